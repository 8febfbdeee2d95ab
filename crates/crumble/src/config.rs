//! Driver configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `crumble.ron` file (if exists)
//! 3. Environment variables prefixed with `CRUMBLE_`
//!
//! Example environment variable: `CRUMBLE_MAINTENANCE__CULL_MIN_AREA=8.0`

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Main driver configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriverConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Fixed-step simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of physics steps to run
    pub steps: usize,
    /// Physics timestep in seconds
    pub dt: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 600,
            dt: 1.0 / 60.0,
        }
    }
}

/// Debris housekeeping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Run maintenance every N steps (0 disables it)
    pub interval_steps: usize,
    /// Dynamic groups below this area are culled
    pub cull_min_area: f32,
    /// Fraction of cull candidates removed per pass
    pub cull_portion: f32,
    /// Seconds a group must sleep before it turns static
    pub freeze_sleep_secs: f64,
    /// Fraction of sleeping groups frozen per pass
    pub freeze_portion: f32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_steps: 60,
            cull_min_area: 4.0,
            cull_portion: 0.5,
            freeze_sleep_secs: 2.0,
            freeze_portion: 0.25,
        }
    }
}

/// Logging of world statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Log terrain statistics every N steps (0 logs only the final summary)
    pub stats_interval_steps: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            stats_interval_steps: 120,
        }
    }
}

impl DriverConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `crumble.ron` file (if exists)
    /// 3. Environment variables prefixed with `CRUMBLE_` (highest priority)
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("simulation.steps", 600_i64)?
            .set_default("simulation.dt", 1.0 / 60.0)?
            .set_default("maintenance.interval_steps", 60_i64)?
            .set_default("maintenance.cull_min_area", 4.0)?
            .set_default("maintenance.cull_portion", 0.5)?
            .set_default("maintenance.freeze_sleep_secs", 2.0)?
            .set_default("maintenance.freeze_portion", 0.25)?
            .set_default("report.stats_interval_steps", 120_i64)?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(
                File::with_name("crumble")
                    .format(config::FileFormat::Ron)
                    .required(false),
            )
            // Layer 3: Environment variables (CRUMBLE_SIMULATION__STEPS, etc.)
            .add_source(Environment::with_prefix("CRUMBLE").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
