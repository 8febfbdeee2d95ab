mod config;
mod scene;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use glam::Affine2;

use crumble_core::terrain::{TerrainEvent, TerrainRenderer};
use crumble_core::World;
use crumble_geometry::{Bounds, TriMesh};

use crate::config::DriverConfig;
use crate::scene::SceneDescription;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene file (RON); runs the built-in demo when omitted
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Number of physics steps (overrides the config file)
    #[arg(long)]
    steps: Option<usize>,

    /// Physics timestep in seconds (overrides the config file)
    #[arg(long)]
    dt: Option<f32>,

    /// Print the built-in demo scene as RON and exit
    #[arg(long)]
    list_demo: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.list_demo {
        println!("{}", SceneDescription::demo().to_ron_string()?);
        return Ok(());
    }

    let mut config = DriverConfig::load()?;
    if let Some(steps) = args.steps {
        config.simulation.steps = steps;
    }
    if let Some(dt) = args.dt {
        config.simulation.dt = dt;
    }

    let scene = match &args.scene {
        Some(path) => SceneDescription::load(path)?,
        None => SceneDescription::demo(),
    };

    log::info!("Starting Crumble scene '{}'", scene.name);
    log::info!("  Steps: {}", config.simulation.steps);
    log::info!("  Timestep: {:.4}s", config.simulation.dt);
    log::info!("  Scripted cuts: {}", scene.script.len());

    run(&scene, &config);
    Ok(())
}

fn run(scene: &SceneDescription, config: &DriverConfig) {
    let (mut world, attachments) = scene.build_world();
    log::info!("Placed {} attachments", attachments.len());
    log_stats(&world, "built");

    let dt = config.simulation.dt;
    world.physics_mut().set_timestep(dt);
    world.step(0.0);

    for step in 0..config.simulation.steps {
        for cut in scene.cuts_at(step) {
            match cut.apply(&mut world) {
                Ok(stats) => log::info!(
                    "Step {}: cut {} shapes into {} pieces ({} new dynamic groups)",
                    step,
                    stats.shapes_cut,
                    stats.pieces,
                    stats.rebuild.dynamic_groups
                ),
                Err(e) => log::warn!("Step {}: cut rejected: {}", step, e),
            }
        }

        world.physics_mut().step();
        let time = (step + 1) as f64 * dt as f64;
        world.step(time);
        world.update(time);

        let interval = config.maintenance.interval_steps;
        if interval > 0 && (step + 1) % interval == 0 {
            maintain(&mut world, config);
        }

        for event in world.drain_events() {
            match event {
                TerrainEvent::AttachmentOrphaned(id) => {
                    let label = world.attachment(id).map_or("?", |a| a.label());
                    log::info!("Step {}: attachment '{}' lost its terrain", step, label);
                }
                other => log::trace!("Step {}: {:?}", step, other),
            }
        }

        let report = config.report.stats_interval_steps;
        if report > 0 && (step + 1) % report == 0 {
            log_stats(&world, &format!("step {}", step + 1));
        }
    }

    log_stats(&world, "final");

    let mut renderer = CountingRenderer::default();
    let draw = world.draw(&scene_viewport(&world), &mut renderer);
    log::info!(
        "Draw: {} batches, {} shapes, {} anchors, {} elements, {} triangles",
        draw.batches,
        draw.shapes,
        draw.anchors,
        draw.elements,
        renderer.triangles
    );
}

fn maintain(world: &mut World, config: &DriverConfig) {
    let maintenance = &config.maintenance;
    let culled = world.cull_dynamic_groups(maintenance.cull_min_area, maintenance.cull_portion, |g| {
        g.attachments().is_empty()
    });
    let frozen = world.make_sleeping_dynamic_groups_static(
        maintenance.freeze_sleep_secs,
        maintenance.freeze_portion,
        |_| true,
    );
    if culled + frozen > 0 {
        log::debug!("Maintenance: culled {}, froze {}", culled, frozen);
    }
}

fn log_stats(world: &World, label: &str) {
    let stats = world.stats();
    log::info!(
        "[{}] static shapes={} dynamic groups={} ({} shapes) attachments={} (orphaned {}) bodies={} colliders={}",
        label,
        stats.static_shapes,
        stats.dynamic_groups,
        stats.dynamic_shapes,
        stats.attachments,
        stats.orphaned_attachments,
        stats.bodies,
        stats.colliders
    );
}

/// World-space bounds of everything drawable
fn scene_viewport(world: &World) -> Bounds {
    let terrain = world
        .shapes()
        .map(|(_, shape)| shape.outer().bounds().transformed(&shape.transform()))
        .fold(Bounds::EMPTY, |acc, b| acc.union(&b));
    world
        .anchors()
        .iter()
        .map(|a| a.bounds())
        .chain(world.elements().iter().map(|e| e.bounds()))
        .fold(terrain, |acc, b| acc.union(&b))
}

/// Renderer that only tallies what it is asked to draw
#[derive(Default)]
struct CountingRenderer {
    open: bool,
    triangles: usize,
}

impl TerrainRenderer for CountingRenderer {
    fn begin_batch(&mut self, _batch: u64, _model: Affine2) {
        debug_assert!(!self.open, "nested draw batch");
        self.open = true;
    }

    fn draw_mesh(&mut self, mesh: &TriMesh, _color: [f32; 4]) {
        self.triangles += mesh.triangle_count();
    }

    fn end_batch(&mut self) {
        self.open = false;
    }
}
