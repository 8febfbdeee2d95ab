//! Terrain engine configuration
//!
//! Every field has a compiled default, so a RON document only needs to
//! name the values it overrides:
//!
//! ```ron
//! (collision_radius: 0.05, cut: (min_radius: 0.25))
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::terrain::Material;
use crate::TerrainError;

/// Terrain engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Material of terrain shapes (static and dynamic)
    pub material: Material,

    /// Material of anchors
    pub anchor_material: Material,

    /// Rounding radius of triangle colliders (0 = sharp triangles)
    pub collision_radius: f32,

    /// Emit closed perimeter colliders per contour when positive
    pub skin_thickness: f32,

    /// Dynamic group pose changes below this are ignored
    pub motion_epsilon: f32,

    #[serde(default)]
    pub cut: CutLimits,

    #[serde(default)]
    pub layers: DrawLayers,

    /// Physics gravity
    pub gravity: Vec2,
}

/// Rejection thresholds for segment cuts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutLimits {
    /// Shortest accepted segment length
    pub min_length: f32,
    /// Smallest accepted half-width
    pub min_radius: f32,
}

impl Default for CutLimits {
    fn default() -> Self {
        Self {
            min_length: 1e-2,
            min_radius: 1e-2,
        }
    }
}

/// Draw layer per drawable kind; lower layers draw first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawLayers {
    pub anchors: u32,
    pub shapes: u32,
    pub elements: u32,
}

impl Default for DrawLayers {
    fn default() -> Self {
        Self {
            anchors: 0,
            shapes: 1,
            elements: 2,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            material: Material::default(),
            anchor_material: Material::anchor(),
            collision_radius: 0.0,
            skin_thickness: 0.0,
            motion_epsilon: 1e-3,
            cut: CutLimits::default(),
            layers: DrawLayers::default(),
            gravity: Vec2::new(0.0, -9.81),
        }
    }
}

impl TerrainConfig {
    /// Parse a RON document; missing fields keep their defaults
    pub fn from_ron_str(source: &str) -> Result<Self, TerrainError> {
        Ok(ron::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TerrainConfig::default();
        assert_eq!(config.material.density, 1.0);
        assert_eq!(config.collision_radius, 0.0);
        assert_eq!(config.layers.shapes, 1);
        assert_eq!(config.gravity, Vec2::new(0.0, -9.81));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = TerrainConfig::from_ron_str(
            "(collision_radius: 0.05, cut: (min_radius: 0.25), material: (density: 2.0))",
        )
        .expect("valid config");
        assert_eq!(config.collision_radius, 0.05);
        assert_eq!(config.cut.min_radius, 0.25);
        assert_eq!(config.cut.min_length, CutLimits::default().min_length);
        assert_eq!(config.material.density, 2.0);
        assert_eq!(config.material.friction, Material::default().friction);
        assert_eq!(config.motion_epsilon, 1e-3);
    }

    #[test]
    fn test_invalid_ron_is_config_error() {
        let result = TerrainConfig::from_ron_str("(collision_radius: \"wide\")");
        assert!(matches!(result, Err(TerrainError::Config(_))));
    }
}
