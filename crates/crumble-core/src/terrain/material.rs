//! Physical and visual material of a terrain group

use serde::{Deserialize, Serialize};

/// Collision category bit for terrain shapes
pub const TERRAIN_CATEGORY: u32 = 1 << 0;
/// Collision category bit for anchors
pub const ANCHOR_CATEGORY: u32 = 1 << 1;

/// Collision filter bit masks, mapped onto rapier interaction groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    /// Categories this collider belongs to
    pub category: u32,
    /// Categories this collider collides with
    pub mask: u32,
}

impl CollisionFilter {
    pub fn new(category: u32, mask: u32) -> Self {
        Self { category, mask }
    }

    pub fn belongs_to(&self, category: u32) -> bool {
        self.category & category != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::new(TERRAIN_CATEGORY, u32::MAX)
    }
}

/// Material shared by every shape of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Mass per unit area
    pub density: f32,
    pub friction: f32,
    pub filter: CollisionFilter,
    /// Groups (and static shapes) smaller than this are discarded
    pub min_surface_area: f32,
    /// RGBA draw color
    pub color: [f32; 4],
}

impl Material {
    /// Default material for anchors
    pub fn anchor() -> Self {
        Self {
            density: 0.0,
            friction: 0.8,
            filter: CollisionFilter::new(ANCHOR_CATEGORY, u32::MAX),
            min_surface_area: 0.0,
            color: [0.25, 0.25, 0.3, 1.0],
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.6,
            filter: CollisionFilter::default(),
            min_surface_area: 1.0,
            color: [0.55, 0.4, 0.25, 1.0],
        }
    }
}
