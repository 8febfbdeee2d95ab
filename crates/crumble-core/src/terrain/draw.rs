//! Draw dispatcher - spatial index of drawables with batch-ordered culling

use std::collections::HashMap;

use glam::Affine2;
use rstar::{Envelope, RTree, RTreeObject, SelectionFunction, AABB};

use crumble_geometry::{Bounds, TriMesh};

use super::ShapeId;

/// Anything the dispatcher can cull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawableKey {
    Shape(ShapeId),
    /// Index into the world's anchor list
    Anchor(usize),
    /// Index into the world's element list
    Element(usize),
}

/// Receives culled geometry, one model matrix per batch
pub trait TerrainRenderer {
    fn begin_batch(&mut self, batch: u64, model: Affine2);
    fn draw_mesh(&mut self, mesh: &TriMesh, color: [f32; 4]);
    fn end_batch(&mut self);
}

/// Counts from one draw pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub batches: usize,
    pub shapes: usize,
    pub anchors: usize,
    pub elements: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct DrawEntry {
    key: DrawableKey,
    envelope: AABB<[f32; 2]>,
    layer: u32,
    batch: u64,
}

impl RTreeObject for DrawEntry {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Selects entries whose envelope touches the query box
struct Intersecting(AABB<[f32; 2]>);

impl SelectionFunction<DrawEntry> for Intersecting {
    fn should_unpack_parent(&self, envelope: &AABB<[f32; 2]>) -> bool {
        envelope.intersects(&self.0)
    }

    fn should_unpack_leaf(&self, leaf: &DrawEntry) -> bool {
        leaf.envelope.intersects(&self.0)
    }
}

/// Culled drawable with its ordering keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleDrawable {
    pub key: DrawableKey,
    pub layer: u32,
    pub batch: u64,
}

/// R-tree over drawable bounds
///
/// Lifetime is explicit: callers `add` and `remove` entries, and report
/// motion through `moved`.
#[derive(Default)]
pub struct DrawDispatcher {
    tree: RTree<DrawEntry>,
    entries: HashMap<DrawableKey, DrawEntry>,
}

impl DrawDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a drawable
    pub fn add(&mut self, key: DrawableKey, bounds: Bounds, layer: u32, batch: u64) {
        self.remove(key);
        let entry = DrawEntry {
            key,
            envelope: to_envelope(&bounds),
            layer,
            batch,
        };
        self.tree.insert(entry.clone());
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: DrawableKey) -> bool {
        match self.entries.remove(&key) {
            Some(entry) => {
                self.tree.remove(&entry);
                true
            }
            None => false,
        }
    }

    /// Reindex a drawable after it moved
    pub fn moved(&mut self, key: DrawableKey, bounds: Bounds) {
        if let Some(entry) = self.entries.get(&key) {
            let (layer, batch) = (entry.layer, entry.batch);
            self.add(key, bounds, layer, batch);
        }
    }

    pub fn contains(&self, key: DrawableKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drawables overlapping `viewport`, ordered by layer then batch
    pub fn cull(&self, viewport: &Bounds) -> Vec<VisibleDrawable> {
        if viewport.is_empty() {
            return Vec::new();
        }
        let mut visible: Vec<VisibleDrawable> = self
            .tree
            .locate_with_selection_function(Intersecting(to_envelope(viewport)))
            .map(|entry| VisibleDrawable {
                key: entry.key,
                layer: entry.layer,
                batch: entry.batch,
            })
            .collect();
        visible.sort_by_key(|v| (v.layer, v.batch, v.key));
        visible.dedup_by_key(|v| v.key);
        visible
    }
}

fn to_envelope(bounds: &Bounds) -> AABB<[f32; 2]> {
    if bounds.is_empty() {
        // Unbounded drawables sit at the origin with no extent
        return AABB::from_point([0.0, 0.0]);
    }
    AABB::from_corners(
        [bounds.min.x, bounds.min.y],
        [bounds.max.x, bounds.max.y],
    )
}
