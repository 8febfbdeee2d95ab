//! Runtime cutting
//!
//! A cut subtracts a world-space polygon from every terrain shape it
//! touches, then regroups the results together with their siblings. Parent
//! groups give up their shapes before the rebuild; dynamic parents stay
//! alive until it finishes so children can inherit their motion.

use std::collections::{BTreeSet, HashMap, VecDeque};

use glam::Vec2;

use crumble_geometry::{Bounds, Contour, PolyEdge, PolygonWithHoles};

use super::{GroupId, RebuildStats, Shape, ShapeId, Subtraction, TerrainEvent, World};
use crate::TerrainError;

/// Outcome of one cut
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CutStats {
    /// Shapes the cutter changed
    pub shapes_cut: usize,
    /// Shapes removed completely
    pub shapes_consumed: usize,
    /// Pieces produced by the subtraction
    pub pieces: usize,
    pub rebuild: RebuildStats,
}

impl CutStats {
    /// True when the cut changed nothing
    pub fn is_empty(&self) -> bool {
        self.shapes_cut == 0
    }

    pub fn merge(&mut self, other: CutStats) {
        self.shapes_cut += other.shapes_cut;
        self.shapes_consumed += other.shapes_consumed;
        self.pieces += other.pieces;
        self.rebuild.merge(other.rebuild);
    }
}

impl World {
    /// Cut a capsule of half-width `radius` around the segment `a`-`b`.
    ///
    /// `min_surface_area <= 0` keeps the configured threshold.
    pub fn cut_segment(
        &mut self,
        a: Vec2,
        b: Vec2,
        radius: f32,
        min_surface_area: f32,
    ) -> Result<CutStats, TerrainError> {
        let length = a.distance(b);
        let limits = self.config.cut;
        if length < limits.min_length || radius < limits.min_radius {
            log::warn!(
                "Cut: rejecting segment ({:.2}, {:.2})-({:.2}, {:.2}) radius {:.3}",
                a.x,
                a.y,
                b.x,
                b.y,
                radius
            );
            return Err(TerrainError::DegenerateCut {
                length,
                min_length: limits.min_length,
                radius,
                min_radius: limits.min_radius,
            });
        }

        let polygon = Contour::capsule(a, b, radius);
        let bounds = polygon.bounds();
        self.cut(&polygon, bounds, min_surface_area)
    }

    /// Subtract a world-space polygon from the terrain.
    ///
    /// `approximate_bounds` drives the broad-phase lookup and must cover the
    /// polygon. `min_surface_area > 0` overrides the area threshold for the
    /// duration of this cut.
    pub fn cut(
        &mut self,
        polygon: &Contour,
        approximate_bounds: Bounds,
        min_surface_area: f32,
    ) -> Result<CutStats, TerrainError> {
        let region = PolygonWithHoles::from(polygon.clone());
        self.cut_with_holes(&region, approximate_bounds, min_surface_area)
    }

    /// Like [`World::cut`] for a polygon with holes; terrain inside the
    /// holes is left in place.
    pub(crate) fn cut_with_holes(
        &mut self,
        region: &PolygonWithHoles,
        approximate_bounds: Bounds,
        min_surface_area: f32,
    ) -> Result<CutStats, TerrainError> {
        if !region.outer.is_valid() {
            return Err(TerrainError::DegenerateCutPolygon(region.outer.len()));
        }

        let saved = self.min_surface_area;
        if min_surface_area > 0.0 {
            self.min_surface_area = min_surface_area;
        }
        let stats = self.cut_region(region, &approximate_bounds);
        self.min_surface_area = saved;
        Ok(stats)
    }

    fn cut_region(&mut self, region: &PolygonWithHoles, bounds: &Bounds) -> CutStats {
        let mut stats = CutStats::default();
        let category = self.config.material.filter.category;
        let candidates = self.store.shapes_in_bounds(bounds, category);

        let mut cut: Vec<(ShapeId, Option<GroupId>)> = Vec::new();
        let mut pieces: Vec<(Shape, Option<GroupId>)> = Vec::new();
        for id in candidates {
            let Some(shape) = self.store.shapes.get(id) else {
                continue;
            };
            let parent = shape.group();
            match shape.subtract_region(region) {
                Subtraction::Unchanged => {}
                Subtraction::Consumed => {
                    stats.shapes_consumed += 1;
                    cut.push((id, parent));
                }
                Subtraction::Pieces(result) => {
                    cut.push((id, parent));
                    pieces.extend(result.into_iter().map(|piece| (piece, parent)));
                }
            }
        }
        if cut.is_empty() {
            log::trace!("Cut: no shape changed");
            return stats;
        }
        stats.shapes_cut = cut.len();
        stats.pieces = pieces.len();

        let cut_ids: BTreeSet<ShapeId> = cut.iter().map(|(id, _)| *id).collect();
        let parents: BTreeSet<GroupId> = cut.iter().filter_map(|(_, g)| *g).collect();

        // Siblings of the cut shapes are regrouped with the pieces
        let mut affected = Vec::new();
        let mut parentage: HashMap<ShapeId, GroupId> = HashMap::new();
        for &parent in &parents {
            let siblings = if parent == self.static_group {
                self.static_component(&cut_ids)
            } else {
                self.store.groups[parent]
                    .shapes()
                    .iter()
                    .copied()
                    .filter(|id| !cut_ids.contains(id))
                    .collect()
            };
            for id in siblings {
                affected.push(id);
                parentage.insert(id, parent);
            }
        }
        for (piece, parent) in pieces {
            let id = self.store.insert_shape(piece);
            affected.push(id);
            if let Some(parent) = parent {
                parentage.insert(id, parent);
            }
        }

        // Parents give up ownership before anything is rebuilt
        let mut retired = Vec::new();
        for &parent in &parents {
            if parent == self.static_group {
                for (id, owner) in &parentage {
                    if *owner == parent {
                        self.store.static_remove_shape(parent, *id);
                    }
                }
            } else {
                self.store.release_group_shapes(parent);
                self.store.groups[parent].retired = true;
                retired.push(parent);
            }
        }
        for id in &cut_ids {
            self.store.destroy_shape(*id);
        }

        stats.rebuild = self.rebuild(affected.clone(), &parentage);

        for parent in retired {
            let leftovers = self.take_migrating_attachments(parent, &BTreeSet::new());
            for id in leftovers {
                if self.rehome_attachment(id, &affected) {
                    stats.rebuild.rehomed_attachments += 1;
                } else {
                    stats.rebuild.orphaned_attachments += 1;
                }
            }
            self.store.destroy_group(parent);
            self.events.push(TerrainEvent::GroupRemoved(parent));
        }

        log::debug!(
            "Cut: {} shapes cut ({} consumed) into {} pieces",
            stats.shapes_cut,
            stats.shapes_consumed,
            stats.pieces
        );
        stats
    }

    /// Static shapes edge-connected to the cut static shapes, excluding them
    fn static_component(&mut self, cut_ids: &BTreeSet<ShapeId>) -> Vec<ShapeId> {
        let members = self.store.groups[self.static_group].shapes().clone();

        let mut by_edge: HashMap<PolyEdge, Vec<ShapeId>> = HashMap::new();
        let mut edges_of: HashMap<ShapeId, Vec<PolyEdge>> = HashMap::new();
        for &id in &members {
            if let Some(shape) = self.store.shapes.get_mut(id) {
                let edges = shape.world_edges().to_vec();
                for edge in &edges {
                    by_edge.entry(*edge).or_default().push(id);
                }
                edges_of.insert(id, edges);
            }
        }

        let mut visited: BTreeSet<ShapeId> = cut_ids
            .iter()
            .copied()
            .filter(|id| members.contains(id))
            .collect();
        let mut queue: VecDeque<ShapeId> = visited.iter().copied().collect();
        let mut component = Vec::new();

        while let Some(id) = queue.pop_front() {
            let Some(edges) = edges_of.get(&id) else {
                continue;
            };
            for edge in edges {
                for &neighbor in by_edge.get(edge).into_iter().flatten() {
                    if visited.insert(neighbor) {
                        component.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Attachment;
    use crate::terrain::Orientation;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Contour {
        Contour::rect(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    fn anchored_bar() -> World {
        let mut world = World::default();
        world.build_from_contours(
            vec![rect(0.0, 0.0, 100.0, 10.0)],
            vec![rect(-5.0, -5.0, 10.0, 15.0)],
            Vec::new(),
        );
        world
    }

    #[test]
    fn test_degenerate_segment_is_rejected() {
        let mut world = anchored_bar();
        let before = world.stats();
        let result = world.cut_segment(Vec2::new(50.0, 5.0), Vec2::new(50.0, 5.0), 2.0, 0.0);
        assert!(matches!(result, Err(TerrainError::DegenerateCut { .. })));
        let result = world.cut_segment(Vec2::new(50.0, -20.0), Vec2::new(50.0, 30.0), 0.0, 0.0);
        assert!(matches!(result, Err(TerrainError::DegenerateCut { .. })));
        assert_eq!(world.stats(), before);
    }

    #[test]
    fn test_degenerate_polygon_is_rejected() {
        let mut world = anchored_bar();
        let line = Contour::new(vec![Vec2::ZERO, Vec2::ONE]);
        let result = world.cut(&line, line.bounds(), 0.0);
        assert!(matches!(result, Err(TerrainError::DegenerateCutPolygon(2))));
    }

    #[test]
    fn test_cut_outside_changes_nothing() {
        let mut world = anchored_bar();
        let stats = world
            .cut_segment(Vec2::new(200.0, 0.0), Vec2::new(210.0, 0.0), 1.0, 0.0)
            .expect("valid cut");
        assert!(stats.is_empty());
        assert_eq!(world.stats().static_shapes, 1);
    }

    #[test]
    fn test_override_area_is_restored() {
        let mut world = anchored_bar();
        world
            .cut_segment(Vec2::new(50.0, -20.0), Vec2::new(50.0, 30.0), 2.0, 5000.0)
            .expect("valid cut");
        assert_eq!(world.min_surface_area(), world.config().material.min_surface_area);
        // Both halves are below the override and are discarded
        assert_eq!(world.stats().dynamic_groups, 0);
        assert_eq!(world.stats().static_shapes, 0);
    }

    #[test]
    fn test_cut_notch_keeps_single_static_shape() {
        let mut world = anchored_bar();
        let stats = world
            .cut_segment(Vec2::new(50.0, 12.0), Vec2::new(60.0, 12.0), 4.0, 0.0)
            .expect("valid cut");
        assert_eq!(stats.shapes_cut, 1);
        assert_eq!(stats.pieces, 1);
        assert_eq!(world.stats().static_shapes, 1);
        assert_eq!(world.stats().dynamic_groups, 0);
    }

    #[test]
    fn test_static_attachment_on_free_half_follows_debris() {
        let mut world = anchored_bar();
        let id = world
            .add_attachment(Attachment::new("barrel"), Vec2::new(80.0, 5.0), Orientation::default())
            .expect("attached");
        world
            .cut_segment(Vec2::new(50.0, -20.0), Vec2::new(50.0, 30.0), 2.0, 0.0)
            .expect("valid cut");

        let group = world
            .attachment(id)
            .and_then(Attachment::group)
            .expect("attachment rehomed");
        assert!(world.group(group).is_some_and(|g| g.is_dynamic()));
        assert!(world.orphaned_attachments().next().is_none());
    }

    #[test]
    fn test_consumed_dynamic_group_orphans_attachment() {
        let mut world = World::default();
        world.build_from_contours(vec![rect(0.0, 20.0, 4.0, 24.0)], Vec::new(), Vec::new());
        let id = world
            .add_attachment(Attachment::new("gem"), Vec2::new(2.0, 22.0), Orientation::default())
            .expect("attached");
        world.drain_events();

        let cutter = rect(-10.0, 10.0, 20.0, 30.0);
        let stats = world.cut(&cutter, cutter.bounds(), 0.0).expect("valid cut");
        assert_eq!(stats.shapes_consumed, 1);
        assert_eq!(world.stats().dynamic_groups, 0);
        assert_eq!(world.orphaned_attachments().collect::<Vec<_>>(), vec![id]);

        let events = world.drain_events();
        assert!(events.contains(&TerrainEvent::AttachmentOrphaned(id)));
        assert!(events.iter().any(|e| matches!(e, TerrainEvent::GroupRemoved(_))));
        // Bodies left: static group and anchors
        assert_eq!(world.physics().body_count(), 2);
    }
}
