//! Terrain shape - one solid outline with holes

use glam::{Affine2, Vec2};
use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};

use crumble_geometry::boolean::{self, PolygonWithHoles};
use crumble_geometry::edge::contour_edges;
use crumble_geometry::triangulate::triangle_signed_area;
use crumble_geometry::{
    build_contour_tree, triangulate, Bounds, Cached, Contour, InvalidationToken, PolyEdge,
    TriMesh, Winding,
};

use super::{GroupId, Material};
use crate::physics::PhysicsWorld;

slotmap::new_key_type! {
    /// Stable identity of a shape in the world arena
    pub struct ShapeId;
}

/// Triangles with less area than this get no collider
const MIN_TRIANGLE_AREA: f32 = 1e-6;

/// Aggregated mass properties of a triangulated shape
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MassData {
    pub mass: f32,
    /// Moment of inertia about the model origin
    pub moment: f32,
    pub area: f32,
    /// Area-weighted centroid in model space
    pub center: Vec2,
}

impl MassData {
    /// Combine two mass distributions sharing the same model origin
    pub fn combine(self, other: MassData) -> MassData {
        let area = self.area + other.area;
        let center = if area > 0.0 {
            (self.center * self.area + other.center * other.area) / area
        } else {
            Vec2::ZERO
        };
        MassData {
            mass: self.mass + other.mass,
            moment: self.moment + other.moment,
            area,
            center,
        }
    }

    /// Moment of inertia about the center of mass
    pub fn central_moment(&self) -> f32 {
        (self.moment - self.mass * self.center.length_squared()).max(0.0)
    }
}

/// Outcome of subtracting a cut polygon from a shape
#[derive(Debug)]
pub enum Subtraction {
    /// Cutter missed or the boolean operation degenerated
    Unchanged,
    /// Nothing of the shape is left
    Consumed,
    /// Remaining pieces, as new world-space shapes
    Pieces(Vec<Shape>),
}

/// World-space projection of the model contours
#[derive(Debug, Clone)]
struct WorldGeometry {
    outer: Contour,
    edges: Vec<PolyEdge>,
    bounds: Bounds,
}

/// One solid outline with holes, owned by exactly one group
#[derive(Debug)]
pub struct Shape {
    /// Clockwise outer contour in model space
    outer: Contour,
    /// Counter-clockwise hole contours in model space
    holes: Vec<Contour>,
    /// Area centroid in model space
    centroid: Vec2,
    mesh: Option<TriMesh>,
    colliders: Vec<ColliderHandle>,
    /// Model-space bounds of the colliders
    collider_bounds: Bounds,
    group: Option<GroupId>,
    /// Copy of the owning group's draw batch
    group_batch: u64,
    /// Copy of the owning group's model transform
    transform: Affine2,
    token: InvalidationToken,
    world: Cached<WorldGeometry>,
}

impl Shape {
    /// Create a shape from world-space contours, fixing up winding
    pub fn from_world_contours(outer: Contour, holes: Vec<Contour>) -> Self {
        let outer = outer.with_winding(Winding::Clockwise);
        let holes: Vec<Contour> = holes
            .into_iter()
            .filter(Contour::is_valid)
            .map(|h| h.with_winding(Winding::CounterClockwise))
            .collect();
        let centroid = area_centroid(&outer, &holes);

        Self {
            outer,
            holes,
            centroid,
            mesh: None,
            colliders: Vec::new(),
            collider_bounds: Bounds::EMPTY,
            group: None,
            group_batch: 0,
            transform: Affine2::IDENTITY,
            token: InvalidationToken::new(),
            world: Cached::new(),
        }
    }

    /// Split an unordered contour soup into shapes
    pub fn from_contours(soup: Vec<Contour>) -> Vec<Shape> {
        build_contour_tree(soup)
            .into_iter()
            .map(|cluster| Shape::from_world_contours(cluster.outer, cluster.holes))
            .collect()
    }

    pub fn outer(&self) -> &Contour {
        &self.outer
    }

    pub fn holes(&self) -> &[Contour] {
        &self.holes
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    pub fn mesh(&self) -> Option<&TriMesh> {
        self.mesh.as_ref()
    }

    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    pub fn collider_bounds(&self) -> Bounds {
        self.collider_bounds
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn group_batch(&self) -> u64 {
        self.group_batch
    }

    pub fn transform(&self) -> Affine2 {
        self.transform
    }

    /// Outer area minus hole area
    pub fn surface_area(&self) -> f32 {
        self.outer.area() - self.holes.iter().map(Contour::area).sum::<f32>()
    }

    /// Triangulate the model contours. False when no triangles came out.
    pub fn triangulate(&mut self) -> bool {
        match triangulate(&self.outer, &self.holes) {
            Ok(mesh) => {
                self.mesh = Some(mesh);
                true
            }
            Err(e) => {
                log::warn!("Shape: triangulation failed: {}", e);
                self.mesh = None;
                false
            }
        }
    }

    /// Mass, moment about the model origin, area and centroid of the mesh
    pub fn compute_mass_and_moment(&self, density: f32) -> MassData {
        let Some(mesh) = &self.mesh else {
            return MassData::default();
        };

        let mut data = MassData::default();
        let mut first_moment = Vec2::ZERO;
        for [a, b, c] in mesh.triangles() {
            let (a, b, c) = positive_winding(a, b, c);
            let area = triangle_signed_area(a, b, c);
            let mass = density * area;
            let moment = mass / 6.0 * (a.dot(a) + b.dot(b) + c.dot(c) + a.dot(b) + b.dot(c) + c.dot(a));
            if moment.is_nan() {
                continue;
            }
            data.mass += mass;
            data.moment += moment;
            data.area += area;
            first_moment += (a + b + c) / 3.0 * area;
        }
        if data.area > 0.0 {
            data.center = first_moment / data.area;
        }
        data
    }

    /// Create one collider per triangle, parented to `body`.
    ///
    /// # Panics
    ///
    /// Panics if the shape still holds colliders.
    pub fn create_collision_shapes(
        &mut self,
        physics: &mut PhysicsWorld,
        body: RigidBodyHandle,
        material: &Material,
        collision_radius: f32,
        skin_thickness: f32,
    ) -> Bounds {
        assert!(
            self.colliders.is_empty(),
            "collision shapes must be destroyed before they are recreated"
        );

        let Some(mesh) = &self.mesh else {
            return Bounds::EMPTY;
        };

        let mut bounds = Bounds::EMPTY;
        for [a, b, c] in mesh.triangles() {
            let (a, b, c) = positive_winding(a, b, c);
            if triangle_signed_area(a, b, c) <= MIN_TRIANGLE_AREA {
                continue;
            }
            let handle = physics.add_triangle_collider(
                body,
                [a, b, c],
                collision_radius,
                &material.filter,
                material.friction,
            );
            self.colliders.push(handle);
            for p in [a, b, c] {
                bounds.include_point(p);
            }
        }

        if skin_thickness > 0.0 && !self.colliders.is_empty() {
            for contour in std::iter::once(&self.outer).chain(&self.holes) {
                let handle = physics.add_loop_collider(
                    body,
                    contour.points(),
                    &material.filter,
                    material.friction,
                );
                self.colliders.push(handle);
            }
        }

        self.collider_bounds = if bounds.is_empty() {
            bounds
        } else {
            bounds.expanded(collision_radius.max(0.0))
        };
        self.collider_bounds
    }

    /// Release every collider and return the released handles
    pub fn destroy_collision_shapes(&mut self, physics: &mut PhysicsWorld) -> Vec<ColliderHandle> {
        let released = std::mem::take(&mut self.colliders);
        for handle in &released {
            physics.remove_collider(*handle);
        }
        self.collider_bounds = Bounds::EMPTY;
        released
    }

    /// Subtract a world-space polygon from this shape
    pub fn subtract(&self, cutter: &Contour) -> Subtraction {
        self.subtract_region(&PolygonWithHoles::from(cutter.clone()))
    }

    /// Subtract a world-space polygon with holes. Material inside the
    /// cutter's holes is kept as separate pieces.
    pub fn subtract_region(&self, cutter: &PolygonWithHoles) -> Subtraction {
        let inverse = self.transform.inverse();
        let local_cutter = cutter.transformed(&inverse);
        if !local_cutter.outer.bounds().intersects(&self.outer.bounds()) {
            return Subtraction::Unchanged;
        }

        let subject = PolygonWithHoles::new(self.outer.clone(), self.holes.clone());
        let pieces = boolean::difference(&subject, &local_cutter);

        if pieces.is_empty() {
            // Consumed only when the cutter covers the whole surface
            let area = self.surface_area();
            let covered: f32 = boolean::intersection(&subject, &local_cutter)
                .iter()
                .map(PolygonWithHoles::area)
                .sum();
            let tolerance = boolean::SLIVER_AREA.max(area * 1e-5);
            return if (area - covered).abs() <= tolerance {
                Subtraction::Consumed
            } else {
                log::debug!(
                    "Shape: degenerate subtraction (area {:.3}, covered {:.3}), keeping original",
                    area,
                    covered
                );
                Subtraction::Unchanged
            };
        }

        let remaining: f32 = pieces.iter().map(PolygonWithHoles::area).sum();
        if pieces.len() == 1 && (self.surface_area() - remaining).abs() <= boolean::SLIVER_AREA {
            return Subtraction::Unchanged;
        }

        Subtraction::Pieces(
            pieces
                .into_iter()
                .map(|piece| {
                    Shape::from_world_contours(
                        piece.outer.transformed(&self.transform),
                        piece
                            .holes
                            .iter()
                            .map(|h| h.transformed(&self.transform))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// Mesh containment of a model-space point, triangulating on demand
    pub fn is_local_point_inside(&mut self, point: Vec2) -> bool {
        if self.mesh.is_none() && !self.triangulate() {
            return false;
        }
        self.mesh
            .as_ref()
            .is_some_and(|mesh| mesh.contains_point(point))
    }

    pub fn world_to_local(&self, point: Vec2) -> Vec2 {
        self.transform.inverse().transform_point2(point)
    }

    /// World-space outer contour
    pub fn world_outer(&mut self) -> &Contour {
        &self.world_geometry().outer
    }

    /// World-space edge keys of the outer contour and holes
    pub fn world_edges(&mut self) -> &[PolyEdge] {
        &self.world_geometry().edges
    }

    /// Bounds of the world-space edges
    pub fn world_edges_bounds(&mut self) -> Bounds {
        self.world_geometry().bounds
    }

    pub fn world_bounds(&mut self) -> Bounds {
        self.world_edges_bounds()
    }

    /// World-space copies of the outer contour and holes
    pub fn world_contours(&self) -> (Contour, Vec<Contour>) {
        (
            self.outer.transformed(&self.transform),
            self.holes
                .iter()
                .map(|h| h.transformed(&self.transform))
                .collect(),
        )
    }

    fn world_geometry(&mut self) -> &WorldGeometry {
        let (outer, holes, transform) = (&self.outer, &self.holes, &self.transform);
        self.world.get_or_update(self.token, || {
            let world_outer = outer.transformed(transform);
            let world_holes: Vec<Contour> = holes.iter().map(|h| h.transformed(transform)).collect();
            let edges: Vec<PolyEdge> = std::iter::once(&world_outer)
                .chain(&world_holes)
                .flat_map(contour_edges)
                .collect();
            let bounds = world_outer.bounds();
            WorldGeometry {
                outer: world_outer,
                edges,
                bounds,
            }
        })
    }

    // ===== Group bookkeeping =====

    pub(crate) fn set_group(&mut self, group: Option<GroupId>, batch: u64) {
        self.group = group;
        self.group_batch = batch;
    }

    pub(crate) fn set_transform(&mut self, transform: Affine2) {
        if self.transform != transform {
            self.transform = transform;
            self.token.bump();
        }
    }

    /// Adopt the world-space contours as model contours under an identity transform
    pub(crate) fn bake_world_space(&mut self) {
        if self.transform == Affine2::IDENTITY {
            return;
        }
        let (outer, holes) = self.world_contours();
        self.outer = outer;
        self.holes = holes;
        self.centroid = self.transform.transform_point2(self.centroid);
        self.transform = Affine2::IDENTITY;
        self.mesh = None;
        self.token.bump();
    }

    /// Shift the model contours by `offset`
    pub(crate) fn translate_model(&mut self, offset: Vec2) {
        self.outer = self.outer.translated(offset);
        self.holes = self.holes.iter().map(|h| h.translated(offset)).collect();
        self.centroid += offset;
        self.mesh = None;
        self.token.bump();
    }
}

fn positive_winding(a: Vec2, b: Vec2, c: Vec2) -> (Vec2, Vec2, Vec2) {
    if triangle_signed_area(a, b, c) < 0.0 {
        (a, c, b)
    } else {
        (a, b, c)
    }
}

fn area_centroid(outer: &Contour, holes: &[Contour]) -> Vec2 {
    let outer_area = outer.area();
    let mut weighted = outer.centroid() * outer_area;
    let mut area = outer_area;
    for hole in holes {
        let hole_area = hole.area();
        weighted -= hole.centroid() * hole_area;
        area -= hole_area;
    }
    if area > f32::EPSILON {
        weighted / area
    } else {
        outer.centroid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f32, max: f32) -> Shape {
        Shape::from_world_contours(Contour::rect(Vec2::splat(min), Vec2::splat(max)), Vec::new())
    }

    #[test]
    fn test_winding_is_normalized() {
        let shape = Shape::from_world_contours(
            Contour::rect(Vec2::ZERO, Vec2::splat(10.0)),
            vec![Contour::rect(Vec2::splat(4.0), Vec2::splat(6.0)).with_winding(Winding::Clockwise)],
        );
        assert_eq!(shape.outer().winding(), Winding::Clockwise);
        assert_eq!(shape.holes()[0].winding(), Winding::CounterClockwise);
        assert!((shape.surface_area() - 96.0).abs() < 1e-4);
    }

    #[test]
    fn test_from_contours_nests_holes() {
        let shapes = Shape::from_contours(vec![
            Contour::rect(Vec2::splat(4.0), Vec2::splat(6.0)),
            Contour::rect(Vec2::ZERO, Vec2::splat(10.0)),
            Contour::rect(Vec2::splat(20.0), Vec2::splat(21.0)),
        ]);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes.iter().map(|s| s.holes().len()).sum::<usize>(), 1);
    }

    #[test]
    fn test_mass_of_unit_square() {
        let mut shape = square(0.0, 1.0);
        assert!(shape.triangulate());
        let mass = shape.compute_mass_and_moment(2.0);
        assert!((mass.area - 1.0).abs() < 1e-5);
        assert!((mass.mass - 2.0).abs() < 1e-5);
        assert!((mass.center - Vec2::splat(0.5)).length() < 1e-5);
        // Square about its corner: m * (w^2 + h^2) / 3
        assert!((mass.moment - 2.0 * 2.0 / 3.0).abs() < 1e-4);
        // About its center: m * (w^2 + h^2) / 12
        assert!((mass.central_moment() - 2.0 * 2.0 / 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_mass_without_mesh_is_zero() {
        let shape = square(0.0, 1.0);
        assert_eq!(shape.compute_mass_and_moment(1.0), MassData::default());
    }

    #[test]
    fn test_subtract_miss_is_unchanged() {
        let shape = square(0.0, 1.0);
        let cutter = Contour::rect(Vec2::splat(5.0), Vec2::splat(6.0));
        assert!(matches!(shape.subtract(&cutter), Subtraction::Unchanged));
    }

    #[test]
    fn test_subtract_covering_cutter_consumes() {
        let shape = square(0.0, 1.0);
        let cutter = Contour::rect(Vec2::splat(-1.0), Vec2::splat(2.0));
        assert!(matches!(shape.subtract(&cutter), Subtraction::Consumed));
    }

    #[test]
    fn test_subtract_flush_cutter_consumes() {
        let shape = Shape::from_world_contours(
            Contour::rect(Vec2::ZERO, Vec2::splat(4.0)),
            Vec::new(),
        );
        let cutters = [
            Contour::rect(Vec2::new(0.0, -1.0), Vec2::new(4.0, 5.0)),
            Contour::rect(Vec2::ZERO, Vec2::splat(4.0)),
            Contour::rect(Vec2::splat(-1.0), Vec2::new(4.0, 5.0)),
        ];
        for cutter in &cutters {
            assert!(
                matches!(shape.subtract(cutter), Subtraction::Consumed),
                "cutter {:?} should consume the shape",
                cutter.bounds()
            );
        }
    }

    #[test]
    fn test_subtract_ring_keeps_enclosed_island() {
        let shape = Shape::from_world_contours(
            Contour::rect(Vec2::ZERO, Vec2::splat(20.0)),
            Vec::new(),
        );
        let ring = PolygonWithHoles::new(
            Contour::rect(Vec2::splat(4.0), Vec2::splat(16.0)),
            vec![Contour::rect(Vec2::splat(6.0), Vec2::splat(14.0))],
        );
        let Subtraction::Pieces(pieces) = shape.subtract_region(&ring) else {
            panic!("expected pieces");
        };
        assert_eq!(pieces.len(), 2);
        let island = pieces
            .iter()
            .find(|piece| piece.holes().is_empty())
            .expect("island survives");
        assert!((island.surface_area() - 64.0).abs() < 1e-2);
        let frame = pieces
            .iter()
            .find(|piece| !piece.holes().is_empty())
            .expect("frame keeps a hole");
        assert!((frame.surface_area() - 256.0).abs() < 1e-2);
    }

    #[test]
    fn test_subtract_splits_moved_shape() {
        let mut shape = Shape::from_world_contours(
            Contour::rect(Vec2::ZERO, Vec2::new(30.0, 10.0)),
            Vec::new(),
        );
        shape.translate_model(Vec2::new(-15.0, -5.0));
        shape.set_transform(Affine2::from_translation(Vec2::new(15.0, 5.0)));

        let cutter = Contour::rect(Vec2::new(10.0, -1.0), Vec2::new(20.0, 11.0));
        let Subtraction::Pieces(pieces) = shape.subtract(&cutter) else {
            panic!("expected pieces");
        };
        assert_eq!(pieces.len(), 2);
        for piece in &pieces {
            assert_eq!(piece.transform(), Affine2::IDENTITY);
            assert!((piece.surface_area() - 100.0).abs() < 1e-2);
            let bounds = piece.outer().bounds();
            assert!(bounds.min.x >= -1e-3 && bounds.max.x <= 30.0 + 1e-3);
        }
    }

    #[test]
    fn test_world_cache_follows_transform() {
        let mut shape = square(0.0, 1.0);
        let before = shape.world_edges_bounds();
        shape.set_transform(Affine2::from_translation(Vec2::new(10.0, 0.0)));
        let after = shape.world_edges_bounds();
        assert!((after.min.x - before.min.x - 10.0).abs() < 1e-5);
        assert_eq!(shape.world_edges().len(), 4);
    }

    #[test]
    fn test_local_point_inside_triangulates_lazily() {
        let mut shape = square(0.0, 2.0);
        assert!(shape.mesh().is_none());
        assert!(shape.is_local_point_inside(Vec2::splat(1.0)));
        assert!(!shape.is_local_point_inside(Vec2::splat(3.0)));
        assert!(shape.mesh().is_some());
    }

    #[test]
    fn test_bake_world_space_resets_transform() {
        let mut shape = square(0.0, 1.0);
        shape.set_transform(Affine2::from_translation(Vec2::new(3.0, 0.0)));
        shape.bake_world_space();
        assert_eq!(shape.transform(), Affine2::IDENTITY);
        assert!((shape.outer().bounds().min.x - 3.0).abs() < 1e-5);
        assert!((shape.centroid() - Vec2::new(3.5, 0.5)).length() < 1e-5);
    }

    #[test]
    fn test_collision_shapes_round_trip() {
        let mut physics = PhysicsWorld::default();
        let body = physics.create_fixed_body(Vec2::ZERO);
        let mut shape = square(0.0, 1.0);
        shape.triangulate();
        let bounds = shape.create_collision_shapes(&mut physics, body, &Material::default(), 0.0, 0.1);
        // Two triangles plus one perimeter loop
        assert_eq!(shape.colliders().len(), 3);
        assert!(bounds.contains_point(Vec2::splat(0.5)));

        let released = shape.destroy_collision_shapes(&mut physics);
        assert_eq!(released.len(), 3);
        assert!(shape.colliders().is_empty());
        assert_eq!(physics.collider_count(), 0);
    }

    #[test]
    #[should_panic]
    fn test_double_collider_creation_panics() {
        let mut physics = PhysicsWorld::default();
        let body = physics.create_fixed_body(Vec2::ZERO);
        let mut shape = square(0.0, 1.0);
        shape.triangulate();
        shape.create_collision_shapes(&mut physics, body, &Material::default(), 0.0, 0.0);
        shape.create_collision_shapes(&mut physics, body, &Material::default(), 0.0, 0.0);
    }
}
