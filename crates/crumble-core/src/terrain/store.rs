//! Arena of shapes and groups with their physics and draw registrations
//!
//! Every structural change to a group goes through here so that the
//! collider ownership table and the draw dispatcher stay in sync with the
//! arenas.

use std::collections::{BTreeSet, HashMap};

use glam::{Affine2, Vec2};
use rapier2d::prelude::ColliderHandle;
use slotmap::SlotMap;

use crumble_geometry::Bounds;

use super::{
    DrawDispatcher, DrawableKey, DynamicState, Group, GroupId, MassData, Material, Shape, ShapeId,
};
use crate::physics::{BodyMass, PhysicsWorld};

/// Collider construction settings shared by every group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderOptions {
    pub collision_radius: f32,
    pub skin_thickness: f32,
}

pub struct TerrainStore {
    pub(crate) shapes: SlotMap<ShapeId, Shape>,
    pub(crate) groups: SlotMap<GroupId, Group>,
    pub(crate) physics: PhysicsWorld,
    pub(crate) dispatcher: DrawDispatcher,
    /// Which shape owns each terrain collider
    collider_owners: HashMap<ColliderHandle, ShapeId>,
    colliders: ColliderOptions,
    shape_layer: u32,
    next_batch_id: u64,
}

impl TerrainStore {
    pub fn new(physics: PhysicsWorld, colliders: ColliderOptions, shape_layer: u32) -> Self {
        Self {
            shapes: SlotMap::with_key(),
            groups: SlotMap::with_key(),
            physics,
            dispatcher: DrawDispatcher::new(),
            collider_owners: HashMap::new(),
            colliders,
            shape_layer,
            next_batch_id: 1,
        }
    }

    /// Allocate a draw batch identity
    pub fn next_batch(&mut self) -> u64 {
        let id = self.next_batch_id;
        self.next_batch_id += 1;
        id
    }

    pub fn insert_shape(&mut self, shape: Shape) -> ShapeId {
        self.shapes.insert(shape)
    }

    /// Shape owning a terrain collider
    pub fn collider_owner(&self, handle: ColliderHandle) -> Option<ShapeId> {
        self.collider_owners.get(&handle).copied()
    }

    /// Drop a shape: colliders, draw entry, group membership and arena slot
    pub fn destroy_shape(&mut self, id: ShapeId) {
        let Some(mut shape) = self.shapes.remove(id) else {
            return;
        };
        for handle in shape.destroy_collision_shapes(&mut self.physics) {
            self.collider_owners.remove(&handle);
        }
        self.dispatcher.remove(DrawableKey::Shape(id));
        if let Some(group) = shape.group().and_then(|g| self.groups.get_mut(g)) {
            group.shapes.remove(&id);
            group.invalidate_bounds();
        }
    }

    fn release_colliders(&mut self, id: ShapeId) {
        if let Some(shape) = self.shapes.get_mut(id) {
            for handle in shape.destroy_collision_shapes(&mut self.physics) {
                self.collider_owners.remove(&handle);
            }
        }
    }

    fn register_colliders(&mut self, id: ShapeId) {
        if let Some(shape) = self.shapes.get(id) {
            for handle in shape.colliders() {
                self.collider_owners.insert(*handle, id);
            }
        }
    }

    /// Terrain shapes whose colliders overlap `bounds` and belong to `category`
    pub fn shapes_in_bounds(&mut self, bounds: &Bounds, category: u32) -> BTreeSet<ShapeId> {
        let hits = self.physics.colliders_in_bounds(bounds);
        hits.into_iter()
            .filter(|h| {
                self.physics
                    .collider_category(*h)
                    .is_some_and(|bits| bits & category != 0)
            })
            .filter_map(|h| self.collider_owner(h))
            .collect()
    }

    // ===== Static groups =====

    pub fn create_static_group(&mut self, material: Material) -> GroupId {
        let body = self.physics.create_fixed_body(Vec2::ZERO);
        let batch = self.next_batch();
        self.groups.insert(Group::new_static(batch, material, body))
    }

    /// Add a shape to a static group. False when the shape cannot be
    /// triangulated or is smaller than `min_area`; the caller discards it.
    pub fn static_add_shape(&mut self, group_id: GroupId, shape_id: ShapeId, min_area: f32) -> bool {
        let options = self.colliders;
        let Some(group) = self.groups.get_mut(group_id) else {
            return false;
        };
        let Some(shape) = self.shapes.get_mut(shape_id) else {
            return false;
        };

        if shape.transform() != Affine2::IDENTITY {
            for handle in shape.destroy_collision_shapes(&mut self.physics) {
                self.collider_owners.remove(&handle);
            }
            shape.bake_world_space();
        }
        if shape.mesh().is_none() && !shape.triangulate() {
            return false;
        }
        let area = shape.compute_mass_and_moment(1.0).area;
        if area < min_area {
            log::trace!("Static: shape area {:.3} below {:.3}", area, min_area);
            return false;
        }

        shape.set_group(Some(group_id), group.batch_id());
        if shape.colliders().is_empty() {
            shape.create_collision_shapes(
                &mut self.physics,
                group.body(),
                group.material(),
                options.collision_radius,
                options.skin_thickness,
            );
            for handle in shape.colliders() {
                self.collider_owners.insert(*handle, shape_id);
            }
        }
        group.shapes.insert(shape_id);
        group.invalidate_bounds();

        let bounds = shape.world_bounds();
        self.dispatcher.add(
            DrawableKey::Shape(shape_id),
            bounds,
            self.shape_layer,
            group.batch_id(),
        );
        true
    }

    /// Take a shape out of a static group, keeping its colliders
    pub fn static_remove_shape(&mut self, group_id: GroupId, shape_id: ShapeId) {
        if let Some(group) = self.groups.get_mut(group_id) {
            if group.shapes.remove(&shape_id) {
                group.invalidate_bounds();
            }
        }
        if let Some(shape) = self.shapes.get_mut(shape_id) {
            if shape.group() == Some(group_id) {
                shape.set_group(None, 0);
            }
        }
    }

    // ===== Dynamic groups =====

    /// Build one dynamic group from `shape_ids`.
    ///
    /// Returns `None` when nothing survives triangulation and collider
    /// creation, or when the aggregate area is below `min_area`. On failure
    /// no body exists and the caller discards the shapes.
    pub fn build_dynamic_group(
        &mut self,
        shape_ids: &[ShapeId],
        parent: Option<GroupId>,
        material: &Material,
        min_area: f32,
    ) -> Option<GroupId> {
        let batch = self.next_batch();
        let group_id = self.groups.insert(Group::new_dynamic(
            batch,
            material.clone(),
            DynamicState {
                position: Vec2::ZERO,
                angle: 0.0,
                sleep_duration: -1.0,
                mass: MassData::default(),
            },
        ));

        // Reparent, baking the previous transform into the model contours
        let mut members = Vec::with_capacity(shape_ids.len());
        for &id in shape_ids {
            if !self.shapes.contains_key(id) {
                continue;
            }
            self.release_colliders(id);
            let shape = &mut self.shapes[id];
            shape.bake_world_space();
            shape.set_group(Some(group_id), batch);
            members.push(id);
        }
        if members.is_empty() {
            self.groups.remove(group_id);
            return None;
        }

        // Unweighted mean of centroids becomes the body origin
        let origin = members
            .iter()
            .map(|id| self.shapes[*id].centroid())
            .sum::<Vec2>()
            / members.len() as f32;

        let mut survivors = Vec::with_capacity(members.len());
        for id in members {
            let shape = &mut self.shapes[id];
            shape.translate_model(-origin);
            if shape.triangulate() {
                survivors.push(id);
            } else {
                self.destroy_shape(id);
            }
        }

        let mass = survivors
            .iter()
            .map(|id| self.shapes[*id].compute_mass_and_moment(material.density))
            .fold(MassData::default(), MassData::combine);

        if survivors.is_empty() || mass.area < min_area || mass.mass <= 0.0 {
            log::debug!(
                "Dynamic: rejecting group of {} shapes, area {:.3} < {:.3}",
                survivors.len(),
                mass.area,
                min_area
            );
            for id in &survivors {
                self.shapes[*id].set_group(None, 0);
            }
            self.groups.remove(group_id);
            return None;
        }

        let body = self.physics.create_dynamic_body(
            origin,
            0.0,
            &BodyMass {
                mass: mass.mass,
                local_center: mass.center,
                inertia: mass.central_moment().max(f32::EPSILON),
            },
        );

        let transform = Affine2::from_translation(origin);
        let options = self.colliders;
        let mut hosted = BTreeSet::new();
        for id in survivors {
            let shape = &mut self.shapes[id];
            shape.set_transform(transform);
            shape.create_collision_shapes(
                &mut self.physics,
                body,
                material,
                options.collision_radius,
                options.skin_thickness,
            );
            if shape.colliders().is_empty() {
                self.destroy_shape(id);
                continue;
            }
            self.register_colliders(id);
            let bounds = self.shapes[id].world_bounds();
            self.dispatcher
                .add(DrawableKey::Shape(id), bounds, self.shape_layer, batch);
            hosted.insert(id);
        }

        if hosted.is_empty() {
            self.physics.remove_body(body);
            self.groups.remove(group_id);
            return None;
        }

        let group = &mut self.groups[group_id];
        group.set_body(body);
        group.shapes = hosted;
        group.invalidate_bounds();
        if let Some(state) = group.dynamic_state_mut() {
            state.position = origin;
            state.mass = mass;
        }

        // Inherit motion from a dynamic parent
        let parent_body = parent
            .and_then(|p| self.groups.get(p))
            .filter(|g| g.is_dynamic())
            .map(Group::body);
        if let Some(parent_body) = parent_body {
            let linear = self
                .physics
                .velocity_at_point(parent_body, origin)
                .unwrap_or(Vec2::ZERO);
            let angular = self.physics.angular_velocity(parent_body).unwrap_or(0.0);
            self.physics.set_velocity(body, linear, angular);
        }

        log::debug!(
            "Dynamic: built group batch={} shapes={} area={:.2} mass={:.2}",
            batch,
            self.groups[group_id].shapes.len(),
            mass.area,
            mass.mass
        );
        Some(group_id)
    }

    /// Pull a dynamic group's pose from physics and propagate it
    pub fn step_dynamic_group(&mut self, id: GroupId, dt: f64, motion_epsilon: f32) {
        let Some(group) = self.groups.get_mut(id) else {
            return;
        };
        let body = group.body();
        let Some((position, angle)) = self.physics.body_pose(body) else {
            return;
        };
        let sleeping = self.physics.is_sleeping(body);

        let Some(state) = group.dynamic_state_mut() else {
            return;
        };
        let moved = position.distance(state.position) > motion_epsilon
            || (angle - state.angle).abs() > motion_epsilon;
        if moved {
            state.position = position;
            state.angle = angle;
        }
        state.sleep_duration = match (sleeping, state.sleep_duration < 0.0) {
            (false, _) => -1.0,
            (true, true) => 0.0,
            (true, false) => state.sleep_duration + dt,
        };

        if moved {
            let model = group.model_matrix();
            group.invalidate_bounds();
            for shape_id in &group.shapes {
                if let Some(shape) = self.shapes.get_mut(*shape_id) {
                    shape.set_transform(model);
                    self.dispatcher
                        .moved(DrawableKey::Shape(*shape_id), shape.world_bounds());
                }
            }
        }
    }

    /// Detach every shape from a group without touching its colliders
    pub fn release_group_shapes(&mut self, id: GroupId) -> Vec<ShapeId> {
        let Some(group) = self.groups.get_mut(id) else {
            return Vec::new();
        };
        let released: Vec<ShapeId> = std::mem::take(&mut group.shapes).into_iter().collect();
        group.invalidate_bounds();
        for shape_id in &released {
            if let Some(shape) = self.shapes.get_mut(*shape_id) {
                shape.set_group(None, 0);
            }
        }
        released
    }

    /// Destroy a group, its remaining shapes and its body
    pub fn destroy_group(&mut self, id: GroupId) {
        let shapes: Vec<ShapeId> = match self.groups.get(id) {
            Some(group) => group.shapes.iter().copied().collect(),
            None => return,
        };
        for shape_id in shapes {
            self.destroy_shape(shape_id);
        }
        if let Some(group) = self.groups.remove(id) {
            if group.is_dynamic() {
                self.physics.remove_body(group.body());
            }
        }
    }

    /// Union of member world bounds, cached until the group changes
    pub fn group_bounds(&mut self, id: GroupId) -> Bounds {
        let Some(group) = self.groups.get_mut(id) else {
            return Bounds::EMPTY;
        };
        let shapes = &mut self.shapes;
        let members = &group.shapes;
        *group.bounds.get_or_update(group.bounds_token, || {
            members
                .iter()
                .filter_map(|id| shapes.get_mut(*id).map(|shape| shape.world_bounds()))
                .fold(Bounds::EMPTY, |acc, bounds| acc.union(&bounds))
        })
    }

    #[cfg(test)]
    pub fn collider_owner_count(&self) -> usize {
        self.collider_owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crumble_geometry::Contour;

    fn store() -> TerrainStore {
        TerrainStore::new(
            PhysicsWorld::new(Vec2::ZERO),
            ColliderOptions {
                collision_radius: 0.0,
                skin_thickness: 0.0,
            },
            1,
        )
    }

    fn rect_shape(x0: f32, y0: f32, x1: f32, y1: f32) -> Shape {
        Shape::from_world_contours(
            Contour::rect(Vec2::new(x0, y0), Vec2::new(x1, y1)),
            Vec::new(),
        )
    }

    #[test]
    fn test_static_add_registers_everything() {
        let mut store = store();
        let group = store.create_static_group(Material::default());
        let shape = store.insert_shape(rect_shape(0.0, 0.0, 4.0, 4.0));

        assert!(store.static_add_shape(group, shape, 1.0));
        assert_eq!(store.shapes[shape].group(), Some(group));
        assert!(store.dispatcher.contains(DrawableKey::Shape(shape)));
        assert_eq!(store.collider_owner_count(), 2);
        let hits = store.shapes_in_bounds(
            &Bounds::new(Vec2::splat(1.0), Vec2::splat(2.0)),
            Material::default().filter.category,
        );
        assert!(hits.contains(&shape));
        let bounds = store.group_bounds(group);
        assert_eq!(bounds.max, Vec2::splat(4.0));
    }

    #[test]
    fn test_static_add_rejects_small_shape() {
        let mut store = store();
        let group = store.create_static_group(Material::default());
        let shape = store.insert_shape(rect_shape(0.0, 0.0, 0.5, 0.5));
        assert!(!store.static_add_shape(group, shape, 1.0));
        assert!(store.groups[group].shapes().is_empty());
    }

    #[test]
    fn test_dynamic_group_origin_is_mean_centroid() {
        let mut store = store();
        let a = store.insert_shape(rect_shape(0.0, 0.0, 2.0, 2.0));
        let b = store.insert_shape(rect_shape(2.0, 0.0, 4.0, 2.0));
        let group = store
            .build_dynamic_group(&[a, b], None, &Material::default(), 1.0)
            .expect("group builds");

        let g = &store.groups[group];
        assert!(g.is_dynamic());
        assert_eq!(g.shapes().len(), 2);
        assert!((g.position() - Vec2::new(2.0, 1.0)).length() < 1e-5);
        assert!((g.area() - 8.0).abs() < 1e-4);

        // World geometry is unchanged by the rebase
        let bounds = store.group_bounds(group);
        assert!((bounds.min - Vec2::ZERO).length() < 1e-4);
        assert!((bounds.max - Vec2::new(4.0, 2.0)).length() < 1e-4);
    }

    #[test]
    fn test_dynamic_group_below_min_area_fails() {
        let mut store = store();
        let a = store.insert_shape(rect_shape(0.0, 0.0, 1.0, 1.0));
        let bodies_before = store.physics.body_count();
        assert!(store
            .build_dynamic_group(&[a], None, &Material::default(), 5.0)
            .is_none());
        assert_eq!(store.physics.body_count(), bodies_before);
        assert!(store.groups.is_empty());
        assert_eq!(store.shapes[a].group(), None);
    }

    #[test]
    fn test_group_bounds_unions_members() {
        let mut store = store();
        let group = store.create_static_group(Material::default());
        let a = store.insert_shape(rect_shape(0.0, 0.0, 4.0, 4.0));
        let b = store.insert_shape(rect_shape(10.0, -2.0, 12.0, 1.0));
        assert!(store.static_add_shape(group, a, 0.0));
        assert!(store.static_add_shape(group, b, 0.0));

        let bounds = store.group_bounds(group);
        assert_eq!(bounds.min, Vec2::new(0.0, -2.0));
        assert_eq!(bounds.max, Vec2::new(12.0, 4.0));

        store.destroy_group(group);
        assert_eq!(store.group_bounds(group), Bounds::EMPTY);
    }

    #[test]
    fn test_destroy_group_releases_everything() {
        let mut store = store();
        let a = store.insert_shape(rect_shape(0.0, 0.0, 2.0, 2.0));
        let group = store
            .build_dynamic_group(&[a], None, &Material::default(), 0.0)
            .expect("group builds");
        store.destroy_group(group);
        assert!(store.shapes.is_empty());
        assert!(store.groups.is_empty());
        assert_eq!(store.collider_owner_count(), 0);
        assert_eq!(store.physics.collider_count(), 0);
        assert!(store.dispatcher.is_empty());
    }

    #[test]
    fn test_child_inherits_parent_velocity() {
        let mut store = store();
        let a = store.insert_shape(rect_shape(0.0, 0.0, 2.0, 2.0));
        let parent = store
            .build_dynamic_group(&[a], None, &Material::default(), 0.0)
            .expect("parent builds");
        let parent_body = store.groups[parent].body();
        store.physics.set_velocity(parent_body, Vec2::new(3.0, 0.0), 0.0);

        let b = store.insert_shape(rect_shape(10.0, 0.0, 12.0, 2.0));
        let child = store
            .build_dynamic_group(&[b], Some(parent), &Material::default(), 0.0)
            .expect("child builds");
        let velocity = store
            .physics
            .linear_velocity(store.groups[child].body())
            .expect("body exists");
        assert!((velocity - Vec2::new(3.0, 0.0)).length() < 1e-5);
    }
}
