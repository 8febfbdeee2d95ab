//! Rigid body physics for terrain groups and anchors

use glam::Vec2;
use rapier2d::parry::bounding_volume::Aabb;
use rapier2d::parry::mass_properties::MassProperties;
use rapier2d::prelude::*;

use crumble_geometry::Bounds;

use crate::terrain::CollisionFilter;

/// Mass distribution handed to the physics engine when a body is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMass {
    /// Total mass
    pub mass: f32,
    /// Center of mass in body-local coordinates
    pub local_center: Vec2,
    /// Angular inertia about the center of mass
    pub inertia: f32,
}

/// Manages the rapier2d physics world
pub struct PhysicsWorld {
    /// Rapier rigid body set
    rigid_body_set: RigidBodySet,

    /// Rapier collider set
    collider_set: ColliderSet,

    /// Physics pipeline
    pipeline: PhysicsPipeline,

    /// Integration parameters
    integration_parameters: IntegrationParameters,

    /// Island manager
    island_manager: IslandManager,

    /// Broad phase
    broad_phase: BroadPhase,

    /// Narrow phase
    narrow_phase: NarrowPhase,

    /// Impulse joint set
    impulse_joint_set: ImpulseJointSet,

    /// Multibody joint set
    multibody_joint_set: MultibodyJointSet,

    /// CCD solver
    ccd_solver: CCDSolver,

    /// Query pipeline
    query_pipeline: QueryPipeline,

    /// Gravity applied every step
    gravity: Vector<Real>,

    /// Colliders were added or removed since the query pipeline was last rebuilt
    query_dirty: bool,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: 1.0 / 60.0, // 60 FPS
            ..Default::default()
        };

        log::debug!(
            "Physics: Created world with gravity ({:.2}, {:.2})",
            gravity.x,
            gravity.y
        );

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            gravity: vector![gravity.x, gravity.y],
            query_dirty: false,
        }
    }

    /// Set the fixed timestep used by `step`
    pub fn set_timestep(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
    }

    pub fn timestep(&self) -> f32 {
        self.integration_parameters.dt
    }

    /// Update physics simulation
    pub fn step(&mut self) {
        let physics_hooks = ();
        let event_handler = ();

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &event_handler,
        );
        self.query_dirty = false;
    }

    // ===== Bodies =====

    /// Create an immovable body
    pub fn create_fixed_body(&mut self, position: Vec2) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![position.x, position.y])
            .build();
        self.rigid_body_set.insert(body)
    }

    /// Create a simulated body with explicit mass properties
    ///
    /// Colliders attached to it are expected to have zero density, so the
    /// mass given here is the body's total mass.
    pub fn create_dynamic_body(&mut self, position: Vec2, angle: f32, mass: &BodyMass) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .rotation(angle)
            .additional_mass_properties(MassProperties::new(
                point![mass.local_center.x, mass.local_center.y],
                mass.mass,
                mass.inertia,
            ))
            .build();

        let handle = self.rigid_body_set.insert(body);

        log::trace!(
            "Physics: Created dynamic body {:?} at ({:.1}, {:.1}), mass={:.2}",
            handle,
            position.x,
            position.y,
            mass.mass
        );

        handle
    }

    /// Remove a body together with any colliders still attached to it
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        if self
            .rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
        {
            self.query_dirty = true;
        }
    }

    /// Current position and rotation of a body
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<(Vec2, f32)> {
        self.rigid_body_set.get(handle).map(|body| {
            let translation = body.translation();
            (Vec2::new(translation.x, translation.y), body.rotation().angle())
        })
    }

    /// Teleport a body
    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, position: Vec2, angle: f32) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_position(Isometry::new(vector![position.x, position.y], angle), true);
            self.query_dirty = true;
        }
    }

    pub fn is_sleeping(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .get(handle)
            .is_some_and(|body| body.is_sleeping())
    }

    /// Linear velocity of the body material at a world-space point
    pub fn velocity_at_point(&self, handle: RigidBodyHandle, point: Vec2) -> Option<Vec2> {
        self.rigid_body_set.get(handle).map(|body| {
            let v = body.velocity_at_point(&point![point.x, point.y]);
            Vec2::new(v.x, v.y)
        })
    }

    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> Option<f32> {
        self.rigid_body_set.get(handle).map(|body| body.angvel())
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.rigid_body_set.get(handle).map(|body| {
            let v = body.linvel();
            Vec2::new(v.x, v.y)
        })
    }

    pub fn set_velocity(&mut self, handle: RigidBodyHandle, linear: Vec2, angular: f32) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_linvel(vector![linear.x, linear.y], true);
            body.set_angvel(angular, true);
        }
    }

    // ===== Colliders =====

    /// Attach a triangle collider given in body-local coordinates
    pub fn add_triangle_collider(
        &mut self,
        parent: RigidBodyHandle,
        triangle: [Vec2; 3],
        border_radius: f32,
        filter: &CollisionFilter,
        friction: f32,
    ) -> ColliderHandle {
        let [a, b, c] = triangle.map(|p| point![p.x, p.y]);
        let builder = if border_radius > 0.0 {
            ColliderBuilder::round_triangle(a, b, c, border_radius)
        } else {
            ColliderBuilder::triangle(a, b, c)
        };
        let collider = builder
            .density(0.0)
            .friction(friction)
            .collision_groups(interaction_groups(filter))
            .build();

        self.query_dirty = true;
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Attach a closed polyline along a contour, in body-local coordinates
    pub fn add_loop_collider(
        &mut self,
        parent: RigidBodyHandle,
        points: &[Vec2],
        filter: &CollisionFilter,
        friction: f32,
    ) -> ColliderHandle {
        let vertices: Vec<Point<Real>> = points.iter().map(|p| point![p.x, p.y]).collect();
        let n = vertices.len() as u32;
        let indices: Vec<[u32; 2]> = (0..n).map(|i| [i, (i + 1) % n]).collect();

        let collider = ColliderBuilder::polyline(vertices, Some(indices))
            .density(0.0)
            .friction(friction)
            .collision_groups(interaction_groups(filter))
            .build();

        self.query_dirty = true;
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        if self
            .collider_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.rigid_body_set,
                true,
            )
            .is_some()
        {
            self.query_dirty = true;
        }
    }

    /// Membership bits of a collider's collision filter
    pub fn collider_category(&self, handle: ColliderHandle) -> Option<u32> {
        self.collider_set
            .get(handle)
            .map(|c| c.collision_groups().memberships.bits())
    }

    /// Broad-phase query: colliders whose bounding boxes overlap `bounds`
    pub fn colliders_in_bounds(&mut self, bounds: &Bounds) -> Vec<ColliderHandle> {
        if bounds.is_empty() {
            return Vec::new();
        }
        if self.query_dirty {
            // Teleported bodies have not moved their colliders yet
            self.rigid_body_set
                .propagate_modified_body_positions_to_colliders(&mut self.collider_set);
            self.query_pipeline
                .update(&self.rigid_body_set, &self.collider_set);
            self.query_dirty = false;
        }

        let aabb = Aabb::new(
            point![bounds.min.x, bounds.min.y],
            point![bounds.max.x, bounds.max.y],
        );
        let mut hits = Vec::new();
        self.query_pipeline
            .colliders_with_aabb_intersecting_aabb(&aabb, |handle| {
                hits.push(*handle);
                true
            });
        hits
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Get reference to rigid body set
    pub fn rigid_body_set(&self) -> &RigidBodySet {
        &self.rigid_body_set
    }

    /// Get reference to collider set
    pub fn collider_set(&self) -> &ColliderSet {
        &self.collider_set
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, -9.81))
    }
}

fn interaction_groups(filter: &CollisionFilter) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(filter.category),
        Group::from_bits_truncate(filter.mask),
    )
}
