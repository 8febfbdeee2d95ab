//! Static and dynamic shape groups

use std::collections::BTreeSet;

use glam::{Affine2, Vec2};
use rapier2d::prelude::RigidBodyHandle;

use crumble_geometry::{Bounds, Cached, InvalidationToken};

use super::{AttachmentId, MassData, Material, ShapeId};

slotmap::new_key_type! {
    /// Stable identity of a group in the world arena
    pub struct GroupId;
}

/// Simulation state of a dynamic group
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicState {
    /// Body translation, also the model origin of member shapes
    pub position: Vec2,
    pub angle: f32,
    /// Seconds spent asleep; negative while awake
    pub sleep_duration: f64,
    pub mass: MassData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupKind {
    /// Shares the world's single fixed body
    Static,
    /// Owns a simulated body
    Dynamic(DynamicState),
}

/// A set of shapes sharing one rigid body
#[derive(Debug)]
pub struct Group {
    batch_id: u64,
    material: Material,
    body: RigidBodyHandle,
    kind: GroupKind,
    pub(crate) shapes: BTreeSet<ShapeId>,
    pub(crate) attachments: BTreeSet<AttachmentId>,
    /// Parent of an in-flight cut, kept alive only until the rebuild finishes
    pub(crate) retired: bool,
    pub(crate) bounds: Cached<Bounds>,
    pub(crate) bounds_token: InvalidationToken,
}

impl Group {
    pub(crate) fn new_static(batch_id: u64, material: Material, body: RigidBodyHandle) -> Self {
        Self::new(batch_id, material, body, GroupKind::Static)
    }

    pub(crate) fn new_dynamic(batch_id: u64, material: Material, state: DynamicState) -> Self {
        Self::new(
            batch_id,
            material,
            RigidBodyHandle::invalid(),
            GroupKind::Dynamic(state),
        )
    }

    fn new(batch_id: u64, material: Material, body: RigidBodyHandle, kind: GroupKind) -> Self {
        Self {
            batch_id,
            material,
            body,
            kind,
            shapes: BTreeSet::new(),
            attachments: BTreeSet::new(),
            retired: false,
            bounds: Cached::new(),
            bounds_token: InvalidationToken::new(),
        }
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn kind(&self) -> &GroupKind {
        &self.kind
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, GroupKind::Static)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, GroupKind::Dynamic(_))
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn shapes(&self) -> &BTreeSet<ShapeId> {
        &self.shapes
    }

    pub fn attachments(&self) -> &BTreeSet<AttachmentId> {
        &self.attachments
    }

    /// Model transform applied to member shapes
    pub fn model_matrix(&self) -> Affine2 {
        match &self.kind {
            GroupKind::Static => Affine2::IDENTITY,
            GroupKind::Dynamic(state) => {
                Affine2::from_angle_translation(state.angle, state.position)
            }
        }
    }

    pub fn position(&self) -> Vec2 {
        match &self.kind {
            GroupKind::Static => Vec2::ZERO,
            GroupKind::Dynamic(state) => state.position,
        }
    }

    pub fn angle(&self) -> f32 {
        match &self.kind {
            GroupKind::Static => 0.0,
            GroupKind::Dynamic(state) => state.angle,
        }
    }

    /// Seconds asleep, `None` for static or awake groups
    pub fn sleep_duration(&self) -> Option<f64> {
        match &self.kind {
            GroupKind::Dynamic(state) if state.sleep_duration >= 0.0 => Some(state.sleep_duration),
            _ => None,
        }
    }

    /// Aggregate surface area; static groups report zero
    pub fn area(&self) -> f32 {
        match &self.kind {
            GroupKind::Static => 0.0,
            GroupKind::Dynamic(state) => state.mass.area,
        }
    }

    pub fn mass(&self) -> Option<&MassData> {
        match &self.kind {
            GroupKind::Static => None,
            GroupKind::Dynamic(state) => Some(&state.mass),
        }
    }

    pub(crate) fn set_body(&mut self, body: RigidBodyHandle) {
        self.body = body;
    }

    pub(crate) fn dynamic_state_mut(&mut self) -> Option<&mut DynamicState> {
        match &mut self.kind {
            GroupKind::Static => None,
            GroupKind::Dynamic(state) => Some(state),
        }
    }

    pub(crate) fn invalidate_bounds(&mut self) {
        self.bounds_token.bump();
    }
}
