//! Attachments - user objects riding on terrain groups
//!
//! An attachment stores its transform relative to the hosting group and
//! derives the world transform from it on every update, so repeated
//! updates under an unchanged group pose produce identical results.

use glam::{Affine2, Vec2};

use super::{GroupId, ShapeId};

slotmap::new_key_type! {
    /// Stable identity of an attachment
    pub struct AttachmentId;
}

/// Initial orientation of an attachment in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// Radians, counter-clockwise from +X
    Angle(f32),
    /// Direction vector; need not be normalized
    Direction(Vec2),
}

impl Orientation {
    /// Unit rotation vector
    pub fn to_rotation(self) -> Vec2 {
        match self {
            Orientation::Angle(angle) => Vec2::from_angle(angle),
            Orientation::Direction(dir) => dir.try_normalize().unwrap_or(Vec2::X),
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Angle(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct Attachment {
    label: String,
    group: Option<GroupId>,
    local_position: Vec2,
    local_rotation: Vec2,
    world_position: Vec2,
    world_rotation: Vec2,
    /// Shapes that hosted this attachment last; tried first when rehoming
    shape_hints: Vec<ShapeId>,
    finished: bool,
    orphaned: bool,
}

impl Attachment {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            group: None,
            local_position: Vec2::ZERO,
            local_rotation: Vec2::X,
            world_position: Vec2::ZERO,
            world_rotation: Vec2::X,
            shape_hints: Vec::new(),
            finished: false,
            orphaned: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn local_position(&self) -> Vec2 {
        self.local_position
    }

    pub fn world_position(&self) -> Vec2 {
        self.world_position
    }

    /// Unit rotation vector in world space
    pub fn world_rotation(&self) -> Vec2 {
        self.world_rotation
    }

    pub fn world_angle(&self) -> f32 {
        self.world_rotation.y.atan2(self.world_rotation.x)
    }

    pub fn shape_hints(&self) -> &[ShapeId] {
        &self.shape_hints
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_orphaned(&self) -> bool {
        self.orphaned
    }

    /// Mark for removal on the next update
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bind to `group` so that the attachment sits at the given world transform
    pub(crate) fn configure(
        &mut self,
        group: GroupId,
        model: &Affine2,
        world_position: Vec2,
        world_rotation: Vec2,
        hints: Vec<ShapeId>,
    ) {
        let inverse = model.inverse();
        self.group = Some(group);
        self.local_position = inverse.transform_point2(world_position);
        self.local_rotation = inverse
            .transform_vector2(world_rotation)
            .try_normalize()
            .unwrap_or(Vec2::X);
        self.shape_hints = hints;
        self.orphaned = false;
        self.update_world_transform(model);
    }

    pub(crate) fn update_world_transform(&mut self, model: &Affine2) {
        self.world_position = model.transform_point2(self.local_position);
        self.world_rotation = model.transform_vector2(self.local_rotation);
    }

    pub(crate) fn orphan(&mut self) {
        self.group = None;
        self.orphaned = true;
    }
}
