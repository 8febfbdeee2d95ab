//! Terrain world - owns every shape, group, anchor, element and attachment

use std::collections::{BTreeSet, HashMap, HashSet};

use glam::Vec2;
use rapier2d::prelude::RigidBodyHandle;
use slotmap::SlotMap;

use crumble_geometry::{Bounds, Contour};

use super::connectivity::{partition_by_shared_edges, ConnectivityNode};
use super::store::{ColliderOptions, TerrainStore};
use super::{
    Anchor, Attachment, AttachmentId, DrawStats, DrawableKey, Element, Group, GroupId, Orientation,
    Shape, ShapeId, TerrainRenderer,
};
use crate::physics::PhysicsWorld;
use crate::{TerrainConfig, TerrainError};

/// Notifications produced by structural changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainEvent {
    /// No group could host the attachment after a rebuild or cull
    AttachmentOrphaned(AttachmentId),
    /// A dynamic group was built
    GroupCreated(GroupId),
    /// A dynamic group was destroyed
    GroupRemoved(GroupId),
}

/// Outcome of regrouping a set of shapes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub static_shapes: usize,
    pub dynamic_groups: usize,
    pub discarded_shapes: usize,
    pub rehomed_attachments: usize,
    pub orphaned_attachments: usize,
}

impl RebuildStats {
    pub fn merge(&mut self, other: RebuildStats) {
        self.static_shapes += other.static_shapes;
        self.dynamic_groups += other.dynamic_groups;
        self.discarded_shapes += other.discarded_shapes;
        self.rehomed_attachments += other.rehomed_attachments;
        self.orphaned_attachments += other.orphaned_attachments;
    }
}

/// Snapshot of world contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerrainStats {
    pub static_shapes: usize,
    pub dynamic_groups: usize,
    pub dynamic_shapes: usize,
    pub anchors: usize,
    pub elements: usize,
    pub attachments: usize,
    pub orphaned_attachments: usize,
    pub bodies: usize,
    pub colliders: usize,
}

/// The destructible terrain
pub struct World {
    pub(crate) config: TerrainConfig,
    pub(crate) store: TerrainStore,
    pub(crate) static_group: GroupId,
    anchor_body: RigidBodyHandle,
    anchors: Vec<Anchor>,
    elements: Vec<Element>,
    element_index: HashMap<String, usize>,
    pub(crate) attachments: SlotMap<AttachmentId, Attachment>,
    orphaned: BTreeSet<AttachmentId>,
    pub(crate) events: Vec<TerrainEvent>,
    /// Area threshold for new groups and static shapes
    pub(crate) min_surface_area: f32,
    last_step_time: Option<f64>,
    time: f64,
}

impl World {
    pub fn new(config: TerrainConfig) -> Self {
        let mut physics = PhysicsWorld::new(config.gravity);
        let anchor_body = physics.create_fixed_body(Vec2::ZERO);
        let mut store = TerrainStore::new(
            physics,
            ColliderOptions {
                collision_radius: config.collision_radius,
                skin_thickness: config.skin_thickness,
            },
            config.layers.shapes,
        );
        let static_group = store.create_static_group(config.material.clone());
        let min_surface_area = config.material.min_surface_area;

        Self {
            config,
            store,
            static_group,
            anchor_body,
            anchors: Vec::new(),
            elements: Vec::new(),
            element_index: HashMap::new(),
            attachments: SlotMap::with_key(),
            orphaned: BTreeSet::new(),
            events: Vec::new(),
            min_surface_area,
            last_step_time: None,
            time: 0.0,
        }
    }

    /// Register anchors and elements, then group `shapes`
    pub fn build(
        &mut self,
        shapes: Vec<Shape>,
        anchors: Vec<Anchor>,
        elements: Vec<Element>,
    ) -> RebuildStats {
        for mut anchor in anchors {
            if !anchor.build(
                &mut self.store.physics,
                self.anchor_body,
                &self.config.anchor_material,
            ) {
                log::warn!("World: dropping anchor without usable area");
                continue;
            }
            let index = self.anchors.len();
            self.store.dispatcher.add(
                DrawableKey::Anchor(index),
                anchor.bounds(),
                self.config.layers.anchors,
                0,
            );
            self.anchors.push(anchor);
        }

        for mut element in elements {
            if !element.prepare() {
                continue;
            }
            let index = self.elements.len();
            self.store.dispatcher.add(
                DrawableKey::Element(index),
                element.bounds(),
                self.config.layers.elements,
                0,
            );
            self.element_index.insert(element.id().to_string(), index);
            self.elements.push(element);
        }

        let ids: Vec<ShapeId> = shapes
            .into_iter()
            .map(|shape| self.store.insert_shape(shape))
            .collect();
        let stats = self.rebuild(ids, &HashMap::new());

        log::info!(
            "World: built {} static shapes, {} dynamic groups, {} anchors, {} elements",
            stats.static_shapes,
            stats.dynamic_groups,
            self.anchors.len(),
            self.elements.len()
        );
        stats
    }

    /// Build from raw contour soups
    pub fn build_from_contours(
        &mut self,
        terrain: Vec<Contour>,
        anchors: Vec<Contour>,
        elements: Vec<Element>,
    ) -> RebuildStats {
        let shapes = Shape::from_contours(terrain);
        let anchors = anchors.into_iter().map(Anchor::new).collect();
        self.build(shapes, anchors, elements)
    }

    // ===== Per-frame =====

    /// Sync dynamic groups with physics
    pub fn step(&mut self, time: f64) {
        let dt = self
            .last_step_time
            .map_or(0.0, |last| (time - last).max(0.0));
        self.last_step_time = Some(time);

        let dynamic: Vec<GroupId> = self
            .store
            .groups
            .iter()
            .filter(|(_, g)| g.is_dynamic() && !g.is_retired())
            .map(|(id, _)| id)
            .collect();
        for id in dynamic {
            self.store
                .step_dynamic_group(id, dt, self.config.motion_epsilon);
        }
    }

    /// Drop finished attachments and refresh world transforms of the rest
    pub fn update(&mut self, time: f64) {
        self.time = time;

        let finished: Vec<AttachmentId> = self
            .attachments
            .iter()
            .filter(|(_, a)| a.is_finished())
            .map(|(id, _)| id)
            .collect();
        for id in finished {
            self.detach(id);
            self.attachments.remove(id);
        }

        for (_, attachment) in self.attachments.iter_mut() {
            let Some(group) = attachment.group().and_then(|g| self.store.groups.get(g)) else {
                continue;
            };
            attachment.update_world_transform(&group.model_matrix());
        }
    }

    /// Render everything overlapping `viewport`, batch by batch
    pub fn draw(&self, viewport: &Bounds, renderer: &mut impl TerrainRenderer) -> DrawStats {
        let mut stats = DrawStats::default();
        let mut current: Option<(u32, u64)> = None;

        for item in self.store.dispatcher.cull(viewport) {
            let (mesh, color, model) = match item.key {
                DrawableKey::Shape(id) => {
                    let Some(shape) = self.store.shapes.get(id) else {
                        continue;
                    };
                    let Some(mesh) = shape.mesh() else {
                        continue;
                    };
                    let color = shape
                        .group()
                        .and_then(|g| self.store.groups.get(g))
                        .map_or(self.config.material.color, |g| g.material().color);
                    stats.shapes += 1;
                    (mesh, color, shape.transform())
                }
                DrawableKey::Anchor(index) => {
                    let Some(mesh) = self.anchors.get(index).and_then(Anchor::mesh) else {
                        continue;
                    };
                    stats.anchors += 1;
                    (mesh, self.config.anchor_material.color, glam::Affine2::IDENTITY)
                }
                DrawableKey::Element(index) => {
                    let Some(element) = self.elements.get(index) else {
                        continue;
                    };
                    let Some(mesh) = element.mesh() else {
                        continue;
                    };
                    stats.elements += 1;
                    (mesh, element.color(), glam::Affine2::IDENTITY)
                }
            };

            let batch = (item.layer, item.batch);
            if current != Some(batch) {
                if current.is_some() {
                    renderer.end_batch();
                }
                renderer.begin_batch(item.batch, model);
                stats.batches += 1;
                current = Some(batch);
            }
            renderer.draw_mesh(mesh, color);
        }

        if current.is_some() {
            renderer.end_batch();
        }
        stats
    }

    // ===== Attachments =====

    /// Attach to whichever terrain shape contains `position`
    pub fn add_attachment(
        &mut self,
        attachment: Attachment,
        position: Vec2,
        orientation: Orientation,
    ) -> Option<AttachmentId> {
        let id = self.attachments.insert(attachment);
        if self.attach_at(id, position, orientation.to_rotation()) {
            Some(id)
        } else {
            self.attachments.remove(id);
            None
        }
    }

    /// Mark an attachment for removal on the next update
    pub fn finish_attachment(&mut self, id: AttachmentId) -> Result<(), TerrainError> {
        let attachment = self
            .attachments
            .get_mut(id)
            .ok_or(TerrainError::UnknownAttachment)?;
        attachment.finish();
        Ok(())
    }

    /// Remove an attachment immediately
    pub fn remove_attachment(&mut self, id: AttachmentId) -> Result<Attachment, TerrainError> {
        self.detach(id);
        self.attachments
            .remove(id)
            .ok_or(TerrainError::UnknownAttachment)
    }

    /// Try to host an orphan again at its last world position
    pub fn reattach_orphan(&mut self, id: AttachmentId) -> Result<bool, TerrainError> {
        let attachment = self
            .attachments
            .get(id)
            .ok_or(TerrainError::UnknownAttachment)?;
        if !attachment.is_orphaned() {
            return Ok(false);
        }
        let (position, rotation) = (attachment.world_position(), attachment.world_rotation());
        Ok(self.attach_at(id, position, rotation))
    }

    fn detach(&mut self, id: AttachmentId) {
        self.orphaned.remove(&id);
        let group = self.attachments.get(id).and_then(Attachment::group);
        if let Some(group) = group.and_then(|g| self.store.groups.get_mut(g)) {
            group.attachments.remove(&id);
        }
    }

    fn attach_at(&mut self, id: AttachmentId, position: Vec2, rotation: Vec2) -> bool {
        let query = Bounds::new(position, position).expanded(1e-3);
        let category = self.config.material.filter.category;
        let candidates = self.store.shapes_in_bounds(&query, category);
        candidates
            .into_iter()
            .any(|shape| self.try_attach_to_shape(id, shape, position, rotation))
    }

    fn try_attach_to_shape(
        &mut self,
        id: AttachmentId,
        shape_id: ShapeId,
        position: Vec2,
        rotation: Vec2,
    ) -> bool {
        let Some(shape) = self.store.shapes.get_mut(shape_id) else {
            return false;
        };
        let Some(group_id) = shape.group() else {
            return false;
        };
        let local = shape.world_to_local(position);
        if !shape.is_local_point_inside(local) {
            return false;
        }
        let Some(group) = self.store.groups.get_mut(group_id) else {
            return false;
        };
        if group.is_retired() {
            return false;
        }
        let Some(attachment) = self.attachments.get_mut(id) else {
            return false;
        };

        let model = group.model_matrix();
        group.attachments.insert(id);
        attachment.configure(group_id, &model, position, rotation, vec![shape_id]);
        self.orphaned.remove(&id);
        true
    }

    /// Host an attachment again after its group changed: hints first, then
    /// `candidates`, then a broad-phase lookup. Orphans it on failure.
    pub(crate) fn rehome_attachment(&mut self, id: AttachmentId, candidates: &[ShapeId]) -> bool {
        let Some(attachment) = self.attachments.get(id) else {
            return false;
        };
        let (position, rotation) = (attachment.world_position(), attachment.world_rotation());
        let hints = attachment.shape_hints().to_vec();

        let hosted = hints
            .iter()
            .chain(candidates)
            .any(|shape| self.try_attach_to_shape(id, *shape, position, rotation))
            || self.attach_at(id, position, rotation);
        if !hosted {
            self.orphan_attachment(id);
        }
        hosted
    }

    pub(crate) fn orphan_attachment(&mut self, id: AttachmentId) {
        let Some(attachment) = self.attachments.get_mut(id) else {
            return;
        };
        attachment.orphan();
        self.orphaned.insert(id);
        self.events.push(TerrainEvent::AttachmentOrphaned(id));
        log::debug!("World: attachment '{}' orphaned", attachment.label());
    }

    /// Take the attachments that must move out of `parent` before a rebuild
    ///
    /// Dynamic parents give up everything. The static group only gives up
    /// attachments hosted by shapes that are being regrouped or are gone.
    pub(crate) fn take_migrating_attachments(
        &mut self,
        parent: GroupId,
        regrouped: &BTreeSet<ShapeId>,
    ) -> Vec<AttachmentId> {
        let Some(group) = self.store.groups.get_mut(parent) else {
            return Vec::new();
        };
        if !group.is_static() {
            return std::mem::take(&mut group.attachments).into_iter().collect();
        }

        let shapes = &self.store.shapes;
        let attachments = &self.attachments;
        let moving: Vec<AttachmentId> = group
            .attachments
            .iter()
            .copied()
            .filter(|id| {
                attachments.get(*id).is_none_or(|a| {
                    a.shape_hints().is_empty()
                        || a.shape_hints()
                            .iter()
                            .any(|s| regrouped.contains(s) || !shapes.contains_key(*s))
                })
            })
            .collect();
        for id in &moving {
            group.attachments.remove(id);
        }
        moving
    }

    // ===== Grouping pipeline =====

    fn resolve_parent(&self, id: ShapeId, parentage: &HashMap<ShapeId, GroupId>) -> Option<GroupId> {
        parentage
            .get(&id)
            .copied()
            .or_else(|| self.store.shapes.get(id).and_then(Shape::group))
    }

    /// Connected clusters of `shapes`: shared edge and same resolved parent
    pub(crate) fn find_shape_groups(
        &mut self,
        shapes: &[ShapeId],
        parentage: &HashMap<ShapeId, GroupId>,
    ) -> Vec<Vec<ShapeId>> {
        let mut nodes = Vec::with_capacity(shapes.len());
        for &id in shapes {
            let parent = self.resolve_parent(id, parentage);
            let Some(shape) = self.store.shapes.get_mut(id) else {
                continue;
            };
            nodes.push(ConnectivityNode {
                key: id,
                parent,
                edges: shape.world_edges().to_vec(),
            });
        }
        partition_by_shared_edges(&nodes)
    }

    /// A cluster stays static only if it came from the static group (or
    /// from nowhere) and touches an anchor
    pub(crate) fn is_shape_group_static(&mut self, cluster: &[ShapeId], parent: Option<GroupId>) -> bool {
        if parent.is_some_and(|p| p != self.static_group) {
            return false;
        }
        for id in cluster {
            let Some(shape) = self.store.shapes.get_mut(*id) else {
                continue;
            };
            let bounds = shape.world_edges_bounds();
            for anchor in &self.anchors {
                if anchor.bounds().intersects(&bounds) && anchor.overlaps(shape.world_outer()) {
                    return true;
                }
            }
        }
        false
    }

    /// Regroup `affected` shapes and rehome the attachments of their parents
    pub(crate) fn rebuild(
        &mut self,
        affected: Vec<ShapeId>,
        parentage: &HashMap<ShapeId, GroupId>,
    ) -> RebuildStats {
        let mut stats = RebuildStats::default();
        let regrouped: BTreeSet<ShapeId> = affected.iter().copied().collect();
        let clusters = self.find_shape_groups(&affected, parentage);
        let material = self.config.material.clone();
        let min_area = self.min_surface_area;

        let mut migrated: HashSet<GroupId> = HashSet::new();
        let mut migrating = Vec::new();

        for cluster in clusters {
            let parent = cluster
                .first()
                .and_then(|id| self.resolve_parent(*id, parentage));
            if let Some(parent) = parent {
                if migrated.insert(parent) {
                    migrating.extend(self.take_migrating_attachments(parent, &regrouped));
                }
            }

            if self.is_shape_group_static(&cluster, parent) {
                for id in cluster {
                    if self.store.static_add_shape(self.static_group, id, min_area) {
                        stats.static_shapes += 1;
                    } else {
                        self.store.destroy_shape(id);
                        stats.discarded_shapes += 1;
                    }
                }
                continue;
            }

            match self
                .store
                .build_dynamic_group(&cluster, parent, &material, min_area)
            {
                Some(group) => {
                    stats.dynamic_groups += 1;
                    self.events.push(TerrainEvent::GroupCreated(group));
                }
                None => {
                    for id in cluster {
                        if self.store.shapes.contains_key(id) {
                            self.store.destroy_shape(id);
                            stats.discarded_shapes += 1;
                        }
                    }
                }
            }
        }

        for id in migrating {
            if self.rehome_attachment(id, &affected) {
                stats.rehomed_attachments += 1;
            } else {
                stats.orphaned_attachments += 1;
            }
        }

        log::debug!(
            "World: rebuild static={} dynamic={} discarded={} orphaned={}",
            stats.static_shapes,
            stats.dynamic_groups,
            stats.discarded_shapes,
            stats.orphaned_attachments
        );
        stats
    }

    // ===== Accessors =====

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.store.physics
    }

    /// Physics world, for stepping and for bodies the host owns
    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.store.physics
    }

    pub fn static_group_id(&self) -> GroupId {
        self.static_group
    }

    pub fn static_group(&self) -> &Group {
        &self.store.groups[self.static_group]
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.store.groups.get(id)
    }

    pub fn dynamic_groups(&self) -> impl Iterator<Item = (GroupId, &Group)> + '_ {
        self.store
            .groups
            .iter()
            .filter(|(_, g)| g.is_dynamic() && !g.is_retired())
    }

    /// World-space bounds of a group
    pub fn group_bounds(&mut self, id: GroupId) -> Bounds {
        self.store.group_bounds(id)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.store.shapes.get(id)
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeId, &Shape)> + '_ {
        self.store.shapes.iter()
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.element_index.get(id).map(|i| &self.elements[*i])
    }

    pub fn attachment(&self, id: AttachmentId) -> Option<&Attachment> {
        self.attachments.get(id)
    }

    pub fn orphaned_attachments(&self) -> impl Iterator<Item = AttachmentId> + '_ {
        self.orphaned.iter().copied()
    }

    /// Current area threshold for new groups
    pub fn min_surface_area(&self) -> f32 {
        self.min_surface_area
    }

    pub fn set_min_surface_area(&mut self, area: f32) {
        self.min_surface_area = area;
    }

    /// Time passed to the last `update`
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn drain_events(&mut self) -> Vec<TerrainEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn stats(&self) -> TerrainStats {
        let dynamic: Vec<&Group> = self.dynamic_groups().map(|(_, g)| g).collect();
        TerrainStats {
            static_shapes: self.static_group().shapes().len(),
            dynamic_groups: dynamic.len(),
            dynamic_shapes: dynamic.iter().map(|g| g.shapes().len()).sum(),
            anchors: self.anchors.len(),
            elements: self.elements.len(),
            attachments: self.attachments.len(),
            orphaned_attachments: self.orphaned.len(),
            bodies: self.store.physics.body_count(),
            colliders: self.store.physics.collider_count(),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(TerrainConfig::default())
    }
}
