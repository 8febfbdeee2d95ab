//! Debris maintenance: culling small groups and freezing sleeping ones

use super::{AttachmentId, Group, GroupId, Shape, ShapeId, TerrainEvent, World};

/// Number of candidates selected for a `portion` in `[0, 1]`
fn portion_count(candidates: usize, portion: f32) -> usize {
    if candidates == 0 || portion <= 0.0 {
        return 0;
    }
    ((candidates as f32 * portion.min(1.0)).ceil() as usize).min(candidates)
}

impl World {
    /// Destroy dynamic groups smaller than `min_surface_area`.
    ///
    /// Candidates also have to pass `predicate`. The smallest
    /// `ceil(portion * candidates)` are destroyed; their attachments become
    /// orphans. Returns the number of groups destroyed.
    pub fn cull_dynamic_groups(
        &mut self,
        min_surface_area: f32,
        portion: f32,
        mut predicate: impl FnMut(&Group) -> bool,
    ) -> usize {
        let mut candidates: Vec<(GroupId, f32)> = self
            .dynamic_groups()
            .filter(|(_, g)| g.area() < min_surface_area)
            .filter(|(_, g)| predicate(*g))
            .map(|(id, g)| (id, g.area()))
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let count = portion_count(candidates.len(), portion);
        for (id, _) in candidates.into_iter().take(count) {
            let attachments = self.take_migrating_attachments(id, &Default::default());
            for attachment in attachments {
                self.orphan_attachment(attachment);
            }
            self.store.destroy_group(id);
            self.events.push(TerrainEvent::GroupRemoved(id));
        }

        if count > 0 {
            log::info!("Maintenance: culled {} dynamic groups", count);
        }
        count
    }

    /// Turn dynamic groups asleep for at least `min_sleep_time` seconds into
    /// static terrain.
    ///
    /// The longest sleepers among the `predicate`-approved candidates are
    /// converted first. Each group's shapes are copied in world space into
    /// the static group; attachments follow them. Returns the number of
    /// groups converted.
    pub fn make_sleeping_dynamic_groups_static(
        &mut self,
        min_sleep_time: f64,
        portion: f32,
        mut predicate: impl FnMut(&Group) -> bool,
    ) -> usize {
        let mut candidates: Vec<(GroupId, f64)> = self
            .dynamic_groups()
            .filter_map(|(id, g)| g.sleep_duration().map(|sleep| (id, sleep, g)))
            .filter(|(_, sleep, _)| *sleep >= min_sleep_time)
            .filter(|(_, _, g)| predicate(*g))
            .map(|(id, sleep, _)| (id, sleep))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        let count = portion_count(candidates.len(), portion);
        for (id, _) in candidates.into_iter().take(count) {
            self.freeze_group(id);
        }

        if count > 0 {
            log::info!("Maintenance: froze {} sleeping groups", count);
        }
        count
    }

    fn freeze_group(&mut self, id: GroupId) {
        let Some(group) = self.store.groups.get(id) else {
            return;
        };
        let copies: Vec<Shape> = group
            .shapes()
            .iter()
            .filter_map(|s| self.store.shapes.get(*s))
            .map(|shape| {
                let (outer, holes) = shape.world_contours();
                Shape::from_world_contours(outer, holes)
            })
            .collect();
        let attachments: Vec<AttachmentId> = self.take_migrating_attachments(id, &Default::default());

        self.store.destroy_group(id);
        self.events.push(TerrainEvent::GroupRemoved(id));

        let mut frozen: Vec<ShapeId> = Vec::with_capacity(copies.len());
        for copy in copies {
            let shape_id = self.store.insert_shape(copy);
            if self.store.static_add_shape(self.static_group, shape_id, 0.0) {
                frozen.push(shape_id);
            } else {
                self.store.destroy_shape(shape_id);
            }
        }

        for attachment in attachments {
            self.rehome_attachment(attachment, &frozen);
        }
        log::debug!("Maintenance: froze group into {} static shapes", frozen.len());
    }
}
