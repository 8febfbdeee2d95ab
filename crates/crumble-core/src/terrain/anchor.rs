//! Anchors - immovable contours that hold static terrain in place

use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};

use crumble_geometry::{triangulate, Bounds, Contour, TriMesh, Winding};

use super::Material;
use crate::physics::PhysicsWorld;

/// Immutable world-space contour with its own colliders
#[derive(Debug)]
pub struct Anchor {
    contour: Contour,
    mesh: Option<TriMesh>,
    colliders: Vec<ColliderHandle>,
    bounds: Bounds,
}

impl Anchor {
    pub fn new(contour: Contour) -> Self {
        let contour = contour.with_winding(Winding::Clockwise);
        let bounds = contour.bounds();
        Self {
            contour,
            mesh: None,
            colliders: Vec::new(),
            bounds,
        }
    }

    pub fn contour(&self) -> &Contour {
        &self.contour
    }

    pub fn mesh(&self) -> Option<&TriMesh> {
        self.mesh.as_ref()
    }

    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn area(&self) -> f32 {
        self.mesh.as_ref().map_or(0.0, TriMesh::area)
    }

    /// True if the anchor and `contour` overlap (any vertex of one inside the other)
    pub fn overlaps(&self, contour: &Contour) -> bool {
        self.contour.intersects(contour)
    }

    /// Triangulate and create colliders on `body`. False when the anchor
    /// has no usable area.
    pub(crate) fn build(
        &mut self,
        physics: &mut PhysicsWorld,
        body: RigidBodyHandle,
        material: &Material,
    ) -> bool {
        let mesh = match triangulate(&self.contour, &[]) {
            Ok(mesh) => mesh,
            Err(e) => {
                log::warn!("Anchor: triangulation failed: {}", e);
                return false;
            }
        };
        if mesh.area() <= material.min_surface_area.max(f32::EPSILON) {
            return false;
        }

        for [a, b, c] in mesh.triangles() {
            self.colliders.push(physics.add_triangle_collider(
                body,
                [a, b, c],
                0.0,
                &material.filter,
                material.friction,
            ));
        }
        self.mesh = Some(mesh);
        true
    }
}
