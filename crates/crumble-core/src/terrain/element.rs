//! Decorative named contours

use crumble_geometry::{triangulate, Bounds, Contour, TriMesh};

/// A drawable contour with no physics
#[derive(Debug, Clone)]
pub struct Element {
    id: String,
    contour: Contour,
    color: [f32; 4],
    mesh: Option<TriMesh>,
}

impl Element {
    pub fn new(id: impl Into<String>, contour: Contour, color: [f32; 4]) -> Self {
        Self {
            id: id.into(),
            contour,
            color,
            mesh: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contour(&self) -> &Contour {
        &self.contour
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn mesh(&self) -> Option<&TriMesh> {
        self.mesh.as_ref()
    }

    pub fn bounds(&self) -> Bounds {
        self.contour.bounds()
    }

    pub(crate) fn prepare(&mut self) -> bool {
        match triangulate(&self.contour, &[]) {
            Ok(mesh) => {
                self.mesh = Some(mesh);
                true
            }
            Err(e) => {
                log::warn!("Element '{}': triangulation failed: {}", self.id, e);
                false
            }
        }
    }
}
