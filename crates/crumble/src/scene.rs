//! Scene descriptions
//!
//! A scene is a RON document listing terrain, anchor and element contours,
//! attachments to place after the build, and a script of cuts keyed by
//! simulation step. Contours are plain point lists:
//!
//! ```ron
//! (
//!     name: "slab",
//!     terrain: [[(0.0, 0.0), (40.0, 0.0), (40.0, 4.0), (0.0, 4.0)]],
//!     anchors: [[(-1.0, -1.0), (5.0, -1.0), (5.0, 5.0), (-1.0, 5.0)]],
//!     script: [(step: 10, cut: Segment(a: (20.0, -5.0), b: (20.0, 9.0), radius: 1.0))],
//! )
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crumble_core::terrain::{
    Attachment, AttachmentId, CrackConfig, CrackPattern, CutStats, Element, Orientation,
};
use crumble_core::{TerrainConfig, TerrainError, World};
use crumble_geometry::Contour;

/// Segments used to approximate scripted circular cuts
const CIRCLE_SEGMENTS: usize = 24;

/// Complete scene to load into a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SceneDescription {
    pub name: String,
    pub config: TerrainConfig,
    pub terrain: Vec<Contour>,
    pub anchors: Vec<Contour>,
    pub elements: Vec<ElementDescription>,
    pub attachments: Vec<AttachmentDescription>,
    pub script: Vec<ScriptedCut>,
}

/// Named decorative polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescription {
    pub id: String,
    pub contour: Contour,
    #[serde(default = "default_element_color")]
    pub color: [f32; 4],
}

fn default_element_color() -> [f32; 4] {
    [0.8, 0.8, 0.8, 1.0]
}

/// Attachment placed after the initial build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDescription {
    pub label: String,
    pub position: Vec2,
    #[serde(default)]
    pub angle: f32,
}

/// A cut applied before the physics step with index `step`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedCut {
    pub step: usize,
    pub cut: CutKind,
    /// Area threshold override for this cut (0 keeps the configured one)
    #[serde(default)]
    pub min_surface_area: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CutKind {
    Segment { a: Vec2, b: Vec2, radius: f32 },
    Circle { center: Vec2, radius: f32 },
    Polygon { contour: Contour },
    Crack {
        origin: Vec2,
        seed: u64,
        #[serde(default)]
        config: CrackConfig,
    },
}

impl ScriptedCut {
    pub fn apply(&self, world: &mut World) -> Result<CutStats, TerrainError> {
        match &self.cut {
            CutKind::Segment { a, b, radius } => {
                world.cut_segment(*a, *b, *radius, self.min_surface_area)
            }
            CutKind::Circle { center, radius } => {
                let contour = Contour::circle(*center, *radius, CIRCLE_SEGMENTS);
                let bounds = contour.bounds();
                world.cut(&contour, bounds, self.min_surface_area)
            }
            CutKind::Polygon { contour } => {
                world.cut(contour, contour.bounds(), self.min_surface_area)
            }
            CutKind::Crack {
                origin,
                seed,
                config,
            } => {
                let pattern = CrackPattern::radial(*origin, config, *seed);
                world.cut_crack(&pattern, self.min_surface_area)
            }
        }
    }
}

impl SceneDescription {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).context("Failed to parse scene")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene {}", path.display()))?;
        Self::from_ron_str(&source).with_context(|| format!("In scene {}", path.display()))
    }

    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize scene")
    }

    /// Build a world and place the scene's attachments
    pub fn build_world(&self) -> (World, Vec<AttachmentId>) {
        let mut world = World::new(self.config.clone());
        let elements = self
            .elements
            .iter()
            .map(|e| Element::new(e.id.clone(), e.contour.clone(), e.color))
            .collect();
        world.build_from_contours(self.terrain.clone(), self.anchors.clone(), elements);

        let mut attachments = Vec::with_capacity(self.attachments.len());
        for description in &self.attachments {
            match world.add_attachment(
                Attachment::new(description.label.clone()),
                description.position,
                Orientation::Angle(description.angle),
            ) {
                Some(id) => attachments.push(id),
                None => log::warn!(
                    "Scene: attachment '{}' at ({:.1}, {:.1}) is not on terrain",
                    description.label,
                    description.position.x,
                    description.position.y
                ),
            }
        }
        (world, attachments)
    }

    /// Cuts scheduled for `step`
    pub fn cuts_at(&self, step: usize) -> impl Iterator<Item = &ScriptedCut> + '_ {
        self.script.iter().filter(move |cut| cut.step == step)
    }

    /// Built-in scene: a T-shaped tower on anchored ground with a cave, a
    /// loose crate, and a script that topples the tower
    pub fn demo() -> Self {
        let tower = Contour::new(vec![
            Vec2::new(-100.0, -20.0),
            Vec2::new(100.0, -20.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 40.0),
            Vec2::new(40.0, 40.0),
            Vec2::new(40.0, 50.0),
            Vec2::new(-40.0, 50.0),
            Vec2::new(-40.0, 40.0),
            Vec2::new(-10.0, 40.0),
            Vec2::new(-10.0, 0.0),
            Vec2::new(-100.0, 0.0),
        ]);
        let cave = rect(-60.0, -15.0, -30.0, -5.0);
        let crate_box = rect(60.0, 30.0, 70.0, 40.0);

        Self {
            name: "demo".to_string(),
            config: TerrainConfig::default(),
            terrain: vec![tower, cave, crate_box],
            anchors: vec![rect(-110.0, -30.0, 110.0, -10.0)],
            elements: vec![ElementDescription {
                id: "sign".to_string(),
                contour: rect(-5.0, 22.0, 5.0, 27.0),
                color: [0.9, 0.7, 0.2, 1.0],
            }],
            attachments: vec![
                AttachmentDescription {
                    label: "lamp".to_string(),
                    position: Vec2::new(30.0, 45.0),
                    angle: 0.0,
                },
                AttachmentDescription {
                    label: "torch".to_string(),
                    position: Vec2::new(-50.0, -2.0),
                    angle: std::f32::consts::FRAC_PI_2,
                },
            ],
            script: vec![
                ScriptedCut {
                    step: 30,
                    cut: CutKind::Segment {
                        a: Vec2::new(-12.0, 20.0),
                        b: Vec2::new(12.0, 20.0),
                        radius: 1.5,
                    },
                    min_surface_area: 0.0,
                },
                ScriptedCut {
                    step: 120,
                    cut: CutKind::Crack {
                        origin: Vec2::new(50.0, -5.0),
                        seed: 7,
                        config: CrackConfig::default(),
                    },
                    min_surface_area: 0.0,
                },
                ScriptedCut {
                    step: 200,
                    cut: CutKind::Circle {
                        center: Vec2::new(-45.0, -10.0),
                        radius: 6.0,
                    },
                    min_surface_area: 0.0,
                },
            ],
        }
    }
}

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Contour {
    Contour::rect(Vec2::new(x0, y0), Vec2::new(x1, y1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_survives_ron() {
        let demo = SceneDescription::demo();
        let text = demo.to_ron_string().expect("serializable");
        let parsed = SceneDescription::from_ron_str(&text).expect("parseable");
        assert_eq!(parsed, demo);
    }

    #[test]
    fn test_minimal_scene_uses_defaults() {
        let scene = SceneDescription::from_ron_str(
            r#"(
                terrain: [[(0.0, 0.0), (40.0, 0.0), (40.0, 4.0), (0.0, 4.0)]],
                script: [(step: 3, cut: Segment(a: (20.0, -5.0), b: (20.0, 9.0), radius: 1.0))],
            )"#,
        )
        .expect("valid scene");
        assert_eq!(scene.config, TerrainConfig::default());
        assert_eq!(scene.terrain.len(), 1);
        assert!(scene.anchors.is_empty());
        assert_eq!(scene.cuts_at(3).count(), 1);
        assert_eq!(scene.cuts_at(4).count(), 0);
        assert_eq!(scene.script[0].min_surface_area, 0.0);
    }

    #[test]
    fn test_invalid_scene_is_an_error() {
        assert!(SceneDescription::from_ron_str("(terrain: 5)").is_err());
    }

    #[test]
    fn test_demo_world_layout() {
        let scene = SceneDescription::demo();
        let (world, attachments) = scene.build_world();

        assert_eq!(world.static_group().shapes().len(), 1);
        assert_eq!(world.dynamic_groups().count(), 1);
        assert_eq!(world.anchors().len(), 1);
        assert!(world.element("sign").is_some());
        assert_eq!(attachments.len(), 2);
        for id in &attachments {
            assert_eq!(
                world.attachment(*id).and_then(Attachment::group),
                Some(world.static_group_id())
            );
        }
    }

    #[test]
    fn test_demo_script_topples_tower() {
        let scene = SceneDescription::demo();
        let (mut world, attachments) = scene.build_world();

        let cut = scene.cuts_at(30).next().expect("tower cut");
        let stats = cut.apply(&mut world).expect("valid cut");
        assert_eq!(stats.shapes_cut, 1);
        assert_eq!(world.dynamic_groups().count(), 2);

        let lamp = world.attachment(attachments[0]).expect("lamp");
        let group = lamp.group().and_then(|g| world.group(g)).expect("hosted");
        assert!(group.is_dynamic());
        let torch = world.attachment(attachments[1]).expect("torch");
        assert_eq!(torch.group(), Some(world.static_group_id()));
    }
}
