//! Terrain model: shapes, groups, anchors, attachments and the world owning them

mod anchor;
mod attachment;
pub mod connectivity;
mod crack;
mod cut;
mod draw;
mod element;
mod group;
mod maintenance;
mod material;
mod shape;
mod store;
mod world;

pub use anchor::Anchor;
pub use attachment::{Attachment, AttachmentId, Orientation};
pub use crack::{CrackConfig, CrackPattern};
pub use cut::CutStats;
pub use draw::{DrawDispatcher, DrawStats, DrawableKey, TerrainRenderer, VisibleDrawable};
pub use element::Element;
pub use group::{DynamicState, Group, GroupId, GroupKind};
pub use material::{CollisionFilter, Material, ANCHOR_CATEGORY, TERRAIN_CATEGORY};
pub use shape::{MassData, Shape, ShapeId, Subtraction};
pub use world::{RebuildStats, TerrainEvent, TerrainStats, World};
