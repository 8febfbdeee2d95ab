//! Crumble core - destructible terrain engine
//!
//! Terrain is a set of closed contours split into shapes. Shapes touching an
//! anchor stay in the shared static group; everything else is grouped by
//! shared edges into rigid dynamic bodies. Cutting subtracts a polygon from
//! the terrain and regroups whatever it touched.

pub mod config;
mod error;
pub mod physics;
pub mod terrain;

pub use config::TerrainConfig;
pub use error::TerrainError;
pub use physics::PhysicsWorld;
pub use terrain::World;
