use thiserror::Error;

/// Errors reported by the terrain engine
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Segment cut too short or too thin to remove anything
    #[error("degenerate cut: length {length} (min {min_length}), radius {radius} (min {min_radius})")]
    DegenerateCut {
        length: f32,
        min_length: f32,
        radius: f32,
        min_radius: f32,
    },

    /// Cut polygon cannot enclose area
    #[error("cut polygon has {0} points, at least 3 are required")]
    DegenerateCutPolygon(usize),

    /// Attachment id is not (or no longer) known to the world
    #[error("unknown attachment")]
    UnknownAttachment,

    /// Configuration could not be parsed
    #[error("invalid terrain configuration: {0}")]
    Config(#[from] ron::error::SpannedError),
}
