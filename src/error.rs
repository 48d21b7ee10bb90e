use thiserror::Error;

/// Errors produced while requesting or applying a regenerated region
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("regeneration service failed: {0}")]
    Service(String),

    #[error("regeneration service returned an unusable image: {0}")]
    InvalidResponse(String),

    #[error("no document is loaded")]
    NoDocument,
}

/// Errors produced while importing a source image
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels")]
    EmptyImage,

    #[error("raster is {actual:?}, document is {expected:?}")]
    SizeMismatch { expected: (u32, u32), actual: (u32, u32) },
}

/// Errors produced while loading editor configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors reported by a project store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("project store failed: {0}")]
    Store(String),

    #[error("failed to serialize project metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}
