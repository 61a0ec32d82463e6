use std::path::PathBuf;

/// Setup-time configuration failures. All of these abort initialization.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("device-computed transforms require instancing")]
    DeviceTransformWithoutInstancing,
    #[error("instance count must be at least 1")]
    NoInstances,
    #[error("unknown transform mode {0:?} (expected per-draw, host or device)")]
    UnknownMode(String),
    #[error("field of view must be between 0 and 180 degrees, got {0}")]
    InvalidFov(f32),
    #[error("velocity must be finite and non-negative, got {0}")]
    InvalidVelocity(f32),
    #[error("mouse tuning must be finite and positive, got {0}")]
    InvalidSensitivity(f32),
    #[error("invalid projection: {0}")]
    InvalidProjection(String),
    #[error("invalid generation parameters: {0}")]
    InvalidGeneration(String),
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
