use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Top-level configuration for a spinfield run.
///
/// Every section falls back to the defaults of the cube stress scene, so a
/// YAML file only needs to name the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seed for instance generation.
    pub seed: u64,
    pub render: RenderConfig,
    pub player: PlayerConfig,
    pub world: WorldConfig,
    pub projection: Projection,
    pub generation: GenerationParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            render: RenderConfig::default(),
            player: PlayerConfig::default(),
            world: WorldConfig::default(),
            projection: Projection::default(),
            generation: GenerationParams::default(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Validate every section and resolve the render capability set.
    pub fn validate(&self) -> Result<Capabilities, ConfigError> {
        self.player.validate()?;
        self.generation.validate()?;
        self.projection.validate()?;
        self.render.resolve()
    }
}

/// Render-mode switches accepted at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub instance_count: u32,
    pub instancing: bool,
    /// Reconstruct transforms on the GPU. Valid only with `instancing`.
    pub device_transform: bool,
    pub lighting: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            instance_count: 200_000,
            instancing: true,
            device_transform: true,
            lighting: true,
        }
    }
}

impl RenderConfig {
    /// Build a config from an already-chosen mode.
    pub fn with_mode(instance_count: u32, mode: TransformMode, lighting: bool) -> Self {
        Self {
            instance_count,
            instancing: mode.is_instanced(),
            device_transform: mode == TransformMode::DeviceComputed,
            lighting,
        }
    }

    /// Resolve the switches into a fixed capability set.
    pub fn resolve(&self) -> Result<Capabilities, ConfigError> {
        if self.instance_count == 0 {
            return Err(ConfigError::NoInstances);
        }
        let mode = match (self.instancing, self.device_transform) {
            (true, true) => TransformMode::DeviceComputed,
            (true, false) => TransformMode::HostComputed,
            (false, false) => TransformMode::PerDraw,
            (false, true) => return Err(ConfigError::DeviceTransformWithoutInstancing),
        };
        let caps = Capabilities {
            mode,
            lighting: self.lighting,
        };
        tracing::debug!(%mode, lighting = self.lighting, "resolved render capabilities");
        Ok(caps)
    }
}

/// Where per-instance transforms are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformMode {
    /// No instancing: one draw call per instance, transform bound as a uniform.
    PerDraw,
    /// Instanced; the host rewrites and re-uploads every transform each frame.
    HostComputed,
    /// Instanced; only the world angle is uploaded and the vertex stage rebuilds transforms.
    DeviceComputed,
}

impl TransformMode {
    pub const ALL: [TransformMode; 3] = [
        TransformMode::PerDraw,
        TransformMode::HostComputed,
        TransformMode::DeviceComputed,
    ];

    pub fn is_instanced(self) -> bool {
        !matches!(self, TransformMode::PerDraw)
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformMode::PerDraw => "per-draw",
            TransformMode::HostComputed => "host",
            TransformMode::DeviceComputed => "device",
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per-draw" | "perdraw" | "none" => Ok(TransformMode::PerDraw),
            "host" | "cpu" => Ok(TransformMode::HostComputed),
            "device" | "gpu" => Ok(TransformMode::DeviceComputed),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

/// Closed capability set resolved once from [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub mode: TransformMode,
    pub lighting: bool,
}

/// Player start pose and look/move tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub start_position: [f32; 3],
    pub fov_degrees: f32,
    pub velocity: f32,
    /// Radians of look per pointer pixel, divided by π.
    pub mouse_sensitivity: f32,
    /// Vertical pointer bound. Defaults to the offset at which pitch reaches ±π/2.
    pub max_abs_y: Option<f32>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_position: [0.0, 0.0, -5.0],
            fov_degrees: 108.0,
            velocity: 20.0,
            mouse_sensitivity: 1.5 / 1000.0,
            max_abs_y: None,
        }
    }
}

impl PlayerConfig {
    pub fn max_abs_y(&self) -> f32 {
        self.max_abs_y.unwrap_or(0.5 / self.mouse_sensitivity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !valid_fov_degrees(self.fov_degrees) {
            return Err(ConfigError::InvalidFov(self.fov_degrees));
        }
        if !self.velocity.is_finite() || self.velocity < 0.0 {
            return Err(ConfigError::InvalidVelocity(self.velocity));
        }
        if !self.mouse_sensitivity.is_finite() || self.mouse_sensitivity <= 0.0 {
            return Err(ConfigError::InvalidSensitivity(self.mouse_sensitivity));
        }
        if let Some(bound) = self.max_abs_y {
            if !bound.is_finite() || bound <= 0.0 {
                return Err(ConfigError::InvalidSensitivity(bound));
            }
        }
        Ok(())
    }
}

/// True for a finite field of view strictly between 0° and 180°.
pub fn valid_fov_degrees(degrees: f32) -> bool {
    degrees.is_finite() && degrees > 0.0 && degrees < 180.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub revolutions_per_second: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            revolutions_per_second: 0.2,
        }
    }
}

/// Projection stage of the camera pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// `w' = tan(fov/2)·z`, depth derived from `near_bias`.
    Perspective { near_bias: f32 },
    /// Cheap approximate projection, `w' = c·z + k`. Ignores the field of view.
    Linear { c: f32, k: f32, near_bias: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective { near_bias: 0.1 }
    }
}

impl Projection {
    pub fn near_bias(&self) -> f32 {
        match *self {
            Projection::Perspective { near_bias } | Projection::Linear { near_bias, .. } => {
                near_bias
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let bias = self.near_bias();
        if !bias.is_finite() || bias <= 0.0 {
            return Err(ConfigError::InvalidProjection(format!(
                "near_bias must be positive, got {bias}"
            )));
        }
        if let Projection::Linear { c, k, .. } = *self {
            if !c.is_finite() || !k.is_finite() || (c == 0.0 && k == 0.0) {
                return Err(ConfigError::InvalidProjection(format!(
                    "linear projection needs a non-zero w term, got c={c} k={k}"
                )));
            }
        }
        Ok(())
    }
}

/// Clip-space depth convention of the target graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipDepth {
    /// GL-style NDC depth in [-1, 1].
    NegOneToOne,
    /// wgpu / Vulkan / D3D NDC depth in [0, 1].
    #[default]
    ZeroToOne,
}

/// Ranges used when generating the instance stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub x_range: [f32; 2],
    pub y_range: [f32; 2],
    pub z_range: [f32; 2],
    /// Instance count the volume is sized for at full scale.
    pub capacity: f32,
    pub min_scale: f32,
    pub spin_range: [f32; 2],
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            x_range: [-75.0, 75.0],
            y_range: [-75.0, 75.0],
            z_range: [25.0, 175.0],
            capacity: 150.0_f32.powi(3) / 20.0,
            min_scale: 0.1,
            spin_range: [0.25, 4.0],
        }
    }
}

impl GenerationParams {
    /// Largest instance scale for `count` instances.
    ///
    /// Shrinks with the cube root of the count so the filled fraction of the
    /// volume stays roughly constant. Never drops below `min_scale`.
    pub fn max_scale(&self, count: u32) -> f32 {
        if count == 0 {
            return self.min_scale;
        }
        (self.capacity / count as f32).cbrt().max(self.min_scale)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, [lo, hi]) in [
            ("x_range", self.x_range),
            ("y_range", self.y_range),
            ("z_range", self.z_range),
            ("spin_range", self.spin_range),
        ] {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ConfigError::InvalidGeneration(format!(
                    "{name} must be an ordered finite range, got [{lo}, {hi}]"
                )));
            }
        }
        if !self.capacity.is_finite() || self.capacity <= 0.0 {
            return Err(ConfigError::InvalidGeneration(format!(
                "capacity must be positive, got {}",
                self.capacity
            )));
        }
        if !self.min_scale.is_finite() || self.min_scale <= 0.0 {
            return Err(ConfigError::InvalidGeneration(format!(
                "min_scale must be positive, got {}",
                self.min_scale
            )));
        }
        Ok(())
    }
}
