//! # World Layers Configuration
//!
//! Parses `layers.toml`, the declarative description of the world grid and
//! every data layer mapped over it.
//!
//! ```toml
//! [world]
//! origin = [-5000.0, -5000.0]
//! size = [10000.0, 10000.0]
//!
//! [[layers]]
//! name = "water"
//! format = "r8"
//! resolution = { mode = "absolute", width = 100, height = 100 }
//!
//! [layers.spatial]
//! build_acceleration_structure = true
//! values_to_track = [{ r = 1.0 }]
//! ```
//!
//! ## Table of Contents
//! 1. WorldLayersConfig — Top-level file
//! 2. LayerConfig — Per-layer record
//! 3. ResolutionConfig — Absolute or world-relative sizing
//! 4. SpatialOptimizationConfig — Tracked values
//! 5. LayerMutability — Write permissions
//! 6. Parsing & validation

use std::path::{Path, PathBuf};

use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::Color;
use crate::error::{Result, WorldLayersError};
use crate::format::PixelFormat;
use crate::grid::{GridMapping, OutOfBoundsPolicy, WorldGrid};
use crate::quadtree::DEFAULT_MAX_POINTS_PER_NODE;

/// Largest pixel buffer a single layer may allocate (4 GiB)
pub const MAX_LAYER_BYTES: u64 = 1 << 32;

/// Largest pixel count per axis, so every pixel coordinate fits an `i32`
pub const MAX_LAYER_AXIS: u32 = i32::MAX as u32;

// ============================================================================
// 1. WorldLayersConfig — Top-level file
// ============================================================================

/// Top-level configuration, parsed from `layers.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldLayersConfig {
    #[serde(default)]
    pub world: WorldSettings,
    /// Registered in file order; a repeated name replaces the earlier layer
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

/// Shared world rectangle and out-of-bounds handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettings {
    #[serde(default)]
    pub origin: Vec2,
    #[serde(default = "default_world_size")]
    pub size: Vec2,
    #[serde(default)]
    pub out_of_bounds: OutOfBoundsPolicy,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            size: default_world_size(),
            out_of_bounds: OutOfBoundsPolicy::default(),
        }
    }
}

impl WorldSettings {
    pub fn grid(&self) -> WorldGrid {
        WorldGrid::new(self.origin, self.size)
    }
}

fn default_world_size() -> Vec2 {
    WorldGrid::default().size
}

// ============================================================================
// 2. LayerConfig — Per-layer record
// ============================================================================

/// Everything needed to build one layer at registration time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Lookup key in the registry
    pub name: String,
    /// Stable identifier for hosts; generated when omitted
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub format: PixelFormat,
    /// Value every pixel starts with and out-of-bounds reads return
    #[serde(default)]
    pub default_value: Color,
    #[serde(default)]
    pub mutability: LayerMutability,
    #[serde(default)]
    pub spatial: SpatialOptimizationConfig,
    /// Descriptive channel labels (e.g. `["depth"]`), not interpreted here
    #[serde(default)]
    pub channel_semantics: Vec<String>,
    /// Image to populate the layer from at load time, relative to `layers.toml`
    #[serde(default)]
    pub initial_data: Option<PathBuf>,
}

impl LayerConfig {
    /// Absolute-resolution layer with default settings
    pub fn new(name: impl Into<String>, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            resolution: ResolutionConfig::Absolute { width, height },
            format,
            default_value: Color::default(),
            mutability: LayerMutability::default(),
            spatial: SpatialOptimizationConfig::default(),
            channel_semantics: Vec::new(),
            initial_data: None,
        }
    }

    /// World-relative layer with a fixed cell size
    pub fn relative(name: impl Into<String>, format: PixelFormat, cell_size: Vec2) -> Self {
        Self {
            resolution: ResolutionConfig::RelativeToWorld { cell_size },
            ..Self::new(name, format, 1, 1)
        }
    }

    pub fn with_default_value(mut self, value: Color) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_mutability(mut self, mutability: LayerMutability) -> Self {
        self.mutability = mutability;
        self
    }

    /// Enable the spatial index for `values`
    pub fn track_values(mut self, values: impl IntoIterator<Item = Color>) -> Self {
        self.spatial.build_acceleration_structure = true;
        self.spatial.values_to_track = values.into_iter().collect();
        self
    }

    pub fn with_max_points_per_node(mut self, max_points_per_node: usize) -> Self {
        self.spatial.max_points_per_node = max_points_per_node;
        self
    }

    pub fn with_channel_semantics<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.channel_semantics = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_initial_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.initial_data = Some(path.into());
        self
    }

    /// Whether a spatial index should be built for this layer
    pub fn wants_spatial_index(&self) -> bool {
        self.spatial.build_acceleration_structure && !self.spatial.values_to_track.is_empty()
    }

    /// Pixel resolution and world mapping of this layer over `grid`.
    ///
    /// Fails for an invalid grid, and for a raster wider than `i32::MAX`
    /// pixels on either axis or larger than [`MAX_LAYER_BYTES`].
    pub fn resolve_resolution(&self, grid: &WorldGrid) -> Result<(UVec2, GridMapping)> {
        self.validate()?;
        if !grid.is_valid() {
            return Err(self.invalid(format!(
                "world grid needs a finite origin and positive size, got {:?} / {:?}",
                grid.origin, grid.size
            )));
        }

        let (resolution, mapping) = match self.resolution {
            ResolutionConfig::Absolute { width, height } => {
                let resolution = UVec2::new(width, height);
                (resolution, GridMapping::from_resolution(grid, resolution))
            }
            ResolutionConfig::RelativeToWorld { cell_size } => {
                // Saturating cast: anything past u32 lands on u32::MAX and fails below
                let cells = (grid.size / cell_size).round().max(Vec2::ONE);
                (cells.as_uvec2(), GridMapping::from_cell_size(grid, cell_size))
            }
        };

        if resolution.max_element() > MAX_LAYER_AXIS {
            return Err(self.invalid(format!(
                "{}x{} exceeds {MAX_LAYER_AXIS} pixels per axis",
                resolution.x, resolution.y
            )));
        }
        let bytes = u64::from(resolution.x)
            .checked_mul(u64::from(resolution.y))
            .and_then(|n| n.checked_mul(self.format.bytes_per_pixel() as u64))
            .filter(|&n| n <= MAX_LAYER_BYTES && usize::try_from(n).is_ok());
        if bytes.is_none() {
            return Err(self.invalid(format!(
                "{}x{} {:?} raster exceeds {MAX_LAYER_BYTES} bytes",
                resolution.x, resolution.y, self.format
            )));
        }
        Ok((resolution, mapping))
    }

    fn invalid(&self, reason: String) -> WorldLayersError {
        WorldLayersError::InvalidLayer {
            name: self.name.clone(),
            reason,
        }
    }

    /// Reject configs that cannot produce a usable raster
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| WorldLayersError::InvalidLayer {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("layer name is empty"));
        }
        match self.resolution {
            ResolutionConfig::Absolute { width, height } if width == 0 || height == 0 => {
                Err(invalid("resolution must be non-zero on both axes"))
            }
            ResolutionConfig::RelativeToWorld { cell_size }
                if !(cell_size.is_finite() && cell_size.x > 0.0 && cell_size.y > 0.0) =>
            {
                Err(invalid("cell size must be positive and finite"))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// 3. ResolutionConfig — Absolute or world-relative sizing
// ============================================================================

/// How many pixels a layer has
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResolutionConfig {
    /// Fixed pixel count stretched over the world grid
    Absolute { width: u32, height: u32 },
    /// Fixed world-space cell size; pixel count follows the grid size
    RelativeToWorld { cell_size: Vec2 },
}

// ============================================================================
// 4. SpatialOptimizationConfig — Tracked values
// ============================================================================

/// Spatial index settings for one layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialOptimizationConfig {
    #[serde(default)]
    pub build_acceleration_structure: bool,
    /// One quadtree per value, matched in this order
    #[serde(default)]
    pub values_to_track: Vec<Color>,
    #[serde(default = "default_max_points_per_node")]
    pub max_points_per_node: usize,
}

impl Default for SpatialOptimizationConfig {
    fn default() -> Self {
        Self {
            build_acceleration_structure: false,
            values_to_track: Vec::new(),
            max_points_per_node: default_max_points_per_node(),
        }
    }
}

fn default_max_points_per_node() -> usize {
    DEFAULT_MAX_POINTS_PER_NODE
}

// ============================================================================
// 5. LayerMutability — Write permissions
// ============================================================================

/// When a layer accepts writes after registration.
///
/// `initial_data` from `layers.toml` is applied at load time for every
/// mode, `Immutable` included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerMutability {
    /// Fixed after load
    Immutable,
    /// Bulk population and raw reloads only, no per-pixel writes
    InitialOnly,
    /// Any write at any time
    #[default]
    Continuous,
}

impl LayerMutability {
    /// `set_value_at_location` is honored
    pub fn allows_runtime_writes(self) -> bool {
        matches!(self, LayerMutability::Continuous)
    }

    /// `populate_layer` and raw reloads are honored
    pub fn allows_population(self) -> bool {
        !matches!(self, LayerMutability::Immutable)
    }
}

// ============================================================================
// 6. Parsing & validation
// ============================================================================

impl WorldLayersConfig {
    /// Load from a `layers.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| WorldLayersError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: WorldLayersConfig =
            toml::from_str(&content).map_err(|source| WorldLayersError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from an inline TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WorldLayersConfig =
            toml::from_str(content).map_err(|source| WorldLayersError::ConfigParse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let grid = self.world.grid();
        if !grid.is_valid() {
            return Err(WorldLayersError::InvalidLayer {
                name: "[world]".to_string(),
                reason: format!(
                    "world needs a finite origin and positive size, got {:?} / {:?}",
                    grid.origin, grid.size
                ),
            });
        }
        self.layers.iter().try_for_each(LayerConfig::validate)
    }

    pub fn with_layer(mut self, layer: LayerConfig) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.iter().rev().find(|l| l.name == name)
    }

    /// Resolve a path from `layers.toml` against the file's directory
    pub fn resolve_path(base_dir: &Path, relative: &Path) -> PathBuf {
        base_dir.join(relative)
    }
}
