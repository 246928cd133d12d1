//! # Eustress World Layers — Queryable 2D Raster Data over World Space
//!
//! Named data layers (water depth, biome masks, heat, ...) mapped over one
//! world rectangle. Each layer is a flat pixel buffer in one of four formats,
//! readable and writable by world position, with bilinear sampling and
//! "nearest pixel holding value V within radius R" queries backed by
//! per-value quadtrees.
//!
//! ## Architecture
//! - `layers.toml` — Declarative world grid + layer configs
//! - `LayerRegistry` — Owns every layer; all world-space access goes here
//! - GPU mirroring, visualization and asset discovery stay with the host,
//!   which reads `raw_bytes()` and the dirty flag
//!
//! ## Modules
//! - `color` — Four-channel sample value and format-aware equality
//! - `format` — Pixel formats and the encode/decode dispatch table
//! - `grid` — World ↔ pixel mapping and out-of-bounds policy
//! - `raster` — Bounds-checked flat pixel storage
//! - `quadtree` — Point quadtree with pruned nearest search
//! - `spatial_index` — One quadtree per tracked value, updated on write
//! - `registry` — Named layer collection and world-space queries
//! - `config` — Parse `layers.toml`
//! - `image_io` — PNG import/export (`image-io` feature)
//! - `error` — Error type for setup and IO paths
//!
//! ## Table of Contents
//! 1. Module declarations
//! 2. Re-exports

pub mod color;
pub mod config;
pub mod error;
pub mod format;
pub mod grid;
#[cfg(feature = "image-io")]
pub mod image_io;
pub mod quadtree;
pub mod raster;
pub mod registry;
pub mod spatial_index;

pub use color::{Color, COLOR_EPSILON};
pub use config::{
    LayerConfig, LayerMutability, ResolutionConfig, SpatialOptimizationConfig, WorldLayersConfig,
    WorldSettings, MAX_LAYER_AXIS, MAX_LAYER_BYTES,
};
pub use error::{Result, WorldLayersError};
pub use format::{PixelCodec, PixelFormat};
pub use grid::{GridMapping, OutOfBoundsPolicy, WorldGrid};
#[cfg(feature = "image-io")]
pub use image_io::{export_layer_png, import_layer_image};
pub use quadtree::{PointQuadtree, QuadBounds};
pub use raster::RasterLayer;
pub use registry::{LayerRegistry, PixelSource, RegisteredLayer};
pub use spatial_index::SpatialIndexSet;
