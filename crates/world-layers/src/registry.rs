//! # Layer Registry
//!
//! Named collection of raster layers mapped over one shared world grid.
//! Every world-space read, write and proximity query goes through here:
//!
//! ```text
//! get/set   world → pixel (policy) → RasterLayer ──→ SpatialIndexSet::on_write
//! nearest   world → pixel-center space → SpatialIndexSet → pixel center (world)
//! ```
//!
//! Query and write paths never fail: unknown layers, out-of-bounds pixels
//! and untracked values come back as `None`, `false` or the layer default.
//! Only setup and IO return [`Result`].
//!
//! ## Table of Contents
//! 1. PixelSource — Bulk population input
//! 2. RegisteredLayer — Config + raster + index
//! 3. LayerRegistry — Construction & lifecycle
//! 4. Point reads & writes
//! 5. Interpolated sampling
//! 6. Nearest-value queries
//! 7. Host hooks (dirty tracking, bulk population, raw reload)
//! 8. Config loading

use std::collections::BTreeMap;
use std::path::Path;

use glam::{IVec2, UVec2, Vec2};

use crate::color::Color;
use crate::config::{LayerConfig, WorldLayersConfig};
use crate::error::{Result, WorldLayersError};
use crate::grid::{OutOfBoundsPolicy, WorldGrid};
use crate::raster::RasterLayer;
use crate::spatial_index::SpatialIndexSet;

// ============================================================================
// 1. PixelSource — Bulk population input
// ============================================================================

/// Anything that can be sampled on an integer grid, e.g. a decoded image.
/// Used by [`LayerRegistry::populate_layer`].
pub trait PixelSource {
    /// Width and height in samples
    fn dimensions(&self) -> UVec2;

    /// Sample at `(x, y)`, both within [`dimensions`](Self::dimensions)
    fn sample(&self, x: u32, y: u32) -> Color;
}

// ============================================================================
// 2. RegisteredLayer — Config + raster + index
// ============================================================================

/// One registry entry
#[derive(Debug, Clone)]
pub struct RegisteredLayer {
    config: LayerConfig,
    raster: RasterLayer,
    index: Option<SpatialIndexSet>,
}

impl RegisteredLayer {
    fn build(config: LayerConfig, grid: &WorldGrid) -> Result<Self> {
        let (resolution, mapping) = config.resolve_resolution(grid)?;
        let raster = RasterLayer::new(config.format, resolution, config.default_value, mapping);
        let index = config.wants_spatial_index().then(|| {
            SpatialIndexSet::build(
                &config.spatial.values_to_track,
                &raster,
                config.spatial.max_points_per_node,
            )
        });
        Ok(Self { config, raster, index })
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn raster(&self) -> &RasterLayer {
        &self.raster
    }

    pub fn spatial_index(&self) -> Option<&SpatialIndexSet> {
        self.index.as_ref()
    }

    /// Write one pixel and keep the index in step. The old value is read
    /// before the buffer changes; both values passed on are decoded.
    fn write_pixel(&mut self, pixel: IVec2, color: Color) -> bool {
        let old = self.raster.get_pixel(pixel);
        if !self.raster.set_pixel(pixel, color) {
            return false;
        }
        if let Some(index) = self.index.as_mut() {
            let new = self.raster.get_pixel(pixel);
            index.on_write(pixel, old, new);
        }
        true
    }

    /// Nearest-neighbor resample of `source` onto every pixel
    fn fill_from<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<usize> {
        let src = source.dimensions();
        if src.x == 0 || src.y == 0 {
            return Err(WorldLayersError::InvalidLayer {
                name: self.config.name.clone(),
                reason: "pixel source is empty".to_string(),
            });
        }

        let res = self.raster.resolution();
        let resample = |dst: u32, dst_len: u32, src_len: u32| -> u32 {
            let s = (dst as f32 / dst_len as f32 * src_len as f32).round() as u32;
            s.min(src_len - 1)
        };

        let mut written = 0;
        for y in 0..res.y {
            let sy = resample(y, res.y, src.y);
            for x in 0..res.x {
                let sx = resample(x, res.x, src.x);
                if self.write_pixel(IVec2::new(x as i32, y as i32), source.sample(sx, sy)) {
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}

// ============================================================================
// 3. LayerRegistry — Construction & lifecycle
// ============================================================================

/// Facade over all layers of one world
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    grid: WorldGrid,
    policy: OutOfBoundsPolicy,
    layers: BTreeMap<String, RegisteredLayer>,
}

impl LayerRegistry {
    pub fn new(grid: WorldGrid) -> Self {
        Self {
            grid,
            policy: OutOfBoundsPolicy::default(),
            layers: BTreeMap::new(),
        }
    }

    pub fn with_out_of_bounds_policy(mut self, policy: OutOfBoundsPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_out_of_bounds_policy(&mut self, policy: OutOfBoundsPolicy) {
        self.policy = policy;
    }

    pub fn out_of_bounds_policy(&self) -> OutOfBoundsPolicy {
        self.policy
    }

    pub fn world_grid(&self) -> &WorldGrid {
        &self.grid
    }

    /// Build and insert a layer. An existing layer with the same name is
    /// replaced whole, storage and index.
    pub fn register_layer(&mut self, config: LayerConfig) -> Result<()> {
        let layer = RegisteredLayer::build(config, &self.grid)?;
        let name = layer.config.name.clone();
        let resolution = layer.raster.resolution();
        let format = layer.raster.format();
        let tracked = layer.index.as_ref().map_or(0, |i| i.entries().len());

        if self.layers.insert(name.clone(), layer).is_some() {
            tracing::debug!("Replaced layer '{}' ({:?}, {}x{})", name, format, resolution.x, resolution.y);
        } else {
            tracing::info!(
                "Registered layer '{}' ({:?}, {}x{}, {} tracked values)",
                name,
                format,
                resolution.x,
                resolution.y,
                tracked
            );
        }
        Ok(())
    }

    /// Drop a layer. Returns whether it existed.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        self.layers.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn contains_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn registered(&self, name: &str) -> Option<&RegisteredLayer> {
        self.layers.get(name)
    }

    pub fn layer(&self, name: &str) -> Option<&RasterLayer> {
        self.layers.get(name).map(|l| &l.raster)
    }

    pub fn layer_config(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.get(name).map(|l| &l.config)
    }

    pub fn spatial_index(&self, name: &str) -> Option<&SpatialIndexSet> {
        self.layers.get(name).and_then(|l| l.index.as_ref())
    }

    // ========================================================================
    // 4. Point reads & writes
    // ========================================================================

    /// Non-finite positions have no pixel under either policy
    #[inline]
    fn pixel_for(policy: OutOfBoundsPolicy, raster: &RasterLayer, world: Vec2) -> Option<IVec2> {
        let pixel = raster.try_world_to_pixel(world)?;
        Some(policy.resolve(pixel, raster.resolution()))
    }

    /// Value of the pixel containing `world`. `None` for an unknown layer;
    /// the layer default outside its bounds (unless clamped) or for a
    /// non-finite position.
    pub fn get_value_at_location(&self, name: &str, world: Vec2) -> Option<Color> {
        let raster = &self.layers.get(name)?.raster;
        Some(match Self::pixel_for(self.policy, raster, world) {
            Some(pixel) => raster.get_pixel(pixel),
            None => raster.default_value(),
        })
    }

    /// Red channel of [`get_value_at_location`](Self::get_value_at_location),
    /// 0.0 for an unknown layer
    pub fn get_float_value_at_location(&self, name: &str, world: Vec2) -> f32 {
        self.get_value_at_location(name, world).map_or(0.0, |c| c.r)
    }

    /// Write `color` into the pixel containing `world`.
    ///
    /// Returns `false` without touching anything for an unknown layer, an
    /// out-of-bounds or non-finite position, or a layer that does not
    /// accept runtime writes.
    pub fn set_value_at_location(&mut self, name: &str, world: Vec2, color: Color) -> bool {
        let policy = self.policy;
        let Some(layer) = self.layers.get_mut(name) else {
            return false;
        };
        let mutability = layer.config.mutability;
        if !mutability.allows_runtime_writes() {
            tracing::warn!(
                "Attempting to write to immutable layer '{}' ({:?}), ignoring",
                name,
                mutability
            );
            return false;
        }
        match Self::pixel_for(policy, &layer.raster, world) {
            Some(pixel) => layer.write_pixel(pixel, color),
            None => false,
        }
    }

    // ========================================================================
    // 5. Interpolated sampling
    // ========================================================================

    /// Bilinear blend of the four pixel centers around `world`.
    /// Each tap is resolved and bounds-checked on its own. A non-finite
    /// position samples the layer default.
    pub fn get_value_at_location_interpolated(&self, name: &str, world: Vec2) -> Option<Color> {
        let raster = &self.layers.get(name)?.raster;
        let p = raster.mapping().world_to_pixel_center_space(world);
        if !p.is_finite() {
            return Some(raster.default_value());
        }
        let base = p.floor();
        let t = p - base;
        let x0 = base.as_ivec2();

        let tap = |offset: IVec2| {
            let pixel = self.policy.resolve(x0.saturating_add(offset), raster.resolution());
            raster.get_pixel(pixel)
        };

        Some(Color::bilerp(
            tap(IVec2::new(0, 0)),
            tap(IVec2::new(1, 0)),
            tap(IVec2::new(0, 1)),
            tap(IVec2::new(1, 1)),
            t.x,
            t.y,
        ))
    }

    // ========================================================================
    // 6. Nearest-value queries
    // ========================================================================

    /// World-space center of the nearest pixel holding `value`, strictly
    /// within `max_world_radius` of `world_origin`.
    ///
    /// `None` for an unknown layer, a layer without a spatial index, an
    /// untracked value, a non-finite origin, or nothing in range.
    pub fn find_nearest_point_with_value(
        &self,
        name: &str,
        world_origin: Vec2,
        max_world_radius: f32,
        value: Color,
    ) -> Option<Vec2> {
        let layer = self.layers.get(name)?;
        let index = layer.index.as_ref()?;
        let mapping = layer.raster.mapping();

        let mut origin_px = mapping.world_to_pixel_center_space(world_origin);
        if !origin_px.is_finite() {
            return None;
        }
        if self.policy == OutOfBoundsPolicy::ClampToEdge {
            let max = (layer.raster.resolution().as_vec2() - Vec2::ONE).max(Vec2::ZERO);
            origin_px = origin_px.clamp(Vec2::ZERO, max);
        }

        // Search in pixel units of the smaller cell side, weighting the
        // other axis so distances stay proportional to world distance
        let min_cell = mapping.min_cell();
        let radius_px = max_world_radius / min_cell;
        let axis_scale = mapping.cell_size / min_cell;

        let pixel = index.find_nearest(value, origin_px, radius_px, axis_scale)?;
        Some(mapping.pixel_to_world(pixel))
    }

    // ========================================================================
    // 7. Host hooks (dirty tracking, bulk population, raw reload)
    // ========================================================================

    /// Layers written since their last [`mark_clean`](Self::mark_clean)
    pub fn dirty_layers(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .filter(|(_, l)| l.raster.is_dirty())
            .map(|(name, _)| name.as_str())
    }

    /// Clear a layer's dirty flag after the host has synced it.
    /// Returns whether the layer exists.
    pub fn mark_clean(&mut self, name: &str) -> bool {
        match self.layers.get_mut(name) {
            Some(layer) => {
                layer.raster.mark_clean();
                true
            }
            None => false,
        }
    }

    fn populatable_mut(&mut self, name: &str) -> Result<&mut RegisteredLayer> {
        let layer = self
            .layers
            .get_mut(name)
            .ok_or_else(|| WorldLayersError::UnknownLayer(name.to_string()))?;
        if !layer.config.mutability.allows_population() {
            return Err(WorldLayersError::WriteRejected {
                name: name.to_string(),
                mutability: layer.config.mutability,
            });
        }
        Ok(layer)
    }

    /// Overwrite every pixel from `source`, resampled nearest-neighbor to
    /// the layer resolution. Returns the number of pixels written.
    pub fn populate_layer<S: PixelSource + ?Sized>(&mut self, name: &str, source: &S) -> Result<usize> {
        let layer = self.populatable_mut(name)?;
        let written = layer.fill_from(source)?;
        tracing::debug!("Populated layer '{}' with {} pixels", name, written);
        Ok(written)
    }

    /// Load-time population, applied regardless of mutability
    #[cfg(feature = "image-io")]
    pub(crate) fn populate_initial<S: PixelSource + ?Sized>(&mut self, name: &str, source: &S) -> Result<usize> {
        let layer = self
            .layers
            .get_mut(name)
            .ok_or_else(|| WorldLayersError::UnknownLayer(name.to_string()))?;
        layer.fill_from(source)
    }

    /// Replace a layer's buffer with bytes in its own format and rebuild
    /// the spatial index from scratch
    pub fn load_raw_buffer(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let layer = self.populatable_mut(name)?;
        layer.raster.load_raw(bytes)?;
        if let Some(index) = layer.index.as_mut() {
            index.populate(&layer.raster);
        }
        Ok(())
    }

    // ========================================================================
    // 8. Config loading
    // ========================================================================

    /// Build a registry from a parsed config. Relative `initial_data` paths
    /// resolve against `base_dir`.
    pub fn from_config(config: &WorldLayersConfig, base_dir: &Path) -> Result<Self> {
        config.validate()?;
        let mut registry = Self::new(config.world.grid()).with_out_of_bounds_policy(config.world.out_of_bounds);

        for layer in &config.layers {
            registry.register_layer(layer.clone())?;

            let Some(relative) = &layer.initial_data else {
                continue;
            };
            let path = WorldLayersConfig::resolve_path(base_dir, relative);

            #[cfg(feature = "image-io")]
            {
                let image = crate::image_io::read_image(&path)?;
                let written = registry.populate_initial(&layer.name, &image)?;
                tracing::info!(
                    "Loaded initial data for '{}' from {} ({} pixels)",
                    layer.name,
                    path.display(),
                    written
                );
            }

            #[cfg(not(feature = "image-io"))]
            tracing::warn!(
                "Layer '{}' has initial data {} but image support is disabled",
                layer.name,
                path.display()
            );
        }

        Ok(registry)
    }

    /// Read `layers.toml` and build the registry it describes
    pub fn load(path: &Path) -> Result<Self> {
        let config = WorldLayersConfig::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let registry = Self::from_config(&config, base_dir)?;
        tracing::info!("Loaded {} layers from {}", registry.len(), path.display());
        Ok(registry)
    }
}
