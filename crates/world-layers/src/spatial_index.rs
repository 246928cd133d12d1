//! # Spatial Index Set
//!
//! One [`PointQuadtree`] per tracked value of a layer, kept in step with
//! every raster write so "nearest pixel holding value V" is a tree search
//! instead of a buffer scan.
//!
//! Tracked values are matched with format-aware equality
//! ([`Color::matches`]) by linear scan. Float tolerance rules out hashing,
//! and a layer only tracks a handful of values.
//!
//! ## Table of Contents
//! 1. SpatialIndexSet — Tracked value → tree
//! 2. Write maintenance
//! 3. Queries

use glam::{IVec2, UVec2, Vec2};

use crate::color::Color;
use crate::format::PixelCodec;
use crate::quadtree::PointQuadtree;
use crate::raster::RasterLayer;

// ============================================================================
// 1. SpatialIndexSet — Tracked value → tree
// ============================================================================

/// A tracked value and the pixels currently holding it
#[derive(Debug, Clone)]
pub struct TrackedTree {
    /// Value as the layer stores it (already quantized)
    pub value: Color,
    pub tree: PointQuadtree,
}

/// Per-layer set of value trees.
///
/// A pixel lives in at most one tree: the first entry whose value matches
/// the pixel's decoded value.
#[derive(Debug, Clone)]
pub struct SpatialIndexSet {
    codec: &'static PixelCodec,
    entries: Vec<TrackedTree>,
}

impl SpatialIndexSet {
    /// Empty trees for `tracked_values`, in order.
    ///
    /// Each value is quantized through `codec` first, so it compares against
    /// what a pixel can actually hold.
    pub fn new(
        tracked_values: &[Color],
        codec: &'static PixelCodec,
        resolution: UVec2,
        max_points_per_node: usize,
    ) -> Self {
        let entries = tracked_values
            .iter()
            .map(|value| TrackedTree {
                value: codec.quantize(*value),
                tree: PointQuadtree::for_resolution(resolution, max_points_per_node),
            })
            .collect();
        Self { codec, entries }
    }

    /// Build an index for `raster` and classify every pixel into it
    pub fn build(tracked_values: &[Color], raster: &RasterLayer, max_points_per_node: usize) -> Self {
        let mut index = Self::new(tracked_values, raster.codec(), raster.resolution(), max_points_per_node);
        index.populate(raster);
        index
    }

    /// Scan every pixel once and insert it into its matching tree.
    /// Existing points are dropped first.
    pub fn populate(&mut self, raster: &RasterLayer) {
        for entry in &mut self.entries {
            entry.tree.clear();
        }
        for (pixel, value) in raster.pixels() {
            if let Some(i) = self.position_of(value) {
                self.entries[i].tree.insert(pixel);
            }
        }
        tracing::debug!(
            "Spatial index populated: {} points across {} tracked values",
            self.total_points(),
            self.entries.len()
        );
    }

    fn position_of(&self, value: Color) -> Option<usize> {
        let format = self.codec.format;
        self.entries.iter().position(|e| e.value.matches(&value, format))
    }

    // ========================================================================
    // 2. Write maintenance
    // ========================================================================

    /// Move `pixel` from the tree matching `old` to the tree matching `new`.
    ///
    /// Both values must be decoded pixel values, `old` read before the write.
    pub fn on_write(&mut self, pixel: IVec2, old: Color, new: Color) {
        let from = self.position_of(old);
        let to = self.position_of(new);
        if from == to {
            return;
        }
        if let Some(i) = from {
            self.entries[i].tree.remove(pixel);
        }
        if let Some(i) = to {
            self.entries[i].tree.insert(pixel);
        }
    }

    // ========================================================================
    // 3. Queries
    // ========================================================================

    /// Nearest pixel holding `value`, searched in pixel-center space.
    ///
    /// `axis_scale` weights each axis of the distance metric; pass
    /// `Vec2::ONE` for square cells.
    pub fn find_nearest(
        &self,
        value: Color,
        origin_px: Vec2,
        max_radius_px: f32,
        axis_scale: Vec2,
    ) -> Option<IVec2> {
        self.tree_for(value)?
            .find_nearest_scaled(origin_px, max_radius_px, axis_scale)
    }

    /// Tree tracking `value`, if any
    pub fn tree_for(&self, value: Color) -> Option<&PointQuadtree> {
        let value = self.codec.quantize(value);
        self.position_of(value).map(|i| &self.entries[i].tree)
    }

    /// Tracked values, quantized, in registration order
    pub fn tracked_values(&self) -> impl Iterator<Item = Color> + '_ {
        self.entries.iter().map(|e| e.value)
    }

    pub fn entries(&self) -> &[TrackedTree] {
        &self.entries
    }

    pub fn total_points(&self) -> usize {
        self.entries.iter().map(|e| e.tree.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PixelFormat;
    use crate::grid::{GridMapping, WorldGrid};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn raster(format: PixelFormat, size: u32) -> RasterLayer {
        let grid = WorldGrid::new(Vec2::ZERO, Vec2::splat(size as f32));
        let res = UVec2::splat(size);
        RasterLayer::new(format, res, Color::TRANSPARENT, GridMapping::from_resolution(&grid, res))
    }

    fn write(raster: &mut RasterLayer, index: &mut SpatialIndexSet, pixel: IVec2, color: Color) {
        let old = raster.get_pixel(pixel);
        if raster.set_pixel(pixel, color) {
            index.on_write(pixel, old, raster.get_pixel(pixel));
        }
    }

    #[test]
    fn test_populate_classifies_default_pixels() {
        let layer = raster(PixelFormat::R8, 8);
        let index = SpatialIndexSet::build(&[Color::scalar(0.0), Color::scalar(1.0)], &layer, 4);
        assert_eq!(index.tree_for(Color::scalar(0.0)).map(PointQuadtree::len), Some(64));
        assert_eq!(index.tree_for(Color::scalar(1.0)).map(PointQuadtree::len), Some(0));
        assert!(index.tree_for(Color::scalar(0.5)).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let layer = raster(PixelFormat::R8, 4);
        // Same value twice: only the first tree ever receives points
        let index = SpatialIndexSet::build(&[Color::scalar(0.0), Color::scalar(0.0)], &layer, 4);
        assert_eq!(index.entries()[0].tree.len(), 16);
        assert_eq!(index.entries()[1].tree.len(), 0);
    }

    #[test]
    fn test_tracked_values_are_quantized() {
        let layer = raster(PixelFormat::R8, 4);
        let index = SpatialIndexSet::build(&[Color::scalar(0.3)], &layer, 4);
        let stored = index.tracked_values().next().unwrap();
        assert_eq!(stored.r, (0.3f32 * 255.0).round() / 255.0);
        // Query with the unquantized value still resolves the tree
        assert!(index.tree_for(Color::scalar(0.3)).is_some());
    }

    #[test]
    fn test_untracked_query_is_none() {
        let layer = raster(PixelFormat::Rgba8, 4);
        let index = SpatialIndexSet::build(&[Color::RED], &layer, 4);
        assert_eq!(index.find_nearest(Color::BLUE, Vec2::ZERO, 100.0, Vec2::ONE), None);
    }

    #[test]
    fn test_index_consistent_after_random_writes() {
        let mut rng = StdRng::seed_from_u64(42);
        let palette = [Color::TRANSPARENT, Color::RED, Color::BLUE, Color::new(0.5, 0.5, 0.5, 1.0)];
        let tracked = [Color::RED, Color::BLUE, Color::TRANSPARENT];
        let mut layer = raster(PixelFormat::Rgba8, 16);
        let mut index = SpatialIndexSet::build(&tracked, &layer, 3);

        for _ in 0..2000 {
            let pixel = IVec2::new(rng.gen_range(-2..18), rng.gen_range(-2..18));
            let color = palette[rng.gen_range(0..palette.len())];
            write(&mut layer, &mut index, pixel, color);
        }

        for entry in index.entries() {
            let expected: HashSet<IVec2> = layer
                .pixels()
                .filter(|(_, v)| v.matches(&entry.value, PixelFormat::Rgba8))
                .map(|(p, _)| p)
                .collect();
            let stored: Vec<IVec2> = entry.tree.points().collect();
            assert_eq!(stored.len(), expected.len(), "{:?}", entry.value);
            assert_eq!(stored.into_iter().collect::<HashSet<_>>(), expected);
        }
    }
}
