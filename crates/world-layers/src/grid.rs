//! # World Grid & Pixel Mapping
//!
//! Maps world positions onto layer pixels and back.
//!
//! ## Pipeline
//! ```text
//! World (units)  →  Continuous pixel     →  Pixel (IVec2)
//!   x/y             (world - origin)/cell    floor()
//! ```
//! Pixel → world always yields the pixel **center**, `(p + 0.5) * cell + origin`.
//!
//! ## Table of Contents
//! 1. WorldGrid — Shared world rectangle
//! 2. GridMapping — Per-layer origin + cell size
//! 3. OutOfBoundsPolicy — Clamp or default
//! 4. Free-function conversions

use glam::{IVec2, UVec2, Vec2};
use serde::{Deserialize, Serialize};

// ============================================================================
// 1. WorldGrid — Shared world rectangle
// ============================================================================

/// The world-space rectangle every layer in a registry is mapped over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldGrid {
    /// Minimum corner in world units
    pub origin: Vec2,
    /// Extent in world units
    pub size: Vec2,
}

impl Default for WorldGrid {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            size: Vec2::splat(1024.0),
        }
    }
}

impl WorldGrid {
    pub fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Rectangle centered on `center` extending `half_extent` on each side
    pub fn from_center_extent(center: Vec2, half_extent: Vec2) -> Self {
        Self {
            origin: center - half_extent,
            size: half_extent * 2.0,
        }
    }

    pub fn max(&self) -> Vec2 {
        self.origin + self.size
    }

    /// Finite origin and a positive, finite size on both axes
    pub fn is_valid(&self) -> bool {
        self.origin.is_finite() && self.size.is_finite() && self.size.x > 0.0 && self.size.y > 0.0
    }

    /// Half-open containment test `[origin, origin + size)`
    pub fn contains(&self, world: Vec2) -> bool {
        let max = self.max();
        world.x >= self.origin.x && world.y >= self.origin.y && world.x < max.x && world.y < max.y
    }
}

// ============================================================================
// 2. GridMapping — Per-layer origin + cell size
// ============================================================================

/// World-to-pixel mapping of a single layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapping {
    /// World position of pixel (0, 0)'s minimum corner
    pub origin: Vec2,
    /// World extent of one pixel per axis
    pub cell_size: Vec2,
}

impl GridMapping {
    /// Absolute-resolution layer: `resolution` pixels stretched over the grid
    pub fn from_resolution(grid: &WorldGrid, resolution: UVec2) -> Self {
        Self {
            origin: grid.origin,
            cell_size: grid.size / resolution.max(UVec2::ONE).as_vec2(),
        }
    }

    /// Relative-resolution layer: fixed world-space cell size
    pub fn from_cell_size(grid: &WorldGrid, cell_size: Vec2) -> Self {
        Self {
            origin: grid.origin,
            cell_size,
        }
    }

    /// Continuous pixel coordinates (pixel (x, y) spans `[x, x + 1)`)
    #[inline]
    pub fn world_to_pixel_f(&self, world: Vec2) -> Vec2 {
        (world - self.origin) / self.cell_size
    }

    /// Pixel containing `world`. Not clamped.
    ///
    /// The float-to-int cast saturates, so NaN lands on 0. Use
    /// [`try_world_to_pixel`](Self::try_world_to_pixel) for untrusted input.
    #[inline]
    pub fn world_to_pixel(&self, world: Vec2) -> IVec2 {
        self.world_to_pixel_f(world).floor().as_ivec2()
    }

    /// Pixel containing `world`, or `None` when the coordinate is not finite
    #[inline]
    pub fn try_world_to_pixel(&self, world: Vec2) -> Option<IVec2> {
        let p = self.world_to_pixel_f(world);
        p.is_finite().then(|| p.floor().as_ivec2())
    }

    /// Continuous coordinates where pixel (x, y)'s center sits at (x, y)
    #[inline]
    pub fn world_to_pixel_center_space(&self, world: Vec2) -> Vec2 {
        self.world_to_pixel_f(world) - Vec2::splat(0.5)
    }

    /// World position of the pixel's center
    #[inline]
    pub fn pixel_to_world(&self, pixel: IVec2) -> Vec2 {
        (pixel.as_vec2() + Vec2::splat(0.5)) * self.cell_size + self.origin
    }

    /// Smaller of the two cell dimensions
    pub fn min_cell(&self) -> f32 {
        self.cell_size.x.min(self.cell_size.y)
    }
}

// ============================================================================
// 3. OutOfBoundsPolicy — Clamp or default
// ============================================================================

/// How world positions outside a layer's pixel range are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfBoundsPolicy {
    /// Leave coordinates unclamped: reads return the layer default, writes are ignored
    #[default]
    ReturnDefault,
    /// Clamp coordinates to the nearest edge pixel
    ClampToEdge,
}

impl OutOfBoundsPolicy {
    /// Apply the policy to a pixel coordinate for a layer of `resolution`
    #[inline]
    pub fn resolve(self, pixel: IVec2, resolution: UVec2) -> IVec2 {
        match self {
            OutOfBoundsPolicy::ReturnDefault => pixel,
            OutOfBoundsPolicy::ClampToEdge => clamp_to_resolution(pixel, resolution),
        }
    }
}

// ============================================================================
// 4. Free-function conversions
// ============================================================================

/// Clamp a pixel coordinate into `[0, resolution - 1]` per axis
pub fn clamp_to_resolution(pixel: IVec2, resolution: UVec2) -> IVec2 {
    let max = resolution.as_ivec2() - IVec2::ONE;
    pixel.clamp(IVec2::ZERO, max.max(IVec2::ZERO))
}

/// `floor((world - grid_origin) / cell_size)`
pub fn world_to_pixel(world: Vec2, grid_origin: Vec2, cell_size: Vec2) -> IVec2 {
    GridMapping {
        origin: grid_origin,
        cell_size,
    }
    .world_to_pixel(world)
}

/// Center of `pixel` in world units
pub fn pixel_to_world(pixel: IVec2, grid_origin: Vec2, cell_size: Vec2) -> Vec2 {
    GridMapping {
        origin: grid_origin,
        cell_size,
    }
    .pixel_to_world(pixel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_mapping() -> GridMapping {
        let grid = WorldGrid::new(Vec2::splat(-5000.0), Vec2::splat(10000.0));
        GridMapping::from_resolution(&grid, UVec2::splat(100))
    }

    #[test]
    fn test_world_to_pixel_floors() {
        let mapping = scenario_mapping();
        assert_eq!(mapping.cell_size, Vec2::splat(100.0));
        assert_eq!(mapping.world_to_pixel(Vec2::new(10.0, 10.0)), IVec2::new(50, 50));
        assert_eq!(mapping.world_to_pixel(Vec2::new(-5000.0, -5000.0)), IVec2::ZERO);
        assert_eq!(mapping.world_to_pixel(Vec2::new(-5000.1, 4999.9)), IVec2::new(-1, 99));
    }

    #[test]
    fn test_pixel_center_roundtrip() {
        let mapping = scenario_mapping();
        for world in [Vec2::new(10.0, 10.0), Vec2::new(-4999.0, 4321.0), Vec2::new(1099.9, -1.0)] {
            let pixel = mapping.world_to_pixel(world);
            let center = mapping.pixel_to_world(pixel);
            assert_eq!(mapping.world_to_pixel(center), pixel);
            assert!((center - world).abs().max_element() <= 50.0);
            let expected = (pixel.as_vec2() + 0.5) * 100.0 - 5000.0;
            assert!((center - expected).length() < 1e-3);
        }
    }

    #[test]
    fn test_clamp_policy() {
        let res = UVec2::new(10, 20);
        let policy = OutOfBoundsPolicy::ClampToEdge;
        assert_eq!(policy.resolve(IVec2::new(-3, 25), res), IVec2::new(0, 19));
        assert_eq!(
            OutOfBoundsPolicy::ReturnDefault.resolve(IVec2::new(-3, 25), res),
            IVec2::new(-3, 25)
        );
    }

    #[test]
    fn test_non_finite_world_has_no_pixel() {
        let mapping = scenario_mapping();
        assert_eq!(mapping.try_world_to_pixel(Vec2::new(10.0, 10.0)), Some(IVec2::new(50, 50)));
        assert_eq!(mapping.try_world_to_pixel(Vec2::new(f32::NAN, 10.0)), None);
        assert_eq!(mapping.try_world_to_pixel(Vec2::new(0.0, f32::INFINITY)), None);

        let degenerate = GridMapping::from_cell_size(&WorldGrid::default(), Vec2::ZERO);
        assert_eq!(degenerate.try_world_to_pixel(Vec2::ZERO), None);
    }

    #[test]
    fn test_grid_validity() {
        assert!(WorldGrid::default().is_valid());
        assert!(!WorldGrid::new(Vec2::ZERO, Vec2::new(10.0, 0.0)).is_valid());
        assert!(!WorldGrid::new(Vec2::ZERO, Vec2::new(-1.0, 1.0)).is_valid());
        assert!(!WorldGrid::new(Vec2::new(f32::NAN, 0.0), Vec2::ONE).is_valid());
    }

    #[test]
    fn test_from_center_extent() {
        let grid = WorldGrid::from_center_extent(Vec2::ZERO, Vec2::splat(50.0));
        assert_eq!(grid.origin, Vec2::splat(-50.0));
        assert_eq!(grid.size, Vec2::splat(100.0));
        assert!(grid.contains(Vec2::new(-50.0, 49.9)));
        assert!(!grid.contains(Vec2::new(50.0, 0.0)));
    }
}
