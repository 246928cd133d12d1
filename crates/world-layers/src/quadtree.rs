//! # Point Quadtree
//!
//! Region quadtree over integer pixel coordinates, one per tracked value of a
//! layer. Supports insert, remove and best-first nearest search bounded by a
//! radius.
//!
//! ## Node states
//! ```text
//! Leaf      points.len() <= max_points_per_node, children = None
//! Internal  points.is_empty(),                   children = Some([NW, NE, SW, SE])
//! ```
//! A leaf whose bound is at most one unit on both axes can only hold copies of
//! a single coordinate. It never splits, so repeated duplicates may push it
//! over capacity.
//!
//! ## Table of Contents
//! 1. QuadBounds — Half-open node rectangle
//! 2. QuadNode — Leaf / internal node
//! 3. PointQuadtree — Public tree API
//! 4. Nearest search
//! 5. Points iterator

use glam::{IVec2, UVec2, Vec2};

/// Default leaf capacity before a split
pub const DEFAULT_MAX_POINTS_PER_NODE: usize = 4;

// ============================================================================
// 1. QuadBounds — Half-open node rectangle
// ============================================================================

/// Axis-aligned rectangle `[min, max)` in pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl QuadBounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Bound covering every pixel of a `resolution`-sized layer
    pub fn from_resolution(resolution: UVec2) -> Self {
        Self::new(Vec2::ZERO, resolution.as_vec2())
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, point: IVec2) -> bool {
        let p = point.as_vec2();
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }

    /// Squared distance from `origin` to the closest point of the rectangle,
    /// with each axis delta multiplied by `axis_scale`
    #[inline]
    fn distance_sq_scaled(&self, origin: Vec2, axis_scale: Vec2) -> f32 {
        let delta = (self.min - origin).max(origin - self.max).max(Vec2::ZERO);
        (delta * axis_scale).length_squared()
    }

    /// Child slot for `point`: `x < cx` picks 0/2, `y < cy` picks 0/1.
    /// A point on a split line lands in the higher half.
    #[inline]
    fn child_index(&self, point: IVec2) -> usize {
        let c = self.center();
        let p = point.as_vec2();
        let right = usize::from(p.x >= c.x);
        let bottom = usize::from(p.y >= c.y);
        right + bottom * 2
    }

    fn quadrant(&self, index: usize) -> QuadBounds {
        let c = self.center();
        let (min_x, max_x) = if index & 1 == 0 { (self.min.x, c.x) } else { (c.x, self.max.x) };
        let (min_y, max_y) = if index & 2 == 0 { (self.min.y, c.y) } else { (c.y, self.max.y) };
        QuadBounds::new(Vec2::new(min_x, min_y), Vec2::new(max_x, max_y))
    }

    /// At most one integer coordinate fits inside
    fn is_unit(&self) -> bool {
        let size = self.size();
        size.x <= 1.0 && size.y <= 1.0
    }
}

// ============================================================================
// 2. QuadNode — Leaf / internal node
// ============================================================================

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: QuadBounds,
    points: Vec<IVec2>,
    children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    fn leaf(bounds: QuadBounds) -> Self {
        Self {
            bounds,
            points: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, point: IVec2, capacity: usize) {
        let index = self.bounds.child_index(point);
        if let Some(children) = self.children.as_deref_mut() {
            children[index].insert(point, capacity);
            return;
        }

        self.points.push(point);
        if self.points.len() > capacity && !self.bounds.is_unit() {
            self.subdivide(capacity);
        }
    }

    /// Split into four children and push every held point down.
    /// Children still over capacity split again.
    fn subdivide(&mut self, capacity: usize) {
        let mut children =
            Box::new([0, 1, 2, 3].map(|index| QuadNode::leaf(self.bounds.quadrant(index))));

        for point in self.points.drain(..) {
            children[self.bounds.child_index(point)].points.push(point);
        }

        for child in children.iter_mut() {
            if child.points.len() > capacity && !child.bounds.is_unit() {
                child.subdivide(capacity);
            }
        }

        self.children = Some(children);
    }

    fn remove(&mut self, point: IVec2) -> bool {
        let index = self.bounds.child_index(point);
        if let Some(children) = self.children.as_deref_mut() {
            return children[index].remove(point);
        }

        match self.points.iter().position(|p| *p == point) {
            Some(i) => {
                self.points.swap_remove(i);
                true
            }
            None => false,
        }
    }

    fn depth(&self) -> usize {
        match &self.children {
            Some(children) => 1 + children.iter().map(QuadNode::depth).max().unwrap_or(0),
            None => 1,
        }
    }
}

// ============================================================================
// 3. PointQuadtree — Public tree API
// ============================================================================

/// Point index over integer pixel coordinates.
///
/// Duplicates are kept as separate entries and [`remove`](Self::remove)
/// takes out one at a time. Nodes are never merged.
#[derive(Debug, Clone)]
pub struct PointQuadtree {
    root: QuadNode,
    max_points_per_node: usize,
    len: usize,
}

impl PointQuadtree {
    /// Empty tree over `bounds`. A capacity of 0 is treated as 1.
    pub fn new(bounds: QuadBounds, max_points_per_node: usize) -> Self {
        Self {
            root: QuadNode::leaf(bounds),
            max_points_per_node: max_points_per_node.max(1),
            len: 0,
        }
    }

    /// Tree covering a layer of `resolution` pixels
    pub fn for_resolution(resolution: UVec2, max_points_per_node: usize) -> Self {
        Self::new(QuadBounds::from_resolution(resolution), max_points_per_node)
    }

    /// Insert `point`. Returns `false` if it lies outside the root bound.
    pub fn insert(&mut self, point: IVec2) -> bool {
        if !self.root.bounds.contains(point) {
            tracing::warn!(
                "Quadtree insert outside root bounds: {:?} not in {:?}..{:?}",
                point, self.root.bounds.min, self.root.bounds.max
            );
            return false;
        }
        self.root.insert(point, self.max_points_per_node);
        self.len += 1;
        true
    }

    /// Remove one entry equal to `point`. Returns whether one was found.
    pub fn remove(&mut self, point: IVec2) -> bool {
        if !self.root.bounds.contains(point) {
            return false;
        }
        let removed = self.root.remove(point);
        if removed {
            self.len -= 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> QuadBounds {
        self.root.bounds
    }

    pub fn max_points_per_node(&self) -> usize {
        self.max_points_per_node
    }

    /// Levels from root to the deepest leaf (an unsplit root is 1)
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Every stored point, duplicates included, in no particular order
    pub fn points(&self) -> Points<'_> {
        Points {
            stack: vec![&self.root],
            current: (&[] as &[IVec2]).iter(),
        }
    }

    /// Drop all points and collapse back to a single leaf
    pub fn clear(&mut self) {
        self.root = QuadNode::leaf(self.root.bounds);
        self.len = 0;
    }

    // ========================================================================
    // 4. Nearest search
    // ========================================================================

    /// Closest stored point strictly within `max_radius` of `origin`
    pub fn find_nearest(&self, origin: Vec2, max_radius: f32) -> Option<IVec2> {
        self.find_nearest_scaled(origin, max_radius, Vec2::ONE)
    }

    /// [`find_nearest`](Self::find_nearest) under the metric
    /// `(dx * sx)² + (dy * sy)²`, for grids whose cells are not square
    pub fn find_nearest_scaled(&self, origin: Vec2, max_radius: f32, axis_scale: Vec2) -> Option<IVec2> {
        if self.is_empty() || max_radius.is_nan() || max_radius <= 0.0 {
            return None;
        }
        let mut search = NearestSearch {
            origin,
            axis_scale,
            best_dist_sq: max_radius * max_radius,
            best: None,
        };
        search.visit(&self.root);
        search.best
    }
}

struct NearestSearch {
    origin: Vec2,
    axis_scale: Vec2,
    best_dist_sq: f32,
    best: Option<IVec2>,
}

impl NearestSearch {
    fn visit(&mut self, node: &QuadNode) {
        if node.bounds.distance_sq_scaled(self.origin, self.axis_scale) >= self.best_dist_sq {
            return;
        }

        for point in &node.points {
            let d = ((point.as_vec2() - self.origin) * self.axis_scale).length_squared();
            if d < self.best_dist_sq {
                self.best_dist_sq = d;
                self.best = Some(*point);
            }
        }

        if let Some(children) = node.children.as_deref() {
            let mut order = [0usize, 1, 2, 3].map(|i| {
                (i, children[i].bounds.distance_sq_scaled(self.origin, self.axis_scale))
            });
            order.sort_by(|a, b| a.1.total_cmp(&b.1));
            for (i, _) in order {
                self.visit(&children[i]);
            }
        }
    }
}

// ============================================================================
// 5. Points iterator
// ============================================================================

/// Iterator returned by [`PointQuadtree::points`]
pub struct Points<'a> {
    stack: Vec<&'a QuadNode>,
    current: std::slice::Iter<'a, IVec2>,
}

impl<'a> Iterator for Points<'a> {
    type Item = IVec2;

    fn next(&mut self) -> Option<IVec2> {
        loop {
            if let Some(point) = self.current.next() {
                return Some(*point);
            }
            let node = self.stack.pop()?;
            if let Some(children) = node.children.as_deref() {
                self.stack.extend(children.iter());
            }
            self.current = node.points.iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(points: &[IVec2], origin: Vec2, radius: f32) -> Option<f32> {
        points
            .iter()
            .map(|p| (p.as_vec2() - origin).length_squared())
            .filter(|d| *d < radius * radius)
            .min_by(|a, b| a.total_cmp(b))
    }

    fn assert_containment(node: &QuadNode) {
        for p in &node.points {
            assert!(node.bounds.contains(*p), "{p:?} outside {:?}", node.bounds);
        }
        if let Some(children) = node.children.as_deref() {
            assert!(node.points.is_empty(), "internal node holds points");
            children.iter().for_each(assert_containment);
        }
    }

    #[test]
    fn test_insert_splits_and_keeps_containment() {
        let mut tree = PointQuadtree::for_resolution(UVec2::new(64, 64), 4);
        for x in 0..64 {
            for y in (0..64).step_by(7) {
                assert!(tree.insert(IVec2::new(x, y)));
            }
        }
        assert_eq!(tree.len(), 64 * 10);
        assert!(tree.depth() > 1);
        assert_containment(&tree.root);
        assert_eq!(tree.points().count(), tree.len());
    }

    #[test]
    fn test_boundary_point_goes_high() {
        let bounds = QuadBounds::from_resolution(UVec2::new(8, 8));
        assert_eq!(bounds.child_index(IVec2::new(4, 4)), 3);
        assert_eq!(bounds.child_index(IVec2::new(3, 4)), 2);
        assert_eq!(bounds.child_index(IVec2::new(4, 3)), 1);
        assert_eq!(bounds.child_index(IVec2::new(3, 3)), 0);
    }

    #[test]
    fn test_rejects_out_of_root_points() {
        let mut tree = PointQuadtree::for_resolution(UVec2::new(10, 10), 4);
        assert!(!tree.insert(IVec2::new(10, 0)));
        assert!(!tree.insert(IVec2::new(-1, 3)));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_duplicates_stay_bounded() {
        let mut tree = PointQuadtree::for_resolution(UVec2::new(1024, 1024), 2);
        for _ in 0..50 {
            tree.insert(IVec2::new(5, 5));
        }
        assert_eq!(tree.len(), 50);
        assert!(tree.depth() <= 12, "depth {}", tree.depth());
        assert_containment(&tree.root);

        assert!(tree.remove(IVec2::new(5, 5)));
        assert_eq!(tree.len(), 49);
        assert_eq!(tree.find_nearest(Vec2::new(5.0, 5.0), 1.0), Some(IVec2::new(5, 5)));
    }

    #[test]
    fn test_remove_missing_point() {
        let mut tree = PointQuadtree::for_resolution(UVec2::new(16, 16), 4);
        tree.insert(IVec2::new(1, 1));
        assert!(!tree.remove(IVec2::new(2, 2)));
        assert!(tree.remove(IVec2::new(1, 1)));
        assert!(!tree.remove(IVec2::new(1, 1)));
        assert!(tree.is_empty());
        assert_eq!(tree.find_nearest(Vec2::new(1.0, 1.0), 10.0), None);
    }

    #[test]
    fn test_radius_is_strict() {
        let mut tree = PointQuadtree::for_resolution(UVec2::new(16, 16), 4);
        tree.insert(IVec2::new(3, 0));
        assert_eq!(tree.find_nearest(Vec2::ZERO, 3.0), None);
        assert_eq!(tree.find_nearest(Vec2::ZERO, 3.01), Some(IVec2::new(3, 0)));
    }

    #[test]
    fn test_scaled_metric() {
        let mut tree = PointQuadtree::for_resolution(UVec2::new(32, 32), 4);
        tree.insert(IVec2::new(4, 0));
        tree.insert(IVec2::new(0, 3));
        // Unscaled, (0, 3) is closer; with x cells a quarter as wide, (4, 0) wins
        assert_eq!(tree.find_nearest(Vec2::ZERO, 10.0), Some(IVec2::new(0, 3)));
        assert_eq!(
            tree.find_nearest_scaled(Vec2::ZERO, 10.0, Vec2::new(0.25, 1.0)),
            Some(IVec2::new(4, 0))
        );
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for round in 0..40 {
            let size = UVec2::new(rng.gen_range(1..128), rng.gen_range(1..128));
            let capacity = rng.gen_range(1..6);
            let mut tree = PointQuadtree::for_resolution(size, capacity);
            let mut points = Vec::new();

            for _ in 0..rng.gen_range(0..300) {
                let p = IVec2::new(rng.gen_range(0..size.x as i32), rng.gen_range(0..size.y as i32));
                tree.insert(p);
                points.push(p);
                // Duplicates and split-line coincidences
                if rng.gen_bool(0.1) {
                    tree.insert(p);
                    points.push(p);
                }
            }

            for _ in 0..points.len() / 4 {
                let i = rng.gen_range(0..points.len());
                let p = points.swap_remove(i);
                assert!(tree.remove(p));
            }
            assert_eq!(tree.len(), points.len());
            assert_containment(&tree.root);

            for _ in 0..50 {
                let origin = Vec2::new(
                    rng.gen_range(-10.0..size.x as f32 + 10.0),
                    rng.gen_range(-10.0..size.y as f32 + 10.0),
                );
                let radius = rng.gen_range(0.5..64.0);
                let expected = brute_force(&points, origin, radius);
                let found = tree
                    .find_nearest(origin, radius)
                    .map(|p| (p.as_vec2() - origin).length_squared());
                assert_eq!(found, expected, "round {round} origin {origin:?} radius {radius}");
            }
        }
    }
}
