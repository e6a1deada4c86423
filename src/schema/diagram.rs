//! Voronoi point diagram and color types.
//!
//! A diagram is a fixed-size set of points in pixel space. Points are kept in
//! *position order* (ascending `x`, then `y`) so the fitness evaluator can
//! binary-search them by column.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A diagram point in pixel coordinates.
///
/// The derived ordering compares `x` first and `y` second, which is exactly
/// the position order used throughout the crate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to a pixel.
    #[inline]
    pub fn distance_squared(&self, col: u32, row: u32) -> u64 {
        let dx = self.x.abs_diff(col) as u64;
        let dy = self.y.abs_diff(row) as u64;
        dx * dx + dy * dy
    }
}

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of absolute per-channel differences, in raw byte units.
    #[inline]
    pub fn abs_diff_sum(&self, r: u8, g: u8, b: u8) -> u32 {
        self.r.abs_diff(r) as u32 + self.g.abs_diff(g) as u32 + self.b.abs_diff(b) as u32
    }
}

/// A Voronoi diagram: a fixed number of points kept in position order.
///
/// The point count never changes after construction. Operations that move a
/// point must restore position order before the diagram is evaluated; see
/// [`Diagram::settle_point`] and [`Diagram::sort_points`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagram {
    points: Vec<Point>,
}

impl Diagram {
    /// Allocate a diagram of `len` points, all at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            points: vec![Point::default(); len],
        }
    }

    /// Adopt a caller-owned point buffer without copying it.
    ///
    /// The buffer is taken as-is; call [`Diagram::sort_points`] if it is not
    /// already in position order. Use [`Diagram::into_points`] to hand the
    /// allocation back.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Release the underlying buffer.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn x(&self, index: usize) -> u32 {
        self.points[index].x
    }

    #[inline]
    pub fn y(&self, index: usize) -> u32 {
        self.points[index].y
    }

    #[inline]
    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Mutable access to the raw points. Callers are responsible for
    /// restoring position order afterwards.
    #[inline]
    pub fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }

    /// Overwrite this diagram with the points of `other` without reallocating.
    pub fn copy_from(&mut self, other: &Diagram) {
        self.points.copy_from_slice(&other.points);
    }

    /// Full sort into position order. Only needed after bulk changes
    /// (random generation, crossover).
    pub fn sort_points(&mut self) {
        self.points.sort_unstable();
    }

    /// Move the point at `index` to its place in position order, assuming
    /// every other point is already ordered. Returns the point's new index.
    pub fn settle_point(&mut self, index: usize) -> usize {
        let mut current = index;
        while current + 1 < self.points.len()
            && self.points[current].cmp(&self.points[current + 1]) == Ordering::Greater
        {
            self.points.swap(current, current + 1);
            current += 1;
        }
        while current > 0 && self.points[current - 1].cmp(&self.points[current]) == Ordering::Greater
        {
            self.points.swap(current - 1, current);
            current -= 1;
        }
        current
    }

    /// Whether all points are in position order.
    pub fn is_sorted(&self) -> bool {
        self.points.is_sorted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagram(coords: &[(u32, u32)]) -> Diagram {
        Diagram::from_points(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn test_position_order_breaks_ties_on_y() {
        assert!(Point::new(1, 9) < Point::new(2, 0));
        assert!(Point::new(3, 1) < Point::new(3, 2));
        assert_eq!(Point::new(4, 4).cmp(&Point::new(4, 4)), Ordering::Equal);
    }

    #[test]
    fn test_settle_point_moves_right() {
        let mut d = diagram(&[(0, 0), (2, 0), (5, 5), (7, 1)]);
        d.points_mut()[0] = Point::new(6, 0);
        let idx = d.settle_point(0);
        assert_eq!(idx, 2);
        assert!(d.is_sorted());
    }

    #[test]
    fn test_settle_point_moves_left() {
        let mut d = diagram(&[(0, 0), (2, 0), (5, 5), (7, 1)]);
        d.points_mut()[3] = Point::new(1, 3);
        let idx = d.settle_point(3);
        assert_eq!(idx, 1);
        assert_eq!(d.points()[1], Point::new(1, 3));
        assert!(d.is_sorted());
    }

    #[test]
    fn test_settle_point_in_place() {
        let mut d = diagram(&[(0, 0), (2, 0), (5, 5)]);
        d.points_mut()[1] = Point::new(3, 9);
        assert_eq!(d.settle_point(1), 1);
        assert!(d.is_sorted());
    }

    #[test]
    fn test_settle_point_equal_neighbours() {
        let mut d = diagram(&[(1, 1), (1, 1), (1, 1)]);
        assert_eq!(d.settle_point(1), 1);
        assert!(d.is_sorted());
    }

    #[test]
    fn test_adopted_buffer_is_returned() {
        let points = vec![Point::new(1, 2), Point::new(3, 4)];
        let ptr = points.as_ptr();
        let d = Diagram::from_points(points);
        assert_eq!(d.x(1), 3);
        assert_eq!(d.y(0), 2);
        let back = d.into_points();
        assert_eq!(back.as_ptr(), ptr);
    }

    #[test]
    fn test_distance_squared() {
        let p = Point::new(3, 4);
        assert_eq!(p.distance_squared(0, 0), 25);
        assert_eq!(p.distance_squared(3, 4), 0);
    }

    #[test]
    fn test_color_abs_diff() {
        let c = Color::new(10, 200, 0);
        assert_eq!(c.abs_diff_sum(0, 255, 0), 65);
    }
}
