//! Fitness evaluation of Voronoi diagrams against the source image.
//!
//! Every pixel is assigned to its nearest diagram point, each point takes the
//! rounded average color of its pixels, and the fitness sums, over all
//! pixels, the mean absolute channel deviation scaled to `[0, 1]`. It lies
//! in `[0, pixel_count]`.
//! Lower is better and 0 is a perfect reconstruction.

use std::sync::Arc;

use rayon::prelude::*;

use crate::schema::{BYTES_PER_PIXEL, Color, Diagram, Point, RgbImage};

/// Summed absolute deviation of one pixel at which it counts as fully wrong.
const CHANNEL_SCALE: f64 = (BYTES_PER_PIXEL * 255) as f64;

/// Scores diagrams. Implementations own all of their work buffers and are
/// therefore not shareable between concurrent searches.
pub trait FitnessEvaluator {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Score a diagram whose points are in position order.
    ///
    /// Recomputes the pixel assignment, point colors and pixel counts, and
    /// increments the evaluation counter.
    fn evaluate(&mut self, diagram: &Diagram) -> f64;

    /// Evaluations performed since the last reset.
    fn evaluations(&self) -> u64;

    fn reset_evaluations(&mut self);

    /// Nearest point index of every pixel of the last evaluated diagram,
    /// row-major, top row first.
    fn assignment(&self) -> &[u32];

    /// Average color of every point of the last evaluated diagram.
    fn colors(&self) -> &[Color];

    /// Pixels owned by every point of the last evaluated diagram. A zero
    /// count marks a point whose color fell back to black.
    fn pixel_counts(&self) -> &[u32];

    /// Summed raw channel deviation (byte units) contributed by each point.
    fn point_errors(&self) -> &[u64];
}

/// Index of the point closest to `(col, row)` under squared Euclidean
/// distance. Ties go to the lowest index.
///
/// `points` must be non-empty and in position order. The scan starts at the
/// point whose column is closest to `col` and widens in both directions,
/// abandoning a direction once the horizontal distance alone exceeds the best
/// distance found so far.
pub fn nearest_point(points: &[Point], col: u32, row: u32) -> usize {
    debug_assert!(!points.is_empty());

    let start = closest_column(points, col);
    let mut best = start;
    let mut best_dist = points[start].distance_squared(col, row);

    let mut lower = start.checked_sub(1);
    let mut upper = (start + 1 < points.len()).then_some(start + 1);

    while lower.is_some() || upper.is_some() {
        if let Some(i) = lower {
            let dx = points[i].x.abs_diff(col) as u64;
            if dx * dx > best_dist {
                lower = None;
            } else {
                let dist = points[i].distance_squared(col, row);
                if dist <= best_dist {
                    // Moving down only ever meets lower indices.
                    best = i;
                    best_dist = dist;
                }
                lower = i.checked_sub(1);
            }
        }

        if let Some(i) = upper {
            let dx = points[i].x.abs_diff(col) as u64;
            if dx * dx > best_dist {
                upper = None;
            } else {
                let dist = points[i].distance_squared(col, row);
                if dist < best_dist || (dist == best_dist && i < best) {
                    best = i;
                    best_dist = dist;
                }
                upper = (i + 1 < points.len()).then_some(i + 1);
            }
        }
    }

    best
}

/// Exhaustive nearest-point scan. Reference for [`nearest_point`].
pub fn nearest_point_linear(points: &[Point], col: u32, row: u32) -> usize {
    let mut best = 0;
    let mut best_dist = u64::MAX;
    for (i, p) in points.iter().enumerate() {
        let dist = p.distance_squared(col, row);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Binary search for the point whose `x` is closest to `col`, preferring the
/// lower one on equal horizontal distance.
fn closest_column(points: &[Point], col: u32) -> usize {
    let split = points.partition_point(|p| p.x < col);
    if split == 0 {
        return 0;
    }
    if split == points.len() {
        return points.len() - 1;
    }
    let below = col - points[split - 1].x;
    let above = points[split].x - col;
    if above < below { split } else { split - 1 }
}

/// Per-point accumulators and the pixel assignment of one evaluator.
#[derive(Debug, Default)]
pub(crate) struct ReconstructionBuffers {
    pub(crate) assignment: Vec<u32>,
    sums: Vec<[u64; 3]>,
    counts: Vec<u32>,
    colors: Vec<Color>,
    errors: Vec<u64>,
}

impl ReconstructionBuffers {
    pub(crate) fn new(pixel_count: usize) -> Self {
        Self {
            assignment: vec![0; pixel_count],
            ..Default::default()
        }
    }

    pub(crate) fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub(crate) fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub(crate) fn errors(&self) -> &[u64] {
        &self.errors
    }

    fn prepare(&mut self, point_count: usize) {
        if self.counts.len() != point_count {
            self.sums.resize(point_count, [0; 3]);
            self.counts.resize(point_count, 0);
            self.colors.resize(point_count, Color::BLACK);
            self.errors.resize(point_count, 0);
        }
        self.sums.fill([0; 3]);
        self.counts.fill(0);
        self.errors.fill(0);
    }

    /// Average colors from the current assignment and return the fitness.
    pub(crate) fn score(&mut self, image: &RgbImage, point_count: usize) -> f64 {
        self.prepare(point_count);

        let pixels = image.data().chunks_exact(BYTES_PER_PIXEL);
        for (pixel, &index) in pixels.clone().zip(&self.assignment) {
            let sum = &mut self.sums[index as usize];
            sum[0] += pixel[0] as u64;
            sum[1] += pixel[1] as u64;
            sum[2] += pixel[2] as u64;
            self.counts[index as usize] += 1;
        }

        for ((color, sum), &count) in self.colors.iter_mut().zip(&self.sums).zip(&self.counts) {
            *color = if count == 0 {
                Color::BLACK
            } else {
                let count = count as u64;
                let half = count / 2;
                Color::new(
                    ((sum[0] + half) / count) as u8,
                    ((sum[1] + half) / count) as u8,
                    ((sum[2] + half) / count) as u8,
                )
            };
        }

        let mut total = 0u64;
        for (pixel, &index) in pixels.zip(&self.assignment) {
            let deviation =
                self.colors[index as usize].abs_diff_sum(pixel[0], pixel[1], pixel[2]) as u64;
            self.errors[index as usize] += deviation;
            total += deviation;
        }

        total as f64 / CHANNEL_SCALE
    }
}

/// Reference CPU evaluator.
pub struct CpuFitnessEvaluator {
    image: Arc<RgbImage>,
    buffers: ReconstructionBuffers,
    evaluations: u64,
}

impl CpuFitnessEvaluator {
    pub fn new(image: Arc<RgbImage>) -> Self {
        let buffers = ReconstructionBuffers::new(image.pixel_count());
        Self {
            image,
            buffers,
            evaluations: 0,
        }
    }

    fn assign_pixels(&mut self, points: &[Point]) {
        let width = self.image.width();
        self.buffers
            .assignment
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, out)| {
                for (col, slot) in out.iter_mut().enumerate() {
                    *slot = nearest_point(points, col as u32, row as u32) as u32;
                }
            });
    }
}

impl FitnessEvaluator for CpuFitnessEvaluator {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn evaluate(&mut self, diagram: &Diagram) -> f64 {
        debug_assert!(diagram.is_sorted(), "diagram points out of position order");
        self.evaluations += 1;
        self.assign_pixels(diagram.points());
        self.buffers.score(&self.image, diagram.len())
    }

    fn evaluations(&self) -> u64 {
        self.evaluations
    }

    fn reset_evaluations(&mut self) {
        self.evaluations = 0;
    }

    fn assignment(&self) -> &[u32] {
        &self.buffers.assignment
    }

    fn colors(&self) -> &[Color] {
        self.buffers.colors()
    }

    fn pixel_counts(&self) -> &[u32] {
        self.buffers.counts()
    }

    fn point_errors(&self) -> &[u64] {
        self.buffers.errors()
    }
}
