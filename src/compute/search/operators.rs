//! Random diagram generation, tweak and crossover operators.
//!
//! All range sampling goes through `rand`'s uniform samplers, which map the
//! generator output onto the requested range without modulo bias.

use rand::prelude::*;

use crate::schema::{Diagram, Point, TweakConfig};

/// Random number generator wrapper for diagram operations.
pub struct DiagramRng {
    rng: StdRng,
    width: u32,
    height: u32,
}

impl DiagramRng {
    /// Create from seed for an image of `width` x `height` pixels.
    pub fn new(seed: u64, width: usize, height: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            width: width as u32,
            height: height as u32,
        }
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Two distinct uniform indices in `0..len` (`len >= 2`).
    pub fn distinct_pair(&mut self, len: usize) -> (usize, usize) {
        let first = self.rng.gen_range(0..len);
        let mut second = self.rng.gen_range(0..len - 1);
        if second >= first {
            second += 1;
        }
        (first, second)
    }

    /// `amount` distinct indices from `0..len`, in random order.
    pub fn sample_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }

    /// Place every point uniformly at random and sort into position order.
    pub fn randomize(&mut self, diagram: &mut Diagram) {
        for point in diagram.points_mut() {
            *point = Point::new(
                self.rng.gen_range(0..self.width),
                self.rng.gen_range(0..self.height),
            );
        }
        diagram.sort_points();
    }

    /// Generate a random diagram of `len` points.
    pub fn random_diagram(&mut self, len: usize) -> Diagram {
        let mut diagram = Diagram::new(len);
        self.randomize(&mut diagram);
        diagram
    }

    /// Copy `source` into `dest` with the point at `target` displaced.
    ///
    /// The displacement on each axis is uniform in
    /// `[-max(1, round(fraction * size)), +max(1, round(fraction * size))]`
    /// and the result is clamped into the image. Only the moved point is
    /// re-seated, so `dest` stays in position order. Returns its new index.
    pub fn tweak_into(
        &mut self,
        source: &Diagram,
        dest: &mut Diagram,
        target: usize,
        config: &TweakConfig,
    ) -> usize {
        dest.copy_from(source);

        let point = source.point(target);
        let x = displace(&mut self.rng, point.x, self.width, config.movement_fraction);
        let y = displace(&mut self.rng, point.y, self.height, config.movement_fraction);
        dest.points_mut()[target] = Point::new(x, y);

        dest.settle_point(target)
    }

    /// Segment crossover.
    ///
    /// Picks a start index and a length in `1..=len`; the (possibly
    /// wrapping) segment is taken from the other parent, every other index
    /// is copied straight. Children are left unsorted.
    pub fn crossover_into(
        &mut self,
        first: &Diagram,
        second: &Diagram,
        first_child: &mut Diagram,
        second_child: &mut Diagram,
    ) {
        let len = first.len();
        let start = self.rng.gen_range(0..len);
        let length = self.rng.gen_range(1..=len);
        exchange_segment(first, second, first_child, second_child, start, length);
    }
}

fn displace<R: Rng>(rng: &mut R, value: u32, size: u32, fraction: f32) -> u32 {
    let reach = ((size as f32 * fraction).round() as i64).max(1);
    let delta = rng.gen_range(-reach..=reach);
    (value as i64 + delta).clamp(0, size as i64 - 1) as u32
}

fn exchange_segment(
    first: &Diagram,
    second: &Diagram,
    first_child: &mut Diagram,
    second_child: &mut Diagram,
    start: usize,
    length: usize,
) {
    let len = first.len();
    let a = first_child.points_mut();
    let b = second_child.points_mut();
    for i in 0..len {
        let in_segment = (i + len - start) % len < length;
        if in_segment {
            a[i] = second.point(i);
            b[i] = first.point(i);
        } else {
            a[i] = first.point(i);
            b[i] = second.point(i);
        }
    }
}
