//! Hill climbing with random restarts.

use std::mem;

use crate::schema::{LocalSearchConfig, TweakConfig, TweakTarget};

use super::operators::DiagramRng;
use super::pool::{DiagramPool, Member};
use super::skeleton::{Candidate, SearchContext, SearchOutcome, SearchStrategy};

/// Tweak-and-accept-if-not-worse stepping shared by local search and the
/// memetic refinement phase.
pub(crate) struct Climber {
    tweak: TweakConfig,
    target: TweakTarget,
    retry_limit: Option<usize>,
    /// Point being retried after failed tweaks.
    focus: Option<usize>,
    failures: usize,
    /// Per-point error of the current solution; empty when unknown.
    errors: Vec<u64>,
}

impl Climber {
    pub(crate) fn new(tweak: TweakConfig, target: TweakTarget, retry_limit: Option<usize>) -> Self {
        Self {
            tweak,
            target,
            retry_limit,
            focus: None,
            failures: 0,
            errors: Vec::new(),
        }
    }

    /// Forget everything learned about the previous current solution.
    pub(crate) fn reset(&mut self) {
        self.focus = None;
        self.failures = 0;
        self.errors.clear();
    }

    /// Take the per-point errors of a newly adopted current solution.
    pub(crate) fn adopt(&mut self, errors: &[u64]) {
        self.reset();
        self.errors.extend_from_slice(errors);
    }

    fn choose_target(&mut self, rng: &mut DiagramRng, len: usize) -> usize {
        if let Some(focus) = self.focus {
            match self.retry_limit {
                Some(limit) if self.failures >= limit => {
                    let next = rng.index(len);
                    self.focus = Some(next);
                    self.failures = 0;
                    return next;
                }
                _ => return focus,
            }
        }

        let pick = match self.target {
            TweakTarget::WorstPoint if self.errors.len() == len => worst_point(&self.errors),
            _ => rng.index(len),
        };
        if self.retry_limit.is_some() {
            self.focus = Some(pick);
            self.failures = 0;
        }
        pick
    }

    fn accept(&mut self, moved_to: usize, errors: &[u64]) {
        self.failures = 0;
        self.focus = match (self.retry_limit, self.target) {
            (Some(_), TweakTarget::Random) => Some(moved_to),
            _ => None,
        };
        self.errors.clear();
        self.errors.extend_from_slice(errors);
    }

    fn reject(&mut self) {
        if self.focus.is_some() {
            self.failures += 1;
        }
    }

    /// One tweak of `current` into `scratch`. When the tweak is not worse
    /// the two slots trade places. Returns whether it was accepted.
    pub(crate) fn step(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        pool: &mut DiagramPool,
        current: &mut Member,
        scratch: &mut usize,
    ) -> bool {
        let target = self.choose_target(rng, pool.point_count());

        let source = pool.checkout(current.slot);
        let moved_to = rng.tweak_into(&source, pool.diagram_mut(*scratch), target, &self.tweak);
        pool.restore(current.slot, source);

        let fitness = ctx.evaluate(pool.diagram(*scratch));
        if fitness <= current.fitness {
            mem::swap(&mut current.slot, scratch);
            current.fitness = fitness;
            self.accept(moved_to, ctx.evaluator().point_errors());
            true
        } else {
            self.reject();
            false
        }
    }
}

/// Index of the largest error, lowest index on ties.
fn worst_point(errors: &[u64]) -> usize {
    let mut worst = 0;
    for (i, &error) in errors.iter().enumerate() {
        if error > errors[worst] {
            worst = i;
        }
    }
    worst
}

/// Random restarts followed by hill climbing until the budget is spent.
pub struct LocalSearch {
    config: LocalSearchConfig,
}

impl LocalSearch {
    pub fn new(config: LocalSearchConfig) -> Self {
        Self { config }
    }
}

impl SearchStrategy for LocalSearch {
    fn name(&self) -> &'static str {
        "local-search"
    }

    fn search(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        point_count: usize,
    ) -> SearchOutcome {
        let mut climber = Climber::new(
            self.config.tweak.clone(),
            self.config.target,
            self.config.point_retry_limit,
        );
        let mut pool = DiagramPool::new(2, point_count);

        let mut current = Member {
            slot: pool.acquire(),
            fitness: f64::INFINITY,
        };
        rng.randomize(pool.diagram_mut(current.slot));
        current.fitness = ctx.evaluate(pool.diagram(current.slot));
        climber.adopt(ctx.evaluator().point_errors());

        let mut scratch = pool.acquire();
        for _ in 0..self.config.restarts {
            if !ctx.can_continue() {
                break;
            }
            rng.randomize(pool.diagram_mut(scratch));
            let fitness = ctx.evaluate(pool.diagram(scratch));
            if fitness < current.fitness {
                mem::swap(&mut current.slot, &mut scratch);
                current.fitness = fitness;
                climber.adopt(ctx.evaluator().point_errors());
            }
        }

        while ctx.can_continue() {
            climber.step(ctx, rng, &mut pool, &mut current, &mut scratch);
        }

        SearchOutcome {
            best: Candidate {
                diagram: pool.checkout(current.slot),
                fitness: current.fitness,
            },
            generations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::compute::fitness::CpuFitnessEvaluator;
    use crate::compute::search::skeleton::SearchEvent;
    use crate::schema::{Budget, Color, RgbImage};

    fn gradient(width: usize, height: usize) -> RgbImage {
        let mut data = Vec::with_capacity(width * height * 3);
        for row in 0..height {
            for col in 0..width {
                data.extend_from_slice(&[(col * 255 / width) as u8, (row * 255 / height) as u8, 90]);
            }
        }
        RgbImage::new(width, height, data).unwrap()
    }

    fn run(
        image: RgbImage,
        config: LocalSearchConfig,
        points: usize,
        evaluations: u64,
        seed: u64,
    ) -> (SearchOutcome, Vec<SearchEvent>, u64) {
        let (width, height) = (image.width(), image.height());
        let mut eval = CpuFitnessEvaluator::new(Arc::new(image));
        let mut events = Vec::new();
        let mut observer = |event: &SearchEvent| events.push(*event);
        let mut ctx = SearchContext::new(&mut eval, Budget::Evaluations { count: evaluations })
            .with_observer(&mut observer);
        let mut rng = DiagramRng::new(seed, width, height);
        let outcome = LocalSearch::new(config).search(&mut ctx, &mut rng, points);
        let used = ctx.evaluations();
        drop(ctx);
        (outcome, events, used)
    }

    #[test]
    fn test_single_evaluation_on_solid_image() {
        let image = RgbImage::filled(4, 4, Color::new(255, 0, 0));
        let (outcome, _, used) = run(image, LocalSearchConfig::default(), 1, 1, 3);
        assert_eq!(used, 1);
        assert_eq!(outcome.best.fitness, 0.0);
    }

    #[test]
    fn test_budget_is_exact() {
        let (_, _, used) = run(gradient(12, 9), LocalSearchConfig::default(), 5, 40, 8);
        assert_eq!(used, 40);
    }

    #[test]
    fn test_restarts_cut_short_by_budget() {
        let (_, _, used) = run(gradient(12, 9), LocalSearchConfig::default(), 5, 4, 8);
        assert_eq!(used, 4);
    }

    #[test]
    fn test_improvements_are_monotonic() {
        for target in [TweakTarget::Random, TweakTarget::WorstPoint] {
            let config = LocalSearchConfig {
                target,
                ..Default::default()
            };
            let (outcome, events, _) = run(gradient(16, 16), config, 6, 300, 17);
            let improved: Vec<f64> = events
                .iter()
                .filter_map(|e| match e {
                    SearchEvent::Improved { fitness, .. } => Some(*fitness),
                    _ => None,
                })
                .collect();
            assert!(!improved.is_empty());
            assert!(improved.windows(2).all(|w| w[1] < w[0]));
            assert_eq!(*improved.last().unwrap(), outcome.best.fitness);
            assert!(outcome.best.diagram.is_sorted());
        }
    }

    #[test]
    fn test_two_pixel_image_converges() {
        let image = RgbImage::new(2, 1, vec![0, 0, 255, 255, 0, 0]).unwrap();
        let (outcome, _, _) = run(image, LocalSearchConfig::default(), 2, 500, 5);
        assert_eq!(outcome.best.fitness, 0.0);
    }

    #[test]
    fn test_worst_point_target() {
        let mut climber = Climber::new(TweakConfig::default(), TweakTarget::WorstPoint, None);
        let mut rng = DiagramRng::new(1, 10, 10);
        climber.adopt(&[4, 30, 30, 2]);
        assert_eq!(climber.choose_target(&mut rng, 4), 1);
        assert_eq!(climber.choose_target(&mut rng, 4), 1);
    }

    #[test]
    fn test_retry_limit_switches_target() {
        let mut climber = Climber::new(TweakConfig::default(), TweakTarget::WorstPoint, Some(2));
        let mut rng = DiagramRng::new(1, 10, 10);
        climber.adopt(&[0, 0, 9]);

        assert_eq!(climber.choose_target(&mut rng, 3), 2);
        climber.reject();
        assert_eq!(climber.choose_target(&mut rng, 3), 2);
        climber.reject();
        assert_eq!(climber.failures, 2);

        // Limit reached: a fresh random focus with a clean failure count.
        let next = climber.choose_target(&mut rng, 3);
        assert_eq!(climber.focus, Some(next));
        assert_eq!(climber.failures, 0);
    }

    #[test]
    fn test_accept_follows_moved_point() {
        let mut climber = Climber::new(TweakConfig::default(), TweakTarget::Random, Some(5));
        let mut rng = DiagramRng::new(2, 10, 10);
        climber.choose_target(&mut rng, 4);
        climber.reject();
        climber.accept(3, &[1, 2, 3, 4]);
        assert_eq!(climber.focus, Some(3));
        assert_eq!(climber.failures, 0);
        assert_eq!(climber.choose_target(&mut rng, 4), 3);
    }
}
