//! Services shared by every search strategy: budget tracking, the running
//! best fitness, improvement notification and the fitness trace.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, warn};

use crate::compute::fitness::FitnessEvaluator;
use crate::schema::{Budget, Diagram};

use super::operators::DiagramRng;

/// Notification emitted while a search runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchEvent {
    /// A strictly better fitness than any seen before in this run.
    Improved {
        fitness: f64,
        evaluations: u64,
        elapsed_seconds: f64,
    },
    /// The budget is spent; `fitness` is the final best.
    Finished {
        fitness: f64,
        evaluations: u64,
        elapsed_seconds: f64,
    },
}

/// A diagram together with its fitness.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub diagram: Diagram,
    pub fitness: f64,
}

/// What a strategy hands back when its budget is spent.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Candidate,
    /// Completed generations, for population strategies.
    pub generations: Option<usize>,
}

/// A metaheuristic that minimizes fitness within the context's budget.
pub trait SearchStrategy {
    fn name(&self) -> &'static str;

    /// Search for the best diagram of `point_count` points.
    ///
    /// The first diagram is always evaluated, even if the budget is already
    /// spent, so there is always a result.
    fn search(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        point_count: usize,
    ) -> SearchOutcome;
}

/// Budget, evaluator and notification hooks for one search run.
///
/// Owns nothing shareable: the evaluator is borrowed mutably for the whole
/// run, and the timer and counters belong to this run only.
pub struct SearchContext<'a> {
    evaluator: &'a mut dyn FitnessEvaluator,
    budget: Budget,
    started: Instant,
    best_fitness: Option<f64>,
    improvements: u64,
    observer: Option<&'a mut dyn FnMut(&SearchEvent)>,
    trace: Option<&'a mut dyn Write>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl<'a> SearchContext<'a> {
    /// Reset the evaluator's counter and start the clock.
    pub fn new(evaluator: &'a mut dyn FitnessEvaluator, budget: Budget) -> Self {
        evaluator.reset_evaluations();
        Self {
            evaluator,
            budget,
            started: Instant::now(),
            best_fitness: None,
            improvements: 0,
            observer: None,
            trace: None,
            cancelled: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a mut dyn FnMut(&SearchEvent)) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Append the best fitness to `trace` after every improvement.
    pub fn with_trace(mut self, trace: &'a mut dyn Write) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Stop the run early once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    /// Whether another evaluation fits in the budget.
    pub fn can_continue(&self) -> bool {
        if self
            .cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return false;
        }
        match self.budget {
            Budget::Time { seconds } => self.started.elapsed().as_secs_f64() < seconds,
            Budget::Evaluations { count } => self.evaluator.evaluations() < count,
        }
    }

    /// Evaluate a diagram, recording and announcing strict improvements.
    pub fn evaluate(&mut self, diagram: &Diagram) -> f64 {
        let fitness = self.evaluator.evaluate(diagram);
        if self.best_fitness.is_none_or(|best| fitness < best) {
            self.record_improvement(fitness);
        }
        fitness
    }

    fn record_improvement(&mut self, fitness: f64) {
        let first = self.best_fitness.is_none();
        self.best_fitness = Some(fitness);
        self.improvements += 1;

        let event = SearchEvent::Improved {
            fitness,
            evaluations: self.evaluations(),
            elapsed_seconds: self.elapsed_seconds(),
        };
        debug!(
            "Improved fitness to {fitness:.6} after {} evaluations",
            self.evaluations()
        );

        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }

        let separator = if first { "" } else { ";" };
        self.write_trace(format_args!("{separator}{fitness:.6}"));
    }

    /// Emit the final notification and terminate the trace line.
    pub fn finish(&mut self) {
        let event = SearchEvent::Finished {
            fitness: self.best_fitness.unwrap_or(f64::INFINITY),
            evaluations: self.evaluations(),
            elapsed_seconds: self.elapsed_seconds(),
        };
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
        self.write_trace(format_args!("\n"));
        if let Some(trace) = self.trace.as_mut()
            && let Err(err) = trace.flush()
        {
            warn!("Failed to flush fitness trace: {err}");
        }
    }

    fn write_trace(&mut self, args: std::fmt::Arguments<'_>) {
        if let Some(trace) = self.trace.as_mut()
            && let Err(err) = trace.write_fmt(args)
        {
            warn!("Disabling fitness trace after write failure: {err}");
            self.trace = None;
        }
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best_fitness
    }

    pub fn improvements(&self) -> u64 {
        self.improvements
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluator.evaluations()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// The evaluator, for reading back the last evaluation's side results.
    pub fn evaluator(&self) -> &dyn FitnessEvaluator {
        &*self.evaluator
    }
}
