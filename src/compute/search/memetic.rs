//! Evolutionary search with local refinement of the tournament survivors.

use crate::schema::{MemeticConfig, TweakTarget};

use super::evolutionary::Population;
use super::local_search::Climber;
use super::operators::DiagramRng;
use super::skeleton::{SearchContext, SearchOutcome, SearchStrategy};

pub struct MemeticAlgorithm {
    config: MemeticConfig,
}

impl MemeticAlgorithm {
    pub fn new(config: MemeticConfig) -> Self {
        Self { config }
    }
}

impl SearchStrategy for MemeticAlgorithm {
    fn name(&self) -> &'static str {
        "memetic"
    }

    fn search(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        point_count: usize,
    ) -> SearchOutcome {
        let evolution = &self.config.evolution;
        let mut climber = Climber::new(evolution.tweak.clone(), TweakTarget::Random, None);
        let mut population =
            Population::initialize(ctx, rng, evolution.population_size, point_count);

        while ctx.can_continue() {
            population.select(rng, evolution.selection_size());
            population.refine(ctx, rng, &mut climber, self.config.local_search_iterations);
            let survivors = population.len();
            population.breed(ctx, rng, survivors, evolution.breeding_size());
            population.mutate(ctx, rng, survivors, evolution.mutation_size(), &evolution.tweak);
            population.finish_generation();
        }

        population.into_outcome()
    }
}
