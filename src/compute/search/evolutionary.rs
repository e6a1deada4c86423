//! Generational evolutionary algorithm.
//!
//! Each generation eliminates members by binary tournament, then refills the
//! population with crossover offspring and single-point mutants of the
//! survivors.

use crate::schema::{EvolutionConfig, TweakConfig};

use super::local_search::Climber;
use super::operators::DiagramRng;
use super::pool::{DiagramPool, Member};
use super::skeleton::{Candidate, SearchContext, SearchOutcome, SearchStrategy};

/// Population state shared by the evolutionary and memetic strategies.
pub(crate) struct Population {
    pool: DiagramPool,
    members: Vec<Member>,
    best: Candidate,
    generations: usize,
}

impl Population {
    /// Evaluate `size` random diagrams. Stops early if the budget runs out,
    /// but always evaluates at least one.
    pub(crate) fn initialize(
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        size: usize,
        point_count: usize,
    ) -> Self {
        let mut pool = DiagramPool::new(size + 2, point_count);
        let mut members: Vec<Member> = Vec::with_capacity(size);

        for i in 0..size {
            if i > 0 && !ctx.can_continue() {
                break;
            }
            let slot = pool.acquire();
            rng.randomize(pool.diagram_mut(slot));
            let fitness = ctx.evaluate(pool.diagram(slot));
            members.push(Member { slot, fitness });
        }

        let mut fittest = members[0];
        for member in &members[1..] {
            if member.fitness < fittest.fitness {
                fittest = *member;
            }
        }
        let best = Candidate {
            diagram: pool.diagram(fittest.slot).clone(),
            fitness: fittest.fitness,
        };

        Self {
            pool,
            members,
            best,
            generations: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Run binary tournaments, eliminating the less fit member of each pair
    /// until `selection_size` members are gone. On equal fitness the second
    /// drawn member is eliminated.
    pub(crate) fn select(&mut self, rng: &mut DiagramRng, selection_size: usize) {
        for _ in 0..selection_size {
            if self.members.len() < 2 {
                break;
            }
            let (a, b) = rng.distinct_pair(self.members.len());
            let loser = if self.members[a].fitness > self.members[b].fitness {
                a
            } else {
                b
            };
            let eliminated = self.members.swap_remove(loser);
            self.pool.release(eliminated.slot);
        }
    }

    /// Add up to `count` offspring of random survivor pairs. Survivors are the
    /// first `survivors` members.
    ///
    /// Both children are re-sorted and evaluated; the fitter one joins the
    /// population (the second on equal fitness) and the other is recycled.
    /// The second child is skipped if the budget runs out after the first.
    pub(crate) fn breed(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        survivors: usize,
        count: usize,
    ) {
        for _ in 0..count {
            if !ctx.can_continue() {
                return;
            }
            let (a, b) = if survivors >= 2 {
                rng.distinct_pair(survivors)
            } else {
                (0, 0)
            };
            let (first_parent, second_parent) = (self.members[a].slot, self.members[b].slot);

            let first_child = self.pool.acquire();
            let second_child = self.pool.acquire();

            let first = self.pool.checkout(first_parent);
            let second = (second_parent != first_parent).then(|| self.pool.checkout(second_parent));
            let mut second_diagram = self.pool.checkout(second_child);
            rng.crossover_into(
                &first,
                second.as_ref().unwrap_or(&first),
                self.pool.diagram_mut(first_child),
                &mut second_diagram,
            );
            second_diagram.sort_points();
            self.pool.restore(second_child, second_diagram);
            self.pool.restore(first_parent, first);
            if let Some(second) = second {
                self.pool.restore(second_parent, second);
            }
            self.pool.diagram_mut(first_child).sort_points();

            let first_fitness = ctx.evaluate(self.pool.diagram(first_child));
            let winner = if ctx.can_continue() {
                let second_fitness = ctx.evaluate(self.pool.diagram(second_child));
                if first_fitness < second_fitness {
                    self.pool.release(second_child);
                    Member {
                        slot: first_child,
                        fitness: first_fitness,
                    }
                } else {
                    self.pool.release(first_child);
                    Member {
                        slot: second_child,
                        fitness: second_fitness,
                    }
                }
            } else {
                self.pool.release(second_child);
                Member {
                    slot: first_child,
                    fitness: first_fitness,
                }
            };

            self.observe(winner);
            self.members.push(winner);
        }
    }

    /// Add up to `count` mutants, each a single tweak of a distinct survivor.
    /// The parents stay in the population unchanged.
    pub(crate) fn mutate(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        survivors: usize,
        count: usize,
        tweak: &TweakConfig,
    ) {
        let point_count = self.pool.point_count();
        for index in rng.sample_indices(survivors, count) {
            if !ctx.can_continue() {
                return;
            }
            let parent = self.members[index].slot;
            let slot = self.pool.acquire();

            let source = self.pool.checkout(parent);
            let target = rng.index(point_count);
            rng.tweak_into(&source, self.pool.diagram_mut(slot), target, tweak);
            self.pool.restore(parent, source);

            let fitness = ctx.evaluate(self.pool.diagram(slot));
            let mutant = Member { slot, fitness };
            self.observe(mutant);
            self.members.push(mutant);
        }
    }

    /// Apply up to `iterations` climbing steps to every member.
    pub(crate) fn refine(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        climber: &mut Climber,
        iterations: usize,
    ) {
        let mut scratch = self.pool.acquire();
        for i in 0..self.members.len() {
            climber.reset();
            let mut member = self.members[i];
            for _ in 0..iterations {
                if !ctx.can_continue() {
                    break;
                }
                climber.step(ctx, rng, &mut self.pool, &mut member, &mut scratch);
            }
            self.members[i] = member;
            self.observe(member);
        }
        self.pool.release(scratch);
    }

    fn observe(&mut self, member: Member) {
        if member.fitness < self.best.fitness {
            self.best.diagram.copy_from(self.pool.diagram(member.slot));
            self.best.fitness = member.fitness;
        }
    }

    pub(crate) fn finish_generation(&mut self) {
        self.generations += 1;
    }

    pub(crate) fn into_outcome(self) -> SearchOutcome {
        SearchOutcome {
            best: self.best,
            generations: Some(self.generations),
        }
    }
}

/// Tournament elimination, segment crossover and tweak mutation.
pub struct EvolutionaryAlgorithm {
    config: EvolutionConfig,
}

impl EvolutionaryAlgorithm {
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }
}

impl SearchStrategy for EvolutionaryAlgorithm {
    fn name(&self) -> &'static str {
        "evolutionary"
    }

    fn search(
        &mut self,
        ctx: &mut SearchContext<'_>,
        rng: &mut DiagramRng,
        point_count: usize,
    ) -> SearchOutcome {
        let config = &self.config;
        let mut population =
            Population::initialize(ctx, rng, config.population_size, point_count);

        while ctx.can_continue() {
            population.select(rng, config.selection_size());
            let survivors = population.len();
            population.breed(ctx, rng, survivors, config.breeding_size());
            population.mutate(ctx, rng, survivors, config.mutation_size(), &config.tweak);
            population.finish_generation();
        }

        population.into_outcome()
    }
}
