#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-hop transmission system.
//!
//! Sources are the agents infected when the phase starts. Every susceptible
//! agent within the infectable distance of a source is claimed at most once
//! per tick; agents claimed during the phase never act as sources until the
//! following tick.

use epiwalk_core::{Command, PopulationView};
use epiwalk_spatial::SpatialIndex;

/// Pure system that turns neighbourhood queries into infection commands.
#[derive(Debug, Default)]
pub struct Transmission {
    claimed: Vec<bool>,
    neighbours: Vec<usize>,
}

impl Transmission {
    /// Creates the system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one [`Command::Infect`] per agent that becomes infected this tick.
    ///
    /// `index` must have been rebuilt from the post-movement positions of
    /// `population`. Sources are visited in ascending id order and their
    /// neighbours in ascending id order, so the attributed source of each
    /// infection does not depend on the index implementation.
    pub fn handle(
        &mut self,
        population: PopulationView<'_>,
        index: &dyn SpatialIndex,
        radius: f64,
        out: &mut Vec<Command>,
    ) {
        debug_assert_eq!(index.len(), population.len(), "stale spatial index");
        self.claimed.clear();
        self.claimed.resize(population.len(), false);

        for source in population.iter().filter(|agent| agent.is_infected()) {
            index.query_radius(source.position(), radius, &mut self.neighbours);
            self.neighbours.sort_unstable();

            for &neighbour in &self.neighbours {
                let Some(target) = population.agents().get(neighbour) else {
                    continue;
                };
                if !target.is_susceptible() || self.claimed[neighbour] {
                    continue;
                }
                self.claimed[neighbour] = true;
                out.push(Command::Infect {
                    agent: target.id(),
                    source: source.id(),
                });
            }
        }
    }
}
