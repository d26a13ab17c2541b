#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Random-walk movement system.
//!
//! On every tick each agent draws one of the nine Moore directions uniformly
//! at random; the world applies the step and reflects any axis that would
//! leave the lattice.

use epiwalk_core::{seeded_rng, Command, Direction, Event, PopulationView, RngStream, SimRng};
use rand::Rng;

/// Pure system that reacts to clock events and emits step commands.
#[derive(Debug)]
pub struct Movement {
    rng: SimRng,
}

impl Movement {
    /// Creates the system with its own stream derived from the run seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: seeded_rng(seed, RngStream::Movement),
        }
    }

    /// Consumes world events and emits one step per agent for every tick that
    /// advanced, drawing directions in ascending agent order.
    pub fn handle(
        &mut self,
        events: &[Event],
        population: PopulationView<'_>,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            if let Event::TimeAdvanced { .. } = event {
                self.plan(population, out);
            }
        }
    }

    fn plan(&mut self, population: PopulationView<'_>, out: &mut Vec<Command>) {
        out.reserve(population.len());
        for agent in population.iter() {
            out.push(Command::StepAgent {
                agent: agent.id(),
                direction: self.draw(),
            });
        }
    }

    fn draw(&mut self) -> Direction {
        Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())]
    }
}
