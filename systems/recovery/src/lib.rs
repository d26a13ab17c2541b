#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Recovery system that schedules and resolves infection episodes.
//!
//! Each infection receives a single onset roll on the tick it starts. A
//! successful roll makes the agent immune and fixes the tick at which the
//! episode resolves; agents whose roll fails stay infectious for the rest of
//! the run. When the timer elapses the agent stops being infectious and keeps
//! its immunity unless it can relapse and the run does not retain immunity.

use epiwalk_core::{
    seeded_rng, Agent, Command, Event, PopulationView, RngStream, SimConfig, SimRng, Tick,
};
use rand::Rng;

/// Parameters that govern recovery.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecoveryPolicy {
    /// Ticks between scheduling a recovery and resolving it.
    pub duration: u64,
    /// Keeps every recovered agent immune.
    pub retain_immunity: bool,
    /// Chance that a new infection schedules its recovery.
    pub onset_probability: f64,
}

impl RecoveryPolicy {
    /// Extracts the recovery parameters from a run configuration.
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            duration: config.recovery_duration,
            retain_immunity: config.retain_immunity,
            onset_probability: config.immune_onset_probability,
        }
    }

    fn keeps_immunity(&self, agent: &Agent) -> bool {
        self.retain_immunity || !agent.can_relapse()
    }
}

/// Pure system that reacts to clock events and emits recovery commands.
#[derive(Debug)]
pub struct Recovery {
    policy: RecoveryPolicy,
    rng: SimRng,
}

impl Recovery {
    /// Creates the system with its own stream derived from the run seed.
    #[must_use]
    pub fn new(seed: u64, policy: RecoveryPolicy) -> Self {
        Self {
            policy,
            rng: seeded_rng(seed, RngStream::Recovery),
        }
    }

    /// Consumes the events of the current tick and emits recovery commands.
    ///
    /// `population` must reflect the state after the transmission phase. The
    /// batch for each tick ends with [`Command::ClearOnsetFlags`].
    pub fn handle(
        &mut self,
        events: &[Event],
        population: PopulationView<'_>,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            if let Event::TimeAdvanced { tick } = event {
                self.process(*tick, population, out);
            }
        }
    }

    fn process(&mut self, tick: Tick, population: PopulationView<'_>, out: &mut Vec<Command>) {
        for agent in population.iter().filter(|agent| agent.is_infected()) {
            let mut recover_at = agent.recover_at().filter(|_| agent.is_immune());

            if agent.is_newly_infected() && recover_at.is_none() && self.roll_onset() {
                let scheduled = tick.after(self.policy.duration);
                out.push(Command::ScheduleRecovery {
                    agent: agent.id(),
                    recover_at: scheduled,
                });
                recover_at = Some(scheduled);
            }

            if recover_at == Some(tick) {
                out.push(Command::ResolveRecovery {
                    agent: agent.id(),
                    immune: self.policy.keeps_immunity(agent),
                });
            }
        }

        out.push(Command::ClearOnsetFlags);
    }

    fn roll_onset(&mut self) -> bool {
        self.rng.gen::<f64>() < self.policy.onset_probability
    }
}
