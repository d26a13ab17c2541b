#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for epiwalk.

mod population;

use epiwalk_core::{Agent, AgentId, Command, ConfigError, Event, Lattice, SimConfig, Tick};
use glam::DVec2;
use thiserror::Error;
use tracing::debug;

/// Represents the authoritative population, lattice and clock.
#[derive(Debug)]
pub struct World {
    lattice: Lattice,
    step_length: f64,
    agents: Vec<Agent>,
    tick: Tick,
    infected: usize,
    ever_infected: usize,
    immune: usize,
}

impl World {
    /// Creates the initial population described by the configuration.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let agents = population::generate(config);
        let world = Self::assemble(config.lattice(), config.step_length, agents);
        debug!(
            population = world.agents.len(),
            infected = world.infected,
            seed = config.seed,
            "population initialised"
        );
        Ok(world)
    }

    /// Creates a world from explicit agents, typically for scripted scenarios.
    ///
    /// Identifiers must be dense and in order, and every agent must start
    /// inside the lattice.
    pub fn from_agents(
        lattice: Lattice,
        step_length: f64,
        agents: Vec<Agent>,
    ) -> Result<Self, WorldError> {
        for (index, agent) in agents.iter().enumerate() {
            if agent.id().index() != index {
                return Err(WorldError::SparseIdentifiers {
                    expected: index,
                    found: agent.id(),
                });
            }
            if !lattice.contains(agent.position()) {
                return Err(WorldError::OutOfBounds {
                    agent: agent.id(),
                    position: agent.position(),
                });
            }
        }

        Ok(Self::assemble(lattice, step_length, agents))
    }

    fn assemble(lattice: Lattice, step_length: f64, agents: Vec<Agent>) -> Self {
        let infected = agents.iter().filter(|agent| agent.is_infected()).count();
        let ever_infected = agents.iter().filter(|agent| agent.was_ever_infected()).count();
        let immune = agents.iter().filter(|agent| agent.is_immune()).count();
        Self {
            lattice,
            step_length,
            agents,
            tick: Tick::ZERO,
            infected,
            ever_infected,
            immune,
        }
    }

    fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent, WorldError> {
        self.agents
            .get_mut(id.index())
            .ok_or(WorldError::UnknownAgent(id))
    }

    fn agent(&self, id: AgentId) -> Result<&Agent, WorldError> {
        self.agents.get(id.index()).ok_or(WorldError::UnknownAgent(id))
    }
}

/// Invariant violations detected while applying a command.
///
/// These indicate a faulty system rather than a recoverable condition; the
/// driver aborts the run when one surfaces.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WorldError {
    /// No agent carries the identifier.
    #[error("unknown agent {}", .0.get())]
    UnknownAgent(AgentId),
    /// Agents must be listed with dense identifiers in ascending order.
    #[error("expected agent {expected}, found agent {}", .found.get())]
    SparseIdentifiers {
        /// Identifier expected at this position.
        expected: usize,
        /// Identifier actually present.
        found: AgentId,
    },
    /// An agent position left the lattice.
    #[error("agent {} is outside the lattice at ({}, {})", .agent.get(), .position.x, .position.y)]
    OutOfBounds {
        /// Offending agent.
        agent: AgentId,
        /// Position outside the bounds.
        position: DVec2,
    },
    /// Immune agents cannot be infected.
    #[error("agent {} is immune and cannot be infected", .0.get())]
    ImmuneTarget(AgentId),
    /// An agent transitions to infected at most once.
    #[error("agent {} is already infected", .0.get())]
    AlreadyInfected(AgentId),
    /// Only infected agents transmit or recover.
    #[error("agent {} is not infected", .0.get())]
    NotInfected(AgentId),
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    match command {
        Command::Tick => {
            world.tick = world.tick.next();
            out_events.push(Event::TimeAdvanced { tick: world.tick });
        }
        Command::StepAgent { agent, direction } => {
            let lattice = world.lattice;
            let step_length = world.step_length;
            let entry = world.agent_mut(agent)?;
            let from = entry.position();
            let to = entry.step(direction, step_length, &lattice);
            debug_assert!(lattice.contains(to), "agent stepped outside the lattice");
            if !lattice.contains(to) {
                return Err(WorldError::OutOfBounds {
                    agent,
                    position: to,
                });
            }
            out_events.push(Event::AgentMoved { agent, from, to });
        }
        Command::Infect { agent, source } => {
            if !world.agent(source)?.is_infected() {
                return Err(WorldError::NotInfected(source));
            }
            let target = world.agent_mut(agent)?;
            if target.is_infected() {
                return Err(WorldError::AlreadyInfected(agent));
            }
            if target.is_immune() {
                return Err(WorldError::ImmuneTarget(agent));
            }
            let first_infection = !target.was_ever_infected();
            target.mark_infected();

            world.infected += 1;
            if first_infection {
                world.ever_infected += 1;
            }
            out_events.push(Event::AgentInfected {
                agent,
                source,
                tick: world.tick,
            });
        }
        Command::ScheduleRecovery { agent, recover_at } => {
            let entry = world.agent_mut(agent)?;
            if !entry.is_infected() {
                return Err(WorldError::NotInfected(agent));
            }
            let was_immune = entry.is_immune();
            entry.schedule_recovery(recover_at);
            if !was_immune {
                world.immune += 1;
            }
            out_events.push(Event::RecoveryScheduled { agent, recover_at });
        }
        Command::ResolveRecovery { agent, immune } => {
            let entry = world.agent_mut(agent)?;
            if !entry.is_infected() {
                return Err(WorldError::NotInfected(agent));
            }
            let was_immune = entry.is_immune();
            entry.resolve(immune);

            world.infected -= 1;
            match (was_immune, immune) {
                (true, false) => world.immune -= 1,
                (false, true) => world.immune += 1,
                _ => {}
            }
            out_events.push(Event::AgentRecovered { agent, immune });
        }
        Command::ClearOnsetFlags => {
            for agent in &mut world.agents {
                agent.clear_onset();
            }
            out_events.push(Event::OnsetFlagsCleared);
        }
    }

    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use epiwalk_core::{Census, Lattice, PopulationView, Tick};
    use glam::DVec2;

    use super::World;

    /// Tick most recently started; zero before the first tick.
    #[must_use]
    pub fn tick(world: &World) -> Tick {
        world.tick
    }

    /// Provides read-only access to the lattice bounds.
    #[must_use]
    pub fn lattice(world: &World) -> Lattice {
        world.lattice
    }

    /// Captures a read-only view of every agent.
    #[must_use]
    pub fn population(world: &World) -> PopulationView<'_> {
        PopulationView::new(&world.agents)
    }

    /// Aggregate counts maintained incrementally by `apply`.
    #[must_use]
    pub fn census(world: &World) -> Census {
        Census {
            population: world.agents.len(),
            infected: world.infected,
            ever_infected: world.ever_infected,
            immune: world.immune,
        }
    }

    /// Fills `out` with every agent position, indexed by agent id.
    pub fn positions(world: &World, out: &mut Vec<DVec2>) {
        out.clear();
        out.extend(world.agents.iter().map(|agent| agent.position()));
    }
}
