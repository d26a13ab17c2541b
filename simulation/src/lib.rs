#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick driver that wires the world, the spatial index and every system into
//! the fixed per-tick phase order.
//!
//! Each tick advances the clock, moves every agent, rebuilds the index from
//! the new positions, runs transmission, then recovery, and finally samples
//! metrics. Termination is evaluated between ticks only.

use std::error::Error as StdError;

use epiwalk_core::{
    Census, Command, ConfigError, Event, Lattice, PopulationView, SimConfig, Tick,
};
use epiwalk_spatial::{build_index, IndexError, SpatialIndex};
use epiwalk_system_analytics::{Analytics, MetricsSeries};
use epiwalk_system_movement::Movement;
use epiwalk_system_recovery::{Recovery, RecoveryPolicy};
use epiwalk_system_transmission::Transmission;
use epiwalk_world::{self as world, query, World, WorldError};
use glam::DVec2;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Error type observers may return to abort a run.
pub type ObserverError = Box<dyn StdError + Send + Sync + 'static>;

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The configuration was rejected before the run started.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A system emitted a command that violates a world invariant.
    #[error("world invariant violated: {0}")]
    World(#[from] WorldError),
    /// The spatial index could not be created or rebuilt.
    #[error("spatial index failure: {0}")]
    Index(#[from] IndexError),
    /// A tick observer requested the run to stop.
    #[error("tick observer failed")]
    Observer(#[source] ObserverError),
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The infected fraction reached the configured upper bound.
    ThresholdReached {
        /// Tick after which the bound held.
        tick: Tick,
    },
    /// No infected agents remain, so the bound can no longer be reached.
    Extinguished {
        /// Tick after which the last infection resolved.
        tick: Tick,
    },
    /// The configured tick limit was exhausted first.
    TickLimitReached {
        /// Final processed tick.
        tick: Tick,
    },
}

impl RunOutcome {
    /// Tick at which the run stopped.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        match self {
            Self::ThresholdReached { tick }
            | Self::Extinguished { tick }
            | Self::TickLimitReached { tick } => *tick,
        }
    }
}

/// Changes produced by a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Tick that was processed.
    pub tick: Tick,
    /// Counts after the tick completed.
    pub census: Census,
    /// Agents infected during the tick.
    pub new_infections: usize,
    /// Infection episodes that ended during the tick.
    pub recoveries: usize,
}

/// Result of a completed run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    /// Why the run stopped.
    pub outcome: RunOutcome,
    /// Final counts.
    pub census: Census,
    /// Sampled metrics including the closing sample.
    pub metrics: MetricsSeries,
}

/// Snapshot handed to observers after the initial state and every tick.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Tick that just completed; zero for the initial state.
    pub tick: Tick,
    /// Counts after the tick.
    pub census: Census,
    /// Bounds of the lattice.
    pub lattice: Lattice,
    /// Read-only view over every agent.
    pub population: PopulationView<'a>,
}

/// Observes a run without influencing it.
pub trait TickObserver {
    /// Receives the state after each tick. Returning an error aborts the run.
    fn on_tick(&mut self, frame: &Frame<'_>) -> Result<(), ObserverError>;
}

struct Silent;

impl TickObserver for Silent {
    fn on_tick(&mut self, _frame: &Frame<'_>) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Owns every piece of run state and advances it one tick at a time.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: World,
    index: Box<dyn SpatialIndex>,
    movement: Movement,
    transmission: Transmission,
    recovery: Recovery,
    analytics: Analytics,
    positions: Vec<DVec2>,
    commands: Vec<Command>,
    events: Vec<Event>,
}

impl Simulation {
    /// Validates the configuration, seeds the population and records the
    /// tick-zero metrics sample.
    pub fn new(config: SimConfig) -> Result<Self, SimulationError> {
        let world = World::new(&config)?;
        Self::with_world(config, world)
    }

    /// Runs a scripted population under the rules of `config`.
    ///
    /// The world's lattice and step length take precedence over the matching
    /// configuration fields.
    pub fn with_world(config: SimConfig, world: World) -> Result<Self, SimulationError> {
        config.validate()?;
        let cell_size = if config.infectable_distance > 0.0 {
            config.infectable_distance
        } else {
            1.0
        };
        let index = build_index(config.index, cell_size)?;
        let analytics = Analytics::new(config.sample_interval, query::census(&world));

        info!(
            population = query::population(&world).len(),
            seed = config.seed,
            index = %config.index,
            "simulation ready"
        );

        Ok(Self {
            movement: Movement::new(config.seed),
            transmission: Transmission::new(),
            recovery: Recovery::new(config.seed, RecoveryPolicy::from_config(&config)),
            analytics,
            index,
            world,
            config,
            positions: Vec::new(),
            commands: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Last completed tick.
    #[must_use]
    pub fn tick(&self) -> Tick {
        query::tick(&self.world)
    }

    /// Current counts.
    #[must_use]
    pub fn census(&self) -> Census {
        query::census(&self.world)
    }

    /// Metrics sampled so far.
    #[must_use]
    pub fn metrics(&self) -> &MetricsSeries {
        self.analytics.series()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            tick: self.tick(),
            census: self.census(),
            lattice: query::lattice(&self.world),
            population: query::population(&self.world),
        }
    }

    /// Reports whether the run should stop before the next tick.
    #[must_use]
    pub fn termination(&self) -> Option<RunOutcome> {
        let census = self.census();
        let tick = self.tick();
        if census.infected_fraction() >= self.config.infection_upper_bound {
            Some(RunOutcome::ThresholdReached { tick })
        } else if census.infected == 0 {
            Some(RunOutcome::Extinguished { tick })
        } else if tick.get() >= self.config.max_ticks {
            Some(RunOutcome::TickLimitReached { tick })
        } else {
            None
        }
    }

    /// Processes exactly one tick in the fixed phase order.
    pub fn step(&mut self) -> Result<TickReport, SimulationError> {
        self.events.clear();

        self.commands.push(Command::Tick);
        execute(&mut self.world, &mut self.commands, &mut self.events)?;
        let clock_events = self.events.len();

        self.movement.handle(
            &self.events[..clock_events],
            query::population(&self.world),
            &mut self.commands,
        );
        execute(&mut self.world, &mut self.commands, &mut self.events)?;

        query::positions(&self.world, &mut self.positions);
        self.index.build(&self.positions)?;

        self.transmission.handle(
            query::population(&self.world),
            self.index.as_ref(),
            self.config.infectable_distance,
            &mut self.commands,
        );
        execute(&mut self.world, &mut self.commands, &mut self.events)?;

        self.recovery.handle(
            &self.events[..clock_events],
            query::population(&self.world),
            &mut self.commands,
        );
        execute(&mut self.world, &mut self.commands, &mut self.events)?;

        let census = self.census();
        let _ = self.analytics.handle(&self.events, census);

        let (new_infections, recoveries) =
            self.events
                .iter()
                .fold((0, 0), |(infected, recovered), event| match event {
                    Event::AgentInfected { .. } => (infected + 1, recovered),
                    Event::AgentRecovered { .. } => (infected, recovered + 1),
                    _ => (infected, recovered),
                });

        let report = TickReport {
            tick: self.tick(),
            census,
            new_infections,
            recoveries,
        };
        trace!(
            tick = report.tick.get(),
            infected = census.infected,
            new_infections,
            recoveries,
            "tick processed"
        );
        Ok(report)
    }

    /// Runs until a termination condition holds.
    pub fn run(self) -> Result<RunSummary, SimulationError> {
        self.run_with(&mut Silent)
    }

    /// Runs until a termination condition holds, notifying `observer` with the
    /// initial state and after every tick.
    pub fn run_with(
        mut self,
        observer: &mut dyn TickObserver,
    ) -> Result<RunSummary, SimulationError> {
        observer
            .on_tick(&self.frame())
            .map_err(SimulationError::Observer)?;

        let outcome = loop {
            if let Some(outcome) = self.termination() {
                break outcome;
            }
            let report = self.step()?;
            if report.new_infections > 0 || report.recoveries > 0 {
                debug!(
                    tick = report.tick.get(),
                    infected = report.census.infected,
                    new_infections = report.new_infections,
                    recoveries = report.recoveries,
                    "epidemic progressed"
                );
            }
            observer
                .on_tick(&self.frame())
                .map_err(SimulationError::Observer)?;
        };

        Ok(self.finish(outcome))
    }

    fn finish(self, outcome: RunOutcome) -> RunSummary {
        let census = self.census();
        match outcome {
            RunOutcome::TickLimitReached { tick } => warn!(
                tick = tick.get(),
                infected = census.infected,
                "tick limit reached before the infection bound"
            ),
            _ => info!(
                ?outcome,
                infected = census.infected,
                recovered = census.recovered(),
                "run finished"
            ),
        }

        RunSummary {
            outcome,
            census,
            metrics: self.analytics.finish(census),
        }
    }
}

fn execute(
    world: &mut World,
    commands: &mut Vec<Command>,
    events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    for command in commands.drain(..) {
        world::apply(world, command, events)?;
    }
    Ok(())
}
