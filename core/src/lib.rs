#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the epiwalk epidemic engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Systems read a [`PopulationView`]
//! and respond with [`Command`] batches describing desired mutations, the world
//! executes those commands via its `apply` entry point, and then broadcasts
//! [`Event`] values describing what actually changed. Every tick runs the same
//! fixed phase order: movement, index rebuild, transmission, recovery, metrics.

mod config;

pub use config::{ConfigError, IndexKind, ParseIndexKindError, SimConfig};

use glam::DVec2;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use rand_chacha::ChaCha8Rng as SimRng;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the simulation clock by a single tick.
    Tick,
    /// Requests that an agent take one random-walk step in the given direction.
    StepAgent {
        /// Agent performing the step.
        agent: AgentId,
        /// Unscaled direction drawn for this step.
        direction: Direction,
    },
    /// Marks a susceptible agent as newly infected.
    Infect {
        /// Agent being infected.
        agent: AgentId,
        /// Infected agent whose neighbourhood contained the target.
        source: AgentId,
    },
    /// Starts the recovery timer for an infected agent and makes it immune.
    ScheduleRecovery {
        /// Agent whose timer starts.
        agent: AgentId,
        /// Tick at which the episode resolves.
        recover_at: Tick,
    },
    /// Ends an infection episode whose timer elapsed.
    ResolveRecovery {
        /// Agent whose episode ends.
        agent: AgentId,
        /// Whether the agent keeps its immunity after recovering.
        immune: bool,
    },
    /// Clears the one-tick onset flag on every agent.
    ClearOnsetFlags,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Tick that is now being processed.
        tick: Tick,
    },
    /// Confirms that an agent moved.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Position before the step.
        from: DVec2,
        /// Position after the step, always inside the lattice.
        to: DVec2,
    },
    /// Confirms that an agent became infected.
    AgentInfected {
        /// Newly infected agent.
        agent: AgentId,
        /// Agent that transmitted the infection.
        source: AgentId,
        /// Tick of infection onset.
        tick: Tick,
    },
    /// Confirms that an agent's recovery timer started.
    RecoveryScheduled {
        /// Agent whose timer started.
        agent: AgentId,
        /// Tick at which the episode resolves.
        recover_at: Tick,
    },
    /// Confirms that an agent stopped being infectious.
    AgentRecovered {
        /// Agent that recovered.
        agent: AgentId,
        /// Whether the agent remains shielded from reinfection.
        immune: bool,
    },
    /// Confirms that all onset flags were cleared.
    OnsetFlagsCleared,
}

/// Unique identifier assigned to an agent.
///
/// Identifiers are dense, so the numeric value doubles as the agent's index
/// into any per-agent buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the agent within dense per-agent buffers.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Discrete simulation time.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tick(u64);

impl Tick {
    /// The initial state before any tick was processed.
    pub const ZERO: Tick = Tick(0);

    /// Creates a tick from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric tick value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// The tick immediately following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The tick that lies `duration` ticks after this one.
    #[must_use]
    pub const fn after(self, duration: u64) -> Self {
        Self(self.0.saturating_add(duration))
    }
}

/// The nine random-walk directions, including standing still.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Null displacement.
    Stay,
    /// Movement toward increasing y.
    North,
    /// Diagonal toward increasing x and y.
    NorthEast,
    /// Movement toward increasing x.
    East,
    /// Diagonal toward increasing x and decreasing y.
    SouthEast,
    /// Movement toward decreasing y.
    South,
    /// Diagonal toward decreasing x and y.
    SouthWest,
    /// Movement toward decreasing x.
    West,
    /// Diagonal toward decreasing x and increasing y.
    NorthWest,
}

impl Direction {
    /// Every direction, in a fixed order used for uniform sampling.
    pub const ALL: [Direction; 9] = [
        Direction::Stay,
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Unscaled displacement; each component is -1, 0 or 1.
    #[must_use]
    pub const fn offset(self) -> DVec2 {
        let (dx, dy) = match self {
            Self::Stay => (0.0, 0.0),
            Self::North => (0.0, 1.0),
            Self::NorthEast => (1.0, 1.0),
            Self::East => (1.0, 0.0),
            Self::SouthEast => (1.0, -1.0),
            Self::South => (0.0, -1.0),
            Self::SouthWest => (-1.0, -1.0),
            Self::West => (-1.0, 0.0),
            Self::NorthWest => (-1.0, 1.0),
        };
        DVec2::new(dx, dy)
    }
}

/// Bounded rectangle `[0, width) × [0, height)` the population walks on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    width: f64,
    height: f64,
}

impl Lattice {
    /// Creates a lattice with the provided dimensions.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Horizontal extent.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Vertical extent.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Midpoint of the lattice, where the index case is placed.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Reports whether the point lies inside the half-open bounds.
    #[must_use]
    pub fn contains(&self, point: DVec2) -> bool {
        (0.0..self.width).contains(&point.x) && (0.0..self.height).contains(&point.y)
    }
}

/// Per-individual state.
///
/// Only the world mutates agents; systems observe them through a
/// [`PopulationView`] and request changes with [`Command`] values.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    id: AgentId,
    position: DVec2,
    infected: bool,
    immune: bool,
    newly_infected: bool,
    ever_infected: bool,
    recover_at: Option<Tick>,
    can_relapse: bool,
}

impl Agent {
    /// Creates a susceptible agent.
    #[must_use]
    pub const fn susceptible(id: AgentId, position: DVec2, can_relapse: bool) -> Self {
        Self {
            id,
            position,
            infected: false,
            immune: false,
            newly_infected: false,
            ever_infected: false,
            recover_at: None,
            can_relapse,
        }
    }

    /// Creates the index case, infected from the start of the run.
    ///
    /// The index case carries the onset flag so it receives the same single
    /// recovery-onset roll as every later infection.
    #[must_use]
    pub const fn index_case(id: AgentId, position: DVec2, can_relapse: bool) -> Self {
        Self {
            id,
            position,
            infected: true,
            immune: false,
            newly_infected: true,
            ever_infected: true,
            recover_at: None,
            can_relapse,
        }
    }

    /// Stable identifier of the agent.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Current coordinates.
    #[must_use]
    pub const fn position(&self) -> DVec2 {
        self.position
    }

    /// Whether the agent is currently contagious.
    #[must_use]
    pub const fn is_infected(&self) -> bool {
        self.infected
    }

    /// Whether the agent is shielded from reinfection.
    #[must_use]
    pub const fn is_immune(&self) -> bool {
        self.immune
    }

    /// Whether the agent became infected during the current tick.
    #[must_use]
    pub const fn is_newly_infected(&self) -> bool {
        self.newly_infected
    }

    /// Whether the agent has been infected at least once.
    #[must_use]
    pub const fn was_ever_infected(&self) -> bool {
        self.ever_infected
    }

    /// Tick at which the scheduled recovery resolves, if any.
    #[must_use]
    pub const fn recover_at(&self) -> Option<Tick> {
        self.recover_at
    }

    /// Whether the agent may lose immunity after recovering.
    #[must_use]
    pub const fn can_relapse(&self) -> bool {
        self.can_relapse
    }

    /// Whether transmission may target this agent.
    #[must_use]
    pub const fn is_susceptible(&self) -> bool {
        !self.infected && !self.immune
    }

    /// Whether the agent was infected before and is no longer contagious.
    #[must_use]
    pub const fn is_recovered(&self) -> bool {
        !self.infected && self.ever_infected
    }

    /// Takes one step, reflecting any axis that would leave the lattice.
    ///
    /// Returns the committed position.
    pub fn step(&mut self, direction: Direction, step_length: f64, lattice: &Lattice) -> DVec2 {
        let delta = direction.offset() * step_length;
        let x = reflect_axis(self.position.x, delta.x, lattice.width());
        let y = reflect_axis(self.position.y, delta.y, lattice.height());
        self.position = DVec2::new(x, y);
        self.position
    }

    /// Marks the agent as infected during the current tick.
    pub fn mark_infected(&mut self) {
        debug_assert!(self.is_susceptible(), "only susceptible agents may be infected");
        self.infected = true;
        self.newly_infected = true;
        self.ever_infected = true;
    }

    /// Starts the recovery timer; the agent is immune from now on.
    pub fn schedule_recovery(&mut self, recover_at: Tick) {
        self.immune = true;
        self.recover_at = Some(recover_at);
    }

    /// Ends the infection episode.
    pub fn resolve(&mut self, immune: bool) {
        self.infected = false;
        self.immune = immune;
        self.recover_at = None;
    }

    /// Clears the one-tick onset flag.
    pub fn clear_onset(&mut self) {
        self.newly_infected = false;
    }
}

// Rounding can leave the reflected coordinate a hair outside the bounds; the
// axis then stays where it was.
fn reflect_axis(coordinate: f64, delta: f64, extent: f64) -> f64 {
    let forward = coordinate + delta;
    if (0.0..extent).contains(&forward) {
        return forward;
    }

    let reflected = coordinate - delta;
    if (0.0..extent).contains(&reflected) {
        reflected
    } else {
        coordinate
    }
}

/// Read-only view over the agent arena in ascending id order.
#[derive(Clone, Copy, Debug)]
pub struct PopulationView<'a> {
    agents: &'a [Agent],
}

impl<'a> PopulationView<'a> {
    /// Captures a view backed by the provided agents.
    #[must_use]
    pub const fn new(agents: &'a [Agent]) -> Self {
        Self { agents }
    }

    /// Iterator over every agent in id order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Agent> + 'a {
        self.agents.iter()
    }

    /// Looks up an agent by identifier.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&'a Agent> {
        self.agents.get(id.index())
    }

    /// Number of agents in the population.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the population is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Underlying agent slice.
    #[must_use]
    pub const fn agents(&self) -> &'a [Agent] {
        self.agents
    }
}

/// Aggregate health counts at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Census {
    /// Total number of agents.
    pub population: usize,
    /// Agents currently infected.
    pub infected: usize,
    /// Agents infected at least once, including those still infected.
    pub ever_infected: usize,
    /// Agents currently flagged immune.
    pub immune: usize,
}

impl Census {
    /// Tallies the provided population.
    #[must_use]
    pub fn of(population: PopulationView<'_>) -> Self {
        population.iter().fold(
            Self {
                population: population.len(),
                ..Self::default()
            },
            |mut census, agent| {
                census.infected += usize::from(agent.is_infected());
                census.ever_infected += usize::from(agent.was_ever_infected());
                census.immune += usize::from(agent.is_immune());
                census
            },
        )
    }

    /// Agents that were infected and no longer are.
    #[must_use]
    pub const fn recovered(&self) -> usize {
        self.ever_infected.saturating_sub(self.infected)
    }

    /// Share of the population currently infected.
    #[must_use]
    pub fn infected_fraction(&self) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            self.infected as f64 / self.population as f64
        }
    }
}

/// One entry of the recorded metrics series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricsSample {
    /// Tick at which the sample was taken.
    pub tick: Tick,
    /// Agents infected at the sample tick.
    pub active_cases: usize,
    /// Agents that were infected and have since recovered.
    pub cumulative_recovered: usize,
    /// Infections recorded since the previous sample.
    pub new_infections: usize,
    /// Agents infected at least once so far.
    pub ever_infected: usize,
}

/// Independent random streams derived from the single run seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RngStream {
    /// Initial placement and relapse eligibility.
    Population,
    /// Direction draws.
    Movement,
    /// Recovery-onset rolls.
    Recovery,
}

impl RngStream {
    const fn id(self) -> u64 {
        match self {
            Self::Population => 0,
            Self::Movement => 1,
            Self::Recovery => 2,
        }
    }
}

/// Creates the generator for one consumer of randomness.
#[must_use]
pub fn seeded_rng(seed: u64, stream: RngStream) -> SimRng {
    let mut rng = SimRng::seed_from_u64(seed);
    rng.set_stream(stream.id());
    rng
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    const LATTICE: Lattice = Lattice::new(10.0, 10.0);

    #[test]
    fn step_moves_freely_inside_bounds() {
        let mut agent = Agent::susceptible(AgentId::new(0), DVec2::new(5.0, 5.0), false);
        let position = agent.step(Direction::NorthEast, 0.5, &LATTICE);
        assert_eq!(position, DVec2::new(5.5, 5.5));
    }

    #[test]
    fn step_bounces_off_upper_edge() {
        let mut agent = Agent::susceptible(AgentId::new(0), DVec2::new(9.8, 3.0), false);
        let position = agent.step(Direction::East, 0.5, &LATTICE);
        assert!((position.x - 9.3).abs() < 1e-12);
        assert_eq!(position.y, 3.0);
    }

    #[test]
    fn step_bounces_off_lower_edge_on_each_axis() {
        let mut agent = Agent::susceptible(AgentId::new(0), DVec2::new(0.1, 0.2), false);
        let position = agent.step(Direction::SouthWest, 0.5, &LATTICE);
        assert!((position.x - 0.6).abs() < 1e-12);
        assert!((position.y - 0.7).abs() < 1e-12);
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let mut agent = Agent::susceptible(AgentId::new(0), DVec2::new(9.5, 1.0), false);
        let position = agent.step(Direction::East, 0.5, &LATTICE);
        assert_eq!(position.x, 9.0);
        assert!(LATTICE.contains(position));
    }

    #[test]
    fn stay_and_zero_length_leave_position_untouched() {
        let start = DVec2::new(2.0, 7.0);
        let mut agent = Agent::susceptible(AgentId::new(0), start, false);
        assert_eq!(agent.step(Direction::Stay, 1.0, &LATTICE), start);
        assert_eq!(agent.step(Direction::NorthWest, 0.0, &LATTICE), start);
    }

    #[test]
    fn directions_cover_the_moore_neighbourhood() {
        let mut offsets: Vec<(i32, i32)> = Direction::ALL
            .iter()
            .map(|direction| {
                let offset = direction.offset();
                (offset.x as i32, offset.y as i32)
            })
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), 9);
    }

    #[test]
    fn infection_lifecycle_updates_flags() {
        let mut agent = Agent::susceptible(AgentId::new(3), DVec2::ZERO, true);
        assert!(agent.is_susceptible());

        agent.mark_infected();
        assert!(agent.is_infected() && agent.is_newly_infected() && agent.was_ever_infected());

        agent.schedule_recovery(Tick::new(7));
        assert!(agent.is_immune());
        assert_eq!(agent.recover_at(), Some(Tick::new(7)));

        agent.clear_onset();
        agent.resolve(false);
        assert!(agent.is_susceptible());
        assert!(agent.is_recovered());
        assert_eq!(agent.recover_at(), None);
    }

    #[test]
    fn census_counts_recovered_agents() {
        let mut recovered = Agent::index_case(AgentId::new(0), DVec2::ZERO, false);
        recovered.schedule_recovery(Tick::new(1));
        recovered.resolve(true);
        let agents = vec![
            recovered,
            Agent::index_case(AgentId::new(1), DVec2::ZERO, false),
            Agent::susceptible(AgentId::new(2), DVec2::ZERO, false),
            Agent::susceptible(AgentId::new(3), DVec2::ZERO, false),
        ];

        let census = Census::of(PopulationView::new(&agents));
        assert_eq!(census.population, 4);
        assert_eq!(census.infected, 1);
        assert_eq!(census.recovered(), 1);
        assert_eq!(census.immune, 1);
        assert!((census.infected_fraction() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn rng_streams_are_reproducible_and_distinct() {
        let mut first = seeded_rng(11, RngStream::Movement);
        let mut second = seeded_rng(11, RngStream::Movement);
        let mut other = seeded_rng(11, RngStream::Recovery);

        let a = first.next_u64();
        assert_eq!(a, second.next_u64());
        assert_ne!(a, other.next_u64());
    }
}
