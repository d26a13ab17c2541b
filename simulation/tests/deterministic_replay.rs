use std::{
    collections::{hash_map::DefaultHasher, BTreeSet},
    hash::{Hash, Hasher},
};

use epiwalk_core::{Agent, AgentId, IndexKind, Lattice, SimConfig, Tick};
use epiwalk_simulation::{
    Frame, ObserverError, RunOutcome, RunSummary, Simulation, SimulationError, TickObserver,
};
use epiwalk_world::World;
use glam::DVec2;

fn outbreak() -> SimConfig {
    SimConfig {
        population: 400,
        lattice_width: 12.0,
        lattice_height: 12.0,
        infectable_distance: 0.6,
        step_length: 0.3,
        infection_upper_bound: 0.9,
        recovery_duration: 4,
        immune_onset_probability: 0.3,
        relapse_probability: 0.5,
        seed: 0xfeed,
        max_ticks: 120,
        sample_interval: 1,
        ..SimConfig::default()
    }
}

#[derive(Default)]
struct Fingerprint {
    hasher: DefaultHasher,
    frames: usize,
}

impl TickObserver for Fingerprint {
    fn on_tick(&mut self, frame: &Frame<'_>) -> Result<(), ObserverError> {
        frame.tick.hash(&mut self.hasher);
        frame.census.hash(&mut self.hasher);
        for agent in frame.population.iter() {
            agent.position().x.to_bits().hash(&mut self.hasher);
            agent.position().y.to_bits().hash(&mut self.hasher);
            (agent.is_infected(), agent.is_immune(), agent.recover_at()).hash(&mut self.hasher);
        }
        self.frames += 1;
        Ok(())
    }
}

fn replay(config: SimConfig) -> (RunSummary, u64, usize) {
    let mut fingerprint = Fingerprint::default();
    let summary = Simulation::new(config)
        .expect("valid config")
        .run_with(&mut fingerprint)
        .expect("run completes");
    (summary, fingerprint.hasher.finish(), fingerprint.frames)
}

#[test]
fn deterministic_replay_produces_identical_runs() {
    let (first, first_print, first_frames) = replay(outbreak());
    let (second, second_print, second_frames) = replay(outbreak());

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first_print, second_print, "fingerprint mismatch");
    assert_eq!(first_frames, second_frames);
    assert_eq!(first_frames as u64, first.outcome.tick().get() + 1);

    let (reseeded, reseeded_print, _) = replay(SimConfig {
        seed: 0xbeef,
        ..outbreak()
    });
    assert_ne!(first_print, reseeded_print);
    assert!(reseeded.metrics.len() > 1);
}

#[test]
fn index_kinds_produce_identical_runs() {
    let runs: Vec<(RunSummary, u64, usize)> =
        [IndexKind::RTree, IndexKind::Grid, IndexKind::BruteForce]
            .into_iter()
            .map(|index| replay(SimConfig { index, ..outbreak() }))
            .collect();

    assert_eq!(runs[0], runs[1], "grid diverged from rtree");
    assert_eq!(runs[0], runs[2], "brute force diverged from rtree");
}

#[test]
fn dense_population_reaches_the_threshold() {
    let summary = Simulation::new(SimConfig {
        population: 60,
        lattice_width: 4.0,
        lattice_height: 4.0,
        infectable_distance: 1.5,
        step_length: 0.5,
        immune_onset_probability: 0.0,
        infection_upper_bound: 0.95,
        max_ticks: 500,
        seed: 3,
        ..SimConfig::default()
    })
    .expect("valid config")
    .run()
    .expect("run completes");

    assert!(matches!(summary.outcome, RunOutcome::ThresholdReached { .. }));
    assert!(summary.census.infected_fraction() >= 0.95);
    let last = summary.metrics.last().expect("samples");
    assert_eq!(last.tick, summary.outcome.tick());
    assert_eq!(last.active_cases, summary.census.infected);
}

#[test]
fn isolated_index_case_extinguishes_after_first_tick() {
    let summary = Simulation::new(SimConfig {
        population: 200,
        infectable_distance: 0.0,
        immune_onset_probability: 1.0,
        recovery_duration: 0,
        seed: 11,
        ..SimConfig::default()
    })
    .expect("valid config")
    .run()
    .expect("run completes");

    assert_eq!(summary.outcome, RunOutcome::Extinguished { tick: Tick::new(1) });
    assert_eq!(summary.census.infected, 0);
    assert_eq!(summary.census.recovered(), 1);
    assert_eq!(summary.metrics.cumulative_recovered().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn tick_limit_stops_endless_runs() {
    let summary = Simulation::new(SimConfig {
        population: 50,
        infectable_distance: 0.0,
        immune_onset_probability: 0.0,
        max_ticks: 10,
        sample_interval: 4,
        ..SimConfig::default()
    })
    .expect("valid config")
    .run()
    .expect("run completes");

    assert_eq!(
        summary.outcome,
        RunOutcome::TickLimitReached { tick: Tick::new(10) }
    );
    assert_eq!(
        summary
            .metrics
            .ticks()
            .map(|tick| tick.get())
            .collect::<Vec<_>>(),
        vec![0, 4, 8, 10]
    );
    assert!(summary.metrics.active_cases().all(|active| active == 1));
}

#[test]
fn step_reports_match_the_census() {
    let mut simulation = Simulation::new(outbreak()).expect("valid config");
    let mut ever_infected = simulation.census().ever_infected;
    let mut infected = simulation.census().infected;

    for expected in 1..=20 {
        let report = simulation.step().expect("tick");
        assert_eq!(report.tick, Tick::new(expected));
        assert_eq!(report.census, simulation.census());
        assert_eq!(
            report.census.infected,
            infected + report.new_infections - report.recoveries
        );
        assert!(report.census.ever_infected >= ever_infected);
        infected = report.census.infected;
        ever_infected = report.census.ever_infected;
    }
    assert_eq!(simulation.metrics().len(), 21);
}

#[derive(Default)]
struct ImmunityAudit {
    resolved: BTreeSet<AgentId>,
}

impl TickObserver for ImmunityAudit {
    fn on_tick(&mut self, frame: &Frame<'_>) -> Result<(), ObserverError> {
        for agent in frame.population.iter() {
            if self.resolved.contains(&agent.id()) {
                assert!(
                    !agent.is_infected() && agent.is_immune(),
                    "{:?} reinfected at tick {:?}",
                    agent.id(),
                    frame.tick
                );
            } else if agent.is_recovered() {
                let _ = self.resolved.insert(agent.id());
            }
        }
        Ok(())
    }
}

#[test]
fn retained_immunity_prevents_reinfection() {
    let mut audit = ImmunityAudit::default();
    let summary = Simulation::new(SimConfig {
        retain_immunity: true,
        relapse_probability: 1.0,
        immune_onset_probability: 0.6,
        recovery_duration: 2,
        ..outbreak()
    })
    .expect("valid config")
    .run_with(&mut audit)
    .expect("run completes");

    assert!(!audit.resolved.is_empty());
    let recovered: Vec<usize> = summary.metrics.cumulative_recovered().collect();
    assert!(recovered.windows(2).all(|pair| pair[0] <= pair[1]));
}

struct Abort;

impl TickObserver for Abort {
    fn on_tick(&mut self, frame: &Frame<'_>) -> Result<(), ObserverError> {
        if frame.tick == Tick::new(3) {
            Err("display closed".into())
        } else {
            Ok(())
        }
    }
}

#[test]
fn observer_errors_abort_the_run() {
    let result = Simulation::new(outbreak())
        .expect("valid config")
        .run_with(&mut Abort);
    assert!(matches!(result, Err(SimulationError::Observer(_))));
}

#[test]
fn invalid_configs_are_rejected() {
    let result = Simulation::new(SimConfig {
        infectable_distance: -1.0,
        ..SimConfig::default()
    });
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

fn checkerboard() -> World {
    let agents = (0..100u32)
        .map(|id| {
            let position = DVec2::new(f64::from(id % 10), f64::from(id / 10));
            if id == 55 {
                Agent::index_case(AgentId::new(id), position, false)
            } else {
                Agent::susceptible(AgentId::new(id), position, false)
            }
        })
        .collect();
    World::from_agents(Lattice::new(10.0, 10.0), 0.0, agents).expect("valid scenario")
}

#[test]
fn scripted_world_spreads_one_hop_per_tick() {
    for index in [IndexKind::RTree, IndexKind::Grid, IndexKind::BruteForce] {
        let config = SimConfig {
            infectable_distance: 2.0,
            immune_onset_probability: 0.0,
            index,
            ..SimConfig::default()
        };
        let mut simulation = Simulation::with_world(config, checkerboard()).expect("valid");

        let first = simulation.step().expect("tick");
        assert_eq!(first.new_infections, 12, "{index}");
        let second = simulation.step().expect("tick");
        assert!(second.new_infections > 0);
        assert_eq!(second.census.infected, 13 + second.new_infections);
    }
}
