use epiwalk_core::{Agent, AgentId, Command, Event, Lattice, Tick};
use epiwalk_system_recovery::{Recovery, RecoveryPolicy};
use epiwalk_world::{self as world, query, World};
use glam::DVec2;

fn scenario(can_relapse: bool) -> World {
    let agents = vec![
        Agent::index_case(AgentId::new(0), DVec2::new(1.0, 1.0), can_relapse),
        Agent::susceptible(AgentId::new(1), DVec2::new(1.0, 1.0), can_relapse),
    ];
    World::from_agents(Lattice::new(4.0, 4.0), 0.0, agents).expect("valid scenario")
}

fn advance(world: &mut World, recovery: &mut Recovery) -> Vec<Event> {
    let mut clock = Vec::new();
    world::apply(world, Command::Tick, &mut clock).expect("tick");

    let mut commands = Vec::new();
    recovery.handle(&clock, query::population(world), &mut commands);
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events).expect("recovery command");
    }
    events
}

fn policy(duration: u64, retain_immunity: bool) -> RecoveryPolicy {
    RecoveryPolicy {
        duration,
        retain_immunity,
        onset_probability: 1.0,
    }
}

#[test]
fn infection_lasts_exactly_until_the_scheduled_tick() {
    let mut world = scenario(false);
    let mut recovery = Recovery::new(0, policy(5, false));
    let index_case = AgentId::new(0);

    let first = advance(&mut world, &mut recovery);
    assert!(first.contains(&Event::RecoveryScheduled {
        agent: index_case,
        recover_at: Tick::new(6),
    }));

    for tick in 1..=5 {
        let agent = query::population(&world).get(index_case).expect("agent");
        assert!(agent.is_infected(), "recovered early at tick {tick}");
        assert!(agent.is_immune());
        assert!(!agent.is_newly_infected());
        if tick < 5 {
            let events = advance(&mut world, &mut recovery);
            assert_eq!(events, vec![Event::OnsetFlagsCleared]);
        }
    }

    let events = advance(&mut world, &mut recovery);
    assert_eq!(query::tick(&world), Tick::new(6));
    assert!(events.contains(&Event::AgentRecovered {
        agent: index_case,
        immune: true,
    }));
    let agent = query::population(&world).get(index_case).expect("agent");
    assert!(!agent.is_infected() && agent.is_recovered());
    assert_eq!(query::census(&world).recovered(), 1);
}

#[test]
fn relapsing_agents_become_susceptible_again() {
    let mut world = scenario(true);
    let mut recovery = Recovery::new(0, policy(2, false));
    for _ in 0..3 {
        let _ = advance(&mut world, &mut recovery);
    }

    let agent = query::population(&world).get(AgentId::new(0)).expect("agent");
    assert!(agent.is_susceptible() && agent.is_recovered());

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::Infect {
            agent: AgentId::new(1),
            source: AgentId::new(0),
        },
        &mut events,
    )
    .expect_err("recovered agents do not transmit");
}

#[test]
fn retained_immunity_overrides_relapse() {
    let mut world = scenario(true);
    let mut recovery = Recovery::new(0, policy(1, true));
    for _ in 0..2 {
        let _ = advance(&mut world, &mut recovery);
    }

    let agent = query::population(&world).get(AgentId::new(0)).expect("agent");
    assert!(!agent.is_infected());
    assert!(agent.is_immune());
}

#[test]
fn onset_flags_are_cleared_every_tick() {
    let mut world = scenario(false);
    let mut recovery = Recovery::new(
        3,
        RecoveryPolicy {
            onset_probability: 0.0,
            ..policy(5, false)
        },
    );

    let events = advance(&mut world, &mut recovery);
    assert_eq!(events, vec![Event::OnsetFlagsCleared]);
    assert!(query::population(&world)
        .iter()
        .all(|agent| !agent.is_newly_infected()));

    let _ = advance(&mut world, &mut recovery);
    let agent = query::population(&world).get(AgentId::new(0)).expect("agent");
    assert!(agent.is_infected() && !agent.is_immune());
    assert_eq!(agent.recover_at(), None);
}
