//! Initial population placement.

use epiwalk_core::{seeded_rng, Agent, AgentId, RngStream, SimConfig};
use glam::DVec2;
use rand::Rng;

/// Scatters `population - 1` susceptible agents uniformly over the lattice and
/// places the index case, which takes the last identifier, at the centre.
pub(crate) fn generate(config: &SimConfig) -> Vec<Agent> {
    let lattice = config.lattice();
    let mut rng = seeded_rng(config.seed, RngStream::Population);
    let mut agents = Vec::with_capacity(config.population);

    let susceptible_count = config.population.saturating_sub(1);
    for index in 0..susceptible_count {
        let position = DVec2::new(
            rng.gen_range(0.0..lattice.width()),
            rng.gen_range(0.0..lattice.height()),
        );
        let can_relapse = rng.gen_bool(config.relapse_probability);
        agents.push(Agent::susceptible(agent_id(index), position, can_relapse));
    }

    let can_relapse = rng.gen_bool(config.relapse_probability);
    agents.push(Agent::index_case(
        agent_id(susceptible_count),
        lattice.center(),
        can_relapse,
    ));

    agents
}

// Validated configurations never exceed u32::MAX agents.
fn agent_id(index: usize) -> AgentId {
    AgentId::new(u32::try_from(index).unwrap_or(u32::MAX))
}
