use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use epiwalk_core::{IndexKind, SimConfig};

/// Random-walk epidemic simulator.
#[derive(Debug, Parser)]
#[command(name = "epiwalk", version)]
pub(crate) struct Args {
    /// TOML file with simulation options; flags override its values.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Number of agents.
    #[arg(long)]
    pub(crate) population: Option<usize>,

    /// Lattice width.
    #[arg(long)]
    pub(crate) width: Option<f64>,

    /// Lattice height.
    #[arg(long)]
    pub(crate) height: Option<f64>,

    /// Infectable distance.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) radius: Option<f64>,

    /// Length of each random-walk step.
    #[arg(long)]
    pub(crate) step_length: Option<f64>,

    /// Infected fraction that ends the run.
    #[arg(long)]
    pub(crate) upper_bound: Option<f64>,

    /// Ticks between scheduling and resolving a recovery.
    #[arg(long)]
    pub(crate) recovery_duration: Option<u64>,

    /// Keep every recovered agent immune.
    #[arg(long)]
    pub(crate) retain_immunity: bool,

    /// Probability that an agent can relapse after recovering.
    #[arg(long)]
    pub(crate) relapse_probability: Option<f64>,

    /// Probability that a new infection schedules its recovery.
    #[arg(long)]
    pub(crate) onset_probability: Option<f64>,

    /// Master random seed.
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Upper bound on processed ticks.
    #[arg(long)]
    pub(crate) max_ticks: Option<u64>,

    /// Ticks between metrics samples.
    #[arg(long)]
    pub(crate) sample_interval: Option<u64>,

    /// Neighbour index: rtree, grid or brute-force.
    #[arg(long)]
    pub(crate) index: Option<IndexKind>,

    /// Print a text frame every N ticks.
    #[arg(long, value_name = "TICKS", value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) render_every: Option<u64>,

    /// Print the infected share every N ticks.
    #[arg(long, value_name = "TICKS", value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) progress_every: Option<u64>,

    /// Character columns of rendered frames.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) frame_columns: u16,

    /// Character rows of rendered frames.
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) frame_rows: u16,

    /// Color rendered frames with ANSI truecolor escapes.
    #[arg(long)]
    pub(crate) color: bool,

    /// Write the run summary and metrics as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub(crate) metrics_json: Option<PathBuf>,
}

impl Args {
    /// Loads the configuration file, if any, and applies flag overrides.
    pub(crate) fn resolve(&self) -> Result<SimConfig> {
        let base = match &self.config {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config at {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))?
            }
            None => SimConfig::default(),
        };

        let config = self.apply(base);
        config.validate().context("configuration rejected")?;
        Ok(config)
    }

    fn apply(&self, mut config: SimConfig) -> SimConfig {
        fn set<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut config.population, self.population);
        set(&mut config.lattice_width, self.width);
        set(&mut config.lattice_height, self.height);
        set(&mut config.infectable_distance, self.radius);
        set(&mut config.step_length, self.step_length);
        set(&mut config.infection_upper_bound, self.upper_bound);
        set(&mut config.recovery_duration, self.recovery_duration);
        set(&mut config.relapse_probability, self.relapse_probability);
        set(&mut config.immune_onset_probability, self.onset_probability);
        set(&mut config.seed, self.seed);
        set(&mut config.max_ticks, self.max_ticks);
        set(&mut config.sample_interval, self.sample_interval);
        set(&mut config.index, self.index);
        config.retain_immunity |= self.retain_immunity;
        config
    }
}
