use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use epiwalk_simulation::{RunOutcome, RunSummary};

pub(crate) fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::ThresholdReached { tick } => {
            format!("infection bound reached after {} ticks", tick.get())
        }
        RunOutcome::Extinguished { tick } => {
            format!("no infections left after {} ticks", tick.get())
        }
        RunOutcome::TickLimitReached { tick } => {
            format!("tick limit of {} reached", tick.get())
        }
    }
}

/// Writes the outcome line followed by one row per metrics sample, with the
/// net change in active cases beside the gross infection count.
pub(crate) fn write_table(out: &mut impl Write, summary: &RunSummary) -> Result<()> {
    writeln!(out, "{}", describe(&summary.outcome))?;
    writeln!(
        out,
        "{:>8}  {:>12}  {:>14}  {:>10}  {:>12}",
        "tick", "active", "new infections", "net", "recovered"
    )?;
    let metrics = &summary.metrics;
    for (sample, net) in metrics.samples().iter().zip(metrics.net_change()) {
        writeln!(
            out,
            "{:>8}  {:>12}  {:>14}  {:>+10}  {:>12}",
            sample.tick.get(),
            sample.active_cases,
            sample.new_infections,
            net,
            sample.cumulative_recovered
        )?;
    }
    if let Some(peak) = summary.metrics.peak_active() {
        writeln!(
            out,
            "peak of {} active cases at tick {}",
            peak.active_cases,
            peak.tick.get()
        )?;
    }
    Ok(())
}

pub(crate) fn write_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create metrics file at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)
        .with_context(|| format!("failed to encode metrics to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write metrics to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use epiwalk_core::{SimConfig, Tick};
    use epiwalk_simulation::Simulation;

    fn summary() -> RunSummary {
        Simulation::new(SimConfig {
            population: 40,
            lattice_width: 5.0,
            lattice_height: 5.0,
            infectable_distance: 0.0,
            immune_onset_probability: 0.0,
            max_ticks: 3,
            ..SimConfig::default()
        })
        .expect("valid config")
        .run()
        .expect("run completes")
    }

    #[test]
    fn table_lists_every_sample() {
        let mut out = Vec::new();
        write_table(&mut out, &summary()).expect("in-memory write");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "tick limit of 3 reached");
        assert!(lines[1].contains("new infections"));
        assert_eq!(lines.len(), 2 + 4 + 1);
        assert_eq!(lines[2].split_whitespace().collect::<Vec<_>>(), vec!["0", "1", "0", "+1", "0"]);
        assert_eq!(lines[3].split_whitespace().nth(3), Some("+0"));
        assert_eq!(lines[6], "peak of 1 active cases at tick 0");
    }

    #[test]
    fn outcomes_are_described() {
        assert_eq!(
            describe(&RunOutcome::Extinguished { tick: Tick::new(4) }),
            "no infections left after 4 ticks"
        );
        assert_eq!(
            describe(&RunOutcome::ThresholdReached { tick: Tick::new(9) }),
            "infection bound reached after 9 ticks"
        );
    }

    #[test]
    fn json_export_round_trips_through_serde_json() {
        let path = std::env::temp_dir().join(format!("epiwalk-report-{}.json", std::process::id()));
        write_json(&path, &summary()).expect("export");
        let contents = std::fs::read_to_string(&path).expect("read back");
        std::fs::remove_file(&path).expect("cleanup");

        let value: serde_json::Value = serde_json::from_str(&contents).expect("valid json");
        assert_eq!(value["outcome"]["kind"], "tick_limit_reached");
        assert_eq!(value["outcome"]["tick"], 3);
        assert_eq!(value["census"]["infected"], 1);
        assert_eq!(value["metrics"]["samples"].as_array().map(Vec::len), Some(4));
    }
}
