#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic analytics system that samples epidemic metrics.

use epiwalk_core::{Census, Event, MetricsSample, Tick};
use serde::Serialize;
use tracing::trace;

/// Pure analytics system that turns world events and census snapshots into a
/// sampled metrics series.
#[derive(Debug)]
pub struct Analytics {
    interval: u64,
    series: MetricsSeries,
    pending_infections: usize,
    last_tick: Tick,
}

impl Analytics {
    /// Creates the recorder and stores the tick-zero sample of `initial`.
    ///
    /// An `interval` of zero is treated as one.
    #[must_use]
    pub fn new(interval: u64, initial: Census) -> Self {
        let mut analytics = Self {
            interval: interval.max(1),
            series: MetricsSeries::default(),
            pending_infections: 0,
            last_tick: Tick::ZERO,
        };
        let _ = analytics.record(Tick::ZERO, initial);
        analytics
    }

    /// Series recorded so far.
    #[must_use]
    pub fn series(&self) -> &MetricsSeries {
        &self.series
    }

    /// Consumes every event produced during one tick together with the census
    /// taken after the tick completed.
    ///
    /// Returns the sample when the tick falls on the sampling interval.
    pub fn handle(&mut self, events: &[Event], census: Census) -> Option<MetricsSample> {
        let mut advanced = None;
        for event in events {
            match event {
                Event::TimeAdvanced { tick } => advanced = Some(*tick),
                Event::AgentInfected { .. } => self.pending_infections += 1,
                _ => {}
            }
        }

        let tick = advanced?;
        self.last_tick = tick;
        if tick.get() % self.interval == 0 {
            Some(self.record(tick, census))
        } else {
            None
        }
    }

    /// Appends a closing sample when the last observed tick fell between
    /// sampling points, then yields the finished series.
    #[must_use]
    pub fn finish(mut self, census: Census) -> MetricsSeries {
        let sampled = self
            .series
            .last()
            .is_some_and(|sample| sample.tick == self.last_tick);
        if !sampled {
            let _ = self.record(self.last_tick, census);
        }
        self.series
    }

    fn record(&mut self, tick: Tick, census: Census) -> MetricsSample {
        let sample = MetricsSample {
            tick,
            active_cases: census.infected,
            cumulative_recovered: census.recovered(),
            new_infections: std::mem::take(&mut self.pending_infections),
            ever_infected: census.ever_infected,
        };
        trace!(
            tick = tick.get(),
            active = sample.active_cases,
            recovered = sample.cumulative_recovered,
            "metrics sampled"
        );
        self.series.samples.push(sample);
        sample
    }
}

/// Ordered metrics samples, one per sampling point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct MetricsSeries {
    samples: Vec<MetricsSample>,
}

impl MetricsSeries {
    /// Every recorded sample in tick order.
    #[must_use]
    pub fn samples(&self) -> &[MetricsSample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample ticks.
    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        self.samples.iter().map(|sample| sample.tick)
    }

    /// Active cases per sample.
    pub fn active_cases(&self) -> impl Iterator<Item = usize> + '_ {
        self.samples.iter().map(|sample| sample.active_cases)
    }

    /// Cumulative recovered count per sample.
    pub fn cumulative_recovered(&self) -> impl Iterator<Item = usize> + '_ {
        self.samples.iter().map(|sample| sample.cumulative_recovered)
    }

    /// Gross infections recorded between consecutive samples.
    ///
    /// Every infection event counts, even when recoveries in the same
    /// interval leave the active count unchanged.
    pub fn new_infections(&self) -> impl Iterator<Item = usize> + '_ {
        self.samples.iter().map(|sample| sample.new_infections)
    }

    /// Net change in active cases since the previous sample.
    ///
    /// The first entry is the active count of the first sample. Entries turn
    /// negative when recoveries outpace infections.
    pub fn net_change(&self) -> impl Iterator<Item = i64> + '_ {
        let mut previous = 0i64;
        self.samples.iter().map(move |sample| {
            let active = sample.active_cases as i64;
            let delta = active - previous;
            previous = active;
            delta
        })
    }

    /// Earliest sample with the highest active case count.
    #[must_use]
    pub fn peak_active(&self) -> Option<&MetricsSample> {
        self.samples
            .iter()
            .reduce(|peak, sample| if sample.active_cases > peak.active_cases { sample } else { peak })
    }

    /// Most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<&MetricsSample> {
        self.samples.last()
    }
}
