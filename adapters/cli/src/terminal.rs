use std::io::Write;

use anyhow::{Context, Result};
use epiwalk_rendering::{colorize, rasterize, HealthLabel, RenderingBackend, Scene};
use epiwalk_simulation::{Frame, ObserverError, TickObserver};

/// Text backend that draws scenes as framed density maps.
#[derive(Debug)]
pub(crate) struct TerminalBackend<W> {
    out: W,
    columns: usize,
    rows: usize,
    color: bool,
}

impl<W: Write> TerminalBackend<W> {
    pub(crate) fn new(out: W, columns: usize, rows: usize) -> Self {
        Self {
            out,
            columns,
            rows,
            color: false,
        }
    }

    /// Paints glyphs with the label palette using ANSI truecolor escapes.
    pub(crate) fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderingBackend for TerminalBackend<W> {
    fn present(&mut self, scene: &Scene) -> Result<()> {
        let border = format!("+{}+", "-".repeat(self.columns));
        writeln!(
            self.out,
            "tick {:>6}  infected {:6.2}%  ({} {}, {} {}, {} {})",
            scene.tick.get(),
            scene.infected_fraction * 100.0,
            HealthLabel::Susceptible.glyph(),
            scene.count(HealthLabel::Susceptible),
            HealthLabel::Infected.glyph(),
            scene.count(HealthLabel::Infected),
            HealthLabel::Recovered.glyph(),
            scene.count(HealthLabel::Recovered),
        )
        .context("failed to write frame header")?;
        writeln!(self.out, "{border}")?;
        for line in rasterize(scene, self.columns, self.rows) {
            if self.color {
                writeln!(self.out, "|{}|", colorize(&line))?;
            } else {
                writeln!(self.out, "|{line}|")?;
            }
        }
        writeln!(self.out, "{border}")?;
        self.out.flush().context("failed to flush frame")
    }
}

/// Console observer printing periodic progress lines and frames.
pub(crate) struct Console<B, W> {
    backend: B,
    progress: W,
    render_every: Option<u64>,
    progress_every: Option<u64>,
}

impl<B: RenderingBackend, W: Write> Console<B, W> {
    pub(crate) fn new(
        backend: B,
        progress: W,
        render_every: Option<u64>,
        progress_every: Option<u64>,
    ) -> Self {
        Self {
            backend,
            progress,
            render_every,
            progress_every,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_parts(self) -> (B, W) {
        (self.backend, self.progress)
    }
}

fn due(cadence: Option<u64>, tick: u64) -> bool {
    cadence.is_some_and(|every| tick % every == 0)
}

impl<B: RenderingBackend, W: Write> TickObserver for Console<B, W> {
    fn on_tick(&mut self, frame: &Frame<'_>) -> Result<(), ObserverError> {
        let tick = frame.tick.get();
        if due(self.progress_every, tick) {
            writeln!(
                self.progress,
                "{tick:>8}  {:6.2}%",
                frame.census.infected_fraction() * 100.0
            )?;
        }
        if due(self.render_every, tick) {
            let scene = Scene::from_population(frame.lattice, frame.tick, frame.population);
            self.backend.present(&scene)?;
        }
        Ok(())
    }
}
