#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for epiwalk adapters.
//!
//! Renderers only observe the population; nothing here feeds back into the
//! simulation.

use anyhow::Result as AnyResult;
use epiwalk_core::{Agent, Lattice, PopulationView, Tick};
use glam::Vec2;

/// Opaque 24-bit color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
}

impl Rgb {
    /// Creates a color from byte channels.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Moves each channel towards white by `amount`, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn towards_white(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let mix = |channel: u8| {
            let channel = f32::from(channel);
            (channel + (255.0 - channel) * amount).round() as u8
        };
        Self::new(mix(self.red), mix(self.green), mix(self.blue))
    }

    /// ANSI truecolor escape selecting this color as the foreground.
    #[must_use]
    pub fn ansi_foreground(self) -> String {
        format!("\x1b[38;2;{};{};{}m", self.red, self.green, self.blue)
    }
}

/// ANSI escape restoring the default terminal colors.
pub const ANSI_RESET: &str = "\x1b[0m";

/// Health state shown for each agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HealthLabel {
    /// Never infected, or able to be infected again.
    Susceptible,
    /// Currently contagious.
    Infected,
    /// Previously infected and no longer contagious.
    Recovered,
}

impl HealthLabel {
    /// Every label in drawing priority order, lowest first.
    pub const ALL: [HealthLabel; 3] = [Self::Susceptible, Self::Recovered, Self::Infected];

    /// Classifies an agent.
    #[must_use]
    pub fn of(agent: &Agent) -> Self {
        if agent.is_infected() {
            Self::Infected
        } else if agent.is_recovered() {
            Self::Recovered
        } else {
            Self::Susceptible
        }
    }

    /// Diverging blue-white-red palette: cool for susceptible, hot for
    /// infected, washed out once recovered.
    #[must_use]
    pub fn color(self) -> Rgb {
        match self {
            Self::Susceptible => Rgb::new(59, 76, 192),
            Self::Infected => Rgb::new(180, 4, 38),
            Self::Recovered => Rgb::new(140, 140, 140).towards_white(0.35),
        }
    }

    /// Character used by text renderers.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Susceptible => '.',
            Self::Infected => '#',
            Self::Recovered => 'o',
        }
    }

    /// Label drawn as `glyph`, if any.
    #[must_use]
    pub fn from_glyph(glyph: char) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.glyph() == glyph)
    }

    const fn slot(self) -> usize {
        match self {
            Self::Susceptible => 0,
            Self::Recovered => 1,
            Self::Infected => 2,
        }
    }
}

/// One drawable agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenePoint {
    /// Position in lattice units.
    pub position: Vec2,
    /// Health state at capture time.
    pub label: HealthLabel,
}

/// Scene description captured after a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Lattice extent in lattice units.
    pub size: Vec2,
    /// Tick the scene was captured at.
    pub tick: Tick,
    /// Share of the population currently infected.
    pub infected_fraction: f64,
    /// Every agent in id order.
    pub points: Vec<ScenePoint>,
}

impl Scene {
    /// Captures the population for presentation.
    #[must_use]
    pub fn from_population(lattice: Lattice, tick: Tick, population: PopulationView<'_>) -> Self {
        let points: Vec<ScenePoint> = population
            .iter()
            .map(|agent| ScenePoint {
                position: agent.position().as_vec2(),
                label: HealthLabel::of(agent),
            })
            .collect();
        let infected = points
            .iter()
            .filter(|point| point.label == HealthLabel::Infected)
            .count();
        let infected_fraction = if points.is_empty() {
            0.0
        } else {
            infected as f64 / points.len() as f64
        };

        Self {
            size: Vec2::new(lattice.width() as f32, lattice.height() as f32),
            tick,
            infected_fraction,
            points,
        }
    }

    /// Number of points carrying `label`.
    #[must_use]
    pub fn count(&self, label: HealthLabel) -> usize {
        self.points.iter().filter(|point| point.label == label).count()
    }
}

/// Rendering backend capable of presenting epidemic scenes.
pub trait RenderingBackend {
    /// Presents one scene. Errors abort the run that produced it.
    fn present(&mut self, scene: &Scene) -> AnyResult<()>;
}

/// Renders the scene as a text density map, top row first.
///
/// Each character cell shows the glyph of the label most common among the
/// points that fall inside it; ties favour infected over recovered over
/// susceptible. Empty cells are blank.
#[must_use]
pub fn rasterize(scene: &Scene, columns: usize, rows: usize) -> Vec<String> {
    if columns == 0 || rows == 0 {
        return Vec::new();
    }

    let mut tallies = vec![[0u32; 3]; columns * rows];
    for point in &scene.points {
        let column = bucket(point.position.x, scene.size.x, columns);
        let row = rows - 1 - bucket(point.position.y, scene.size.y, rows);
        tallies[row * columns + column][point.label.slot()] += 1;
    }

    tallies
        .chunks(columns)
        .map(|line| line.iter().map(dominant).collect())
        .collect()
}

/// Wraps every glyph of a rasterized line in its label's truecolor escape.
///
/// Runs of the same label share one escape; blanks are left uncolored.
#[must_use]
pub fn colorize(line: &str) -> String {
    let mut painted = String::with_capacity(line.len() * 4);
    let mut current = None;
    for glyph in line.chars() {
        let label = HealthLabel::from_glyph(glyph);
        if label != current {
            if current.is_some() {
                painted.push_str(ANSI_RESET);
            }
            if let Some(label) = label {
                painted.push_str(&label.color().ansi_foreground());
            }
            current = label;
        }
        painted.push(glyph);
    }
    if current.is_some() {
        painted.push_str(ANSI_RESET);
    }
    painted
}

fn bucket(coordinate: f32, extent: f32, count: usize) -> usize {
    if extent <= 0.0 {
        return 0;
    }
    let scaled = (coordinate / extent * count as f32).floor();
    // Negative values saturate to zero in the cast.
    (scaled as usize).min(count - 1)
}

fn dominant(tally: &[u32; 3]) -> char {
    HealthLabel::ALL
        .iter()
        .filter(|label| tally[label.slot()] > 0)
        .max_by_key(|label| tally[label.slot()])
        .map_or(' ', |label| label.glyph())
}
