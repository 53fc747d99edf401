//! Rolling (day, S, I, R) series feeding the compartment chart.
//!
//! Sessions can run for any number of days; the chart only ever shows the
//! most recent `window` of them. Appends are idempotent by day so a snapshot
//! that is delivered twice is not counted twice.

use std::collections::VecDeque;
use std::fmt::Write;

use serde::Serialize;

use crate::model::Snapshot;

/// Default number of days kept for charting.
pub const DEFAULT_WINDOW: usize = 100;

/// One charted day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub day: u32,
    pub susceptible: u64,
    pub infected: u64,
    pub recovered: u64,
}

impl SeriesPoint {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        let clamp = |v: i64| v.max(0) as u64;
        Self {
            day: snapshot.day,
            susceptible: clamp(snapshot.stats.susceptible),
            infected: clamp(snapshot.stats.infected),
            recovered: clamp(snapshot.stats.recovered),
        }
    }
}

/// Bounded FIFO of [`SeriesPoint`]s.
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    points: VecDeque<SeriesPoint>,
    window: usize,
}

impl Default for SeriesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl SeriesBuffer {
    /// Create a buffer keeping at most `window` days (minimum 1).
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            points: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    /// Record a snapshot. Returns `false` when the day was already the last
    /// stored one and nothing changed.
    pub fn append(&mut self, snapshot: &Snapshot) -> bool {
        if self.points.back().is_some_and(|p| p.day == snapshot.day) {
            return false;
        }
        self.points.push_back(SeriesPoint::from_snapshot(snapshot));
        while self.points.len() > self.window {
            self.points.pop_front();
        }
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &SeriesPoint> + '_ {
        self.points.iter()
    }

    /// Owned copy of the series for publishing to the presentation layer.
    pub fn to_vec(&self) -> Vec<SeriesPoint> {
        self.points.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// CSV rendering of the buffered window, see [`to_csv`].
    pub fn to_csv(&self) -> String {
        to_csv(&self.points)
    }
}

/// Largest single compartment count over `points`, 0 when empty.
pub fn y_max<'a>(points: impl IntoIterator<Item = &'a SeriesPoint>) -> u64 {
    points
        .into_iter()
        .map(|p| p.susceptible.max(p.infected).max(p.recovered))
        .max()
        .unwrap_or(0)
}

/// CSV with a `day,susceptible,infected,recovered` header.
pub fn to_csv<'a>(points: impl IntoIterator<Item = &'a SeriesPoint>) -> String {
    let mut out = String::from("day,susceptible,infected,recovered\n");
    for p in points {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{},{}",
            p.day, p.susceptible, p.infected, p.recovered
        );
    }
    out
}
