//! Cooperative auto-play cadence.
//!
//! Auto-play is not a worker running beside the session: it is a timer the
//! control task waits on together with user input. When the timer fires the
//! control task performs one step, applies its result, and only then asks for
//! the next cycle to be armed. That gives two guarantees:
//!
//! - at most one step request is ever outstanding;
//! - stopping takes effect by dropping the armed timer, so no cycle can fire
//!   after [`AutoPlay::disengage`], while a step already in flight still
//!   completes and is applied.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

/// Delay between the end of one auto-play step and the start of the next.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(500);

enum Phase {
    Disengaged,
    /// Next cycle armed; the handle is the timer itself.
    Waiting(Pin<Box<Sleep>>),
    /// Cycle fired; a step is being performed.
    InFlight,
}

pub struct AutoPlay {
    cadence: Duration,
    phase: Phase,
    cycles: u64,
}

impl Default for AutoPlay {
    fn default() -> Self {
        Self::new(DEFAULT_CADENCE)
    }
}

impl AutoPlay {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            phase: Phase::Disengaged,
            cycles: 0,
        }
    }

    /// Start cycling. The first cycle is due immediately. Engaging an already
    /// engaged scheduler keeps its current timer.
    pub fn engage(&mut self) {
        if matches!(self.phase, Phase::Disengaged) {
            self.phase = Phase::Waiting(Box::pin(sleep(Duration::ZERO)));
        }
    }

    /// Stop cycling. Drops any armed timer; a cycle already in flight is not
    /// followed by another one.
    pub fn disengage(&mut self) {
        self.phase = Phase::Disengaged;
    }

    pub fn is_engaged(&self) -> bool {
        !matches!(self.phase, Phase::Disengaged)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, Phase::InFlight)
    }

    /// When the armed cycle fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Waiting(timer) => Some(timer.deadline()),
            _ => None,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Number of cycles fired since creation.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Resolves when the armed cycle is due and marks it in flight. Never
    /// resolves while nothing is armed.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the timer
    /// armed.
    pub async fn due(&mut self) {
        match &mut self.phase {
            Phase::Waiting(timer) => timer.as_mut().await,
            _ => future::pending::<()>().await,
        }
        self.phase = Phase::InFlight;
        self.cycles += 1;
        log::debug!("autoplay: cycle {} due", self.cycles);
    }

    /// The in-flight cycle's result has been applied; arm the next one.
    pub fn complete(&mut self) {
        if matches!(self.phase, Phase::InFlight) {
            self.phase = Phase::Waiting(Box::pin(sleep(self.cadence)));
        }
    }
}
