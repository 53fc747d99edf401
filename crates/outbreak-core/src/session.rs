//! Session state machine.
//!
//! A [`Session`] owns everything one simulation run needs on the client: the
//! lifecycle state, the parameters the service must see on every step, the
//! rolling series, the graph view and the auto-play scheduler. Remote calls
//! are made only from legal states; illegal requests are ignored rather than
//! failed so a stray key press never turns into an error message.
//!
//! ```text
//!          start            toggle              toggle/stop
//!   Idle ─────────► Running ───────► AutoPlaying ───────────► Paused
//!    ▲                 │                  ▲                      │
//!    │                 └── step ──┘       └──────── toggle ──────┘
//!    └──────────────────────── reset (from anywhere) ────────────┘
//! ```

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::autoplay::AutoPlay;
use crate::backend::SimulationBackend;
use crate::config::ControllerConfig;
use crate::error::{BackendError, BackendResult, ControlError, ControlResult};
use crate::graph::{GraphFrame, GraphView, Reconciliation};
use crate::model::{CompartmentStats, SimulationParameters, Snapshot};
use crate::series::{self, SeriesBuffer, SeriesPoint};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    AutoPlaying,
    Paused,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AutoPlaying => "auto-playing",
            Self::Paused => "paused",
        }
    }

    /// A session exists on the service.
    pub fn is_live(self) -> bool {
        self != Self::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether an operation did anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Not legal from the current state; nothing happened.
    Ignored,
}

pub const STATUS_READY: &str = "Ready to start";

/// Everything the presentation layer needs for one frame.
///
/// Republished on every layout tick, so it carries the latest day and counts
/// rather than the snapshot itself; the graph frame already holds the nodes.
#[derive(Debug, Clone, Serialize)]
pub struct RenderState {
    pub state: SessionState,
    pub status: String,
    /// A remote request is outstanding.
    pub busy: bool,
    pub session_id: Option<Uuid>,
    pub parameters: Option<SimulationParameters>,
    pub day: Option<u32>,
    pub stats: Option<CompartmentStats>,
    pub series: Vec<SeriesPoint>,
    pub window: usize,
    pub graph: GraphFrame,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            status: STATUS_READY.to_string(),
            busy: false,
            session_id: None,
            parameters: None,
            day: None,
            stats: None,
            series: Vec::new(),
            window: 0,
            graph: GraphFrame::default(),
        }
    }
}

impl RenderState {
    /// Chart y bound: the population when known, else the largest charted
    /// compartment.
    pub fn y_bound(&self) -> u64 {
        match &self.parameters {
            Some(p) => u64::from(p.population_size),
            None => series::y_max(&self.series),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<B> {
    backend: B,
    config: ControllerConfig,
    state: SessionState,
    params: Option<SimulationParameters>,
    session_id: Option<Uuid>,
    latest: Option<Snapshot>,
    series: SeriesBuffer,
    graph: GraphView,
    autoplay: AutoPlay,
    status: String,
    busy: bool,
    publisher: watch::Sender<RenderState>,
}

impl<B: SimulationBackend> Session<B> {
    pub fn new(backend: B, config: ControllerConfig) -> Self {
        let (publisher, _) = watch::channel(RenderState {
            window: config.window,
            ..RenderState::default()
        });
        Self {
            backend,
            series: SeriesBuffer::new(config.window),
            graph: GraphView::new(config.layout),
            autoplay: AutoPlay::new(config.cadence),
            config,
            state: SessionState::Idle,
            params: None,
            session_id: None,
            latest: None,
            status: STATUS_READY.to_string(),
            busy: false,
            publisher,
        }
    }

    // ---- Operations ----

    /// Open a session on the service.
    pub async fn start(&mut self, params: SimulationParameters) -> ControlResult<Outcome> {
        if self.state != SessionState::Idle {
            log::debug!("session: start ignored while {}", self.state);
            return Ok(Outcome::Ignored);
        }
        if let Err(err) = params.validate() {
            return Err(self.fail(err));
        }

        self.status = "Starting...".to_string();
        self.begin_request();
        let result = self.backend.start(&params).await;
        self.busy = false;

        match result {
            Ok(snapshot) => {
                let id = Uuid::new_v4();
                log::info!(
                    "session {id}: started (population {}, initial infected {})",
                    params.population_size,
                    params.initial_infected
                );
                self.series.clear();
                self.graph.clear();
                self.params = Some(params);
                self.session_id = Some(id);
                self.state = SessionState::Running;
                self.status = "Running".to_string();
                self.absorb(snapshot);
                self.publish();
                Ok(Outcome::Applied)
            }
            Err(BackendError::Rejected { status, detail }) => {
                Err(self.fail(ControlError::RemoteRejected { status, detail }))
            }
            Err(err) => Err(self.fail(ControlError::remote_call_failed("start", err))),
        }
    }

    /// Advance one day by hand. Blocked while auto-play owns the cadence.
    pub async fn step(&mut self) -> ControlResult<Outcome> {
        match self.state {
            SessionState::Running | SessionState::Paused => {}
            state => {
                log::debug!("session: step ignored while {state}");
                return Ok(Outcome::Ignored);
            }
        }
        self.perform_step().await
    }

    /// Running/Paused → AutoPlaying, AutoPlaying → Paused.
    pub fn toggle_auto_play(&mut self) -> Outcome {
        match self.state {
            SessionState::Running | SessionState::Paused => {
                self.state = SessionState::AutoPlaying;
                self.autoplay.engage();
                self.status = "Auto-playing...".to_string();
                self.log_transition("auto-play engaged");
                self.publish();
                Outcome::Applied
            }
            SessionState::AutoPlaying => self.stop_auto_play(),
            SessionState::Idle => Outcome::Ignored,
        }
    }

    pub fn stop_auto_play(&mut self) -> Outcome {
        if self.state != SessionState::AutoPlaying {
            return Outcome::Ignored;
        }
        self.autoplay.disengage();
        self.state = SessionState::Paused;
        self.status = "Paused".to_string();
        self.log_transition("auto-play stopped");
        self.publish();
        Outcome::Applied
    }

    /// Contact-reduction intervention. `strength` is passed through as given.
    pub async fn apply_lockdown(&mut self, strength: f64) -> ControlResult<Outcome> {
        if !self.state.is_live() {
            return Ok(Outcome::Ignored);
        }
        self.begin_request();
        let result = self.backend.lockdown(strength).await;
        self.finish("lockdown", result, || {
            format!("Lockdown applied ({:.0}%)", strength * 100.0)
        })
    }

    /// Immunise a fraction of the population. `fraction` is passed through.
    pub async fn apply_vaccinate(&mut self, fraction: f64) -> ControlResult<Outcome> {
        if !self.state.is_live() {
            return Ok(Outcome::Ignored);
        }
        self.begin_request();
        let result = self.backend.vaccinate(fraction).await;
        self.finish("vaccinate", result, || {
            format!("Vaccinated {:.0}%", fraction * 100.0)
        })
    }

    /// Drop everything and return to Idle. Legal from any state.
    pub fn reset(&mut self) -> Outcome {
        self.autoplay.disengage();
        self.series.clear();
        self.graph.clear();
        if let Some(id) = self.session_id.take() {
            log::info!("session {id}: reset");
        }
        self.latest = None;
        self.params = None;
        self.state = SessionState::Idle;
        self.status = STATUS_READY.to_string();
        self.busy = false;
        self.publish();
        Outcome::Applied
    }

    // ---- Auto-play ----

    /// Wait until the next auto-play cycle is due. Never resolves while
    /// auto-play is disengaged. Cancel-safe.
    pub async fn next_auto_play_cycle(&mut self) {
        self.autoplay.due().await;
    }

    /// Perform the step of a due cycle and arm the next one. A failed step is
    /// reported but keeps the loop going.
    pub async fn run_auto_play_cycle(&mut self) -> ControlResult<Outcome> {
        if self.state != SessionState::AutoPlaying {
            self.autoplay.disengage();
            return Ok(Outcome::Ignored);
        }
        let result = self.perform_step().await;
        self.autoplay.complete();
        result
    }

    // ---- Layout ----

    /// Advance the graph layout one tick. Returns `false` once settled.
    pub fn tick_layout(&mut self) -> bool {
        let moved = self.graph.tick();
        if moved {
            self.publish();
        }
        moved
    }

    pub fn is_layout_active(&self) -> bool {
        self.graph.is_settling()
    }

    // ---- Accessors ----

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_auto_play_engaged(&self) -> bool {
        self.autoplay.is_engaged()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn parameters(&self) -> Option<&SimulationParameters> {
        self.params.as_ref()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn series(&self) -> &SeriesBuffer {
        &self.series
    }

    pub fn graph(&self) -> &GraphView {
        &self.graph
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Receiver of every published [`RenderState`].
    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.publisher.subscribe()
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            state: self.state,
            status: self.status.clone(),
            busy: self.busy,
            session_id: self.session_id,
            parameters: self.params.clone(),
            day: self.latest.as_ref().map(|s| s.day),
            stats: self.latest.as_ref().map(|s| s.stats),
            series: self.series.to_vec(),
            window: self.series.window(),
            graph: self.graph.frame(),
        }
    }

    // ---- Internals ----

    async fn perform_step(&mut self) -> ControlResult<Outcome> {
        let Some(params) = self.params.clone() else {
            return Ok(Outcome::Ignored);
        };
        self.begin_request();
        let result = self.backend.step(&params).await;
        let day = result.as_ref().map(|s| s.day).unwrap_or_default();
        self.finish("step", result, || format!("Day {day}"))
    }

    fn begin_request(&mut self) {
        self.busy = true;
        self.publish();
    }

    fn finish(
        &mut self,
        operation: &'static str,
        result: BackendResult<Snapshot>,
        status: impl FnOnce() -> String,
    ) -> ControlResult<Outcome> {
        self.busy = false;
        match result {
            Ok(snapshot) => {
                self.status = status();
                self.absorb(snapshot);
                self.publish();
                Ok(Outcome::Applied)
            }
            Err(err) => Err(self.fail(ControlError::remote_call_failed(operation, err))),
        }
    }

    /// Feed a snapshot into the series and the graph view.
    fn absorb(&mut self, snapshot: Snapshot) {
        self.series.append(&snapshot);
        let action = self.graph.reconcile(&snapshot, self.config.viewport);
        if action == Reconciliation::Rebuilt {
            log::debug!(
                "session: day {} rebuilt graph ({} nodes)",
                snapshot.day,
                snapshot.node_count()
            );
        }
        self.latest = Some(snapshot);
    }

    fn fail(&mut self, err: ControlError) -> ControlError {
        log::warn!("session: {} error: {err}", err.kind());
        self.busy = false;
        self.status = format!("Error: {err}");
        self.publish();
        err
    }

    fn log_transition(&self, what: &str) {
        match self.session_id {
            Some(id) => log::info!("session {id}: {what}"),
            None => log::info!("session: {what}"),
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(self.render_state());
    }
}
