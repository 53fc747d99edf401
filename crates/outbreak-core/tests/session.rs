//! Integration tests for the session controller.
//!
//! These drive a [`Session`] (directly, and through the driver task) against
//! an in-process fake of the simulation service:
//! start → step / auto-play → interventions → reset.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};

use outbreak_core::{
    BackendError, BackendResult, CompartmentStats, ControlError, ControllerConfig, DriverHandle,
    Intent, Link, Node, NodeStatus, Session, SessionState, SimulationBackend, SimulationParameters,
    Snapshot,
};

// ---------------------------------------------------------------------------
// Fake service
// ---------------------------------------------------------------------------

/// A tiny SIR-flavoured stand-in: every step infects one more node.
#[derive(Default)]
struct FakeService {
    population: AtomicU32,
    infected: AtomicU32,
    day: AtomicU32,
    requests: AtomicUsize,
    steps: AtomicUsize,
    failing_steps: AtomicUsize,
    failing_interventions: AtomicUsize,
    step_started: Notify,
    gate: Option<Arc<Semaphore>>,
}

impl FakeService {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    /// Consume one scripted failure from `counter`, if any are left.
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn snapshot(&self) -> Snapshot {
        let n = self.population.load(Ordering::SeqCst);
        let infected = self.infected.load(Ordering::SeqCst).min(n);
        Snapshot {
            day: self.day.load(Ordering::SeqCst),
            stats: CompartmentStats {
                susceptible: i64::from(n - infected),
                infected: i64::from(infected),
                recovered: 0,
            },
            nodes: (0..n)
                .map(|id| Node {
                    id,
                    status: if id < infected {
                        NodeStatus::Infected
                    } else {
                        NodeStatus::Susceptible
                    },
                })
                .collect(),
            links: (0..n.saturating_sub(1))
                .map(|i| Link {
                    source: i,
                    target: i + 1,
                })
                .collect(),
        }
    }
}

impl SimulationBackend for FakeService {
    async fn start(&self, params: &SimulationParameters) -> BackendResult<Snapshot> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.population.store(params.population_size, Ordering::SeqCst);
        self.infected.store(params.initial_infected, Ordering::SeqCst);
        self.day.store(0, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    async fn step(&self, _params: &SimulationParameters) -> BackendResult<Snapshot> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.steps.fetch_add(1, Ordering::SeqCst);
        self.step_started.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if Self::take_failure(&self.failing_steps) {
            return Err(BackendError::Transport("connection reset".into()));
        }
        self.day.fetch_add(1, Ordering::SeqCst);
        self.infected.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    async fn lockdown(&self, _strength: f64) -> BackendResult<Snapshot> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_interventions) {
            return Err(BackendError::Transport("service unavailable".into()));
        }
        Ok(self.snapshot())
    }

    async fn vaccinate(&self, _fraction: f64) -> BackendResult<Snapshot> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_interventions) {
            return Err(BackendError::Transport("service unavailable".into()));
        }
        Ok(self.snapshot())
    }
}

fn params() -> SimulationParameters {
    SimulationParameters {
        population_size: 500,
        initial_infected: 5,
        transmission_prob: 0.3,
        recovery_time: 10,
        avg_degree: 6,
        rewire_prob: 0.1,
        ..SimulationParameters::default()
    }
}

fn small_params() -> SimulationParameters {
    SimulationParameters {
        population_size: 40,
        initial_infected: 2,
        ..params()
    }
}

/// Session on day 1, auto-playing if asked.
async fn live_session(auto_play: bool) -> (Arc<FakeService>, Session<Arc<FakeService>>) {
    let fake = Arc::new(FakeService::default());
    let mut session = Session::new(fake.clone(), ControllerConfig::default());
    session.start(small_params()).await.unwrap();
    session.step().await.unwrap();
    if auto_play {
        session.toggle_auto_play();
    }
    (fake, session)
}

fn failed_operation(err: &ControlError) -> Option<&'static str> {
    match err {
        ControlError::RemoteCallFailed { operation, .. } => Some(*operation),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_then_three_steps() {
    let fake = Arc::new(FakeService::default());
    let mut session = Session::new(fake.clone(), ControllerConfig::default());

    session.start(params()).await.unwrap();
    assert_eq!(fake.requests(), 1);
    assert_eq!(session.state(), SessionState::Running);

    let snap = session.latest().unwrap();
    assert_eq!(snap.day, 0);
    assert_eq!(
        (snap.stats.susceptible, snap.stats.infected, snap.stats.recovered),
        (495, 5, 0)
    );
    assert_eq!(snap.node_count(), 500);
    assert_eq!(session.graph().node_count(), 500);

    for _ in 0..3 {
        session.step().await.unwrap();
    }
    assert_eq!(session.series().len(), 4);
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.status(), "Day 3");
}

#[tokio::test]
async fn invalid_parameters_never_reach_the_service() {
    let fake = Arc::new(FakeService::default());
    let mut session = Session::new(fake.clone(), ControllerConfig::default());

    let bad = SimulationParameters {
        initial_infected: 600,
        ..params()
    };
    let err = session.start(bad).await.unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)), "{err:?}");
    assert_eq!(fake.requests(), 0);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.status().starts_with("Error: Initial infected (600)"));
}

#[tokio::test]
async fn steps_patch_the_graph_in_place() {
    let fake = Arc::new(FakeService::default());
    let mut session = Session::new(fake.clone(), ControllerConfig::default());
    session.start(small_params()).await.unwrap();
    let generation = session.graph().generation();
    while session.tick_layout() {}
    let before = session.graph().bodies().to_vec();

    session.step().await.unwrap();

    assert_eq!(session.graph().generation(), generation);
    assert_eq!(session.graph().bodies(), before.as_slice());
    assert_eq!(session.graph().nodes()[2].status, NodeStatus::Infected);
}

#[tokio::test]
async fn failed_lockdown_keeps_state_and_series() {
    for auto_play in [false, true] {
        let (fake, mut session) = live_session(auto_play).await;
        let state = session.state();
        fake.failing_interventions.store(1, Ordering::SeqCst);

        let err = session.apply_lockdown(0.5).await.unwrap_err();

        assert_eq!(failed_operation(&err), Some("lockdown"), "{err:?}");
        assert_eq!(session.state(), state);
        assert_eq!(session.is_auto_play_engaged(), auto_play);
        assert_eq!(session.series().len(), 2);
        assert!(session.status().starts_with("Error: lockdown failed"));
        assert!(!session.is_busy());
    }
}

#[tokio::test]
async fn failed_vaccinate_keeps_state_and_series() {
    for auto_play in [false, true] {
        let (fake, mut session) = live_session(auto_play).await;
        let expected = if auto_play {
            SessionState::AutoPlaying
        } else {
            SessionState::Running
        };
        assert_eq!(session.state(), expected);
        fake.failing_interventions.store(1, Ordering::SeqCst);

        let err = session.apply_vaccinate(0.1).await.unwrap_err();

        assert_eq!(failed_operation(&err), Some("vaccinate"), "{err:?}");
        assert_eq!(session.state(), expected);
        assert_eq!(session.series().len(), 2);
        assert_eq!(session.latest().map(|s| s.day), Some(1));

        // The next attempt goes through and the session carries on.
        session.apply_vaccinate(0.1).await.unwrap();
        assert_eq!(session.status(), "Vaccinated 10%");
        assert_eq!(session.state(), expected);
    }
}

#[tokio::test]
async fn reset_from_every_live_state() {
    for target in [
        SessionState::Running,
        SessionState::AutoPlaying,
        SessionState::Paused,
    ] {
        let fake = Arc::new(FakeService::default());
        let mut session = Session::new(fake, ControllerConfig::default());
        session.start(small_params()).await.unwrap();
        session.step().await.unwrap();
        if target != SessionState::Running {
            session.toggle_auto_play();
        }
        if target == SessionState::Paused {
            session.stop_auto_play();
        }
        assert_eq!(session.state(), target);

        session.reset();

        assert_eq!(session.state(), SessionState::Idle, "from {target}");
        assert!(session.series().is_empty());
        assert!(session.graph().is_empty());
        assert!(session.session_id().is_none());
        assert!(!session.is_auto_play_engaged());
        assert_eq!(session.status(), "Ready to start");
    }
}

#[tokio::test]
async fn restart_after_reset_clears_history() {
    let fake = Arc::new(FakeService::default());
    let mut session = Session::new(fake.clone(), ControllerConfig::default());
    session.start(small_params()).await.unwrap();
    session.step().await.unwrap();
    let first = session.session_id();
    session.reset();

    session.start(params()).await.unwrap();
    assert_eq!(session.series().len(), 1);
    assert_ne!(session.session_id(), first);
    assert_eq!(session.graph().node_count(), 500);
}

#[tokio::test]
async fn zero_node_snapshot_keeps_previous_graph() {
    let fake = Arc::new(FakeService::default());
    let mut session = Session::new(fake.clone(), ControllerConfig::default());
    session.start(small_params()).await.unwrap();
    fake.population.store(0, Ordering::SeqCst);
    session.step().await.unwrap();
    assert_eq!(session.graph().node_count(), 40);
    assert_eq!(session.series().len(), 2);
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn auto_play_steps_at_cadence() {
    let fake = Arc::new(FakeService::default());
    let handle = DriverHandle::spawn(Session::new(fake.clone(), ControllerConfig::default()));

    handle.send(Intent::Start(small_params())).await;
    handle.send(Intent::ToggleAutoPlay).await;
    // Cycles at 0, 500 and 1000 ms.
    tokio::time::sleep(Duration::from_millis(1250)).await;

    assert_eq!(fake.steps(), 3);
    let render = handle.current();
    assert_eq!(render.state, SessionState::AutoPlaying);
    assert_eq!(render.series.len(), 4);

    let session = handle.shutdown().await.unwrap();
    assert_eq!(session.state(), SessionState::AutoPlaying);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_step_land_then_halts() {
    let gate = Arc::new(Semaphore::new(0));
    let fake = Arc::new(FakeService::gated(gate.clone()));
    let handle = DriverHandle::spawn(Session::new(fake.clone(), ControllerConfig::default()));

    handle.send(Intent::Start(small_params())).await;
    handle.send(Intent::ToggleAutoPlay).await;
    fake.step_started.notified().await;
    assert!(handle.current().busy);

    handle.send(Intent::StopAutoPlay).await;
    gate.add_permits(1);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(fake.steps(), 1);
    let render = handle.current();
    assert_eq!(render.state, SessionState::Paused);
    assert_eq!(render.day, Some(1));
    assert!(!render.busy);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_cycle_does_not_stop_auto_play() {
    let fake = Arc::new(FakeService::default());
    fake.failing_steps.store(1, Ordering::SeqCst);
    let handle = DriverHandle::spawn(Session::new(fake.clone(), ControllerConfig::default()));

    handle.send(Intent::Start(small_params())).await;
    handle.send(Intent::ToggleAutoPlay).await;
    tokio::time::sleep(Duration::from_millis(1250)).await;

    assert_eq!(fake.steps(), 3);
    let render = handle.current();
    assert_eq!(render.state, SessionState::AutoPlaying);
    assert_eq!(render.series.len(), 3);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn queued_reset_runs_after_the_in_flight_step() {
    let gate = Arc::new(Semaphore::new(0));
    let fake = Arc::new(FakeService::gated(gate.clone()));
    let handle = DriverHandle::spawn(Session::new(fake.clone(), ControllerConfig::default()));

    handle.send(Intent::Start(small_params())).await;
    handle.send(Intent::Step).await;
    fake.step_started.notified().await;
    handle.send(Intent::Reset).await;
    gate.add_permits(1);

    let session = handle.shutdown().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.series().is_empty());
    assert!(session.graph().is_empty());
    assert_eq!(fake.steps(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_sender_stops_the_driver() {
    let fake = Arc::new(FakeService::default());
    let session = Session::new(fake, ControllerConfig::default());
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    let task = tokio::spawn(outbreak_core::driver::run(session, rx));
    tx.send(Intent::Start(small_params())).await.unwrap();
    drop(tx);
    let session = task.await.unwrap();
    assert_eq!(session.state(), SessionState::Running);
}
