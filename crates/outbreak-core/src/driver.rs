//! The control task.
//!
//! One task owns the [`Session`] and is the only place remote calls are made
//! from. It waits on three things at once: the next user intent, the
//! auto-play timer and (while the graph is settling) the layout ticker.
//! Whatever wins is run to completion before anything else is looked at, so
//! requests never overlap and intents that arrive meanwhile simply queue.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::backend::SimulationBackend;
use crate::error::ControlResult;
use crate::model::SimulationParameters;
use crate::session::{Outcome, RenderState, Session};

/// Queue depth between the UI and the control task.
pub const INTENT_QUEUE: usize = 32;

/// A user request for the control task.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Start(SimulationParameters),
    Step,
    ToggleAutoPlay,
    StopAutoPlay,
    Lockdown(f64),
    Vaccinate(f64),
    Reset,
    Shutdown,
}

/// Drive `session` until [`Intent::Shutdown`] arrives or every sender is
/// dropped. Returns the session for inspection.
pub async fn run<B: SimulationBackend>(
    mut session: Session<B>,
    mut intents: mpsc::Receiver<Intent>,
) -> Session<B> {
    let mut layout_ticker = interval(session.config().layout_tick.max(Duration::from_millis(1)));
    layout_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let settling = session.is_layout_active();
        tokio::select! {
            biased;

            intent = intents.recv() => match intent {
                None | Some(Intent::Shutdown) => break,
                Some(intent) => {
                    // Errors are already in the status line and the log.
                    let _ = dispatch(&mut session, intent).await;
                }
            },

            _ = session.next_auto_play_cycle() => {
                let _ = session.run_auto_play_cycle().await;
            }

            _ = layout_ticker.tick(), if settling => {
                session.tick_layout();
            }
        }
    }

    log::debug!("driver: stopped");
    session
}

async fn dispatch<B: SimulationBackend>(
    session: &mut Session<B>,
    intent: Intent,
) -> ControlResult<Outcome> {
    log::debug!("driver: {intent:?}");
    match intent {
        Intent::Start(params) => session.start(params).await,
        Intent::Step => session.step().await,
        Intent::ToggleAutoPlay => Ok(session.toggle_auto_play()),
        Intent::StopAutoPlay => Ok(session.stop_auto_play()),
        Intent::Lockdown(strength) => session.apply_lockdown(strength).await,
        Intent::Vaccinate(fraction) => session.apply_vaccinate(fraction).await,
        Intent::Reset => Ok(session.reset()),
        Intent::Shutdown => Ok(Outcome::Ignored),
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Sending side of a spawned control task.
pub struct DriverHandle<B> {
    intents: mpsc::Sender<Intent>,
    render: watch::Receiver<RenderState>,
    task: JoinHandle<Session<B>>,
}

impl<B: SimulationBackend + 'static> DriverHandle<B> {
    /// Spawn the control task on the current runtime.
    pub fn spawn(session: Session<B>) -> Self {
        Self::spawn_on(session, &Handle::current())
    }

    /// Spawn the control task on `runtime`; callable from outside it.
    pub fn spawn_on(session: Session<B>, runtime: &Handle) -> Self {
        let (intents, rx) = mpsc::channel(INTENT_QUEUE);
        let render = session.subscribe();
        let task = runtime.spawn(run(session, rx));
        Self {
            intents,
            render,
            task,
        }
    }

    /// Queue an intent without waiting. Returns `false` if the queue is full
    /// or the task has stopped.
    pub fn submit(&self, intent: Intent) -> bool {
        match self.intents.try_send(intent) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("driver: intent dropped ({err})");
                false
            }
        }
    }

    /// Queue an intent, waiting for room. Returns `false` if the task has
    /// stopped.
    pub async fn send(&self, intent: Intent) -> bool {
        self.intents.send(intent).await.is_ok()
    }

    /// Another sender into the intent queue.
    pub fn intents(&self) -> mpsc::Sender<Intent> {
        self.intents.clone()
    }

    /// A receiver of render states, independent of this handle's.
    pub fn render(&self) -> watch::Receiver<RenderState> {
        self.render.clone()
    }

    /// Latest published render state.
    pub fn current(&self) -> RenderState {
        self.render.borrow().clone()
    }

    /// Stop the task and hand back the session. `None` if the task panicked.
    pub async fn shutdown(self) -> Option<Session<B>> {
        let _ = self.intents.send(Intent::Shutdown).await;
        self.task.await.ok()
    }
}
