//! # outbreak-core
//!
//! Client-side controller for a step-driven epidemic simulation service.
//!
//! The service owns the disease model and the contact network; this crate
//! owns everything on the dashboard side of the wire: which requests are legal
//! when, how auto-play paces itself, what the compartment chart shows, and how
//! the contact graph is kept on screen without relaying it out every day.
//!
//! ## Quick Start
//!
//! ```no_run
//! use outbreak_core::{ControllerConfig, HttpBackend, Session, SimulationParameters};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::default();
//! let backend = HttpBackend::new(&config.base_url, config.request_timeout)?;
//! let mut session = Session::new(backend, config);
//!
//! session.start(SimulationParameters::default()).await?;
//! for _ in 0..10 {
//!     session.step().await?;
//! }
//! print!("{}", session.series().to_csv());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! UI intents → [`driver`] task → [`Session`] → [`SimulationBackend`]
//!
//! Every snapshot the service returns is appended to the [`SeriesBuffer`],
//! reconciled into the [`GraphView`] and republished as a [`RenderState`].
//! The [`AutoPlay`] scheduler is a timer the driver waits on, never a second
//! caller, so at most one request is in flight at any time.

pub mod autoplay;
pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod layout;
pub mod model;
pub mod series;
pub mod session;

pub use autoplay::{AutoPlay, DEFAULT_CADENCE};
pub use backend::{HttpBackend, SimulationBackend};
pub use config::ControllerConfig;
pub use driver::{DriverHandle, Intent};
pub use error::{BackendError, BackendResult, ControlError, ControlResult, RejectionDetail};
pub use graph::{FrameNode, GraphFrame, GraphView, Reconciliation};
pub use layout::{ForceLayout, LayoutParams, Viewport};
pub use model::{CompartmentStats, Link, Node, NodeId, NodeStatus, SimulationParameters, Snapshot};
pub use series::{DEFAULT_WINDOW, SeriesBuffer, SeriesPoint};
pub use session::{Outcome, RenderState, Session, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
