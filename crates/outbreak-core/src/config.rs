//! Controller configuration.

use std::time::Duration;

use crate::autoplay::DEFAULT_CADENCE;
use crate::layout::{LayoutParams, Viewport};
use crate::series::DEFAULT_WINDOW;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Layout tick period while the graph is settling (~60 Hz).
pub const DEFAULT_LAYOUT_TICK: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Root URL of the simulation service, without a trailing slash.
    pub base_url: String,
    /// Days kept in the rolling series.
    pub window: usize,
    /// Delay between auto-play steps.
    pub cadence: Duration,
    /// Client-side timeout per request. `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub viewport: Viewport,
    pub layout: LayoutParams,
    pub layout_tick: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            window: DEFAULT_WINDOW,
            cadence: DEFAULT_CADENCE,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            viewport: Viewport::default(),
            layout: LayoutParams::default(),
            layout_tick: DEFAULT_LAYOUT_TICK,
        }
    }
}

impl ControllerConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Timeout in whole seconds; `0` disables it.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }
}
