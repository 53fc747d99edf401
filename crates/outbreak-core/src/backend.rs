//! Remote simulation service.
//!
//! The service is an opaque collaborator with four operations, each answering
//! with a [`Snapshot`]. [`SimulationBackend`] is the seam the session is
//! written against; [`HttpBackend`] talks JSON over HTTP:
//!
//! | operation | request                             |
//! |-----------|-------------------------------------|
//! | start     | `POST /start` with parameters body  |
//! | step      | `POST /step` with parameters body   |
//! | lockdown  | `POST /lockdown?strength=<x>`       |
//! | vaccinate | `POST /vaccinate?fraction=<x>`      |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BackendError, BackendResult, RejectionDetail};
use crate::model::{SimulationParameters, Snapshot};

/// Operations the simulation service offers.
pub trait SimulationBackend: Send + Sync {
    fn start(
        &self,
        params: &SimulationParameters,
    ) -> impl Future<Output = BackendResult<Snapshot>> + Send;

    /// Advance one day. The service expects the session's parameters again.
    fn step(
        &self,
        params: &SimulationParameters,
    ) -> impl Future<Output = BackendResult<Snapshot>> + Send;

    fn lockdown(&self, strength: f64) -> impl Future<Output = BackendResult<Snapshot>> + Send;

    fn vaccinate(&self, fraction: f64) -> impl Future<Output = BackendResult<Snapshot>> + Send;
}

impl<T: SimulationBackend> SimulationBackend for Arc<T> {
    fn start(
        &self,
        params: &SimulationParameters,
    ) -> impl Future<Output = BackendResult<Snapshot>> + Send {
        (**self).start(params)
    }

    fn step(
        &self,
        params: &SimulationParameters,
    ) -> impl Future<Output = BackendResult<Snapshot>> + Send {
        (**self).step(params)
    }

    fn lockdown(&self, strength: f64) -> impl Future<Output = BackendResult<Snapshot>> + Send {
        (**self).lockdown(strength)
    }

    fn vaccinate(&self, fraction: f64) -> impl Future<Output = BackendResult<Snapshot>> + Send {
        (**self).vaccinate(fraction)
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// JSON-over-HTTP client for the simulation service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client for `base_url`. `timeout` bounds each request.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> BackendResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> BackendResult<Snapshot> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                detail: RejectionDetail::from_body(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl SimulationBackend for HttpBackend {
    async fn start(&self, params: &SimulationParameters) -> BackendResult<Snapshot> {
        log::debug!("POST {}/start", self.base_url);
        self.send(self.client.post(self.url("/start")).json(params))
            .await
    }

    async fn step(&self, params: &SimulationParameters) -> BackendResult<Snapshot> {
        self.send(self.client.post(self.url("/step")).json(params))
            .await
    }

    async fn lockdown(&self, strength: f64) -> BackendResult<Snapshot> {
        log::debug!("POST {}/lockdown?strength={strength}", self.base_url);
        self.send(
            self.client
                .post(self.url("/lockdown"))
                .query(&[("strength", strength)]),
        )
        .await
    }

    async fn vaccinate(&self, fraction: f64) -> BackendResult<Snapshot> {
        log::debug!("POST {}/vaccinate?fraction={fraction}", self.base_url);
        self.send(
            self.client
                .post(self.url("/vaccinate"))
                .query(&[("fraction", fraction)]),
        )
        .await
    }
}
