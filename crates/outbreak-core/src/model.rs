//! Wire-level model of the remote simulation: run parameters and snapshots.
//!
//! Every remote operation answers with a [`Snapshot`]: one observation of the
//! simulated population at a given day, including the full contact graph with
//! per-node health status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Node identifier as assigned by the simulation service.
pub type NodeId = u32;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters sent on `start` and echoed on every `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub population_size: u32,
    pub initial_infected: u32,
    pub transmission_prob: f64,
    pub recovery_time: u32,
    /// Multiplier applied to `transmission_prob` by the service (1.0 = no masks).
    #[serde(default = "default_mask_multiplier")]
    pub mask_multiplier: f64,
    pub avg_degree: u32,
    pub rewire_prob: f64,
}

fn default_mask_multiplier() -> f64 {
    1.0
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            population_size: 500,
            initial_infected: 5,
            transmission_prob: 0.3,
            recovery_time: 14,
            mask_multiplier: default_mask_multiplier(),
            avg_degree: 6,
            rewire_prob: 0.1,
        }
    }
}

impl SimulationParameters {
    /// Local precondition check run before any remote call.
    ///
    /// Only the relation between the initially infected and the population is
    /// checked here; ranges of the probabilities are the service's business.
    pub fn validate(&self) -> ControlResult<()> {
        if self.initial_infected > self.population_size {
            return Err(ControlError::Validation(format!(
                "Initial infected ({}) cannot exceed population size ({})",
                self.initial_infected, self.population_size
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Health compartment of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Susceptible,
    Infected,
    Recovered,
    /// Any status string this client does not know about. Drawn in grey.
    #[serde(other)]
    Unknown,
}

impl NodeStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Susceptible => "susceptible",
            Self::Infected => "infected",
            Self::Recovered => "recovered",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compartment counts. Signed on purpose: malformed upstream data is clamped
/// by the series buffer rather than rejected at decode time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompartmentStats {
    #[serde(default)]
    pub susceptible: i64,
    #[serde(default)]
    pub infected: i64,
    #[serde(default)]
    pub recovered: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
}

/// One observation of the simulation at a given day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub day: u32,
    #[serde(default)]
    pub stats: CompartmentStats,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Snapshot {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
