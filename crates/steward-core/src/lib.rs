//! steward-core — shared domain model for the Steward control loop.
//!
//! Defines the types that flow through one optimization cycle (metrics,
//! topology, profiles, opportunities, proposals, snapshots, decisions),
//! the collaborator contracts the loop consumes (metrics, topology,
//! mutation, budget), the event vocabulary published on the notification
//! bus, and the cycle configuration.
//!
//! Everything here is data or a trait boundary; the cycle logic lives in
//! the analyzer, engine, executor, and controller crates.

pub mod config;
pub mod error;
pub mod events;
pub mod providers;
pub mod types;

pub use config::{ControlConfig, SafetyThresholds};
pub use error::{ProviderError, ProviderResult};
pub use events::ControlEvent;
pub use providers::{
    ApplyReport, BudgetProvider, BudgetStatus, MetricsProvider, RestoreReport, TopologyMutator,
    TopologyProvider,
};
pub use types::*;
pub use uuid::Uuid;
