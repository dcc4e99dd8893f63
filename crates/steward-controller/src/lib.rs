//! steward-controller — the autonomous optimization loop.
//!
//! One cycle:
//!
//! ```text
//! observe ─→ analyze ─→ detect ─→ propose ─→ gate ─→ execute ─→ verify
//!                                              │                   │
//!                                           blocked /         failure →
//!                                           deferred           rollback
//!                                              │                   │
//!                                              └────── ledger ─────┘
//! ```
//!
//! The [`Controller`] owns the single canonical cycle path; the interval
//! timer and manual triggers both funnel into it, and a mutex guard
//! guarantees cycles never interleave. Every completed cycle appends
//! exactly one decision to the ledger, and observers follow along on the
//! broadcast [`EventBus`].

pub mod controller;
pub mod events;

pub use controller::{
    Controller, ControllerBuilder, ControllerError, ControllerHandle, ControllerStatus,
    CycleOutcome,
};
pub use events::EventBus;
pub use steward_executor::CyclePhase;
