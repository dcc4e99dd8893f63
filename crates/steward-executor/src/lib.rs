//! steward-executor — applies approved proposals to the live system.
//!
//! Per-cycle state machine:
//!
//! ```text
//! Idle → Analyzing → Proposing → Gating → Executing → Verifying
//!                                             │            │
//!                                             │       success → Idle
//!                                             │
//!                                         failure → RollingBack → Idle
//! ```
//!
//! The executor captures a pre-change [`steward_core::Snapshot`] keyed by
//! the decision id, applies the proposal through the external topology
//! mutator, and hands off to the verifier. On verification failure the
//! rollback manager restores the snapshot and confirms the restoration;
//! an unconfirmed restoration is a critical, non-retried error. Every
//! branch terminates back at Idle.

pub mod cycle;
pub mod executor;
pub mod rollback;
pub mod verifier;

pub use cycle::CyclePhase;
pub use executor::{ChangeResult, Executor, PhaseHook};
pub use rollback::{RollbackError, RollbackManager};
pub use verifier::{Verifier, VerifyOutcome};
