//! steward-engine — turns opportunities into gated, executable proposals.
//!
//! [`proposals::generate`] maps each detected opportunity to exactly one
//! typed proposal, adds independent error-rate and right-sizing triggers,
//! scores confidence from the triggering metric's magnitude, and filters
//! by the configured confidence threshold.
//!
//! [`gate::validate`] then checks an individual proposal against the
//! stability, resource-delta, availability, and critical-service
//! invariants. Nothing reaches the topology mutator without an
//! `Approved` verdict.

pub mod gate;
pub mod proposals;

pub use gate::{GateVerdict, validate};
pub use proposals::generate;
