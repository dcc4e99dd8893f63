//! Collaborator error types.

use thiserror::Error;

/// Errors surfaced by external collaborators (metrics, topology, budget).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Fetch failed for a transient reason. The cycle aborts cleanly and
    /// the next interval retries; never escalated.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// The mutator refused or failed to apply a change.
    #[error("mutation failed: {0}")]
    Mutation(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
