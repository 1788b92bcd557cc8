//! Full-reference-content retrieval collaborator.
//!
//! Upstream source for guidance population: given a case's statement and its
//! violated articles, it returns the full relevant reference material (legal
//! and employment-reference text), or nothing when no material applies.
//! The search mechanics (vector index, keyword store) are the collaborator's
//! business, not the engine's.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the retrieval collaborator.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),
}

impl RetrievalError {
    /// Whether retrying the same call can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        // Both variants are infrastructure failures; the query itself is
        // never at fault.
        true
    }
}

/// Upstream reference-content source.
#[async_trait]
pub trait ReferenceRetriever: Send + Sync {
    /// Fetch the full reference content relevant to a case.
    ///
    /// `Ok(None)` means the search ran and found nothing relevant; it is a
    /// normal outcome, distinct from a failure, and callers must not cache
    /// anything for it.
    async fn retrieve(
        &self,
        statement: &str,
        articles: &[String],
    ) -> Result<Option<String>, RetrievalError>;

    /// Retriever name for metrics.
    fn name(&self) -> &str;
}
