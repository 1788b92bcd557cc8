//! # caseflow-runtime
//!
//! Async runtime for the grievance lifecycle engine.
//!
//! `caseflow-core` decides; this crate executes. It provides:
//! - The repository seam ([`GrievanceRepository`]) with an in-memory
//!   implementation for tests and embedding
//! - The four public engine operations ([`GrievanceEngine`]): advance,
//!   settle, withdraw, elevate-from-complaint
//! - The discipline-guidance cache service ([`GuidanceService`]) and its
//!   population pipeline over the retrieval and text-generation collaborators
//! - Event emission ([`EventSink`])
//!
//! ## Important
//!
//! Every operation runs to completion on the calling task; the only
//! suspension points are repository and upstream collaborator calls. State
//! transitions on one grievance are serialized by the repository's version
//! check; operations on different grievances are fully independent.
//!
//! ## Example
//!
//! ```rust,ignore
//! use caseflow_runtime::{GrievanceEngine, InMemoryRepository, InMemoryEventSink};
//!
//! let engine = GrievanceEngine::new(repo, registry, sink);
//! let elevation = engine.elevate_from_complaint(&actor, complaint_id).await?;
//! engine.advance_step(&actor, elevation.grievance_id, "Pay issue unresolved").await?;
//! ```

pub mod config;
pub mod engine;
pub mod events;
pub mod guidance;
pub mod providers;
pub mod repository;
pub mod resilience;
pub mod retrieval;

// Re-export main types at crate root
pub use config::{GuidanceConfig, RuntimeConfig};
pub use engine::{Elevation, FilingRequest, GrievanceEngine};
pub use events::{EventSink, InMemoryEventSink, TracingEventSink};
pub use guidance::{CaseFacts, GuidanceOutcome, GuidanceService};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, ProviderError, TextGenerator, TokenUsage,
};
pub use repository::{GrievanceRepository, InMemoryRepository, RepositoryError};
pub use retrieval::{ReferenceRetriever, RetrievalError};
