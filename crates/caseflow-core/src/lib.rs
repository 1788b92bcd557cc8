//! # caseflow-core
//!
//! Deterministic grievance lifecycle engine.
//!
//! This crate provides the rule layer of Caseflow, answering:
//! - May this case move to its next procedural step, and when is it due?
//! - May this case be settled or withdrawn right now?
//! - What does elevating a complaint into a grievance look like?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No I/O**: Persistence and upstream collaborators live in `caseflow-runtime`
//! 3. **Frozen history**: A resolved case cannot be mutated; the type system
//!    enforces it (see [`CaseState`])
//! 4. **Single ordering key**: Step numbers order the procedure; stage is
//!    derived template metadata
//!
//! ## Example
//!
//! ```rust,ignore
//! use caseflow_core::{AgreementConfig, StepRegistry, machine};
//!
//! let config = AgreementConfig::from_yaml_file("agreement.yaml")?;
//! let registry = StepRegistry::from_configs([config])?;
//!
//! let plan = machine::plan_advance(&grievance, &registry, "Pay issue unresolved", now)?;
//! println!("next step {} due {:?}", plan.next.step_number, plan.due_date);
//! ```

pub mod agreement;
pub mod deadline;
pub mod event;
pub mod machine;
pub mod registry;
pub mod topics;
pub mod types;

// Re-export main types at crate root
pub use agreement::{AgreementConfig, AgreementError, StepTemplateConfig};
pub use event::{EventKind, GrievanceEvent};
pub use registry::{StepRegistry, StepTemplate};
pub use types::{
    ActorContext, AgreementId, CaseState, CaseStatus, Complaint, ComplaintId, ComplaintStatus,
    GrievanceId, GrievanceInstance, GuidanceEntry, OrganizationId, Resolution, ResolutionKind,
    Role, Stage, StepRecord,
};

use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Every public operation in caseflow returns one of these; nothing is thrown
/// past the engine boundary. Callers branch on [`EngineError::kind`] and render
/// [`EngineError::user_message`] to end users.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A required narrative field was missing or blank.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not allowed in the case's current state,
    /// including double-resolution and lost concurrent races.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Advance was attempted at the final step of the agreement's procedure.
    #[error("no step follows step {step_number} in agreement {agreement_id}")]
    NoNextStep {
        agreement_id: AgreementId,
        step_number: u32,
    },

    /// Unknown grievance, complaint, agreement, or template.
    #[error("not found: {0}")]
    NotFound(String),

    /// The text-generation or retrieval collaborator failed or timed out.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A calculator input violated its contract (e.g. negative day count).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The actor's role does not permit this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Classification of an [`EngineError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    NoNextStep,
    NotFound,
    UpstreamUnavailable,
    InvalidArgument,
    Forbidden,
}

impl EngineError {
    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            EngineError::NoNextStep { .. } => ErrorKind::NoNextStep,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }

    /// Whether a caller-initiated retry can ever succeed.
    ///
    /// Only upstream failures are transient; state-transition errors are
    /// logically invalid and retrying them cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::UpstreamUnavailable(_))
    }

    /// Operator-facing guidance for rendering in views.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Validation(msg) => msg.clone(),
            EngineError::InvalidTransition(_) => {
                "This case has already been resolved and can no longer be changed.".to_string()
            }
            EngineError::NoNextStep { .. } => {
                "No further steps are defined in this agreement's grievance procedure.".to_string()
            }
            EngineError::NotFound(_) => "The requested case could not be found.".to_string(),
            EngineError::UpstreamUnavailable(_) => {
                "Reference guidance is temporarily unavailable. The case itself is unaffected."
                    .to_string()
            }
            EngineError::InvalidArgument(msg) => msg.clone(),
            EngineError::Forbidden(_) => {
                "Your role does not permit this action on the case.".to_string()
            }
        }
    }
}

/// Reject a blank required narrative field.
///
/// The step note, settlement details, and withdrawal details are all
/// mandatory prose; whitespace-only input is treated as missing.
pub(crate) fn require_narrative(field: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!(
            "{} is required and cannot be blank",
            field
        )));
    }
    Ok(())
}
