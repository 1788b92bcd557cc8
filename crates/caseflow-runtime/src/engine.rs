//! Grievance engine operations.
//!
//! The four public operations of the lifecycle engine: advance a case to its
//! next step, settle it, withdraw it, and elevate a complaint into a new
//! case. Each operation:
//! 1. Checks the actor's role and tenant scope
//! 2. Loads current state from the repository
//! 3. Plans the transition with the pure state machine in caseflow-core
//! 4. Persists the outcome under an optimistic version check
//! 5. Emits the transition event after the write commits
//!
//! A lost version race surfaces as `InvalidTransition`: the precondition the
//! planner checked no longer holds, and state-transition errors are never
//! retried automatically.

use chrono::Utc;
use std::sync::Arc;

use caseflow_core::{
    machine, ActorContext, AgreementId, CaseState, Complaint, ComplaintId, ComplaintStatus,
    EngineError, EventKind, GrievanceEvent, GrievanceId, GrievanceInstance, Resolution,
    StepRecord, StepRegistry,
};

use crate::events::EventSink;
use crate::repository::{GrievanceRepository, RepositoryError};

/// Result of elevating a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elevation {
    pub grievance_id: GrievanceId,
    /// False when the complaint had already been elevated; the existing id
    /// is returned and nothing is written or emitted.
    pub is_new: bool,
}

/// Request to file a grievance directly, without an originating complaint.
#[derive(Debug, Clone)]
pub struct FilingRequest {
    pub agreement_id: AgreementId,
    pub statement: String,
    pub violated_articles: Vec<String>,
    pub settlement_desired: Option<String>,
    pub grievor_name: String,
}

/// The grievance lifecycle engine.
pub struct GrievanceEngine<R> {
    repository: Arc<R>,
    registry: Arc<StepRegistry>,
    sink: Arc<dyn EventSink>,
}

impl<R: GrievanceRepository> GrievanceEngine<R> {
    pub fn new(repository: Arc<R>, registry: Arc<StepRegistry>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            repository,
            registry,
            sink,
        }
    }

    /// Move an active grievance to the next step of its procedure.
    ///
    /// The note records which issues remain unresolved and is required.
    pub async fn advance_step(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
        remaining_issues_note: &str,
    ) -> Result<GrievanceInstance, EngineError> {
        require_transition_role(actor)?;
        let instance = self.load_scoped(actor, grievance_id).await?;

        let now = Utc::now();
        let plan = machine::plan_advance(&instance, &self.registry, remaining_issues_note, now)?;
        let from_step = instance.state.step_number();

        let mut updated = instance.clone();
        updated.state = CaseState::Active {
            stage: plan.next_template.stage,
            step_number: plan.next_template.step_number,
        };
        updated.version = instance.version + 1;

        let due_date = plan.step_record.due_date;
        self.repository
            .update_grievance(updated.clone(), instance.version, Some(plan.step_record))
            .await
            .map_err(map_repository_error)?;

        tracing::info!(
            grievance_id = %grievance_id,
            from_step,
            to_step = plan.next_template.step_number,
            "grievance advanced"
        );

        self.sink.emit(GrievanceEvent::new(
            grievance_id,
            now,
            EventKind::Advanced {
                from_step,
                to_step: plan.next_template.step_number,
                stage: plan.next_template.stage,
                note: remaining_issues_note.trim().to_string(),
                due_date,
            },
        ));

        Ok(updated)
    }

    /// Settle an active grievance.
    pub async fn settle(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
        settlement_details: &str,
    ) -> Result<GrievanceInstance, EngineError> {
        require_transition_role(actor)?;
        let instance = self.load_scoped(actor, grievance_id).await?;

        let now = Utc::now();
        let resolution = machine::plan_settlement(&instance, settlement_details, now)?;
        let details = resolution.details.clone();

        let updated = self.resolve(instance, resolution).await?;

        tracing::info!(grievance_id = %grievance_id, "grievance settled");
        self.sink.emit(GrievanceEvent::new(
            grievance_id,
            now,
            EventKind::Settled { details },
        ));

        Ok(updated)
    }

    /// Withdraw an active grievance.
    pub async fn withdraw(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
        withdrawal_details: &str,
    ) -> Result<GrievanceInstance, EngineError> {
        require_transition_role(actor)?;
        let instance = self.load_scoped(actor, grievance_id).await?;

        let now = Utc::now();
        let resolution = machine::plan_withdrawal(&instance, withdrawal_details, now)?;
        let details = resolution.details.clone();

        let updated = self.resolve(instance, resolution).await?;

        tracing::info!(grievance_id = %grievance_id, "grievance withdrawn");
        self.sink.emit(GrievanceEvent::new(
            grievance_id,
            now,
            EventKind::Withdrawn { details },
        ));

        Ok(updated)
    }

    /// Elevate a complaint into a grievance.
    ///
    /// Idempotent on complaint identity: a second call returns the existing
    /// grievance id with `is_new = false` and writes nothing. The grievance
    /// insert and the complaint status update commit atomically.
    pub async fn elevate_from_complaint(
        &self,
        actor: &ActorContext,
        complaint_id: ComplaintId,
    ) -> Result<Elevation, EngineError> {
        require_transition_role(actor)?;

        let complaint = self
            .repository
            .complaint(complaint_id)
            .await
            .map_err(map_repository_error)?
            .filter(|c| c.organization_id == actor.organization_id)
            .ok_or_else(|| EngineError::NotFound(format!("complaint {}", complaint_id)))?;

        if let Some(existing) = self
            .repository
            .grievance_for_complaint(complaint_id)
            .await
            .map_err(map_repository_error)?
        {
            return Ok(Elevation {
                grievance_id: existing.id,
                is_new: false,
            });
        }

        let now = Utc::now();
        let (grievance, first_step) = self.new_instance_from(&complaint, now)?;
        let grievance_id = grievance.id;

        let mut grieved = complaint;
        grieved.status = ComplaintStatus::Grieved;

        match self
            .repository
            .elevate_complaint(grieved, grievance, first_step)
            .await
        {
            Ok(()) => {}
            // Lost a concurrent elevation race: converge on the winner's id.
            Err(RepositoryError::Constraint(_)) => {
                let existing = self
                    .repository
                    .grievance_for_complaint(complaint_id)
                    .await
                    .map_err(map_repository_error)?
                    .ok_or_else(|| {
                        EngineError::NotFound(format!(
                            "grievance for complaint {}",
                            complaint_id
                        ))
                    })?;
                return Ok(Elevation {
                    grievance_id: existing.id,
                    is_new: false,
                });
            }
            Err(e) => return Err(map_repository_error(e)),
        }

        tracing::info!(
            complaint_id = %complaint_id,
            grievance_id = %grievance_id,
            "complaint elevated to grievance"
        );

        self.sink.emit(GrievanceEvent::new(
            grievance_id,
            now,
            EventKind::Elevated { complaint_id },
        ));

        Ok(Elevation {
            grievance_id,
            is_new: true,
        })
    }

    /// File a grievance directly, without an originating complaint.
    pub async fn file_grievance(
        &self,
        actor: &ActorContext,
        request: FilingRequest,
    ) -> Result<GrievanceInstance, EngineError> {
        require_transition_role(actor)?;

        let now = Utc::now();
        let first = self.registry.first_template(&request.agreement_id)?;
        let due_date = machine::step_due_date(first, now)?;

        let id = GrievanceId::generate();
        let instance = GrievanceInstance {
            id,
            organization_id: actor.organization_id,
            agreement_id: request.agreement_id,
            complaint_id: None,
            statement: request.statement,
            violated_articles: request.violated_articles,
            settlement_desired: request.settlement_desired,
            grievor_name: request.grievor_name,
            state: CaseState::Active {
                stage: first.stage,
                step_number: first.step_number,
            },
            created_at: now,
            version: 1,
        };
        let first_step = StepRecord {
            grievance_id: id,
            step_number: first.step_number,
            stage: first.stage,
            entered_at: now,
            remaining_issues: String::new(),
            due_date,
        };

        self.repository
            .insert_grievance(instance.clone(), first_step)
            .await
            .map_err(map_repository_error)?;

        tracing::info!(grievance_id = %id, "grievance filed");
        Ok(instance)
    }

    /// A grievance visible to this actor, or NotFound.
    ///
    /// Tenant scoping reports foreign cases as NotFound rather than
    /// Forbidden so case ids cannot be probed across organizations.
    pub async fn load_scoped(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
    ) -> Result<GrievanceInstance, EngineError> {
        self.repository
            .grievance(grievance_id)
            .await
            .map_err(map_repository_error)?
            .filter(|g| g.organization_id == actor.organization_id)
            .ok_or_else(|| EngineError::NotFound(format!("grievance {}", grievance_id)))
    }

    async fn resolve(
        &self,
        instance: GrievanceInstance,
        resolution: Resolution,
    ) -> Result<GrievanceInstance, EngineError> {
        let mut updated = instance.clone();
        updated.state = CaseState::Resolved(resolution);
        updated.version = instance.version + 1;

        self.repository
            .update_grievance(updated.clone(), instance.version, None)
            .await
            .map_err(map_repository_error)?;

        Ok(updated)
    }

    fn new_instance_from(
        &self,
        complaint: &Complaint,
        now: chrono::DateTime<Utc>,
    ) -> Result<(GrievanceInstance, StepRecord), EngineError> {
        let first = self.registry.first_template(&complaint.agreement_id)?;
        let due_date = machine::step_due_date(first, now)?;

        let id = GrievanceId::generate();
        let instance = GrievanceInstance {
            id,
            organization_id: complaint.organization_id,
            agreement_id: complaint.agreement_id.clone(),
            complaint_id: Some(complaint.id),
            statement: complaint.statement.clone(),
            violated_articles: complaint.violated_articles.clone(),
            settlement_desired: complaint.settlement_desired.clone(),
            grievor_name: complaint.grievor_name.clone(),
            state: CaseState::Active {
                stage: first.stage,
                step_number: first.step_number,
            },
            created_at: now,
            version: 1,
        };
        let step = StepRecord {
            grievance_id: id,
            step_number: first.step_number,
            stage: first.stage,
            entered_at: now,
            remaining_issues: String::new(),
            due_date,
        };
        Ok((instance, step))
    }
}

fn require_transition_role(actor: &ActorContext) -> Result<(), EngineError> {
    if !actor.role.may_transition() {
        return Err(EngineError::Forbidden(format!(
            "role {:?} cannot execute case transitions",
            actor.role
        )));
    }
    Ok(())
}

/// Map persistence failures onto the engine taxonomy.
///
/// A version conflict means a concurrent transition invalidated the checked
/// precondition, so it surfaces as InvalidTransition (never auto-retried).
fn map_repository_error(err: RepositoryError) -> EngineError {
    match err {
        RepositoryError::Conflict { grievance_id, .. } => EngineError::InvalidTransition(format!(
            "grievance {} was modified concurrently; reload and retry the action if still valid",
            grievance_id
        )),
        RepositoryError::MissingRow(what) => EngineError::NotFound(what),
        RepositoryError::Constraint(msg) => EngineError::InvalidTransition(msg),
        RepositoryError::Backend(msg) => EngineError::UpstreamUnavailable(msg),
    }
}
