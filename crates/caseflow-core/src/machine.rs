//! Grievance state machine: pure transition planning.
//!
//! The policy rules are strict and not configurable:
//! 1. A resolved case admits no further transitions (no reopen is exposed)
//! 2. Advance requires a next template; the terminal step is a hard stop
//! 3. Required narrative fields must be non-blank
//!
//! These functions decide and describe transitions; they perform no I/O.
//! The runtime engine loads state, calls a planner, persists the outcome
//! atomically, and emits the corresponding event.

use chrono::{DateTime, Utc};

use crate::deadline::compute_due_date;
use crate::registry::{StepRegistry, StepTemplate};
use crate::types::{
    CaseState, GrievanceInstance, Resolution, ResolutionKind, StepRecord,
};
use crate::{require_narrative, EngineError};

/// Planned outcome of an advance: the template entered and the new history
/// record to append.
#[derive(Debug, Clone)]
pub struct AdvancePlan {
    pub next_template: StepTemplate,
    pub step_record: StepRecord,
}

/// Plan moving a grievance to its next procedural step.
///
/// Preconditions: the case is active, the note is non-blank, and the
/// agreement defines a step after the current one. The due date of the new
/// step is computed from `now`; untimed templates (`time_limit_days == 0`)
/// get no due date rather than a meaningless same-day one.
pub fn plan_advance(
    instance: &GrievanceInstance,
    registry: &StepRegistry,
    remaining_issues_note: &str,
    now: DateTime<Utc>,
) -> Result<AdvancePlan, EngineError> {
    require_narrative("remaining issues note", remaining_issues_note)?;
    let current_step = require_active(instance)?;

    let next = registry
        .next_template(&instance.agreement_id, current_step)?
        .ok_or_else(|| EngineError::NoNextStep {
            agreement_id: instance.agreement_id.clone(),
            step_number: current_step,
        })?;

    let due_date = step_due_date(next, now)?;

    Ok(AdvancePlan {
        next_template: next.clone(),
        step_record: StepRecord {
            grievance_id: instance.id,
            step_number: next.step_number,
            stage: next.stage,
            entered_at: now,
            remaining_issues: remaining_issues_note.trim().to_string(),
            due_date,
        },
    })
}

/// Plan settling an active grievance.
pub fn plan_settlement(
    instance: &GrievanceInstance,
    settlement_details: &str,
    now: DateTime<Utc>,
) -> Result<Resolution, EngineError> {
    plan_resolution(
        instance,
        ResolutionKind::Settlement,
        "settlement details",
        settlement_details,
        now,
    )
}

/// Plan withdrawing an active grievance.
pub fn plan_withdrawal(
    instance: &GrievanceInstance,
    withdrawal_details: &str,
    now: DateTime<Utc>,
) -> Result<Resolution, EngineError> {
    plan_resolution(
        instance,
        ResolutionKind::Withdrawal,
        "withdrawal details",
        withdrawal_details,
        now,
    )
}

/// The due date for entering a template at `now`.
///
/// This owns the `time_limit_days == 0` guard: the calculator is never asked
/// for a zero-day deadline.
pub fn step_due_date(
    template: &StepTemplate,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, EngineError> {
    if template.time_limit_days == 0 {
        return Ok(None);
    }
    compute_due_date(
        now,
        i64::from(template.time_limit_days),
        template.calendar_days,
    )
    .map(Some)
}

fn plan_resolution(
    instance: &GrievanceInstance,
    kind: ResolutionKind,
    field: &str,
    details: &str,
    now: DateTime<Utc>,
) -> Result<Resolution, EngineError> {
    require_narrative(field, details)?;
    let step_number = require_active(instance)?;

    Ok(Resolution {
        kind,
        details: details.trim().to_string(),
        resolved_at: now,
        last_stage: instance.state.stage(),
        last_step_number: step_number,
    })
}

/// The current step number, or `InvalidTransition` if the case is resolved.
fn require_active(instance: &GrievanceInstance) -> Result<u32, EngineError> {
    match &instance.state {
        CaseState::Active { step_number, .. } => Ok(*step_number),
        CaseState::Resolved(res) => Err(EngineError::InvalidTransition(format!(
            "grievance {} was already resolved ({}) on {}",
            instance.id,
            res.kind.as_str(),
            res.resolved_at.date_naive()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::AgreementConfig;
    use crate::types::{AgreementId, GrievanceId, OrganizationId, Stage};
    use chrono::TimeZone;

    fn registry() -> StepRegistry {
        let yaml = r#"
agreement_id: "cba-2024"
name: "Test Agreement"
steps:
  - step_number: 1
    name: "Informal discussion"
    stage: informal
    time_limit_days: 10
  - step_number: 2
    name: "Written grievance"
    stage: formal
    time_limit_days: 5
  - step_number: 3
    name: "Arbitration referral"
    stage: arbitration
    time_limit_days: 0
"#;
        StepRegistry::from_configs([AgreementConfig::from_yaml(yaml).unwrap()]).unwrap()
    }

    fn now() -> DateTime<Utc> {
        // Mon 2025-12-01
        Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap()
    }

    fn active_grievance(step_number: u32) -> GrievanceInstance {
        let stage = match step_number {
            1 => Stage::Informal,
            2 => Stage::Formal,
            _ => Stage::Arbitration,
        };
        GrievanceInstance {
            id: GrievanceId::generate(),
            organization_id: OrganizationId::generate(),
            agreement_id: AgreementId::new("cba-2024"),
            complaint_id: None,
            statement: "Improper shift assignment".into(),
            violated_articles: vec!["Article 12.3".into()],
            settlement_desired: Some("Restore shift".into()),
            grievor_name: "J. Doe".into(),
            state: CaseState::Active { stage, step_number },
            created_at: now(),
            version: 1,
        }
    }

    fn settled_grievance() -> GrievanceInstance {
        let mut g = active_grievance(2);
        g.state = CaseState::Resolved(Resolution {
            kind: ResolutionKind::Settlement,
            details: "Paid lump sum".into(),
            resolved_at: now(),
            last_stage: Stage::Formal,
            last_step_number: 2,
        });
        g
    }

    #[test]
    fn test_advance_moves_to_next_template() {
        let plan = plan_advance(&active_grievance(1), &registry(), "Pay unresolved", now())
            .unwrap();
        assert_eq!(plan.next_template.step_number, 2);
        assert_eq!(plan.step_record.stage, Stage::Formal);
        assert_eq!(plan.step_record.remaining_issues, "Pay unresolved");
        // 5 business days from Mon 2025-12-01, skipping the weekend
        assert_eq!(
            plan.step_record.due_date.unwrap().date_naive(),
            Utc.with_ymd_and_hms(2025, 12, 8, 0, 0, 0).unwrap().date_naive()
        );
    }

    #[test]
    fn test_advance_into_untimed_step_has_no_due_date() {
        let plan =
            plan_advance(&active_grievance(2), &registry(), "Escalating", now()).unwrap();
        assert_eq!(plan.next_template.step_number, 3);
        assert!(plan.step_record.due_date.is_none());
    }

    #[test]
    fn test_advance_at_terminal_step_fails() {
        let result = plan_advance(&active_grievance(3), &registry(), "Note", now());
        assert!(matches!(result, Err(EngineError::NoNextStep { step_number: 3, .. })));
    }

    #[test]
    fn test_advance_with_blank_note_fails() {
        let result = plan_advance(&active_grievance(1), &registry(), "  ", now());
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_advance_on_resolved_case_fails() {
        let result = plan_advance(&settled_grievance(), &registry(), "Note", now());
        assert!(matches!(result, Err(EngineError::InvalidTransition(_))));
    }

    #[test]
    fn test_settlement_freezes_stage_and_step() {
        let resolution = plan_settlement(&active_grievance(2), "Paid lump sum", now()).unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Settlement);
        assert_eq!(resolution.last_stage, Stage::Formal);
        assert_eq!(resolution.last_step_number, 2);
    }

    #[test]
    fn test_no_double_resolution() {
        let settled = settled_grievance();
        assert!(matches!(
            plan_settlement(&settled, "Again", now()),
            Err(EngineError::InvalidTransition(_))
        ));
        assert!(matches!(
            plan_withdrawal(&settled, "Changed mind", now()),
            Err(EngineError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_withdrawal_requires_details() {
        let result = plan_withdrawal(&active_grievance(1), "", now());
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Walking an instance forward through successful advances yields
            /// strictly increasing step numbers that never revisit a value.
            #[test]
            fn advance_step_numbers_strictly_increase(start in 1u32..3) {
                let registry = registry();
                let mut instance = active_grievance(start);
                let mut seen = vec![instance.state.step_number()];

                while let Ok(plan) = plan_advance(&instance, &registry, "note", now()) {
                    let next = plan.next_template.step_number;
                    prop_assert!(next > *seen.last().unwrap());
                    prop_assert!(!seen.contains(&next));
                    seen.push(next);
                    instance.state = CaseState::Active {
                        stage: plan.next_template.stage,
                        step_number: next,
                    };
                }

                // Walk always terminates at the last configured step.
                prop_assert_eq!(*seen.last().unwrap(), 3);
            }
        }
    }
}
