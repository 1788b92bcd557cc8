//! Core data model for the grievance lifecycle engine.
//!
//! A grievance is either `Active` at a numbered step of its agreement's
//! procedure, or `Resolved` with a frozen record of how and where it ended.
//! That shape is the central invariant: resolution data exists exactly when
//! the case is no longer active, and the stage/step of a resolved case are
//! read-only history inside [`Resolution`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id! {
    /// Identity of one grievance case.
    GrievanceId
}

uuid_id! {
    /// Identity of a complaint, the record a grievance may be elevated from.
    ComplaintId
}

uuid_id! {
    /// Identity of a tenant organization.
    OrganizationId
}

/// Identity of a collective agreement's grievance procedure configuration.
///
/// A stable slug (e.g. `cba-2024-local-417`), not a surrogate key, because
/// agreement configuration is authored by humans and referenced from files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(String);

impl AgreementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Actor context
// ============================================================================

/// Role of the acting user within their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Rank-and-file member; read-only access to cases.
    Member,
    /// Union representative or steward; may drive case transitions.
    Representative,
    /// Organization administrator.
    Administrator,
}

impl Role {
    /// Whether this role may execute state transitions and elevations.
    pub fn may_transition(&self) -> bool {
        matches!(self, Role::Representative | Role::Administrator)
    }
}

/// Explicit per-call context: who is acting, for which tenant.
///
/// Passed into every operation instead of being read from ambient session
/// state, so transition logic is testable without simulating a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub organization_id: OrganizationId,
    pub role: Role,
}

impl ActorContext {
    pub fn new(organization_id: OrganizationId, role: Role) -> Self {
        Self {
            organization_id,
            role,
        }
    }
}

// ============================================================================
// Stage and case state
// ============================================================================

/// Coarse phase of the grievance process, attached to each step template.
///
/// Never used for ordering decisions; step numbers are the sole ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Informal,
    Formal,
    Arbitration,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Informal => "informal",
            Stage::Formal => "formal",
            Stage::Arbitration => "arbitration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a case reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionKind {
    Settlement,
    Withdrawal,
    Arbitration,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Settlement => "SETTLEMENT",
            ResolutionKind::Withdrawal => "WITHDRAWAL",
            ResolutionKind::Arbitration => "ARBITRATION",
        }
    }
}

/// Terminal-resolution record. Exists exactly when a case is no longer active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub kind: ResolutionKind,
    /// Narrative details (settlement terms, withdrawal reason, award summary).
    pub details: String,
    pub resolved_at: DateTime<Utc>,
    /// Stage the case held when resolved; read-only history.
    pub last_stage: Stage,
    /// Step the case held when resolved; read-only history.
    pub last_step_number: u32,
}

/// Lifecycle state of a grievance.
///
/// The sum type makes "frozen once terminal" a compile-time shape: there is
/// no current step to mutate on a resolved case, and no resolution data on an
/// active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseState {
    Active { stage: Stage, step_number: u32 },
    Resolved(Resolution),
}

impl CaseState {
    pub fn is_active(&self) -> bool {
        matches!(self, CaseState::Active { .. })
    }

    /// Current stage for an active case, last-held stage for a resolved one.
    pub fn stage(&self) -> Stage {
        match self {
            CaseState::Active { stage, .. } => *stage,
            CaseState::Resolved(res) => res.last_stage,
        }
    }

    /// Current step for an active case, last-held step for a resolved one.
    pub fn step_number(&self) -> u32 {
        match self {
            CaseState::Active { step_number, .. } => *step_number,
            CaseState::Resolved(res) => res.last_step_number,
        }
    }

    /// Flat status label for views and reports.
    pub fn status(&self) -> CaseStatus {
        match self {
            CaseState::Active { .. } => CaseStatus::Active,
            CaseState::Resolved(res) => match res.kind {
                ResolutionKind::Settlement => CaseStatus::Settled,
                ResolutionKind::Withdrawal => CaseStatus::Withdrawn,
                ResolutionKind::Arbitration => CaseStatus::ResolvedArbitration,
            },
        }
    }
}

/// Flat projection of [`CaseState`] for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Active,
    Settled,
    Withdrawn,
    ResolvedArbitration,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaseStatus::Active => "ACTIVE",
            CaseStatus::Settled => "SETTLED",
            CaseStatus::Withdrawn => "WITHDRAWN",
            CaseStatus::ResolvedArbitration => "RESOLVED_ARBITRATION",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Grievance instance and step history
// ============================================================================

/// One grievance case. Mutated only by the state machine; never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrievanceInstance {
    pub id: GrievanceId,
    pub organization_id: OrganizationId,
    pub agreement_id: AgreementId,
    /// Originating complaint, when the case was created by elevation.
    pub complaint_id: Option<ComplaintId>,
    /// The grievor's statement of the facts.
    pub statement: String,
    /// Agreement articles alleged to be violated.
    pub violated_articles: Vec<String>,
    /// Remedy the grievor is seeking, if stated.
    pub settlement_desired: Option<String>,
    pub grievor_name: String,
    pub state: CaseState,
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency version; bumped on every state mutation.
    pub version: u64,
}

impl GrievanceInstance {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn status(&self) -> CaseStatus {
        self.state.status()
    }
}

/// History record for one step a grievance entered. Append-only.
///
/// `entered_at` of the *current* step anchors deadline computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub grievance_id: GrievanceId,
    pub step_number: u32,
    pub stage: Stage,
    pub entered_at: DateTime<Utc>,
    /// Issues still outstanding when the case moved to this step.
    /// Empty only for the first step of a freshly created case.
    pub remaining_issues: String,
    /// Due date for action at this step; `None` for untimed templates.
    pub due_date: Option<DateTime<Utc>>,
}

// ============================================================================
// Complaint (elevation source)
// ============================================================================

/// Lifecycle status of a complaint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    /// Filed, not yet elevated.
    Open,
    /// Elevated into a grievance.
    Grieved,
}

/// A member complaint; the record a grievance may be elevated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub organization_id: OrganizationId,
    pub agreement_id: AgreementId,
    pub statement: String,
    pub violated_articles: Vec<String>,
    pub settlement_desired: Option<String>,
    pub grievor_name: String,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Discipline guidance cache entry
// ============================================================================

/// Cached, AI-extracted reference material for one grievance.
///
/// Keyed uniquely by grievance; replaced wholesale on repopulation. An entry
/// whose `expires_at` has passed must never be served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceEntry {
    pub grievance_id: GrievanceId,
    /// Extracted reference text, citations and headers preserved.
    pub relevant_sections: String,
    /// Misconduct topic tags derived from the extracted text.
    pub topics: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GuidanceEntry {
    /// Build an entry expiring `ttl_days` after `now`.
    ///
    /// `ttl_days` must be positive so that `expires_at > created_at` holds.
    pub fn new(
        grievance_id: GrievanceId,
        relevant_sections: impl Into<String>,
        topics: BTreeSet<String>,
        now: DateTime<Utc>,
        ttl_days: u32,
    ) -> Result<Self, crate::EngineError> {
        if ttl_days == 0 {
            return Err(crate::EngineError::InvalidArgument(
                "guidance TTL must be at least one day".to_string(),
            ));
        }
        Ok(Self {
            grievance_id,
            relevant_sections: relevant_sections.into(),
            topics,
            created_at: now,
            expires_at: now + chrono::Duration::days(i64::from(ttl_days)),
        })
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_case_state_projection() {
        let active = CaseState::Active {
            stage: Stage::Formal,
            step_number: 2,
        };
        assert!(active.is_active());
        assert_eq!(active.status(), CaseStatus::Active);
        assert_eq!(active.stage(), Stage::Formal);
        assert_eq!(active.step_number(), 2);

        let resolved = CaseState::Resolved(Resolution {
            kind: ResolutionKind::Settlement,
            details: "Paid lump sum".into(),
            resolved_at: ts(2025, 6, 1),
            last_stage: Stage::Formal,
            last_step_number: 2,
        });
        assert!(!resolved.is_active());
        assert_eq!(resolved.status(), CaseStatus::Settled);
        // Frozen history remains readable
        assert_eq!(resolved.stage(), Stage::Formal);
        assert_eq!(resolved.step_number(), 2);
    }

    #[test]
    fn test_guidance_entry_expiry_window() {
        let now = ts(2025, 1, 1);
        let entry = GuidanceEntry::new(
            GrievanceId::generate(),
            "Article 12 …",
            BTreeSet::new(),
            now,
            30,
        )
        .unwrap();

        assert!(entry.expires_at > entry.created_at);
        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + chrono::Duration::days(29)));
        assert!(entry.is_expired(now + chrono::Duration::days(30)));
    }

    #[test]
    fn test_guidance_entry_rejects_zero_ttl() {
        let result = GuidanceEntry::new(
            GrievanceId::generate(),
            "text",
            BTreeSet::new(),
            ts(2025, 1, 1),
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_role_transition_permissions() {
        assert!(!Role::Member.may_transition());
        assert!(Role::Representative.may_transition());
        assert!(Role::Administrator.may_transition());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(CaseStatus::Active.to_string(), "ACTIVE");
        assert_eq!(
            CaseStatus::ResolvedArbitration.to_string(),
            "RESOLVED_ARBITRATION"
        );
        assert_eq!(ResolutionKind::Settlement.as_str(), "SETTLEMENT");
    }
}
