//! Repository seam.
//!
//! The engine is specified against this trait, not a database. A conforming
//! implementation must provide:
//! - A compare-and-swap on `GrievanceInstance.version` so two concurrent
//!   transitions on one case cannot both succeed
//! - An atomic multi-write for elevation (grievance insert + complaint
//!   status update commit together or not at all)
//! - Upsert/delete-if-exists semantics for guidance entries, unique-keyed by
//!   grievance, so concurrent population attempts converge on one row
//!
//! [`InMemoryRepository`] ships for tests and embedding; it holds all tables
//! behind a single lock, which makes the multi-write trivially atomic.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use caseflow_core::{
    Complaint, ComplaintId, GrievanceId, GrievanceInstance, GuidanceEntry, StepRecord,
};

/// Errors from the persistence collaborator.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The expected version was stale; a concurrent transition won the race.
    #[error("version conflict on grievance {grievance_id}: expected {expected}, found {found}")]
    Conflict {
        grievance_id: GrievanceId,
        expected: u64,
        found: u64,
    },

    /// A write referenced a row that does not exist.
    #[error("missing row: {0}")]
    MissingRow(String),

    /// A uniqueness constraint was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Backend failure (connection, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// CRUD and atomic multi-write contract for the engine's records.
#[async_trait]
pub trait GrievanceRepository: Send + Sync {
    async fn grievance(
        &self,
        id: GrievanceId,
    ) -> Result<Option<GrievanceInstance>, RepositoryError>;

    /// Look up the grievance elevated from a complaint, if any.
    ///
    /// The complaint identity is the elevation idempotency key.
    async fn grievance_for_complaint(
        &self,
        complaint_id: ComplaintId,
    ) -> Result<Option<GrievanceInstance>, RepositoryError>;

    /// Insert a directly-filed grievance with its first step record.
    async fn insert_grievance(
        &self,
        instance: GrievanceInstance,
        first_step: StepRecord,
    ) -> Result<(), RepositoryError>;

    /// Persist a mutated grievance, appending a step record when the
    /// transition entered a new step.
    ///
    /// Fails with [`RepositoryError::Conflict`] unless the stored version
    /// still equals `expected_version`; `instance.version` carries the
    /// incremented value to store.
    async fn update_grievance(
        &self,
        instance: GrievanceInstance,
        expected_version: u64,
        new_step: Option<StepRecord>,
    ) -> Result<(), RepositoryError>;

    /// Step history for a grievance, in entry order.
    async fn steps(&self, grievance_id: GrievanceId) -> Result<Vec<StepRecord>, RepositoryError>;

    async fn complaint(&self, id: ComplaintId) -> Result<Option<Complaint>, RepositoryError>;

    async fn insert_complaint(&self, complaint: Complaint) -> Result<(), RepositoryError>;

    /// Atomic elevation multi-write: insert the new grievance (with its
    /// first step record) and update the originating complaint in one
    /// transaction. Neither write is visible unless both commit.
    async fn elevate_complaint(
        &self,
        complaint: Complaint,
        grievance: GrievanceInstance,
        first_step: StepRecord,
    ) -> Result<(), RepositoryError>;

    async fn guidance(
        &self,
        grievance_id: GrievanceId,
    ) -> Result<Option<GuidanceEntry>, RepositoryError>;

    /// Insert or replace the guidance entry for `entry.grievance_id`.
    ///
    /// A single atomic upsert, not delete-then-insert: concurrent readers
    /// see either the old value or the new one, never neither.
    async fn upsert_guidance(&self, entry: GuidanceEntry) -> Result<(), RepositoryError>;

    /// Delete the guidance entry for a grievance if one exists. Deleting an
    /// absent entry is not an error.
    async fn delete_guidance(&self, grievance_id: GrievanceId) -> Result<(), RepositoryError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Default)]
struct Store {
    grievances: HashMap<GrievanceId, GrievanceInstance>,
    steps: HashMap<GrievanceId, Vec<StepRecord>>,
    complaints: HashMap<ComplaintId, Complaint>,
    by_complaint: HashMap<ComplaintId, GrievanceId>,
    guidance: HashMap<GrievanceId, GuidanceEntry>,
}

/// In-memory repository for tests and embedding.
///
/// All tables live behind one lock; every trait method takes the lock once,
/// so the multi-write and CAS contracts hold without further machinery.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrievanceRepository for InMemoryRepository {
    async fn grievance(
        &self,
        id: GrievanceId,
    ) -> Result<Option<GrievanceInstance>, RepositoryError> {
        Ok(self.store.read().grievances.get(&id).cloned())
    }

    async fn grievance_for_complaint(
        &self,
        complaint_id: ComplaintId,
    ) -> Result<Option<GrievanceInstance>, RepositoryError> {
        let store = self.store.read();
        Ok(store
            .by_complaint
            .get(&complaint_id)
            .and_then(|gid| store.grievances.get(gid))
            .cloned())
    }

    async fn insert_grievance(
        &self,
        instance: GrievanceInstance,
        first_step: StepRecord,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.write();
        if store.grievances.contains_key(&instance.id) {
            return Err(RepositoryError::Constraint(format!(
                "grievance {} already exists",
                instance.id
            )));
        }
        if let Some(complaint_id) = instance.complaint_id {
            store.by_complaint.insert(complaint_id, instance.id);
        }
        store.steps.insert(instance.id, vec![first_step]);
        store.grievances.insert(instance.id, instance);
        Ok(())
    }

    async fn update_grievance(
        &self,
        instance: GrievanceInstance,
        expected_version: u64,
        new_step: Option<StepRecord>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.write();
        let current = store.grievances.get(&instance.id).ok_or_else(|| {
            RepositoryError::MissingRow(format!("grievance {}", instance.id))
        })?;

        if current.version != expected_version {
            return Err(RepositoryError::Conflict {
                grievance_id: instance.id,
                expected: expected_version,
                found: current.version,
            });
        }

        if let Some(step) = new_step {
            store.steps.entry(instance.id).or_default().push(step);
        }
        store.grievances.insert(instance.id, instance);
        Ok(())
    }

    async fn steps(&self, grievance_id: GrievanceId) -> Result<Vec<StepRecord>, RepositoryError> {
        Ok(self
            .store
            .read()
            .steps
            .get(&grievance_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn complaint(&self, id: ComplaintId) -> Result<Option<Complaint>, RepositoryError> {
        Ok(self.store.read().complaints.get(&id).cloned())
    }

    async fn insert_complaint(&self, complaint: Complaint) -> Result<(), RepositoryError> {
        let mut store = self.store.write();
        if store.complaints.contains_key(&complaint.id) {
            return Err(RepositoryError::Constraint(format!(
                "complaint {} already exists",
                complaint.id
            )));
        }
        store.complaints.insert(complaint.id, complaint);
        Ok(())
    }

    async fn elevate_complaint(
        &self,
        complaint: Complaint,
        grievance: GrievanceInstance,
        first_step: StepRecord,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.write();

        if !store.complaints.contains_key(&complaint.id) {
            return Err(RepositoryError::MissingRow(format!(
                "complaint {}",
                complaint.id
            )));
        }
        // Loser of a concurrent elevation race fails the whole multi-write;
        // nothing it staged becomes visible.
        if store.by_complaint.contains_key(&complaint.id) {
            return Err(RepositoryError::Constraint(format!(
                "complaint {} was already elevated",
                complaint.id
            )));
        }

        store.by_complaint.insert(complaint.id, grievance.id);
        store.complaints.insert(complaint.id, complaint);
        store.steps.insert(grievance.id, vec![first_step]);
        store.grievances.insert(grievance.id, grievance);
        Ok(())
    }

    async fn guidance(
        &self,
        grievance_id: GrievanceId,
    ) -> Result<Option<GuidanceEntry>, RepositoryError> {
        Ok(self.store.read().guidance.get(&grievance_id).cloned())
    }

    async fn upsert_guidance(&self, entry: GuidanceEntry) -> Result<(), RepositoryError> {
        self.store
            .write()
            .guidance
            .insert(entry.grievance_id, entry);
        Ok(())
    }

    async fn delete_guidance(&self, grievance_id: GrievanceId) -> Result<(), RepositoryError> {
        self.store.write().guidance.remove(&grievance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_core::{
        AgreementId, CaseState, ComplaintStatus, OrganizationId, Stage,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap()
    }

    fn sample_grievance() -> (GrievanceInstance, StepRecord) {
        let id = GrievanceId::generate();
        let instance = GrievanceInstance {
            id,
            organization_id: OrganizationId::generate(),
            agreement_id: AgreementId::new("cba-2024"),
            complaint_id: None,
            statement: "Shift change without notice".into(),
            violated_articles: vec!["Article 7".into()],
            settlement_desired: None,
            grievor_name: "J. Doe".into(),
            state: CaseState::Active {
                stage: Stage::Informal,
                step_number: 1,
            },
            created_at: now(),
            version: 1,
        };
        let step = StepRecord {
            grievance_id: id,
            step_number: 1,
            stage: Stage::Informal,
            entered_at: now(),
            remaining_issues: String::new(),
            due_date: None,
        };
        (instance, step)
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let repo = InMemoryRepository::new();
        let (instance, step) = sample_grievance();
        repo.insert_grievance(instance.clone(), step).await.unwrap();

        let read = repo.grievance(instance.id).await.unwrap().unwrap();
        assert_eq!(read, instance);
        assert_eq!(repo.steps(instance.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let repo = InMemoryRepository::new();
        let (mut instance, step) = sample_grievance();
        repo.insert_grievance(instance.clone(), step).await.unwrap();

        // First writer wins.
        instance.version = 2;
        repo.update_grievance(instance.clone(), 1, None)
            .await
            .unwrap();

        // Second writer still expects version 1 and must lose.
        instance.version = 2;
        let result = repo.update_grievance(instance, 1, None).await;
        assert!(matches!(
            result,
            Err(RepositoryError::Conflict {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_elevation_multi_write_is_atomic() {
        let repo = InMemoryRepository::new();
        let org = OrganizationId::generate();
        let complaint = Complaint {
            id: ComplaintId::generate(),
            organization_id: org,
            agreement_id: AgreementId::new("cba-2024"),
            statement: "Unsafe ladder".into(),
            violated_articles: vec!["Article 19".into()],
            settlement_desired: None,
            grievor_name: "A. Smith".into(),
            status: ComplaintStatus::Open,
            created_at: now(),
        };
        repo.insert_complaint(complaint.clone()).await.unwrap();

        let (mut grievance, mut step) = sample_grievance();
        grievance.organization_id = org;
        grievance.complaint_id = Some(complaint.id);
        step.grievance_id = grievance.id;

        let mut grieved = complaint.clone();
        grieved.status = ComplaintStatus::Grieved;
        repo.elevate_complaint(grieved, grievance.clone(), step.clone())
            .await
            .unwrap();

        // Both sides of the write are visible.
        let stored = repo.complaint(complaint.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ComplaintStatus::Grieved);
        let linked = repo
            .grievance_for_complaint(complaint.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.id, grievance.id);

        // A second elevation for the same complaint fails and changes nothing.
        let (mut other, mut other_step) = sample_grievance();
        other.complaint_id = Some(complaint.id);
        other_step.grievance_id = other.id;
        let mut grieved_again = complaint.clone();
        grieved_again.status = ComplaintStatus::Grieved;
        let result = repo
            .elevate_complaint(grieved_again, other.clone(), other_step)
            .await;
        assert!(matches!(result, Err(RepositoryError::Constraint(_))));
        assert!(repo.grievance(other.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guidance_upsert_replaces() {
        let repo = InMemoryRepository::new();
        let gid = GrievanceId::generate();

        let first =
            GuidanceEntry::new(gid, "old text", BTreeSet::new(), now(), 30).unwrap();
        repo.upsert_guidance(first).await.unwrap();

        let second =
            GuidanceEntry::new(gid, "new text", BTreeSet::new(), now(), 30).unwrap();
        repo.upsert_guidance(second).await.unwrap();

        let stored = repo.guidance(gid).await.unwrap().unwrap();
        assert_eq!(stored.relevant_sections, "new text");
    }

    #[tokio::test]
    async fn test_delete_guidance_is_idempotent() {
        let repo = InMemoryRepository::new();
        let gid = GrievanceId::generate();
        // Deleting a missing entry is fine.
        repo.delete_guidance(gid).await.unwrap();

        let entry = GuidanceEntry::new(gid, "text", BTreeSet::new(), now(), 30).unwrap();
        repo.upsert_guidance(entry).await.unwrap();
        repo.delete_guidance(gid).await.unwrap();
        assert!(repo.guidance(gid).await.unwrap().is_none());
    }
}
