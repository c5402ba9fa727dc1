//! ComplaintLifecycle — creation, status transitions, recurrence counting.
//!
//! Transition legality lives on `Status::can_transition_to`; this type wires
//! the pure rules to the store and the geo index, with bounded retries when
//! a concurrent writer races a conditional update.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use civicpulse_common::{CivicError, Complaint, NewReport, Status};

use crate::geo_index::GeoIndex;
use crate::store::{ComplaintStore, RecurrenceUpdate};

pub struct ComplaintLifecycle {
    store: Arc<dyn ComplaintStore>,
    index: Arc<GeoIndex>,
    conflict_retries: u32,
}

impl ComplaintLifecycle {
    pub fn new(store: Arc<dyn ComplaintStore>, index: Arc<GeoIndex>, conflict_retries: u32) -> Self {
        Self { store, index, conflict_retries }
    }

    /// Create and persist a new PENDING complaint from a validated report,
    /// then make it visible to future dedup queries.
    pub async fn create(&self, report: &NewReport) -> Result<Complaint, CivicError> {
        let complaint = Complaint::from_report(report);
        self.store.insert(&complaint).await?;
        // Index after the store write commits: dedup readers may briefly miss
        // the new complaint, but never see an id the store doesn't have.
        self.index.insert(&complaint);
        info!(
            complaint_id = %complaint.id,
            category = %complaint.category,
            department_id = complaint.department_id,
            is_critical = complaint.is_critical,
            "complaint created"
        );
        Ok(complaint)
    }

    /// Apply a status transition. Illegal transitions fail with
    /// `InvalidTransition` and leave the row untouched; conditional-update
    /// races are retried a bounded number of times against the re-read state.
    pub async fn transition(&self, id: Uuid, to: Status) -> Result<Complaint, CivicError> {
        let mut attempt = 0;
        loop {
            let current = self.store.get(id).await?.ok_or(CivicError::NotFound(id))?;
            let from = current.status;
            if !from.can_transition_to(to) {
                return Err(CivicError::InvalidTransition { from, to });
            }

            match self.store.update_status(id, from, to).await {
                Ok(()) => {
                    if to.is_terminal() {
                        self.index.remove(current.category, id, current.location);
                    }
                    info!(complaint_id = %id, %from, %to, "status transition applied");
                    return Ok(Complaint { status: to, ..current });
                }
                Err(CivicError::StoreConflict(detail)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        complaint_id = %id,
                        %from,
                        %to,
                        attempt,
                        detail,
                        "status update raced a concurrent write, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fold a duplicate report into `id`: atomic read-increment-write of the
    /// recurrence count. Status and severity of the target are untouched.
    pub async fn record_recurrence(&self, id: Uuid) -> Result<RecurrenceUpdate, CivicError> {
        let mut attempt = 0;
        loop {
            match self.store.increment_recurrence(id).await {
                Ok(update) => {
                    info!(
                        complaint_id = %id,
                        previous_count = update.previous_count,
                        new_count = update.new_count,
                        "recurrence recorded"
                    );
                    return Ok(update);
                }
                Err(CivicError::StoreConflict(detail)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        complaint_id = %id,
                        attempt,
                        detail,
                        "recurrence increment conflicted, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use civicpulse_common::{Category, GeoPoint};

    fn report() -> NewReport {
        NewReport {
            category: Category::Water,
            department_id: 2,
            description: "burst pipe flooding the street".into(),
            location: GeoPoint::new(12.95, 77.61),
            address: "8th Main".into(),
            severity: 7,
            image_url: None,
        }
    }

    fn lifecycle(store: Arc<MemoryStore>) -> ComplaintLifecycle {
        ComplaintLifecycle::new(store, Arc::new(GeoIndex::new()), 3)
    }

    #[tokio::test]
    async fn create_persists_and_indexes() {
        let store = Arc::new(MemoryStore::new());
        let index = Arc::new(GeoIndex::new());
        let lc = ComplaintLifecycle::new(store.clone(), index.clone(), 3);

        let c = lc.create(&report()).await.unwrap();
        assert_eq!(store.get(c.id).await.unwrap().unwrap().status, Status::Pending);
        assert_eq!(index.query(Category::Water, c.location, 0.3), vec![c.id]);
    }

    #[tokio::test]
    async fn full_happy_path() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(store.clone());
        let c = lc.create(&report()).await.unwrap();

        let c = lc.transition(c.id, Status::InProgress).await.unwrap();
        assert_eq!(c.status, Status::InProgress);
        let c = lc.transition(c.id, Status::Completed).await.unwrap();
        assert_eq!(c.status, Status::Completed);
    }

    #[tokio::test]
    async fn illegal_transition_fails_and_leaves_status_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(store.clone());
        let c = lc.create(&report()).await.unwrap();

        let err = lc.transition(c.id, Status::Completed).await.unwrap_err();
        assert!(matches!(
            err,
            CivicError::InvalidTransition { from: Status::Pending, to: Status::Completed }
        ));
        assert_eq!(store.get(c.id).await.unwrap().unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn terminal_states_reject_all_transitions() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(store.clone());
        let c = lc.create(&report()).await.unwrap();
        lc.transition(c.id, Status::Rejected).await.unwrap();

        for to in [Status::Pending, Status::InProgress, Status::Completed] {
            let err = lc.transition(c.id, to).await.unwrap_err();
            assert!(matches!(err, CivicError::InvalidTransition { from: Status::Rejected, .. }));
        }
        assert_eq!(store.get(c.id).await.unwrap().unwrap().status, Status::Rejected);
    }

    #[tokio::test]
    async fn terminal_transition_removes_from_index() {
        let store = Arc::new(MemoryStore::new());
        let index = Arc::new(GeoIndex::new());
        let lc = ComplaintLifecycle::new(store, index.clone(), 3);
        let c = lc.create(&report()).await.unwrap();

        lc.transition(c.id, Status::InProgress).await.unwrap();
        assert_eq!(index.len(), 1);
        lc.transition(c.id, Status::Completed).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let lc = lifecycle(Arc::new(MemoryStore::new()));
        let err = lc.transition(Uuid::new_v4(), Status::InProgress).await.unwrap_err();
        assert!(matches!(err, CivicError::NotFound(_)));
    }

    #[tokio::test]
    async fn recurrence_increment_reports_before_and_after() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(store.clone());
        let c = lc.create(&report()).await.unwrap();

        let update = lc.record_recurrence(c.id).await.unwrap();
        assert_eq!(update.previous_count, 1);
        assert_eq!(update.new_count, 2);
        assert_eq!(store.get(c.id).await.unwrap().unwrap().recurrence_count, 2);
        // Status and severity untouched by the merge.
        let row = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(row.status, Status::Pending);
        assert_eq!(row.severity, 7);
    }
}
