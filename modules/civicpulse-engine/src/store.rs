//! ComplaintStore — the persistence seam.
//!
//! The engine never talks to a database directly; everything flows through
//! this trait so unit tests run against the in-memory store in `testing`
//! with no network and no Docker.

use async_trait::async_trait;
use uuid::Uuid;

use civicpulse_common::{Category, CivicError, Complaint, GeoPoint, Status};

/// Before/after counts from an atomic recurrence increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceUpdate {
    pub previous_count: u32,
    pub new_count: u32,
}

/// Durable complaint persistence.
///
/// Concurrency contract: `increment_recurrence` must be atomic relative to
/// concurrent increments on the same row — either a single-statement
/// server-side increment or a compare-and-swap that reports
/// [`CivicError::StoreConflict`] so the caller can retry. Lost updates are
/// an invariant violation, not a tolerable race.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Persist a freshly created complaint.
    async fn insert(&self, complaint: &Complaint) -> Result<(), CivicError>;

    /// Fetch a complaint by id.
    async fn get(&self, id: Uuid) -> Result<Option<Complaint>, CivicError>;

    /// Complaints of `category` within `radius_km` of `center`, all statuses.
    /// Serves the citizen-facing nearby query, where a resolved issue is
    /// still worth showing. Rows with missing or invalid coordinates are
    /// excluded, never an error.
    async fn find_by_category_near(
        &self,
        category: Category,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Complaint>, CivicError>;

    /// Atomically add one to `recurrence_count`, returning before/after.
    async fn increment_recurrence(&self, id: Uuid) -> Result<RecurrenceUpdate, CivicError>;

    /// Move `status` from `from` to `to`. Fails with `StoreConflict` if the
    /// row is no longer in `from` (someone else transitioned it first), and
    /// `NotFound` if the row does not exist. The transition itself has
    /// already been validated by the lifecycle.
    async fn update_status(&self, id: Uuid, from: Status, to: Status) -> Result<(), CivicError>;

    /// All non-terminal complaints; used to warm the geo index at startup.
    async fn active_complaints(&self) -> Result<Vec<Complaint>, CivicError>;

    /// Dashboard listing, newest first, optionally narrowed by department
    /// and/or status.
    async fn list(
        &self,
        department_id: Option<i64>,
        status: Option<Status>,
    ) -> Result<Vec<Complaint>, CivicError>;
}
