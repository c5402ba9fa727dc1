//! Deterministic in-memory ComplaintStore for tests.
//!
//! All mutations happen under a single write lock, so the atomicity the
//! store contract demands (no lost recurrence increments, conditional
//! status updates) holds by construction. No network, no Docker.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use civicpulse_common::{haversine_km, Category, CivicError, Complaint, GeoPoint, Status};

use crate::store::{ComplaintStore, RecurrenceUpdate};

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<Uuid, Complaint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored complaints (all statuses).
    pub fn row_count(&self) -> usize {
        self.rows.read().expect("store lock poisoned").len()
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn insert(&self, complaint: &Complaint) -> Result<(), CivicError> {
        let mut rows = self.rows.write().expect("store lock poisoned");
        if rows.contains_key(&complaint.id) {
            return Err(CivicError::Database(format!(
                "duplicate complaint id {}",
                complaint.id
            )));
        }
        rows.insert(complaint.id, complaint.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Complaint>, CivicError> {
        Ok(self.rows.read().expect("store lock poisoned").get(&id).cloned())
    }

    async fn find_by_category_near(
        &self,
        category: Category,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Complaint>, CivicError> {
        let rows = self.rows.read().expect("store lock poisoned");
        let mut out: Vec<Complaint> = rows
            .values()
            .filter(|c| c.category == category)
            .filter(|c| c.location.is_valid())
            .filter(|c| {
                haversine_km(
                    center.latitude,
                    center.longitude,
                    c.location.latitude,
                    c.location.longitude,
                ) <= radius_km
            })
            .cloned()
            .collect();
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }

    async fn increment_recurrence(&self, id: Uuid) -> Result<RecurrenceUpdate, CivicError> {
        let mut rows = self.rows.write().expect("store lock poisoned");
        let row = rows.get_mut(&id).ok_or(CivicError::NotFound(id))?;
        let previous_count = row.recurrence_count;
        row.recurrence_count += 1;
        Ok(RecurrenceUpdate { previous_count, new_count: row.recurrence_count })
    }

    async fn update_status(&self, id: Uuid, from: Status, to: Status) -> Result<(), CivicError> {
        let mut rows = self.rows.write().expect("store lock poisoned");
        let row = rows.get_mut(&id).ok_or(CivicError::NotFound(id))?;
        if row.status != from {
            return Err(CivicError::StoreConflict(format!(
                "expected status {from}, row is {}",
                row.status
            )));
        }
        row.status = to;
        Ok(())
    }

    async fn active_complaints(&self) -> Result<Vec<Complaint>, CivicError> {
        let rows = self.rows.read().expect("store lock poisoned");
        Ok(rows.values().filter(|c| !c.status.is_terminal()).cloned().collect())
    }

    async fn list(
        &self,
        department_id: Option<i64>,
        status: Option<Status>,
    ) -> Result<Vec<Complaint>, CivicError> {
        let rows = self.rows.read().expect("store lock poisoned");
        let mut out: Vec<Complaint> = rows
            .values()
            .filter(|c| department_id.map_or(true, |d| c.department_id == d))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
