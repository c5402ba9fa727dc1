//! Postgres-backed ComplaintStore.
//!
//! The concurrency contract lives in the SQL, not in application code:
//! recurrence increments are a single server-side `UPDATE ... RETURNING`
//! (no read-modify-write window), and status transitions are conditional on
//! the expected current status so a raced row surfaces as `StoreConflict`
//! instead of silently clobbering a concurrent transition.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use civicpulse_common::{
    bounding_box, haversine_km, Category, CivicError, Complaint, GeoPoint, Status,
};
use civicpulse_engine::{ComplaintStore, RecurrenceUpdate};

const SCHEMA: &str = include_str!("../schema.sql");

const COMPLAINT_COLUMNS: &str = "id, category, department_id, description, latitude, longitude, \
     address, severity, is_critical, status, recurrence_count, created_at, image_url";

#[derive(Clone)]
pub struct PgComplaintStore {
    pool: PgPool,
}

impl PgComplaintStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the complaints table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), CivicError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> CivicError {
    CivicError::Database(e.to_string())
}

fn complaint_from_row(row: &PgRow) -> Result<Complaint, CivicError> {
    let category: String = row.try_get("category").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    let severity: i16 = row.try_get("severity").map_err(db_err)?;
    let recurrence_count: i32 = row.try_get("recurrence_count").map_err(db_err)?;

    Ok(Complaint {
        id: row.try_get("id").map_err(db_err)?,
        category: category.parse()?,
        department_id: row.try_get("department_id").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        location: GeoPoint::new(
            row.try_get("latitude").map_err(db_err)?,
            row.try_get("longitude").map_err(db_err)?,
        ),
        address: row.try_get("address").map_err(db_err)?,
        severity: severity as u8,
        is_critical: row.try_get("is_critical").map_err(db_err)?,
        status: status.parse()?,
        recurrence_count: recurrence_count as u32,
        created_at: row.try_get("created_at").map_err(db_err)?,
        image_url: row.try_get("image_url").map_err(db_err)?,
    })
}

#[async_trait]
impl ComplaintStore for PgComplaintStore {
    async fn insert(&self, complaint: &Complaint) -> Result<(), CivicError> {
        sqlx::query(
            r#"
            INSERT INTO complaints
                (id, category, department_id, description, latitude, longitude,
                 address, severity, is_critical, status, recurrence_count, created_at, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(complaint.id)
        .bind(complaint.category.to_string())
        .bind(complaint.department_id)
        .bind(&complaint.description)
        .bind(complaint.location.latitude)
        .bind(complaint.location.longitude)
        .bind(&complaint.address)
        .bind(complaint.severity as i16)
        .bind(complaint.is_critical)
        .bind(complaint.status.to_string())
        .bind(complaint.recurrence_count as i32)
        .bind(complaint.created_at)
        .bind(&complaint.image_url)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Complaint>, CivicError> {
        let row = sqlx::query(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(complaint_from_row).transpose()
    }

    async fn find_by_category_near(
        &self,
        category: Category,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Complaint>, CivicError> {
        if !center.is_valid() || radius_km <= 0.0 {
            return Ok(Vec::new());
        }
        let bbox = bounding_box(center.latitude, center.longitude, radius_km);

        // Bounding-box prefilter on the indexed columns; the exact
        // great-circle check happens in Rust. All statuses are returned:
        // a resolved pothole still belongs on the citizen map, and dedup
        // candidacy is restricted to non-terminal complaints elsewhere.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMPLAINT_COLUMNS} FROM complaints
            WHERE category = $1
              AND latitude BETWEEN $2 AND $3
              AND longitude BETWEEN $4 AND $5
            ORDER BY created_at ASC
            "#
        ))
        .bind(category.to_string())
        .bind(bbox.min_lat)
        .bind(bbox.max_lat)
        .bind(bbox.min_lng)
        .bind(bbox.max_lng)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::new();
        for row in &rows {
            let complaint = complaint_from_row(row)?;
            if !complaint.location.is_valid() {
                // A corrupt stored row must never surface as a false match.
                continue;
            }
            let d = haversine_km(
                center.latitude,
                center.longitude,
                complaint.location.latitude,
                complaint.location.longitude,
            );
            if d <= radius_km {
                out.push(complaint);
            }
        }
        Ok(out)
    }

    async fn increment_recurrence(&self, id: Uuid) -> Result<RecurrenceUpdate, CivicError> {
        // Single-statement server-side increment: atomic at the row level,
        // concurrent merges serialize on the row lock and each sees its own
        // distinct before/after pair.
        let row = sqlx::query(
            r#"
            UPDATE complaints
            SET recurrence_count = recurrence_count + 1
            WHERE id = $1
            RETURNING recurrence_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Err(CivicError::NotFound(id));
        };
        let new_count: i32 = row.try_get("recurrence_count").map_err(db_err)?;
        Ok(RecurrenceUpdate {
            previous_count: new_count as u32 - 1,
            new_count: new_count as u32,
        })
    }

    async fn update_status(&self, id: Uuid, from: Status, to: Status) -> Result<(), CivicError> {
        let result = sqlx::query(
            "UPDATE complaints SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing updated: either the row is gone or it moved under us.
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM complaints WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        if exists {
            Err(CivicError::StoreConflict(format!(
                "complaint {id} is no longer in status {from}"
            )))
        } else {
            Err(CivicError::NotFound(id))
        }
    }

    async fn active_complaints(&self) -> Result<Vec<Complaint>, CivicError> {
        let rows = sqlx::query(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE status IN ('PENDING', 'INPROGRESS')"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(complaint_from_row).collect()
    }

    async fn list(
        &self,
        department_id: Option<i64>,
        status: Option<Status>,
    ) -> Result<Vec<Complaint>, CivicError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMPLAINT_COLUMNS} FROM complaints
            WHERE ($1::BIGINT IS NULL OR department_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(department_id)
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(complaint_from_row).collect()
    }
}
