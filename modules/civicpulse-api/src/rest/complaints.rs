//! Complaint REST surface: intake, lifecycle transitions, and read queries.
//!
//! Thin by design — validation of shape, base64 decoding, and delegation to
//! the engine. Errors come back as `{"error": reason}` JSON bodies; dedup
//! internals (scorer failures) never surface as request failures.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use civicpulse_common::{Category, CivicError, GeoPoint, NewReport, Status};
use civicpulse_engine::IngestOutcome;

use crate::image::decode_image_base64;
use crate::AppState;

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LocationBody {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComplaintRequest {
    category: String,
    department_id: i64,
    description: String,
    location: LocationBody,
    address: String,
    severity: i64,
    image_base64: Option<String>,
}

pub async fn create_complaint(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateComplaintRequest>,
) -> Response {
    // Everything that can reject does so here, before any side effect.
    let category = match Category::from_str(&body.category) {
        Ok(c) => c,
        Err(e) => return error_response(e),
    };
    if !(1..=10).contains(&body.severity) {
        return error_response(CivicError::Validation(format!(
            "severity must be 1..10, got {}",
            body.severity
        )));
    }

    let image_url = match &body.image_base64 {
        Some(payload) => {
            let bytes = match decode_image_base64(payload) {
                Ok(b) => b,
                Err(e) => return error_response(e),
            };
            match state.images.store(bytes).await {
                Ok(url) => url,
                Err(e) => {
                    // Image storage failing must not reject the report itself.
                    warn!(error = %e, "image sink failed, complaint proceeds without image");
                    None
                }
            }
        }
        None => None,
    };

    let report = NewReport {
        category,
        department_id: body.department_id,
        description: body.description,
        location: GeoPoint::new(body.location.latitude, body.location.longitude),
        address: body.address,
        severity: body.severity as u8,
        image_url,
    };

    match state.engine.ingest(report).await {
        Ok(IngestOutcome::Created(complaint)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Complaint created",
                "complaint": complaint,
            })),
        )
            .into_response(),
        Ok(IngestOutcome::Merged { complaint, previous_count, new_count, reason }) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Report merged into existing complaint",
                "complaint": complaint,
                "previousCount": previous_count,
                "newCount": new_count,
                "reason": reason,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

pub async fn start_complaint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    transition(state, id, Status::InProgress).await
}

pub async fn resolve_complaint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    transition(state, id, Status::Completed).await
}

pub async fn reject_complaint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    transition(state, id, Status::Rejected).await
}

async fn transition(state: Arc<AppState>, id: Uuid, to: Status) -> Response {
    match state.lifecycle.transition(id, to).await {
        Ok(complaint) => Json(serde_json::json!({
            "message": format!("Complaint moved to {to}"),
            "complaint": complaint,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Read queries
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NearbyParams {
    latitude: f64,
    longitude: f64,
    radius_km: f64,
    /// Optional narrowing; without it all categories are searched.
    category: Option<String>,
}

/// Citizen-facing "issues near me" query. The radius here is caller-chosen
/// and unrelated to the dedup radius.
pub async fn nearby_complaints(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Response {
    let center = GeoPoint::new(params.latitude, params.longitude);
    if !center.is_valid() {
        return error_response(CivicError::Validation("latitude/longitude out of range".into()));
    }
    if params.radius_km <= 0.0 || !params.radius_km.is_finite() {
        return error_response(CivicError::Validation("radius_km must be positive".into()));
    }

    let categories = match &params.category {
        Some(raw) => match Category::from_str(raw) {
            Ok(c) => vec![c],
            Err(e) => return error_response(e),
        },
        None => vec![Category::Electricity, Category::Water, Category::Garbage, Category::Road],
    };

    let mut complaints = Vec::new();
    for category in categories {
        match state
            .store
            .find_by_category_near(category, center, params.radius_km)
            .await
        {
            Ok(mut found) => complaints.append(&mut found),
            Err(e) => return error_response(e),
        }
    }
    complaints.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(serde_json::json!({
        "total": complaints.len(),
        "complaints": complaints,
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct ListParams {
    department_id: Option<i64>,
    status: Option<String>,
}

/// Department dashboard listing, newest first.
pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Response {
    let status = match &params.status {
        Some(raw) => match Status::from_str(raw) {
            Ok(s) => Some(s),
            Err(e) => return error_response(e),
        },
        None => None,
    };

    match state.store.list(params.department_id, status).await {
        Ok(complaints) => Json(serde_json::json!({
            "total": complaints.len(),
            "complaints": complaints,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn error_response(err: CivicError) -> Response {
    let status = match &err {
        CivicError::Validation(_) => StatusCode::BAD_REQUEST,
        CivicError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CivicError::NotFound(_) => StatusCode::NOT_FOUND,
        // Exhausted conflict retries: transient, the caller may resubmit.
        CivicError::StoreConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        CivicError::ScorerUnavailable(_)
        | CivicError::Database(_)
        | CivicError::Config(_)
        | CivicError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}
