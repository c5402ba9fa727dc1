use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CivicError;

// --- Categories ---

/// Issue category. The legacy mobile clients send the short codes
/// (`ELEC`, `GARB`), so those are accepted as aliases on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "ELECTRICITY", alias = "ELEC")]
    Electricity,
    #[serde(rename = "WATER")]
    Water,
    #[serde(rename = "GARBAGE", alias = "GARB")]
    Garbage,
    #[serde(rename = "ROAD")]
    Road,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Electricity => write!(f, "ELECTRICITY"),
            Category::Water => write!(f, "WATER"),
            Category::Garbage => write!(f, "GARBAGE"),
            Category::Road => write!(f, "ROAD"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ELECTRICITY" | "ELEC" => Ok(Category::Electricity),
            "WATER" => Ok(Category::Water),
            "GARBAGE" | "GARB" => Ok(Category::Garbage),
            "ROAD" => Ok(Category::Road),
            other => Err(CivicError::Validation(format!("unknown category: {other}"))),
        }
    }
}

// --- Lifecycle status ---

/// Complaint lifecycle status.
///
/// PENDING → INPROGRESS → COMPLETED, with REJECTED reachable from either
/// non-terminal state. COMPLETED and REJECTED are terminal: complaints are
/// never deleted, they stay for audit and analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "INPROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Rejected)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    /// Self-transitions are not permitted; terminal states allow nothing.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::InProgress)
                | (Status::Pending, Status::Rejected)
                | (Status::InProgress, Status::Completed)
                | (Status::InProgress, Status::Rejected)
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pending => write!(f, "PENDING"),
            Status::InProgress => write!(f, "INPROGRESS"),
            Status::Completed => write!(f, "COMPLETED"),
            Status::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(Status::Pending),
            "INPROGRESS" => Ok(Status::InProgress),
            "COMPLETED" => Ok(Status::Completed),
            "REJECTED" => Ok(Status::Rejected),
            other => Err(CivicError::Validation(format!("unknown status: {other}"))),
        }
    }
}

// --- Geo ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Coordinates must be finite and in range. Rejects the NaN/Infinity
    /// values that JSON parsers happily hand through.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

// --- Severity ---

/// Criticality is derived from severity once at creation and never
/// recomputed: severity above 6 flags the complaint as critical.
pub fn is_critical(severity: u8) -> bool {
    severity > 6
}

// --- Incoming report ---

/// A validated-shape citizen report, as handed to the dedup engine by the
/// ingestion boundary. Image bytes have already been resolved to an opaque
/// URL (or dropped) by that boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub category: Category,
    pub department_id: i64,
    pub description: String,
    pub location: GeoPoint,
    pub address: String,
    pub severity: u8,
    pub image_url: Option<String>,
}

impl NewReport {
    /// Shape validation per the intake contract. Fails before any side effect.
    pub fn validate(&self) -> Result<(), CivicError> {
        if self.description.trim().is_empty() {
            return Err(CivicError::Validation("description is required".into()));
        }
        if self.address.trim().is_empty() {
            return Err(CivicError::Validation("address is required".into()));
        }
        if !(1..=10).contains(&self.severity) {
            return Err(CivicError::Validation(format!(
                "severity must be 1..10, got {}",
                self.severity
            )));
        }
        if !self.location.is_valid() {
            return Err(CivicError::Validation(format!(
                "location out of range: ({}, {})",
                self.location.latitude, self.location.longitude
            )));
        }
        Ok(())
    }
}

// --- Complaint aggregate ---

/// The complaint aggregate root. `category`, `location`, and `address` are
/// immutable once created; only `status` and `recurrence_count` mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: Uuid,
    pub category: Category,
    pub department_id: i64,
    pub description: String,
    pub location: GeoPoint,
    pub address: String,
    pub severity: u8,
    pub is_critical: bool,
    pub status: Status,
    pub recurrence_count: u32,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl Complaint {
    /// Build a fresh complaint from a validated report: PENDING, one report
    /// folded in, criticality derived from severity.
    pub fn from_report(report: &NewReport) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: report.category,
            department_id: report.department_id,
            description: report.description.clone(),
            location: report.location,
            address: report.address.clone(),
            severity: report.severity,
            is_critical: is_critical(report.severity),
            status: Status::Pending,
            recurrence_count: 1,
            created_at: Utc::now(),
            image_url: report.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(severity: u8) -> NewReport {
        NewReport {
            category: Category::Road,
            department_id: 4,
            description: "pothole near gate 2".into(),
            location: GeoPoint::new(12.97, 77.59),
            address: "Gate 2, MG Road".into(),
            severity,
            image_url: None,
        }
    }

    #[test]
    fn critical_iff_severity_above_six() {
        for severity in 1..=10u8 {
            assert_eq!(is_critical(severity), severity > 6, "severity {severity}");
        }
    }

    #[test]
    fn new_complaint_starts_pending_with_count_one() {
        let c = Complaint::from_report(&report(8));
        assert_eq!(c.status, Status::Pending);
        assert_eq!(c.recurrence_count, 1);
        assert!(c.is_critical);
    }

    #[test]
    fn pending_moves_to_inprogress_or_rejected() {
        assert!(Status::Pending.can_transition_to(Status::InProgress));
        assert!(Status::Pending.can_transition_to(Status::Rejected));
        assert!(!Status::Pending.can_transition_to(Status::Completed));
        assert!(!Status::Pending.can_transition_to(Status::Pending));
    }

    #[test]
    fn inprogress_moves_to_completed_or_rejected() {
        assert!(Status::InProgress.can_transition_to(Status::Completed));
        assert!(Status::InProgress.can_transition_to(Status::Rejected));
        assert!(!Status::InProgress.can_transition_to(Status::Pending));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for terminal in [Status::Completed, Status::Rejected] {
            assert!(terminal.is_terminal());
            for next in [Status::Pending, Status::InProgress, Status::Completed, Status::Rejected] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn validation_rejects_blank_description() {
        let mut r = report(5);
        r.description = "   ".into();
        assert!(matches!(r.validate(), Err(CivicError::Validation(_))));
    }

    #[test]
    fn validation_rejects_out_of_range_severity() {
        assert!(report(0).validate().is_err());
        assert!(report(11).validate().is_err());
        assert!(report(10).validate().is_ok());
        assert!(report(1).validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_coordinates() {
        let mut r = report(5);
        r.location = GeoPoint::new(91.0, 77.59);
        assert!(r.validate().is_err());
        r.location = GeoPoint::new(12.97, -181.0);
        assert!(r.validate().is_err());
        r.location = GeoPoint::new(f64::NAN, 77.59);
        assert!(r.validate().is_err());
    }

    #[test]
    fn category_accepts_legacy_codes() {
        assert_eq!("ELEC".parse::<Category>().unwrap(), Category::Electricity);
        assert_eq!("GARB".parse::<Category>().unwrap(), Category::Garbage);
        assert_eq!("ROAD".parse::<Category>().unwrap(), Category::Road);
        assert!("SEWAGE".parse::<Category>().is_err());
    }

    #[test]
    fn status_serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"INPROGRESS\"");
        assert_eq!(serde_json::to_string(&Category::Garbage).unwrap(), "\"GARBAGE\"");
        let c: Category = serde_json::from_str("\"ELEC\"").unwrap();
        assert_eq!(c, Category::Electricity);
    }
}
