//! DeduplicationEngine — merge-vs-create decision at submission time.
//!
//! Duplicate detection is a best-effort optimization, never a hard
//! dependency for accepting a report: a scorer timeout or failure demotes
//! the candidate to a non-match, is logged with the ids involved, and intake
//! proceeds to create a new complaint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use civicpulse_common::{haversine_km, CivicError, Complaint, DedupConfig, NewReport};

use crate::geo_index::GeoIndex;
use crate::lifecycle::ComplaintLifecycle;
use crate::scorer::SimilarityScorer;
use crate::store::ComplaintStore;

/// The result of ingesting one citizen report.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// No acceptable merge target: a new complaint was created.
    Created(Complaint),
    /// The report was folded into an existing complaint.
    Merged {
        complaint: Complaint,
        previous_count: u32,
        new_count: u32,
        /// Audit-log-only match explanation; not persisted on the row.
        reason: String,
    },
}

struct BestMatch {
    id: Uuid,
    distance_km: f64,
    created_at: DateTime<Utc>,
    score: f64,
    reason: String,
}

pub struct DeduplicationEngine {
    store: Arc<dyn ComplaintStore>,
    index: Arc<GeoIndex>,
    scorer: Arc<dyn SimilarityScorer>,
    lifecycle: Arc<ComplaintLifecycle>,
    config: DedupConfig,
}

impl DeduplicationEngine {
    pub fn new(
        store: Arc<dyn ComplaintStore>,
        scorer: Arc<dyn SimilarityScorer>,
        config: DedupConfig,
    ) -> Self {
        let index = Arc::new(GeoIndex::new());
        let lifecycle = Arc::new(ComplaintLifecycle::new(
            store.clone(),
            index.clone(),
            config.conflict_retries,
        ));
        Self { store, index, scorer, lifecycle, config }
    }

    /// Lifecycle handle for status transitions driven by department staff.
    pub fn lifecycle(&self) -> Arc<ComplaintLifecycle> {
        self.lifecycle.clone()
    }

    /// Rebuild the geo index from the store's non-terminal complaints.
    /// Called once at startup; returns the number of indexed complaints.
    pub async fn warm_index(&self) -> Result<usize, CivicError> {
        let active = self.store.active_complaints().await?;
        for complaint in &active {
            self.index.insert(complaint);
        }
        let indexed = self.index.len();
        info!(indexed, "geo index warmed");
        Ok(indexed)
    }

    /// Decide whether `report` is a new issue or a recurrence of an existing
    /// one. Validation failures reject before any side effect.
    pub async fn ingest(&self, report: NewReport) -> Result<IngestOutcome, CivicError> {
        report.validate()?;

        let candidate_ids =
            self.index
                .query(report.category, report.location, self.config.dedup_radius_km);

        let best = self.best_candidate(&candidate_ids, &report).await?;

        match best {
            Some(m) if m.score >= self.config.accept_threshold => {
                let update = self.lifecycle.record_recurrence(m.id).await?;
                let complaint = self
                    .store
                    .get(m.id)
                    .await?
                    .ok_or(CivicError::NotFound(m.id))?;
                info!(
                    complaint_id = %m.id,
                    score = m.score,
                    distance_km = m.distance_km,
                    reason = %m.reason,
                    new_count = update.new_count,
                    "report merged into existing complaint"
                );
                Ok(IngestOutcome::Merged {
                    complaint,
                    previous_count: update.previous_count,
                    new_count: update.new_count,
                    reason: m.reason,
                })
            }
            _ => {
                let complaint = self.lifecycle.create(&report).await?;
                Ok(IngestOutcome::Created(complaint))
            }
        }
    }

    /// Score every candidate and keep the best one. Ties break by smaller
    /// distance, then earlier creation. Scorer failures and timeouts demote
    /// the candidate to a non-match and the scan continues.
    async fn best_candidate(
        &self,
        candidate_ids: &[Uuid],
        report: &NewReport,
    ) -> Result<Option<BestMatch>, CivicError> {
        let timeout = Duration::from_millis(self.config.scorer_timeout_ms);
        let mut best: Option<BestMatch> = None;

        for &id in candidate_ids {
            // The index may briefly lag the store; a missing or finished row
            // is simply no longer a candidate.
            let Some(candidate) = self.store.get(id).await? else {
                continue;
            };
            if candidate.status.is_terminal() {
                continue;
            }

            let distance_km = haversine_km(
                candidate.location.latitude,
                candidate.location.longitude,
                report.location.latitude,
                report.location.longitude,
            );
            if distance_km > self.config.dedup_radius_km {
                continue;
            }

            let score = match tokio::time::timeout(timeout, self.scorer.score(&candidate, report))
                .await
            {
                Ok(Ok(score)) => score,
                Ok(Err(e)) => {
                    warn!(candidate_id = %id, error = %e, "scorer failed, treating candidate as non-match");
                    continue;
                }
                Err(_) => {
                    warn!(
                        candidate_id = %id,
                        timeout_ms = self.config.scorer_timeout_ms,
                        "scorer timed out, treating candidate as non-match"
                    );
                    continue;
                }
            };

            let contender = BestMatch {
                id,
                distance_km,
                created_at: candidate.created_at,
                score: score.value,
                reason: score.reason,
            };
            if best.as_ref().map_or(true, |b| beats(&contender, b)) {
                best = Some(contender);
            }
        }

        Ok(best)
    }
}

/// Highest score wins; ties by smallest distance, then earliest `created_at`.
fn beats(a: &BestMatch, b: &BestMatch) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    if a.distance_km != b.distance_km {
        return a.distance_km < b.distance_km;
    }
    a.created_at < b.created_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn m(score: f64, distance_km: f64, created_secs: i64) -> BestMatch {
        BestMatch {
            id: Uuid::new_v4(),
            distance_km,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            score,
            reason: String::new(),
        }
    }

    #[test]
    fn higher_score_wins() {
        assert!(beats(&m(0.9, 0.2, 100), &m(0.8, 0.0, 0)));
        assert!(!beats(&m(0.7, 0.0, 0), &m(0.8, 0.2, 100)));
    }

    #[test]
    fn score_tie_breaks_by_distance() {
        assert!(beats(&m(0.8, 0.05, 100), &m(0.8, 0.10, 0)));
    }

    #[test]
    fn full_tie_breaks_by_earliest_creation() {
        assert!(beats(&m(0.8, 0.05, 50), &m(0.8, 0.05, 100)));
        assert!(!beats(&m(0.8, 0.05, 100), &m(0.8, 0.05, 50)));
    }
}
