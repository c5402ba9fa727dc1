//! SimilarityScorer — how likely do two reports describe the same issue?
//!
//! The deterministic default combines proximity and description overlap with
//! fixed, documented weights. An external scorer (semantic embedding, LLM)
//! can replace it behind the same trait; the category gate is enforced here
//! regardless, and the engine treats any scorer failure as a non-match.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use civicpulse_common::{haversine_km, CivicError, Complaint, DedupConfig, NewReport};

/// A similarity verdict: score in [0,1] plus a human-readable reason kept
/// for the audit log (never persisted on the complaint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub reason: String,
}

#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn score(&self, candidate: &Complaint, report: &NewReport) -> Result<Score, CivicError>;
}

// ---------------------------------------------------------------------------
// DefaultScorer — deterministic distance + text overlap
// ---------------------------------------------------------------------------

/// `weight_d * max(0, 1 - d/radius) + weight_t * jaccard(descriptions)`,
/// gated on category match.
pub struct DefaultScorer {
    radius_km: f64,
    distance_weight: f64,
    text_weight: f64,
}

impl DefaultScorer {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            radius_km: config.dedup_radius_km,
            distance_weight: config.distance_weight,
            text_weight: config.text_weight,
        }
    }
}

#[async_trait]
impl SimilarityScorer for DefaultScorer {
    async fn score(&self, candidate: &Complaint, report: &NewReport) -> Result<Score, CivicError> {
        // Mandatory gate: different categories are never the same issue.
        if candidate.category != report.category {
            return Ok(Score {
                value: 0.0,
                reason: format!(
                    "category mismatch ({} vs {})",
                    candidate.category, report.category
                ),
            });
        }

        let distance_km = haversine_km(
            candidate.location.latitude,
            candidate.location.longitude,
            report.location.latitude,
            report.location.longitude,
        );
        let distance_term = (1.0 - distance_km / self.radius_km).max(0.0);
        let text_term = jaccard(&tokenize(&candidate.description), &tokenize(&report.description));

        let value = self.distance_weight * distance_term + self.text_weight * text_term;
        Ok(Score {
            value,
            reason: format!(
                "distance {distance_km:.4} km (term {distance_term:.2}), text overlap {text_term:.2}"
            ),
        })
    }
}

/// Case-insensitive tokens, punctuation stripped.
fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-set Jaccard overlap. Two empty sets carry no signal: 0, not 1.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

// ---------------------------------------------------------------------------
// HttpScorer — pluggable remote scorer
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RemoteScoreRequest<'a> {
    candidate: &'a Complaint,
    report: &'a NewReport,
}

#[derive(Deserialize)]
struct RemoteScoreResponse {
    score: f64,
    reason: Option<String>,
}

/// Remote similarity scorer over HTTP (e.g. an embedding or LLM service).
///
/// The category gate still short-circuits locally, and the response score is
/// clamped into [0,1] — a misbehaving service must not be able to force a
/// merge past the engine's contract. Timeouts are the engine's job; failures
/// here surface as `ScorerUnavailable` and degrade to non-match upstream.
pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
}

impl HttpScorer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl SimilarityScorer for HttpScorer {
    async fn score(&self, candidate: &Complaint, report: &NewReport) -> Result<Score, CivicError> {
        if candidate.category != report.category {
            return Ok(Score {
                value: 0.0,
                reason: format!(
                    "category mismatch ({} vs {})",
                    candidate.category, report.category
                ),
            });
        }

        let response = self
            .client
            .post(&self.url)
            .json(&RemoteScoreRequest { candidate, report })
            .send()
            .await
            .map_err(|e| CivicError::ScorerUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| CivicError::ScorerUnavailable(e.to_string()))?;

        let body: RemoteScoreResponse = response
            .json()
            .await
            .map_err(|e| CivicError::ScorerUnavailable(format!("bad scorer response: {e}")))?;

        Ok(Score {
            value: body.score.clamp(0.0, 1.0),
            reason: body.reason.unwrap_or_else(|| "remote scorer".to_string()),
        })
    }
}
