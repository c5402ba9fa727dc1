use std::env;

/// Dedup engine tuning. These are configuration, not fixed law: the radius
/// and threshold defaults were never settled product-side, so every knob is
/// overridable from the environment.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Candidate search radius for merging ("same street/building").
    pub dedup_radius_km: f64,
    /// Minimum similarity score for a merge to be accepted.
    pub accept_threshold: f64,
    /// Weight of the distance term in the default scorer.
    pub distance_weight: f64,
    /// Weight of the text-overlap term in the default scorer.
    pub text_weight: f64,
    /// Hard cap on a single scorer call. On expiry the candidate is a non-match.
    pub scorer_timeout_ms: u64,
    /// Bounded retries for store write conflicts before surfacing.
    pub conflict_retries: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            dedup_radius_km: 0.3,
            accept_threshold: 0.6,
            distance_weight: 0.5,
            text_weight: 0.5,
            scorer_timeout_ms: 2000,
            conflict_retries: 3,
        }
    }
}

impl DedupConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dedup_radius_km: parsed_env("DEDUP_RADIUS_KM", defaults.dedup_radius_km),
            accept_threshold: parsed_env("DEDUP_ACCEPT_THRESHOLD", defaults.accept_threshold),
            distance_weight: parsed_env("DEDUP_DISTANCE_WEIGHT", defaults.distance_weight),
            text_weight: parsed_env("DEDUP_TEXT_WEIGHT", defaults.text_weight),
            scorer_timeout_ms: parsed_env("SCORER_TIMEOUT_MS", defaults.scorer_timeout_ms),
            conflict_retries: parsed_env("STORE_CONFLICT_RETRIES", defaults.conflict_retries),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub web_host: String,
    pub web_port: u16,
    /// Optional remote similarity scorer endpoint. Unset means the
    /// deterministic default scorer runs.
    pub scorer_url: Option<String>,
    pub dedup: DedupConfig,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            scorer_url: env::var("SCORER_URL").ok().filter(|s| !s.is_empty()),
            dedup: DedupConfig::from_env(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number, got {raw:?}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_defaults() {
        let d = DedupConfig::default();
        assert_eq!(d.dedup_radius_km, 0.3);
        assert_eq!(d.accept_threshold, 0.6);
        assert_eq!(d.distance_weight + d.text_weight, 1.0);
        assert!(d.conflict_retries >= 1);
    }
}
