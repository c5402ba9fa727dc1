//! Complaint intake core: geospatial candidate lookup, similarity scoring,
//! merge-vs-create decisions, and the complaint lifecycle.
//!
//! Everything here is store-agnostic: persistence is injected through the
//! [`ComplaintStore`] trait, similarity through [`SimilarityScorer`]. The
//! deterministic default scorer needs no network; an external scorer can be
//! swapped in behind the same trait without touching the engine's control flow.

pub mod dedup;
pub mod geo_index;
pub mod lifecycle;
pub mod scorer;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dedup::{DeduplicationEngine, IngestOutcome};
pub use geo_index::GeoIndex;
pub use lifecycle::ComplaintLifecycle;
pub use scorer::{DefaultScorer, HttpScorer, Score, SimilarityScorer};
pub use store::{ComplaintStore, RecurrenceUpdate};
