//! In-memory spatial index over active complaints.
//!
//! Complaints are bucketed into geohash-6 cells (~1.2 km x 0.6 km) per
//! category. A radius query decodes to the set of cells covering the search
//! window and haversine-filters the entries found there. Correctness, not
//! throughput, is the contract: the cell walk only narrows the scan.
//!
//! Readers run concurrently with writers. A reader may miss a complaint
//! inserted after its lookup started (eventual visibility); it never sees an
//! entry for a complaint that has been removed.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use geohash::Coord;
use tracing::warn;
use uuid::Uuid;

use civicpulse_common::{bounding_box, haversine_km, Category, Complaint, GeoPoint};

const GEOHASH_PRECISION: usize = 6;

// Geohash-6 cell dimensions in degrees. Sampling the search window at half
// this pitch guarantees every overlapped cell is visited.
const CELL_LAT_DEG: f64 = 0.0054931640625;
const CELL_LNG_DEG: f64 = 0.010986328125;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    id: Uuid,
    latitude: f64,
    longitude: f64,
}

/// Geohash-bucketed index of non-terminal complaints, keyed per category.
#[derive(Default)]
pub struct GeoIndex {
    cells: RwLock<HashMap<(Category, String), Vec<IndexEntry>>>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a complaint. Terminal complaints and complaints with invalid
    /// coordinates are skipped: they must never come back as candidates,
    /// and a bad stored row must never poison a query.
    pub fn insert(&self, complaint: &Complaint) {
        if complaint.status.is_terminal() {
            return;
        }
        let Some(cell) = cell_for(complaint.location) else {
            warn!(complaint_id = %complaint.id, "complaint has unindexable coordinates, skipping");
            return;
        };
        let entry = IndexEntry {
            id: complaint.id,
            latitude: complaint.location.latitude,
            longitude: complaint.location.longitude,
        };
        let mut cells = self.cells.write().expect("geo index lock poisoned");
        cells.entry((complaint.category, cell)).or_default().push(entry);
    }

    /// Drop a complaint from the index (it reached a terminal state).
    pub fn remove(&self, category: Category, id: Uuid, location: GeoPoint) {
        let Some(cell) = cell_for(location) else {
            return;
        };
        let mut cells = self.cells.write().expect("geo index lock poisoned");
        if let Some(entries) = cells.get_mut(&(category, cell.clone())) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                cells.remove(&(category, cell));
            }
        }
    }

    /// IDs of indexed complaints of `category` within `radius_km` of `center`.
    pub fn query(&self, category: Category, center: GeoPoint, radius_km: f64) -> Vec<Uuid> {
        if !center.is_valid() || radius_km <= 0.0 {
            return Vec::new();
        }

        let covering = covering_cells(center, radius_km);
        let cells = self.cells.read().expect("geo index lock poisoned");

        let mut hits = Vec::new();
        for cell in covering {
            if let Some(entries) = cells.get(&(category, cell)) {
                for e in entries {
                    let d = haversine_km(center.latitude, center.longitude, e.latitude, e.longitude);
                    if d <= radius_km {
                        hits.push(e.id);
                    }
                }
            }
        }
        hits
    }

    /// Number of indexed entries, across all categories and cells.
    pub fn len(&self) -> usize {
        let cells = self.cells.read().expect("geo index lock poisoned");
        cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cell_for(location: GeoPoint) -> Option<String> {
    if !location.is_valid() {
        return None;
    }
    geohash::encode(
        Coord { x: location.longitude, y: location.latitude },
        GEOHASH_PRECISION,
    )
    .ok()
}

/// Geohash cells overlapping the search window, found by sampling the
/// window at half-cell pitch. For the dedup radius this is the center cell
/// and its ring of neighbors; larger radii just sample more points.
fn covering_cells(center: GeoPoint, radius_km: f64) -> HashSet<String> {
    let bbox = bounding_box(center.latitude, center.longitude, radius_km);
    let mut cells = HashSet::new();

    let mut lat = bbox.min_lat;
    while lat <= bbox.max_lat + CELL_LAT_DEG / 2.0 {
        let mut lng = bbox.min_lng;
        while lng <= bbox.max_lng + CELL_LNG_DEG / 2.0 {
            let point = GeoPoint::new(lat.clamp(-90.0, 90.0), lng.clamp(-180.0, 180.0));
            if let Some(cell) = cell_for(point) {
                cells.insert(cell);
            }
            lng += CELL_LNG_DEG / 2.0;
        }
        lat += CELL_LAT_DEG / 2.0;
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use civicpulse_common::{NewReport, Status};

    fn complaint_at(category: Category, lat: f64, lng: f64) -> Complaint {
        Complaint::from_report(&NewReport {
            category,
            department_id: 1,
            description: "streetlight out".into(),
            location: GeoPoint::new(lat, lng),
            address: "5th Cross".into(),
            severity: 4,
            image_url: None,
        })
    }

    #[test]
    fn finds_nearby_same_category() {
        let index = GeoIndex::new();
        let c = complaint_at(Category::Road, 12.97, 77.59);
        index.insert(&c);

        let hits = index.query(Category::Road, GeoPoint::new(12.9701, 77.5901), 0.3);
        assert_eq!(hits, vec![c.id]);
    }

    #[test]
    fn excludes_other_categories() {
        let index = GeoIndex::new();
        index.insert(&complaint_at(Category::Water, 12.97, 77.59));

        let hits = index.query(Category::Road, GeoPoint::new(12.97, 77.59), 0.3);
        assert!(hits.is_empty());
    }

    #[test]
    fn excludes_points_outside_radius() {
        let index = GeoIndex::new();
        index.insert(&complaint_at(Category::Road, 13.05, 77.60)); // ~9 km away

        let hits = index.query(Category::Road, GeoPoint::new(12.97, 77.59), 0.3);
        assert!(hits.is_empty());
    }

    #[test]
    fn finds_neighbor_cell_points_near_boundary() {
        let index = GeoIndex::new();
        // Two points ~100m apart that straddle a likely cell boundary.
        let a = complaint_at(Category::Garbage, 12.9699, 77.5899);
        index.insert(&a);

        let hits = index.query(Category::Garbage, GeoPoint::new(12.9708, 77.5905), 0.3);
        assert_eq!(hits, vec![a.id]);
    }

    #[test]
    fn terminal_complaints_are_not_indexed() {
        let index = GeoIndex::new();
        let mut c = complaint_at(Category::Road, 12.97, 77.59);
        c.status = Status::Completed;
        index.insert(&c);

        assert!(index.is_empty());
        assert!(index.query(Category::Road, GeoPoint::new(12.97, 77.59), 0.3).is_empty());
    }

    #[test]
    fn invalid_coordinates_never_match_and_never_crash() {
        let index = GeoIndex::new();
        let mut c = complaint_at(Category::Road, 12.97, 77.59);
        c.location = GeoPoint::new(f64::NAN, 200.0);
        index.insert(&c);

        assert!(index.is_empty());
        assert!(index.query(Category::Road, GeoPoint::new(12.97, 77.59), 0.3).is_empty());
    }

    #[test]
    fn remove_drops_the_entry() {
        let index = GeoIndex::new();
        let c = complaint_at(Category::Road, 12.97, 77.59);
        index.insert(&c);
        index.remove(c.category, c.id, c.location);

        assert!(index.query(Category::Road, c.location, 0.3).is_empty());
    }

    #[test]
    fn larger_radius_spans_many_cells() {
        let index = GeoIndex::new();
        let far = complaint_at(Category::Road, 12.99, 77.62); // a few km out
        index.insert(&far);

        assert!(index.query(Category::Road, GeoPoint::new(12.97, 77.59), 0.3).is_empty());
        let hits = index.query(Category::Road, GeoPoint::new(12.97, 77.59), 6.0);
        assert_eq!(hits, vec![far.id]);
    }

    #[test]
    fn invalid_query_center_returns_nothing() {
        let index = GeoIndex::new();
        index.insert(&complaint_at(Category::Road, 12.97, 77.59));
        assert!(index.query(Category::Road, GeoPoint::new(f64::NAN, 77.59), 0.3).is_empty());
    }
}
