//! Great-circle math shared by the dedup engine and the stores.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Latitude/longitude window enclosing a radius around a center point.
///
/// Used as a cheap prefilter before the exact haversine check: one degree of
/// latitude is ~111 km everywhere; a degree of longitude shrinks with
/// cos(latitude). Near the poles the window degenerates to the full range.
/// Longitude clamps at ±180 rather than wrapping, so a window straddling the
/// antimeridian is truncated; acceptable for a single-city deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// Bounding box around `(center_lat, center_lng)` with the given radius.
pub fn bounding_box(center_lat: f64, center_lng: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / 111.0;
    let cos_lat = center_lat.to_radians().cos();
    let lng_delta = if cos_lat > 1e-6 {
        radius_km / (111.0 * cos_lat)
    } else {
        180.0
    };

    BoundingBox {
        min_lat: (center_lat - lat_delta).max(-90.0),
        max_lat: (center_lat + lat_delta).min(90.0),
        min_lng: (center_lng - lng_delta).max(-180.0),
        max_lng: (center_lng + lng_delta).min(180.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_same_point_is_zero() {
        let d = haversine_km(12.9716, 77.5946, 12.9716, 77.5946);
        assert!(d.abs() < 1e-9, "expected 0, got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let ab = haversine_km(12.97, 77.59, 13.05, 77.60);
        let ba = haversine_km(13.05, 77.60, 12.97, 77.59);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn haversine_bengaluru_to_mysuru() {
        // ~125-145 km depending on exact endpoints
        let d = haversine_km(12.9716, 77.5946, 12.2958, 76.6394);
        assert!(d > 120.0 && d < 150.0, "expected ~130 km, got {d}");
    }

    #[test]
    fn haversine_fifteen_meters_apart() {
        let d = haversine_km(12.97, 77.59, 12.9701, 77.5901);
        assert!(d < 0.03, "expected tens of meters, got {d} km");
    }

    #[test]
    fn bounding_box_contains_points_within_radius() {
        let bbox = bounding_box(12.97, 77.59, 0.3);
        assert!(bbox.contains(12.9701, 77.5901));
        assert!(!bbox.contains(13.05, 77.60));
    }

    #[test]
    fn bounding_box_clamps_at_poles() {
        let bbox = bounding_box(89.999, 0.0, 5.0);
        assert!(bbox.max_lat <= 90.0);
        assert!(bbox.min_lng >= -180.0 && bbox.max_lng <= 180.0);
    }
}
