//! Great-circle distance between geographic coordinates.
//!
//! Coordinates follow the `[longitude, latitude]` convention used by the
//! customer records and campaign anchors throughout the system.

/// A `[longitude, latitude]` pair in degrees.
pub type Coordinate = [f64; 2];

/// Earth radius in kilometers, for the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius within which two campaigns for the same product are considered
/// the same cluster, and within which a customer may join a campaign.
pub const EXCLUSION_RADIUS_KM: f64 = 2.0;

/// Haversine distance in kilometers between two `[longitude, latitude]` pairs.
///
/// Pure and total: out-of-range coordinates still produce a finite distance
/// rather than an error, mirroring unvalidated geographic input upstream.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b[1] - a[1]).to_radians();
    let d_lon = (b[0] - a[0]).to_radians();
    let lat1 = a[1].to_radians();
    let lat2 = b[1].to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points() {
        let p = [31.2357, 30.0444];
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = [31.2357, 30.0444]; // Cairo
        let b = [29.9187, 31.2001]; // Alexandria
        let ab = distance_km(a, b);
        let ba = distance_km(b, a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_known_distance_cairo_alexandria() {
        let cairo = [31.2357, 30.0444];
        let alexandria = [29.9187, 31.2001];
        let d = distance_km(cairo, alexandria);
        // Roughly 180 km apart
        assert!(d > 170.0 && d < 190.0, "got {d}");
    }

    #[test]
    fn test_antipodal_points() {
        let a = [0.0, 0.0];
        let b = [180.0, 0.0];
        let d = distance_km(a, b);
        // Half the Earth's circumference, ~20015 km
        assert!((d - 20015.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_equator_to_pole() {
        let equator = [0.0, 0.0];
        let pole = [0.0, 90.0];
        let d = distance_km(equator, pole);
        // Quarter circumference, ~10007 km
        assert!((d - 10007.5).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_short_distance_within_exclusion_radius() {
        // ~15 meters apart, well within the 2 km exclusion radius
        let a = [31.0, 30.0];
        let b = [31.0001, 30.0001];
        let d = distance_km(a, b);
        assert!(d < EXCLUSION_RADIUS_KM);
        assert!(d > 0.0);
    }

    #[test]
    fn test_out_of_range_input_degrades_to_distance() {
        // Nonsense coordinates still yield a finite, non-negative number
        let d = distance_km([720.0, 200.0], [-540.0, -300.0]);
        assert!(d.is_finite());
        assert!(d >= 0.0);
    }
}
