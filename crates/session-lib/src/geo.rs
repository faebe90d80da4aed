//! Great-circle distance helpers.
use ricecoco_common::Location;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
pub fn distance_m(a: Location, b: Location) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // clamp guards asin against rounding slightly above 1 for antipodal points
    let d = 2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin();
    // h underflows for distinct points a hair apart; they are still apart
    d.max(f64::MIN_POSITIVE)
}

/// Whether `a` lies within `threshold_m` meters of `b` (inclusive).
///
/// `(0, 0)` is an ordinary point here; callers that use it as a placeholder
/// must not ask before a real fix is known.
pub fn is_location_near(a: Location, b: Location, threshold_m: f64) -> bool {
    distance_m(a, b) <= threshold_m
}
