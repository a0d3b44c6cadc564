//! Great-circle helpers. All distances are in meters.

use crate::models::Location;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

pub fn rad_to_deg(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Haversine distance between two (latitude, longitude) pairs given in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = deg_to_rad(lat1);
    let lat2 = deg_to_rad(lat2);
    let u = ((lat2 - lat1) / 2.0).sin();
    let v = ((deg_to_rad(lon2) - deg_to_rad(lon1)) / 2.0).sin();
    let x = (u * u + lat1.cos() * lat2.cos() * v * v).sqrt();
    2.0 * EARTH_RADIUS_M * x.min(1.0).asin()
}

pub fn distance(a: Location, b: Location) -> f64 {
    distance_meters(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Length of a polyline visiting the given locations in order.
pub fn polyline_length(points: impl IntoIterator<Item = Location>) -> f64 {
    let mut total = 0.0;
    let mut prev: Option<Location> = None;
    for p in points {
        if let Some(q) = prev {
            total += distance(q, p);
        }
        prev = Some(p);
    }
    total
}
