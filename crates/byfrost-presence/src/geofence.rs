// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Geofence evaluation via the haversine great-circle distance.

use byfrost_core::GeoPoint;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A configured workplace radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofencePolicy {
    pub center: GeoPoint,
    pub radius_m: f64,
}

/// Result of evaluating one coordinate pair against the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceEvaluation {
    pub distance_m: f64,
    pub within_radius: bool,
}

impl GeofencePolicy {
    /// Evaluate a punch location against the workplace radius.
    pub fn evaluate(&self, point: GeoPoint) -> GeofenceEvaluation {
        let distance_m = haversine_distance_m(self.center, point);
        GeofenceEvaluation {
            distance_m,
            within_radius: distance_m <= self.radius_m,
        }
    }
}

/// Great-circle distance between two WGS84 coordinates, in meters.
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint { latitude, longitude }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let distance = haversine_distance_m(point(0.0, 0.0), point(1.0, 0.0));
        let expected = 111_195.0; // pi * R / 180
        let tolerance = expected * 0.01;
        assert!(
            (distance - expected).abs() < tolerance,
            "expected ~{expected} m, got {distance} m"
        );
    }

    #[test]
    fn zero_distance_for_identical_points() {
        let p = point(-23.5505, -46.6333);
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = point(-23.5505, -46.6333);
        let b = point(-22.9068, -43.1729);
        let ab = haversine_distance_m(a, b);
        let ba = haversine_distance_m(b, a);
        assert!((ab - ba).abs() < 1e-6);
        // São Paulo to Rio is roughly 360 km.
        assert!((ab - 360_000.0).abs() < 10_000.0, "got {ab} m");
    }

    #[test]
    fn evaluation_respects_the_radius() {
        let policy = GeofencePolicy {
            center: point(-23.5505, -46.6333),
            radius_m: 150.0,
        };

        let near = policy.evaluate(point(-23.5506, -46.6334));
        assert!(near.within_radius);
        assert!(near.distance_m < 150.0);

        let far = policy.evaluate(point(-23.5600, -46.6333));
        assert!(!far.within_radius);
        assert!(far.distance_m > 1_000.0);
    }
}
