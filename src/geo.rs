use serde::Serialize;

/// Tolerance for treating two coordinates as the same place (about 10 cm).
const COORD_EPSILON: f64 = 1e-6;
const ALTITUDE_EPSILON: f64 = 0.01;

/// Decimal-degree geolocation, signed (south and west negative).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

impl GeoPoint {
    /// Same position within rounding noise. Altitude is compared only when
    /// `self` carries one.
    pub fn same_place(&self, other: &GeoPoint) -> bool {
        let horizontal = (self.latitude - other.latitude).abs() < COORD_EPSILON
            && (self.longitude - other.longitude).abs() < COORD_EPSILON;
        let vertical = match (self.altitude, other.altitude) {
            (None, _) => true,
            (Some(a), Some(b)) => (a - b).abs() < ALTITUDE_EPSILON,
            (Some(_), None) => false,
        };
        horizontal && vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_place_ignores_rounding() {
        let a = GeoPoint { latitude: 35.658581, longitude: 139.745433, altitude: None };
        let b = GeoPoint { latitude: 35.6585812, longitude: 139.7454328, altitude: Some(12.0) };
        assert!(a.same_place(&b));
    }

    #[test]
    fn altitude_only_checked_when_present() {
        let a = GeoPoint { latitude: 1.0, longitude: 2.0, altitude: Some(10.0) };
        let b = GeoPoint { latitude: 1.0, longitude: 2.0, altitude: None };
        assert!(!a.same_place(&b));
        assert!(b.same_place(&a));
    }
}
