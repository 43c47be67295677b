//! Geodetic points, great-circle distance and search bounding boxes.
//!
//! Distances are computed with the haversine formula on a sphere of the
//! IUGG mean Earth radius. At the radii this service works with (a few to a
//! few hundred kilometres) the deviation from the WGS 84 ellipsoid stays
//! under 0.5 %, and unlike a planar approximation it does not grow with
//! latitude or distance.

use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::{Error, Result};

/// Mean Earth radius (IUGG), in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Padding added around bounding boxes so that points lying exactly on the
/// search circle survive the degree/radian round trip.
const BOX_PADDING_DEG: f64 = 1e-9;

// ─── GeoPoint ────────────────────────────────────────────────────────────────

/// A WGS 84 position in decimal degrees.
///
/// Always valid: latitude in `[-90, 90]`, longitude in `[-180, 180]`, both
/// finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
  latitude:  f64,
  longitude: f64,
}

impl GeoPoint {
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
      return Err(Error::InvalidLatitude(latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
      return Err(Error::InvalidLongitude(longitude));
    }
    Ok(Self { latitude, longitude })
  }

  pub fn latitude(&self) -> f64 { self.latitude }

  pub fn longitude(&self) -> f64 { self.longitude }

  /// Great-circle distance to `other`, in metres.
  pub fn distance_to(&self, other: &GeoPoint) -> f64 {
    let phi1 = self.latitude.to_radians();
    let phi2 = other.latitude.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (other.longitude - self.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
      + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // `a` can drift a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
  }
}

// ─── BoundingBox ─────────────────────────────────────────────────────────────

/// An inclusive longitude interval, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongitudeSpan {
  pub min: f64,
  pub max: f64,
}

/// A latitude band crossed with one or two longitude spans; the coarse
/// spatial-index filter that precedes exact distance checks.
///
/// Every point within the search circle lies inside the box. The converse
/// does not hold, so results must still be filtered by
/// [`GeoPoint::distance_to`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
  pub min_latitude:    f64,
  pub max_latitude:    f64,
  /// One span normally, two when the circle crosses the antimeridian.
  pub longitude_spans: Vec<LongitudeSpan>,
}

impl BoundingBox {
  /// The smallest box enclosing the spherical cap of `radius_m` metres
  /// around `center`. `radius_m` must be non-negative.
  pub fn around(center: GeoPoint, radius_m: f64) -> Self {
    let angular = radius_m / EARTH_RADIUS_M;
    let lat = center.latitude.to_radians();
    let min_lat = lat - angular;
    let max_lat = lat + angular;

    // The cap contains a pole: every longitude is reachable.
    if min_lat <= -FRAC_PI_2 || max_lat >= FRAC_PI_2 {
      return Self {
        min_latitude:    (min_lat.to_degrees() - BOX_PADDING_DEG).max(-90.0),
        max_latitude:    (max_lat.to_degrees() + BOX_PADDING_DEG).min(90.0),
        longitude_spans: vec![LongitudeSpan { min: -180.0, max: 180.0 }],
      };
    }

    let d_lon = (angular.sin() / lat.cos()).min(1.0).asin().to_degrees()
      + BOX_PADDING_DEG;
    let min_lon = center.longitude - d_lon;
    let max_lon = center.longitude + d_lon;

    let longitude_spans = if min_lon < -180.0 {
      vec![
        LongitudeSpan { min: min_lon + 360.0, max: 180.0 },
        LongitudeSpan { min: -180.0, max: max_lon },
      ]
    } else if max_lon > 180.0 {
      vec![
        LongitudeSpan { min: min_lon, max: 180.0 },
        LongitudeSpan { min: -180.0, max: max_lon - 360.0 },
      ]
    } else {
      vec![LongitudeSpan { min: min_lon, max: max_lon }]
    };

    Self {
      min_latitude: (min_lat.to_degrees() - BOX_PADDING_DEG).max(-90.0),
      max_latitude: (max_lat.to_degrees() + BOX_PADDING_DEG).min(90.0),
      longitude_spans,
    }
  }

  pub fn contains(&self, point: &GeoPoint) -> bool {
    (self.min_latitude..=self.max_latitude).contains(&point.latitude)
      && self
        .longitude_spans
        .iter()
        .any(|span| (span.min..=span.max).contains(&point.longitude))
  }
}
