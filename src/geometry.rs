use crate::coords::CoordinatePair;
use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};

/// Metres per degree of latitude, close enough for a query window.
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crs {
    Wgs84,
}

impl Crs {
    /// OGC identifier, as the Process API expects it.
    pub fn uri(self: &Self) -> &'static str {
        match self {
            Crs::Wgs84 => "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
        }
    }
}

/// Axis order is x = longitude, y = latitude.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub crs: Crs,
}

impl BoundingBox {
    /// Square window of `half_extent_m` metres on each side of the point.
    pub fn around(pair: &CoordinatePair, half_extent_m: f64) -> Result<Self> {
        let CoordinatePair {
            latitude,
            longitude,
        } = *pair;

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FetchError::InvalidCoordinate(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(FetchError::InvalidCoordinate(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        if !half_extent_m.is_finite() || half_extent_m <= 0.0 {
            return Err(FetchError::InvalidCoordinate(format!(
                "extent {half_extent_m} must be positive"
            )));
        }

        let d_lat = half_extent_m / METERS_PER_DEGREE;
        // Keep a usable width near the poles.
        let cos_lat = latitude.to_radians().cos().max(0.01);
        let d_lon = half_extent_m / (METERS_PER_DEGREE * cos_lat);

        Ok(Self {
            min_x: (longitude - d_lon).max(-180.0),
            min_y: (latitude - d_lat).max(-90.0),
            max_x: (longitude + d_lon).min(180.0),
            max_y: (latitude + d_lat).min(90.0),
            crs: Crs::Wgs84,
        })
    }

    pub fn center(self: &Self) -> CoordinatePair {
        CoordinatePair::new(
            (self.min_y + self.max_y) / 2.0,
            (self.min_x + self.max_x) / 2.0,
        )
    }

    pub fn as_array(self: &Self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}
