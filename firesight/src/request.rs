//! Image request types.
//!
//! Provides the `ImageRequest` type that encapsulates all parameters
//! needed to retrieve one satellite image: which constellation and
//! product, the acquisition date, and where on the globe to look.
//!
//! Requests are validated at construction, so a constructed
//! `ImageRequest` is always safe to hand to the orchestrator — no
//! downstream component re-checks coordinates.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

/// Satellite constellations the service can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Satellite {
    /// Terra/Aqua MODIS instruments.
    Modis,
    /// Suomi NPP / NOAA-20 VIIRS instruments.
    Viirs,
    /// GOES-East ABI instrument.
    Goes,
}

impl Satellite {
    /// Stable name used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Satellite::Modis => "MODIS",
            Satellite::Viirs => "VIIRS",
            Satellite::Goes => "GOES",
        }
    }
}

impl fmt::Display for Satellite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Satellite {
    type Err = InvalidRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MODIS" => Ok(Satellite::Modis),
            "VIIRS" => Ok(Satellite::Viirs),
            "GOES" => Ok(Satellite::Goes),
            _ => Err(InvalidRequestError::UnknownSatellite(s.to_string())),
        }
    }
}

/// Errors from constructing an [`ImageRequest`].
///
/// These are rejected before any cache or network activity and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRequestError {
    /// Latitude outside [-90, 90].
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Radius must be a positive, finite distance.
    #[error("radius {0} km is not a positive distance")]
    InvalidRadius(f64),

    /// Product identifier must be non-empty.
    #[error("product identifier is empty")]
    EmptyProduct,

    /// Satellite name not recognised.
    #[error("unknown satellite '{0}' (expected MODIS, VIIRS or GOES)")]
    UnknownSatellite(String),
}

/// A validated request for one satellite image.
///
/// Immutable once constructed. Two requests with identical fields map
/// to the same cache key (see [`crate::cache::CacheKey`]).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    satellite: Satellite,
    product: String,
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    radius_km: f64,
}

impl ImageRequest {
    /// Create a new request, validating coordinates and radius.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if the latitude or longitude is
    /// out of range, the radius is not positive and finite, or the
    /// product identifier is empty.
    pub fn new(
        satellite: Satellite,
        product: impl Into<String>,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Self, InvalidRequestError> {
        let product = product.into();

        if !(-90.0..=90.0).contains(&latitude) || latitude.is_nan() {
            return Err(InvalidRequestError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) || longitude.is_nan() {
            return Err(InvalidRequestError::LongitudeOutOfRange(longitude));
        }
        if !(radius_km > 0.0 && radius_km.is_finite()) {
            return Err(InvalidRequestError::InvalidRadius(radius_km));
        }
        if product.is_empty() {
            return Err(InvalidRequestError::EmptyProduct);
        }

        Ok(Self {
            satellite,
            product,
            date,
            latitude,
            longitude,
            radius_km,
        })
    }

    /// The satellite constellation to query.
    pub fn satellite(&self) -> Satellite {
        self.satellite
    }

    /// The product identifier (e.g. "MOD09GA").
    pub fn product(&self) -> &str {
        &self.product
    }

    /// The acquisition date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Latitude of the point of interest, degrees north.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude of the point of interest, degrees east.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Search radius around the point, kilometres.
    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }
}
