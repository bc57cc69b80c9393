// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate with latitude, longitude and an optional altitude.
///
/// Latitude and longitude are stored in decimal degrees, the altitude in meters
/// above the WGS84 ellipsoid. The default coordinate is invalid, it has no
/// latitude and no longitude.
///
/// # Example
///
/// ```rust
/// use common::position::GeoCoordinate;
///
/// let coordinate = GeoCoordinate::new(52.5200, 13.4050, Some(34.0));
/// assert!(coordinate.is_valid());
/// assert!(!GeoCoordinate::default().is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl GeoCoordinate {
    /// Creates a new [`GeoCoordinate`].
    ///
    /// # Arguments
    ///
    /// * `latitude` - Latitude in decimal degrees, positive for the northern hemisphere.
    /// * `longitude` - Longitude in decimal degrees, positive for the eastern hemisphere.
    /// * `altitude` - Altitude in meters if the fix carries one.
    pub fn new(latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        GeoCoordinate {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Returns `true` if latitude and longitude are inside their valid ranges.
    ///
    /// NaN values are never valid. The altitude does not take part in the check.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for GeoCoordinate {
    fn default() -> Self {
        GeoCoordinate {
            latitude: f64::NAN,
            longitude: f64::NAN,
            altitude: None,
        }
    }
}

/// A single position sample reported by a provider, a so called fix.
///
/// A fix is only usable if it carries a timestamp and a valid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    coordinate: GeoCoordinate,
    timestamp: Option<DateTime<Utc>>,
}

impl PositionInfo {
    /// Creates a new fix for `coordinate` taken at `timestamp`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use common::position::{GeoCoordinate, PositionInfo};
    ///
    /// let fix = PositionInfo::new(GeoCoordinate::new(10.0, 20.0, Some(30.0)), chrono::Utc::now());
    /// assert!(fix.is_valid());
    /// ```
    pub fn new(coordinate: GeoCoordinate, timestamp: DateTime<Utc>) -> Self {
        PositionInfo {
            coordinate,
            timestamp: Some(timestamp),
        }
    }

    /// Creates a fix without coordinate and timestamp.
    pub fn invalid() -> Self {
        PositionInfo {
            coordinate: GeoCoordinate::default(),
            timestamp: None,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Returns `true` if the fix has a timestamp and a valid coordinate.
    pub fn is_valid(&self) -> bool {
        self.timestamp.is_some() && self.coordinate.is_valid()
    }

    pub fn coordinate(&self) -> GeoCoordinate {
        self.coordinate
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

impl Default for PositionInfo {
    fn default() -> Self {
        PositionInfo::invalid()
    }
}
