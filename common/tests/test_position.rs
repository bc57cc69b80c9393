// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{DateTime, Utc};
use common::position::{GeoCoordinate, PositionInfo};

fn get_position_info_as_json<'a>() -> &'a str {
    r#"
    {
        "coordinate": {
            "latitude": 52.025833,
            "longitude": 11.279166,
            "altitude": 88.5
        },
        "timestamp": "2025-05-01T10:15:00Z"
    }
    "#
}

fn get_timestamp() -> DateTime<Utc> {
    "2025-05-01T10:15:00Z".parse::<DateTime<Utc>>().unwrap()
}

#[test]
pub fn deserialize_coordinate_without_altitude() {
    let coordinate = GeoCoordinate::from_json(r#"{"latitude": 52.025833, "longitude": 11.279166}"#)
        .unwrap_or_else(|e| panic!("Failed to deserialize the raw json. Reason: {e}"));
    assert_eq!(coordinate, GeoCoordinate::new(52.025833, 11.279166, None));
}

#[test]
pub fn deserialize_position_info_from_json() {
    let info = PositionInfo::from_json(get_position_info_as_json())
        .unwrap_or_else(|e| panic!("Failed to deserialize the raw json. Reason: {e}"));
    assert_eq!(
        info,
        PositionInfo::new(
            GeoCoordinate::new(52.025833, 11.279166, Some(88.5)),
            get_timestamp()
        )
    );
    assert!(info.is_valid());
}

#[test]
pub fn default_coordinate_is_invalid() {
    let coordinate = GeoCoordinate::default();
    assert!(!coordinate.is_valid());
    assert_eq!(coordinate.altitude, None);
}

#[test]
pub fn coordinate_out_of_range_is_invalid() {
    assert!(!GeoCoordinate::new(90.5, 0.0, None).is_valid());
    assert!(!GeoCoordinate::new(0.0, -180.5, None).is_valid());
    assert!(!GeoCoordinate::new(f64::NAN, 0.0, None).is_valid());
    assert!(GeoCoordinate::new(-90.0, 180.0, None).is_valid());
}

#[test]
pub fn fix_without_timestamp_is_invalid() {
    assert!(!PositionInfo::invalid().is_valid());
    assert!(!PositionInfo::default().is_valid());
}

#[test]
pub fn fix_with_invalid_coordinate_is_invalid() {
    let info = PositionInfo::new(GeoCoordinate::default(), get_timestamp());
    assert!(!info.is_valid());
    assert_eq!(info.timestamp(), Some(get_timestamp()));
}
