//! Tests for GeoBounds construction and formatting.

use radar_common::bbox::{BoundsParseError, GeoBounds};

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_conus_fallback_constant() {
    assert_eq!(GeoBounds::CONUS.as_array(), [25.0, -125.0, 50.0, -65.0]);
    assert!(GeoBounds::CONUS.is_ordered());
}

#[test]
fn test_width_height() {
    let bounds = GeoBounds::new(30.0, -100.0, 40.0, -90.0);
    assert_eq!(bounds.width(), 10.0);
    assert_eq!(bounds.height(), 10.0);
}

#[test]
fn test_contains_point() {
    let bounds = GeoBounds::new(30.0, -100.0, 40.0, -90.0);
    assert!(bounds.contains_point(35.0, -95.0));
    assert!(bounds.contains_point(30.0, -100.0));
    assert!(!bounds.contains_point(41.0, -95.0));
    assert!(!bounds.contains_point(35.0, -89.0));
}

// ============================================================================
// from_coordinates tests
// ============================================================================

#[test]
fn test_from_descending_coordinates_is_ordered() {
    // MRMS latitudes run north to south
    let lats: Vec<f64> = (0..50).map(|i| 54.995 - i as f64 * 0.01).collect();
    let lons: Vec<f64> = (0..70).map(|i| -129.995 + i as f64 * 0.01).collect();
    let bounds = GeoBounds::from_coordinates(&lats, &lons).unwrap();

    assert!(bounds.is_ordered());
    assert!((bounds.north - 54.995).abs() < 1e-9);
    assert!((bounds.south - 54.505).abs() < 1e-9);
    assert!((bounds.west + 129.995).abs() < 1e-9);
}

#[test]
fn test_single_point_axis() {
    let bounds = GeoBounds::from_coordinates(&[12.5], &[7.0]).unwrap();
    assert_eq!(bounds, GeoBounds::new(12.5, 7.0, 12.5, 7.0));
    assert!(bounds.is_ordered());
}

#[test]
fn test_all_nan_axis_is_none() {
    assert!(GeoBounds::from_coordinates(&[f64::NAN], &[1.0]).is_none());
}

// ============================================================================
// Parsing tests
// ============================================================================

#[test]
fn test_parse_with_whitespace() {
    let bounds = GeoBounds::from_csv(" 30, -100 ,40,-90 ").unwrap();
    assert_eq!(bounds, GeoBounds::new(30.0, -100.0, 40.0, -90.0));
}

#[test]
fn test_parse_wrong_arity() {
    assert!(matches!(
        GeoBounds::from_csv("1,2,3"),
        Err(BoundsParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_parse_bad_number() {
    assert!(matches!(
        GeoBounds::from_csv("1,2,x,4"),
        Err(BoundsParseError::InvalidNumber(_))
    ));
}

#[test]
fn test_serde_field_names() {
    let json = serde_json::to_value(GeoBounds::CONUS).unwrap();
    assert_eq!(json["south"], 25.0);
    assert_eq!(json["east"], -65.0);
}
