//! Decoding synthetic GRIB2 messages into oriented fields and coordinates.

use bytes::Bytes;
use grib2_parser::{decode, Grib2Error, Grib2Reader, Grib2Tables};
use test_utils::grib2::scan;
use test_utils::fixtures::dbz;
use test_utils::{assert_approx_eq, Grib2Builder, Packing};

fn decode_bytes(data: Vec<u8>) -> Result<grib2_parser::DecodedGrid, Grib2Error> {
    decode(Bytes::from(data), &Grib2Tables::radar())
}

// ============================================================================
// Orientation
// ============================================================================

#[test]
fn test_north_first_rows_become_south_first() {
    // MRMS scans north to south; the first row in the file is the north row.
    let data = Grib2Builder::new_mrms()
        .with_grid(3, 2)
        .with_bounds(30.0, -100.0, 31.0, -98.0)
        .with_data(vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0])
        .build();

    let grid = decode_bytes(data).unwrap();
    let field = grid.field("MergedReflectivityQC").unwrap();

    assert_eq!((field.width, field.height), (3, 2));
    // Row 0 is the south row
    assert_approx_eq!(field.value(0, 0).unwrap(), 10.0, 0.01);
    assert_approx_eq!(field.value(0, 2).unwrap(), 30.0, 0.01);
    assert_approx_eq!(field.value(1, 0).unwrap(), 1.0, 0.01);
}

#[test]
fn test_south_first_with_negative_i() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_bounds(30.0, -100.0, 31.0, -99.0)
        .with_scanning_mode(scan::J_POSITIVE | scan::I_NEGATIVE)
        .with_data(vec![1.0, 2.0, 3.0, 4.0])
        .build();

    let grid = decode_bytes(data).unwrap();
    let field = &grid.fields()[0];

    // First value in the file is the south-east corner
    assert_approx_eq!(field.value(0, 1).unwrap(), 1.0, 0.01);
    assert_approx_eq!(field.value(0, 0).unwrap(), 2.0, 0.01);
    assert_approx_eq!(field.value(1, 1).unwrap(), 3.0, 0.01);

    let lon = &grid.coordinate("longitude").unwrap().values;
    assert_approx_eq!(lon[0], -100.0, 1e-6);
    assert_approx_eq!(lon[1], -99.0, 1e-6);
}

#[test]
fn test_column_major_scanning_is_rejected() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_scanning_mode(scan::J_CONSECUTIVE)
        .with_data(vec![1.0, 2.0, 3.0, 4.0])
        .build();

    assert!(matches!(
        decode_bytes(data),
        Err(Grib2Error::UnsupportedGrid(_))
    ));
}

// ============================================================================
// Coordinates
// ============================================================================

#[test]
fn test_coordinate_axes_span_the_grid() {
    let data = Grib2Builder::new_mrms()
        .with_grid(11, 11)
        .with_bounds(30.0, -100.0, 40.0, -90.0)
        .with_constant_value(20.0)
        .build();

    let grid = decode_bytes(data).unwrap();
    let lat = &grid.coordinate("latitude").unwrap().values;
    let lon = &grid.coordinate("longitude").unwrap().values;

    assert_eq!(lat.len(), 11);
    assert_eq!(lon.len(), 11);
    assert_approx_eq!(lat[0], 30.0, 1e-6);
    assert_approx_eq!(lat[10], 40.0, 1e-6);
    assert!(lat.windows(2).all(|w| w[0] < w[1]));
    // Written as 260..270 east, normalized to -100..-90
    assert_approx_eq!(lon[0], -100.0, 1e-6);
    assert_approx_eq!(lon[10], -90.0, 1e-6);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_bitmap_points_decode_as_nan() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_scanning_mode(scan::J_POSITIVE)
        .with_data(vec![5.0, f32::NAN, f32::NAN, 45.0])
        .build();

    let grid = decode_bytes(data).unwrap();
    let field = &grid.fields()[0];

    assert_approx_eq!(field.value(0, 0).unwrap(), 5.0, 0.01);
    assert!(field.value(0, 1).unwrap().is_nan());
    assert!(field.value(1, 0).unwrap().is_nan());
    assert_approx_eq!(field.value(1, 1).unwrap(), 45.0, 0.01);
}

#[test]
fn test_sentinels_survive_decoding() {
    let data = Grib2Builder::new_mrms()
        .with_grid(3, 1)
        .with_scanning_mode(scan::J_POSITIVE)
        .with_data(vec![dbz::NO_COVERAGE, dbz::MISSING, 42.5])
        .build();

    let grid = decode_bytes(data).unwrap();
    let values = &grid.fields()[0].values;
    assert_approx_eq!(values[0], dbz::NO_COVERAGE, 0.05);
    assert_approx_eq!(values[1], dbz::MISSING, 0.05);
    assert_approx_eq!(values[2], 42.5, 0.05);
}

#[test]
fn test_decimal_scale_factor() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 1)
        .with_scanning_mode(scan::J_POSITIVE)
        .with_decimal_scale(1)
        .with_data(vec![12.3, 45.6])
        .build();

    let grid = decode_bytes(data).unwrap();
    let values = &grid.fields()[0].values;
    assert_approx_eq!(values[0], 12.3, 0.01);
    assert_approx_eq!(values[1], 45.6, 0.01);
}

#[test]
fn test_png_packing() {
    let data = Grib2Builder::new_mrms()
        .with_grid(3, 1)
        .with_scanning_mode(scan::J_POSITIVE)
        .with_packing(Packing::Png)
        .with_data(vec![-10.0, 25.0, 60.0])
        .build();

    let grid = decode_bytes(data).unwrap();
    let values = &grid.fields()[0].values;
    assert_approx_eq!(values[0], -10.0, 0.01);
    assert_approx_eq!(values[1], 25.0, 0.01);
    assert_approx_eq!(values[2], 60.0, 0.01);
}

// ============================================================================
// Fields and messages
// ============================================================================

#[test]
fn test_field_names_come_from_tables() {
    let mut data = Grib2Builder::new_mrms().with_grid(2, 2).build();
    data.extend(
        Grib2Builder::new_mrms()
            .with_grid(2, 2)
            .with_discipline(0)
            .with_parameter(99, 1)
            .build(),
    );

    let grid = decode_bytes(data).unwrap();
    let names: Vec<&str> = grid.field_names().collect();
    assert_eq!(names, vec!["MergedReflectivityQC", "P0_99_1"]);

    let metadata = grid.fields()[0].metadata.as_ref().unwrap();
    assert_eq!(metadata.level, "500 m above MSL");
}

#[test]
fn test_repeated_field_keeps_first() {
    let mut data = Grib2Builder::new_mrms()
        .with_grid(2, 1)
        .with_constant_value(10.0)
        .build();
    data.extend(
        Grib2Builder::new_mrms()
            .with_grid(2, 1)
            .with_constant_value(50.0)
            .build(),
    );

    let grid = decode_bytes(data).unwrap();
    assert_eq!(grid.fields().len(), 1);
    assert_approx_eq!(grid.fields()[0].values[0], 10.0, 0.01);
}

#[test]
fn test_field_with_different_shape_is_skipped() {
    let mut data = Grib2Builder::new_mrms().with_grid(2, 2).build();
    data.extend(
        Grib2Builder::new_mrms()
            .with_grid(3, 3)
            .with_parameter(1, 0)
            .build(),
    );

    let grid = decode_bytes(data).unwrap();
    assert_eq!(grid.fields().len(), 1);
}

#[test]
fn test_trailing_padding_is_ignored() {
    let mut data = Grib2Builder::new_mrms().with_grid(2, 2).build();
    data.extend_from_slice(&[0u8; 64]);

    assert!(decode_bytes(data).is_ok());
}

#[test]
fn test_reader_yields_messages_in_order() {
    let mut data = Grib2Builder::new_mrms().build();
    data.extend(Grib2Builder::new_mrms().with_parameter(1, 0).build());

    let mut reader = Grib2Reader::new(Bytes::from(data), Grib2Tables::radar());
    let first = reader.next_message().unwrap().unwrap();
    let second = reader.next_message().unwrap().unwrap();
    assert_eq!(first.parameter_name, "MergedReflectivityQC");
    assert_eq!(second.parameter_name, "PrecipRate");
    assert!(reader.next_message().unwrap().is_none());
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn test_non_grib_payload_has_no_fields() {
    let result = decode_bytes(b"<html>Not Found</html>".to_vec());
    assert!(matches!(result, Err(Grib2Error::NoFields)));
}

#[test]
fn test_truncated_message_is_invalid() {
    let mut data = Grib2Builder::new_mrms().build();
    data.truncate(data.len() / 2);

    assert!(matches!(
        decode_bytes(data),
        Err(Grib2Error::InvalidFormat(_))
    ));
}

#[test]
fn test_missing_end_marker_is_invalid() {
    let mut data = Grib2Builder::new_mrms().build();
    let len = data.len();
    data[len - 1] = b'X';

    assert!(matches!(
        decode_bytes(data),
        Err(Grib2Error::InvalidFormat(_))
    ));
}

// ============================================================================
// Real MRMS sample (optional)
// ============================================================================

#[test]
fn test_real_mrms_sample() {
    use std::io::Read;

    let path = test_utils::require_test_file!(
        "MRMS_ReflectivityAtLowestAltitude_00.50_sample.grib2.gz"
    );
    let compressed = std::fs::read(path).unwrap();
    let mut payload = Vec::new();
    flate2::read::GzDecoder::new(&compressed[..])
        .read_to_end(&mut payload)
        .unwrap();

    let grid = decode_bytes(payload).unwrap();
    let field = &grid.fields()[0];
    assert_eq!((field.width, field.height), (7000, 3500));

    let lat = &grid.coordinate("latitude").unwrap().values;
    assert_approx_eq!(lat[0], 20.005, 0.001);
    assert_approx_eq!(lat[lat.len() - 1], 54.995, 0.001);
}
