//! Tests for error types

use particle_db::{Error, TrackedInput};

#[test]
fn test_storage_error() {
    let error = Error::Storage("file not found".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("file not found"));
}

#[test]
fn test_schema_mismatch_error_names_both_sides() {
    let error = Error::SchemaMismatch {
        expected: vec!["x".to_string(), "y".to_string(), "r".to_string()],
        found: vec!["x".to_string(), "y".to_string()],
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Schema mismatch"));
    assert!(error_str.contains("\"r\""));
}

#[test]
fn test_column_not_found_error() {
    let error = Error::ColumnNotFound("velocity".to_string());
    assert!(format!("{error}").contains("velocity"));
}

#[test]
fn test_length_mismatch_error() {
    let error = Error::LengthMismatch {
        column: "id".to_string(),
        expected: 10,
        found: 7,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("id"));
    assert!(error_str.contains("10"));
    assert!(error_str.contains('7'));
}

#[test]
fn test_unsupported_input_error() {
    // A 2-wide unnamed block has no default column names.
    let mut table = particle_db::MeasurementTable::new();
    let error = table
        .add_tracking_data(0, TrackedInput::block(vec![vec![1.0, 2.0]]))
        .unwrap_err();
    let error_str = format!("{error}");
    assert!(error_str.contains("Unsupported input"));
    assert!(error_str.contains("column names"));
}

#[test]
fn test_type_coercion_error() {
    let error = Error::TypeCoercion {
        column: "r".to_string(),
        reason: "`2.5` is not representable as an integer".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Cannot coerce"));
    assert!(error_str.contains("2.5"));
}

#[test]
fn test_frame_index_required_error_suggests_fix() {
    let error = Error::FrameIndexRequired {
        operation: "get_info",
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("get_info"));
    assert!(error_str.contains("set_frame_index"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_error_debug() {
    let error = Error::ColumnNotFound("x".to_string());
    assert!(format!("{error:?}").contains("ColumnNotFound"));
}
