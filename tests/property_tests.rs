//! Property-based tests for the measurement store
//!
//! Invariants that must hold for any table the tracking pipeline can
//! produce: persistence round-trips exactly, appends preserve arrival
//! order, index-mode transitions invert, dtype coercion is atomic.

use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use particle_db::storage::{read_table, write_table};
use particle_db::{ColumnType, MeasurementTable, TrackedInput};

static FILE_SEQ: AtomicUsize = AtomicUsize::new(0);

fn scratch_path() -> String {
    format!(
        "/tmp/particle_db_prop_{}_{}.parquet",
        std::process::id(),
        FILE_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Per-frame detection batches: (frame number, rows of x/y/r).
fn frame_batches() -> impl Strategy<Value = Vec<(u64, Vec<Vec<f64>>)>> {
    prop::collection::vec(
        (
            0u64..100,
            prop::collection::vec(prop::collection::vec(-1000.0f64..1000.0, 3), 0..6),
        ),
        1..12,
    )
}

fn build_table(batches: &[(u64, Vec<Vec<f64>>)]) -> MeasurementTable {
    let mut table = MeasurementTable::new();
    for (frame, rows) in batches {
        table
            .add_tracking_data(
                *frame,
                TrackedInput::named_block(rows.clone(), ["x", "y", "r"]),
            )
            .expect("valid batch must append");
    }
    table
}

proptest! {
    /// Property: save then load reproduces the table exactly.
    #[test]
    fn prop_round_trip_is_exact(batches in frame_batches()) {
        let table = build_table(&batches);
        let path = scratch_path();

        write_table(&path, &table).expect("write failed");
        let loaded = read_table(&path).expect("read failed");
        std::fs::remove_file(&path).ok();

        prop_assert_eq!(loaded, table);
    }

    /// Property: appends preserve arrival order, never sorting by frame.
    #[test]
    fn prop_append_preserves_arrival_order(batches in frame_batches()) {
        let table = build_table(&batches);

        let expected: Vec<u64> = batches
            .iter()
            .flat_map(|(frame, rows)| std::iter::repeat(*frame).take(rows.len()))
            .collect();
        prop_assert_eq!(table.frames(), expected.as_slice());

        let expected_x: Vec<f64> = batches
            .iter()
            .flat_map(|(_, rows)| rows.iter().map(|row| row[0]))
            .collect();
        let x: Vec<f64> = table
            .get_column("x")
            .expect("x column exists")
            .iter()
            .map(|v| v.as_f64().expect("x is numeric"))
            .collect();
        prop_assert_eq!(x, expected_x);
    }

    /// Property: reset_index then set_frame_index restores the table.
    #[test]
    fn prop_mode_transitions_invert(batches in frame_batches()) {
        let mut table = build_table(&batches);
        let indexed = table.clone();

        table.reset_index().expect("reset_index failed");
        table.set_frame_index().expect("set_frame_index failed");
        prop_assert_eq!(&table, &indexed);

        // Each transition is idempotent on repeat.
        table.reset_index().expect("reset_index failed");
        let columnar = table.clone();
        table.reset_index().expect("repeat reset_index failed");
        prop_assert_eq!(&table, &columnar);
    }

    /// Property: a failing dtype mapping changes nothing (all-or-nothing).
    #[test]
    fn prop_set_dtypes_is_atomic(
        whole in prop::collection::vec(-1000i64..1000, 1..20),
    ) {
        let mut table = MeasurementTable::new();
        #[allow(clippy::cast_precision_loss)]
        let x: Vec<f64> = whole.iter().map(|&v| v as f64).collect();
        // y always carries a fractional part, so Int coercion must fail.
        let y: Vec<f64> = x.iter().map(|v| v + 0.5).collect();
        let r = vec![1.0; x.len()];
        table
            .add_tracking_data(
                0,
                TrackedInput::named_columns(
                    vec![x.into(), y.into(), r.into()],
                    ["x", "y", "r"],
                ),
            )
            .expect("append failed");

        let before = table.clone();
        let result = table.set_dtypes(&[("x", ColumnType::Int), ("y", ColumnType::Int)]);
        prop_assert!(result.is_err());
        prop_assert_eq!(&table, &before);

        // The same mapping without the poisoned column succeeds.
        table.set_dtypes(&[("x", ColumnType::Int)]).expect("x coerces");
        prop_assert_eq!(
            table.column("x").expect("x column exists").dtype(),
            ColumnType::Int
        );
    }
}
