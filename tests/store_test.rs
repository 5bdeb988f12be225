//! Integration tests for the measurement store
//!
//! Exercises the store the way the tracking pipeline drives it: create a
//! store per video, append detections frame by frame, attach derived
//! properties, project frames back out for annotation.

use std::path::Path;

use particle_db::{DataStore, Error, IndexMode, TrackedInput, Value};

#[test]
fn test_create_produces_bound_table_file() {
    let store = DataStore::create("/tmp/particle_db_it_create_video.avi")
        .expect("Failed to create store");

    // Same base name, fixed binary-table extension.
    assert_eq!(
        store.path(),
        Path::new("/tmp/particle_db_it_create_video.parquet")
    );
    assert!(store.path().exists(), "create must persist immediately");

    let loaded = DataStore::open("/tmp/particle_db_it_create_video.avi")
        .expect("Failed to load fresh store");
    assert_eq!(loaded.row_count(), 0);
    assert!(loaded.headings().is_empty());

    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_block_append_and_frame_projection() {
    let mut store =
        DataStore::create("/tmp/particle_db_it_project.avi").expect("Failed to create store");

    store
        .add_tracking_data(0, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        .expect("Failed to append frame 0");

    let info = store.get_info(0, &["x", "y"]).expect("Projection failed");
    assert_eq!(
        info,
        vec![
            vec![Value::Float(1.0), Value::Float(2.0)],
            vec![Value::Float(4.0), Value::Float(5.0)],
        ]
    );

    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_particle_property_column() {
    let mut store =
        DataStore::create("/tmp/particle_db_it_property.avi").expect("Failed to create store");
    store
        .add_tracking_data(0, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        .expect("Failed to append");

    store
        .add_particle_property("id", vec![10_i64, 20])
        .expect("Failed to add property");
    assert_eq!(
        store.get_column("id").expect("Column lookup failed"),
        vec![Value::Int(10), Value::Int(20)]
    );
    assert_eq!(store.headings(), vec!["x", "y", "r", "id"]);

    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_schema_mismatch_append_leaves_store_unchanged() {
    let mut store =
        DataStore::create("/tmp/particle_db_it_mismatch.avi").expect("Failed to create store");
    store
        .add_tracking_data(0, vec![vec![1.0, 2.0, 3.0]])
        .expect("Failed to append");

    let before = store.clone();
    let result = store.add_tracking_data(
        1,
        TrackedInput::named_block(vec![vec![7.0, 8.0]], ["x", "y"]),
    );

    assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    assert_eq!(store, before, "failed append must not mutate the table");

    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_appends_keep_arrival_order_not_frame_order() {
    let mut store =
        DataStore::create("/tmp/particle_db_it_order.avi").expect("Failed to create store");

    // The tracker normally emits increasing frames, but the store does not
    // enforce it: frame 5 before frame 3 stays in arrival order.
    store
        .add_tracking_data(5, vec![vec![1.0, 1.0, 1.0]])
        .expect("Failed to append frame 5");
    store
        .add_tracking_data(3, vec![vec![2.0, 2.0, 2.0], vec![3.0, 3.0, 3.0]])
        .expect("Failed to append frame 3");

    assert_eq!(store.mode(), IndexMode::Indexed);
    assert_eq!(store.table().frames(), &[5, 3, 3]);
    assert_eq!(
        store.get_column("x").expect("Column lookup failed"),
        vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]
    );

    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_absent_frame_projects_to_empty_block() {
    let mut store =
        DataStore::create("/tmp/particle_db_it_absent.avi").expect("Failed to create store");
    store
        .add_tracking_data(0, vec![vec![1.0, 2.0, 3.0]])
        .expect("Failed to append");

    // A frame with zero detections is legitimate, not an error.
    let info = store.get_info(7, &["x"]).expect("Projection failed");
    assert!(info.is_empty());

    // An unknown heading is an error even for an absent frame.
    assert!(matches!(
        store.get_info(7, &["velocity"]),
        Err(Error::ColumnNotFound(_))
    ));

    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_missing_column_lookup_is_reported() {
    let store =
        DataStore::create("/tmp/particle_db_it_missing_col.avi").expect("Failed to create store");
    let err = store.get_column("x").unwrap_err();
    assert!(err.to_string().contains("x"));
    std::fs::remove_file(store.path()).ok();
}

#[test]
fn test_scoped_store_persists_after_mid_pipeline_error() {
    let video = "/tmp/particle_db_it_scoped_err.avi";

    // A pipeline stage that fails partway through its frames.
    let run = || -> particle_db::Result<()> {
        let mut store = DataStore::scoped(video)?;
        store.add_tracking_data(0, vec![vec![1.0, 2.0, 3.0]])?;
        // Mismatched columns: this stage dies here.
        store.add_tracking_data(1, TrackedInput::named_block(vec![vec![1.0]], ["x"]))?;
        store.close()
    };
    assert!(run().is_err());

    // The rows appended before the failure were still persisted on exit.
    let reloaded = DataStore::open(video).expect("Failed to reload after error");
    assert_eq!(reloaded.row_count(), 1);
    assert_eq!(reloaded.table().frames(), &[0]);

    std::fs::remove_file(reloaded.path()).ok();
}

#[test]
fn test_multi_stage_pipeline_merge() {
    let mut tracked =
        DataStore::create("/tmp/particle_db_it_stage_track.avi").expect("Failed to create store");
    let mut linked =
        DataStore::create("/tmp/particle_db_it_stage_link.avi").expect("Failed to create store");

    tracked
        .add_tracking_data(0, vec![vec![1.0, 2.0, 3.0]])
        .expect("Failed to append");
    linked
        .add_tracking_data(1, vec![vec![4.0, 5.0, 6.0]])
        .expect("Failed to append");

    tracked.append_store(&linked).expect("Merge failed");
    assert_eq!(tracked.row_count(), 2);
    assert_eq!(tracked.table().frames(), &[0, 1]);

    std::fs::remove_file(tracked.path()).ok();
    std::fs::remove_file(linked.path()).ok();
}

#[test]
fn test_index_mode_round_trip_is_lossless() {
    let mut store =
        DataStore::create("/tmp/particle_db_it_mode.avi").expect("Failed to create store");
    store
        .add_tracking_data(2, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        .expect("Failed to append");

    let indexed = store.table().clone();
    store.reset_index().expect("reset_index failed");
    assert_eq!(store.mode(), IndexMode::Columnar);
    assert_eq!(store.headings()[0], "frame");

    store.set_frame_index().expect("set_frame_index failed");
    assert_eq!(store.table(), &indexed);

    std::fs::remove_file(store.path()).ok();
}
