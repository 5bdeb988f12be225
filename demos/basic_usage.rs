//! Basic particle-db usage: per-frame appends, derived properties, reload
//!
//! This example demonstrates:
//! - Creating a store bound to a video's table file
//! - Streaming per-frame appends from a (simulated) tracker
//! - Derived per-particle property columns
//! - Frame projection and save/load round-trip
//!
//! Run with: cargo run --example basic_usage

use anyhow::Result;

use particle_db::{DataStore, TrackedInput};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Particle-DB Basic Usage Example ===\n");

    let video = "/tmp/particle_db_demo_video.avi";
    println!("Creating store for {video}...");
    let mut store = DataStore::create(video)?;
    println!("  ✓ Bound table file: {}\n", store.path().display());

    // Simulated tracker output: two particles drifting right.
    println!("Appending 100 frames of detections...");
    for frame in 0..100_u64 {
        let t = frame as f64;
        let rows = vec![
            vec![10.0 + t, 50.0, 3.2],
            vec![200.0 + t * 0.5, 80.0, 2.7],
        ];
        store.add_tracking_data(frame, TrackedInput::named_block(rows, ["x", "y", "r"]))?;
    }
    println!("  ✓ {} rows across 100 frames\n", store.row_count());

    // A linking stage would compute these; here they alternate.
    println!("Attaching linked trajectory ids...");
    let ids: Vec<i64> = (0..store.row_count()).map(|i| (i % 2) as i64).collect();
    store.add_particle_property("traj_id", ids)?;
    println!("  ✓ Columns: {:?}\n", store.headings());

    // Frame projection, e.g. for an annotation overlay.
    println!("Particles in frame 42:");
    for row in store.get_info(42, &["x", "y", "r"])? {
        println!("  {row:?}");
    }
    println!();

    // Persist and reload.
    store.save()?;
    let reloaded = DataStore::open(video)?;
    println!("Reloaded {} rows from disk", reloaded.row_count());
    println!(
        "  ✓ Round-trip exact: {}",
        reloaded.table() == store.table()
    );

    std::fs::remove_file(store.path()).ok();
    Ok(())
}
