//! Multi-stage pipeline with scoped persistence
//!
//! This example demonstrates:
//! - The save-on-exit guard (`ScopedStore`) around a processing scope
//! - Merging a second stage's results with `append_store`
//! - Reopening a store between stages
//!
//! Run with: cargo run --example pipeline_merge

use anyhow::Result;

use particle_db::{DataStore, TrackedInput};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Particle-DB Pipeline Merge Example ===\n");

    let video = "/tmp/particle_db_demo_pipeline.avi";

    // Stage 1: track the first half of the video. The guard saves the
    // table however this scope exits, so a crash mid-stage still leaves
    // everything appended so far on disk.
    println!("Stage 1: tracking frames 0..50 (scoped)...");
    {
        let mut store = DataStore::scoped(video)?;
        for frame in 0..50_u64 {
            let rows = vec![vec![frame as f64, 100.0, 3.0]];
            store.add_tracking_data(frame, TrackedInput::named_block(rows, ["x", "y", "r"]))?;
        }
        println!("  ✓ {} rows appended, saving on scope exit", store.row_count());
    }

    // Stage 2: an independent pass over the second half, merged in.
    println!("\nStage 2: tracking frames 50..100 and merging...");
    let mut second = DataStore::create("/tmp/particle_db_demo_stage2.avi")?;
    for frame in 50..100_u64 {
        let rows = vec![vec![frame as f64, 100.0, 3.0]];
        second.add_tracking_data(frame, TrackedInput::named_block(rows, ["x", "y", "r"]))?;
    }

    let mut merged = DataStore::scoped(video)?;
    println!("  reopened stage-1 store: {} rows", merged.row_count());
    merged.append_store(&second)?;
    println!("  ✓ merged: {} rows", merged.row_count());

    // close() returns the final save result explicitly.
    merged.close()?;

    let done = DataStore::open(video)?;
    println!(
        "\nFinal table: {} rows, frames {:?}..{:?}",
        done.row_count(),
        done.table().frames().first(),
        done.table().frames().last()
    );

    std::fs::remove_file(done.path()).ok();
    std::fs::remove_file(second.path()).ok();
    Ok(())
}
