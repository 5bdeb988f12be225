//! # Particle-DB: Frame-Indexed Measurement Store
//!
//! Particle-db is the tracked-data store for video-microscopy particle
//! tracking: a frame-indexed tabular structure that accumulates
//! per-particle measurements across a video's frames, supports incremental
//! append during a streaming frame-by-frame pipeline, and persists to a
//! binary columnar file (Parquet).
//!
//! ## Design
//!
//! - **Explicit index mode**: the frame key is either the table's index or
//!   an ordinary `frame` column, tracked by an enum — never inferred.
//! - **Schema validated on every mutation**: appends with a mismatched
//!   column set fail cleanly and leave the table untouched.
//! - **Explicit failure**: load/save return results; nothing is logged and
//!   swallowed on the library path.
//! - **Scoped persistence**: a drop guard ensures the table is saved
//!   however a multi-stage processing scope exits.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use particle_db::DataStore;
//!
//! // One store per video, bound to `video.parquet`.
//! let mut store = DataStore::create("video.avi")?;
//!
//! // Per-frame appends from the upstream tracker: rows of x, y, r.
//! store.add_tracking_data(0, vec![vec![12.0, 80.5, 3.1], vec![40.2, 10.0, 2.9]])?;
//! store.add_tracking_data(1, vec![vec![13.1, 79.9, 3.1]])?;
//!
//! // Derived per-particle properties, e.g. linked trajectory ids.
//! store.add_particle_property("traj_id", vec![0_i64, 1, 0])?;
//!
//! // Frame projection for annotation/export.
//! let positions = store.get_info(0, &["x", "y"])?;
//! assert_eq!(positions.len(), 2);
//!
//! store.save()?;
//! # Ok::<(), particle_db::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod storage;
pub mod store;
pub mod table;

pub use error::{Error, Result};
pub use store::{DataStore, ScopedStore, StoreBuilder, TABLE_EXTENSION};
pub use table::{
    Column, ColumnType, IndexMode, MeasurementTable, TrackedInput, Value,
    DEFAULT_TRACK_COLUMNS, FRAME_COLUMN,
};
