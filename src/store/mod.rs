//! File-bound measurement store
//!
//! A [`DataStore`] owns one [`MeasurementTable`] and its file binding: one
//! store per video, bound to the video's base name with the fixed
//! `.parquet` extension. Load and save failures surface as explicit
//! results — callers that want a best-effort batch policy compose it
//! above this layer instead of the store swallowing errors.
//!
//! [`ScopedStore`] is the resource-scoping contract for multi-stage
//! pipelines (crop → preprocess → track → link → postprocess → annotate):
//! however the scope exits, the table is persisted.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::storage;
use crate::table::{ColumnType, IndexMode, MeasurementTable, TrackedInput, Value};
use crate::Result;

/// Extension of persisted table files.
pub const TABLE_EXTENSION: &str = "parquet";

/// Derive the bound table path: same base name, fixed extension.
fn bound_path(path: &Path) -> PathBuf {
    path.with_extension(TABLE_EXTENSION)
}

/// Measurement store bound to one video's table file.
#[derive(Debug, Clone, PartialEq)]
pub struct DataStore {
    path: PathBuf,
    table: MeasurementTable,
}

impl DataStore {
    /// Start configuring a store for `path` (any extension; the binding
    /// swaps it for [`TABLE_EXTENSION`]).
    pub fn builder<P: AsRef<Path>>(path: P) -> StoreBuilder {
        StoreBuilder {
            path: path.as_ref().to_path_buf(),
            load: false,
        }
    }

    /// Create an empty store bound to `path` and persist it immediately,
    /// so the table file exists from the start of the run.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] when the initial save fails.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: bound_path(path.as_ref()),
            table: MeasurementTable::new(),
        };
        store.save()?;
        info!(path = %store.path.display(), "created empty measurement store");
        Ok(store)
    }

    /// Open the store persisted for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] when the bound file is missing,
    /// corrupt, or not a measurement table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = bound_path(path.as_ref());
        let table = storage::read_table(&path)?;
        debug!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.headings().len(),
            "loaded measurement store"
        );
        Ok(Self { path, table })
    }

    /// Acquire the store for `path` inside a save-on-exit guard: opens the
    /// bound file when it exists, creates an empty store otherwise.
    ///
    /// # Errors
    ///
    /// Returns the [`Self::open`] / [`Self::create`] error.
    pub fn scoped<P: AsRef<Path>>(path: P) -> Result<ScopedStore> {
        let bound = bound_path(path.as_ref());
        let store = if bound.exists() {
            Self::open(path)?
        } else {
            Self::create(path)?
        };
        Ok(store.into_scoped())
    }

    /// Wrap this store in a save-on-exit guard.
    #[must_use]
    pub fn into_scoped(self) -> ScopedStore {
        ScopedStore { store: Some(self) }
    }

    /// The bound table file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the underlying table.
    #[must_use]
    pub const fn table(&self) -> &MeasurementTable {
        &self.table
    }

    /// Mutably borrow the underlying table.
    pub fn table_mut(&mut self) -> &mut MeasurementTable {
        &mut self.table
    }

    /// Persist the table to the bound file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] when the write fails; the
    /// previous file contents are only replaced by a successful write.
    pub fn save(&self) -> Result<()> {
        storage::write_table(&self.path, &self.table)?;
        debug!(
            path = %self.path.display(),
            rows = self.table.row_count(),
            "saved measurement store"
        );
        Ok(())
    }

    /// Persist the table to `path` (verbatim, no extension rewrite)
    /// without rebinding the store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] when the write fails.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        storage::write_table(path.as_ref(), &self.table)
    }

    /// Append one frame's detections. See
    /// [`MeasurementTable::add_tracking_data`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error; the table is unchanged on error.
    pub fn add_tracking_data(&mut self, frame: u64, data: impl Into<TrackedInput>) -> Result<()> {
        self.table.add_tracking_data(frame, data)
    }

    /// Concatenate another store's rows onto this one. See
    /// [`MeasurementTable::append_table`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error; the table is unchanged on error.
    pub fn append_store(&mut self, other: &Self) -> Result<()> {
        self.table.append_table(&other.table)
    }

    /// Set or overwrite a per-particle property column. See
    /// [`MeasurementTable::add_particle_property`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error.
    pub fn add_particle_property(
        &mut self,
        name: impl Into<String>,
        values: impl Into<crate::table::Column>,
    ) -> Result<()> {
        self.table.add_particle_property(name, values)
    }

    /// Column values in row order. See [`MeasurementTable::get_column`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error.
    pub fn get_column(&self, name: &str) -> Result<Vec<Value>> {
        self.table.get_column(name)
    }

    /// Ordered snapshot of column names.
    #[must_use]
    pub fn headings(&self) -> Vec<String> {
        self.table.headings()
    }

    /// One frame's rows restricted to the requested headings. See
    /// [`MeasurementTable::get_info`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error.
    pub fn get_info(&self, frame: u64, headings: &[&str]) -> Result<Vec<Vec<Value>>> {
        self.table.get_info(frame, headings)
    }

    /// Coerce columns to target types. See
    /// [`MeasurementTable::set_dtypes`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error; all-or-nothing.
    pub fn set_dtypes(&mut self, mapping: &[(&str, ColumnType)]) -> Result<()> {
        self.table.set_dtypes(mapping)
    }

    /// Move the `frame` column to the index. See
    /// [`MeasurementTable::set_frame_index`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error.
    pub fn set_frame_index(&mut self) -> Result<()> {
        self.table.set_frame_index()
    }

    /// Materialize the frame key as a `frame` column. See
    /// [`MeasurementTable::reset_index`].
    ///
    /// # Errors
    ///
    /// Propagates the table-level error.
    pub fn reset_index(&mut self) -> Result<()> {
        self.table.reset_index()
    }

    /// Current index mode.
    #[must_use]
    pub const fn mode(&self) -> IndexMode {
        self.table.mode()
    }

    /// Number of rows (particle-observations).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }
}

/// Builder selecting between opening an existing table and creating a new
/// one, mirroring a tracking run that resumes versus starts fresh.
#[derive(Debug)]
pub struct StoreBuilder {
    path: PathBuf,
    load: bool,
}

impl StoreBuilder {
    /// Load the previously persisted table instead of starting empty.
    #[must_use]
    pub const fn load(mut self, load: bool) -> Self {
        self.load = load;
        self
    }

    /// Build the store.
    ///
    /// # Errors
    ///
    /// Returns the [`DataStore::open`] error when loading, otherwise the
    /// [`DataStore::create`] error.
    pub fn build(self) -> Result<DataStore> {
        if self.load {
            DataStore::open(&self.path)
        } else {
            DataStore::create(&self.path)
        }
    }

    /// Build the store wrapped in a save-on-exit guard.
    ///
    /// # Errors
    ///
    /// Returns the [`Self::build`] error.
    pub fn scoped(self) -> Result<ScopedStore> {
        self.build().map(DataStore::into_scoped)
    }
}

/// Save-on-exit guard around a [`DataStore`].
///
/// Dereferences to the store. On scope exit — normal return, early `?`,
/// or unwind — the table is saved; a failure on the drop path can only be
/// logged (`Drop` cannot return it), so callers that need the save result
/// call [`ScopedStore::close`] instead of relying on drop.
pub struct ScopedStore {
    store: Option<DataStore>,
}

impl ScopedStore {
    /// Save and release the store, returning the save result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] when the final save fails.
    pub fn close(mut self) -> Result<()> {
        match self.store.take() {
            Some(store) => store.save(),
            None => Ok(()),
        }
    }
}

impl Deref for ScopedStore {
    type Target = DataStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref().expect("store is present until drop")
    }
}

impl DerefMut for ScopedStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.store.as_mut().expect("store is present until drop")
    }
}

impl fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStore").field("store", &self.store).finish()
    }
}

impl Drop for ScopedStore {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            if let Err(e) = store.save() {
                error!(
                    path = %store.path().display(),
                    "failed to save measurement store on scope exit: {e}"
                );
            }
        }
    }
}
