//! Frame-indexed measurement table
//!
//! A [`MeasurementTable`] accumulates per-particle measurements across the
//! frames of a video. One row is one particle-observation in one frame;
//! many rows share a frame number (one per detected particle). The frame
//! key lives either as the table's index or as an ordinary `frame` column,
//! tracked by an explicit [`IndexMode`] — never inferred from whether a
//! `frame` column happens to exist.
//!
//! ## Design
//!
//! Columns are contiguous typed vectors extended in place on every append,
//! so a long tracking run grows the table with amortized reallocation
//! instead of per-frame whole-table copies. Every mutation validates the
//! column-name set first and leaves the table untouched on error.

mod column;
mod input;

pub use column::{Column, ColumnType, Value};
pub use input::{TrackedInput, DEFAULT_TRACK_COLUMNS};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the frame column in columnar mode.
pub const FRAME_COLUMN: &str = "frame";

/// Whether the frame number is the table's lookup key or an ordinary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Frame number is the per-row lookup key, not a data column.
    Indexed,
    /// Frame number, if present, is an ordinary column named `frame`.
    Columnar,
}

/// Frame-indexed table of per-particle measurements.
///
/// Created empty (columnar mode) or loaded from a persisted file (whatever
/// mode was saved). Mutated by per-frame appends during tracking, by
/// whole-table merges between pipeline stages, and by derived-property
/// column additions.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTable {
    headings: Vec<String>,
    columns: Vec<Column>,
    lookup: FxHashMap<String, usize>,
    /// Per-row frame keys; empty in columnar mode. Values never exceed
    /// `i64::MAX` (validated on append, Int64 on disk).
    frames: Vec<u64>,
    mode: IndexMode,
}

impl Default for MeasurementTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementTable {
    /// Create an empty table in columnar mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            headings: Vec::new(),
            columns: Vec::new(),
            lookup: FxHashMap::default(),
            frames: Vec::new(),
            mode: IndexMode::Columnar,
        }
    }

    /// Current index mode.
    #[must_use]
    pub const fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Number of rows (particle-observations).
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self.mode {
            IndexMode::Indexed => self.frames.len(),
            IndexMode::Columnar => self.columns.first().map_or(0, Column::len),
        }
    }

    /// Whether the table has no rows and no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.frames.is_empty()
    }

    /// Ordered snapshot of the column names (owned, not an alias into the
    /// table's storage).
    #[must_use]
    pub fn headings(&self) -> Vec<String> {
        self.headings.clone()
    }

    /// Whether a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Per-row frame keys. Empty in columnar mode.
    #[must_use]
    pub fn frames(&self) -> &[u64] {
        &self.frames
    }

    /// Borrow a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] when no such column exists.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.lookup
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Column values as a flat owned sequence in row order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] when no such column exists.
    pub fn get_column(&self, name: &str) -> Result<Vec<Value>> {
        self.column(name).map(Column::values)
    }

    /// Set or overwrite a whole column of per-particle values.
    ///
    /// The value count must equal the current row count. On an empty table
    /// (no rows, no columns, columnar mode) the assignment defines the row
    /// count; an empty frame-indexed table rejects non-empty values because
    /// the new rows would have no frame keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`] on a value-count mismatch.
    pub fn add_particle_property(
        &mut self,
        name: impl Into<String>,
        values: impl Into<Column>,
    ) -> Result<()> {
        let name = name.into();
        let column = values.into();
        let rows = self.row_count();
        let defines_rows =
            self.columns.is_empty() && self.mode == IndexMode::Columnar && rows == 0;
        if column.len() != rows && !defines_rows {
            return Err(Error::LengthMismatch {
                column: name,
                expected: rows,
                found: column.len(),
            });
        }
        if let Some(&i) = self.lookup.get(&name) {
            self.columns[i] = column;
        } else {
            self.lookup.insert(name.clone(), self.columns.len());
            self.headings.push(name);
            self.columns.push(column);
        }
        Ok(())
    }

    /// Sub-table of one frame's rows restricted to the requested headings,
    /// as a 2D value block (rows = particles, columns = headings in
    /// requested order).
    ///
    /// A frame with no rows yields an empty block: frames with zero
    /// detections are legitimate, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameIndexRequired`] in columnar mode and
    /// [`Error::ColumnNotFound`] for an unknown heading.
    pub fn get_info(&self, frame: u64, headings: &[&str]) -> Result<Vec<Vec<Value>>> {
        if self.mode != IndexMode::Indexed {
            return Err(Error::FrameIndexRequired {
                operation: "get_info",
            });
        }
        let slots = headings
            .iter()
            .map(|&name| {
                self.lookup
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut block = Vec::new();
        for row in (0..self.frames.len()).filter(|&i| self.frames[i] == frame) {
            let mut cells = Vec::with_capacity(slots.len());
            for &slot in &slots {
                let cell = self.columns[slot].value(row).ok_or_else(|| {
                    Error::Storage(format!("row {row} out of range in column scan"))
                })?;
                cells.push(cell);
            }
            block.push(cells);
        }
        Ok(block)
    }

    /// Coerce the listed columns to the given target types.
    ///
    /// All-or-nothing: every coercion is computed first and the table is
    /// only updated if all of them succeed. Columns already at the target
    /// type are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for an unknown column and
    /// [`Error::TypeCoercion`] for a value that cannot be represented in
    /// the target type; the table is unchanged in both cases.
    pub fn set_dtypes(&mut self, mapping: &[(&str, ColumnType)]) -> Result<()> {
        let mut staged = Vec::new();
        for &(name, target) in mapping {
            let slot = self
                .lookup
                .get(name)
                .copied()
                .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
            if self.columns[slot].dtype() != target {
                staged.push((slot, self.columns[slot].coerced(name, target)?));
            }
        }
        for (slot, column) in staged {
            self.columns[slot] = column;
        }
        Ok(())
    }

    /// Append one frame's detections.
    ///
    /// The frame number is stamped onto every new row, the table ends in
    /// frame-indexed mode, and rows append at the end: no sorting, no
    /// dedup, caller order preserved. The first append defines the table's
    /// column set; later appends must match it. Incoming values are
    /// coerced to the existing column types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInput`] for a malformed payload,
    /// [`Error::SchemaMismatch`] for an incompatible column set,
    /// [`Error::TypeCoercion`] for un-coercible values, and
    /// [`Error::FrameIndexRequired`] when appending to a non-empty
    /// columnar table that has no `frame` column to index by. The table
    /// is unchanged on every error path.
    pub fn add_tracking_data(
        &mut self,
        frame: u64,
        data: impl Into<TrackedInput>,
    ) -> Result<()> {
        if i64::try_from(frame).is_err() {
            return Err(Error::UnsupportedInput(format!(
                "frame number {frame} exceeds the supported range"
            )));
        }
        let new = data.into().normalize()?;

        // First write defines the schema; an empty table indexes directly.
        if self.columns.is_empty() {
            let count = new.row_count();
            self.headings = new.names;
            self.columns = new.columns;
            self.lookup = build_lookup(&self.headings);
            self.frames.extend(std::iter::repeat(frame).take(count));
            self.mode = IndexMode::Indexed;
            return Ok(());
        }

        // Stage everything against the post-conversion column set before
        // any mutation, so a failed append leaves the table untouched.
        let converting = self.mode == IndexMode::Columnar;
        let drops_frame = converting && self.lookup.contains_key(FRAME_COLUMN);
        if converting && !drops_frame && self.row_count() > 0 {
            // Existing rows have no recoverable frame keys.
            return Err(Error::FrameIndexRequired {
                operation: "add_tracking_data",
            });
        }
        let targets: Vec<(&str, &Column)> = self
            .iter_columns()
            .filter(|(name, _)| !(drops_frame && *name == FRAME_COLUMN))
            .collect();
        let staged = align_and_coerce(&targets, &new.names, &new.columns)?;
        let count = new.row_count();

        if converting {
            self.set_frame_index()?;
            if self.mode != IndexMode::Indexed {
                // No frame column and zero rows: flip directly.
                self.mode = IndexMode::Indexed;
            }
        }
        for (existing, incoming) in self.columns.iter_mut().zip(staged) {
            existing.extend(incoming)?;
        }
        self.frames.extend(std::iter::repeat(frame).take(count));
        Ok(())
    }

    /// Concatenate another table's rows onto this one.
    ///
    /// Both tables' row orders are preserved. A mode difference is
    /// reconciled by converting a copy of the incoming table to this
    /// table's mode. Appending anything to a brand-new empty table adopts
    /// the incoming table wholesale, mode included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] for an incompatible column set,
    /// [`Error::FrameIndexRequired`] when the incoming columnar table has
    /// no `frame` column to convert with, and [`Error::TypeCoercion`] for
    /// un-coercible values. The table is unchanged on error.
    pub fn append_table(&mut self, other: &Self) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        let mut incoming = other.clone();
        if incoming.mode != self.mode {
            match self.mode {
                IndexMode::Indexed => {
                    incoming.set_frame_index()?;
                    if incoming.mode != IndexMode::Indexed {
                        return Err(Error::FrameIndexRequired {
                            operation: "append_store",
                        });
                    }
                }
                IndexMode::Columnar => incoming.reset_index()?,
            }
        }

        let targets: Vec<(&str, &Column)> = self.iter_columns().collect();
        let staged = align_and_coerce(&targets, &incoming.headings, &incoming.columns)?;
        for (existing, new) in self.columns.iter_mut().zip(staged) {
            existing.extend(new)?;
        }
        self.frames.extend(incoming.frames);
        Ok(())
    }

    /// Move the `frame` column to the index (columnar → indexed).
    ///
    /// No-op when no `frame` column exists. When the table is already
    /// indexed and a stray `frame` column exists anyway, the redundant
    /// column is dropped rather than erroring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeCoercion`] when the `frame` column holds
    /// values that are not non-negative integers.
    pub fn set_frame_index(&mut self) -> Result<()> {
        match self.mode {
            IndexMode::Indexed => {
                if let Some(&slot) = self.lookup.get(FRAME_COLUMN) {
                    self.remove_column_at(slot);
                }
                Ok(())
            }
            IndexMode::Columnar => {
                let Some(&slot) = self.lookup.get(FRAME_COLUMN) else {
                    return Ok(());
                };
                let keys = frame_keys(&self.columns[slot])?;
                self.remove_column_at(slot);
                self.frames = keys;
                self.mode = IndexMode::Indexed;
                Ok(())
            }
        }
    }

    /// Materialize the frame key as a leading `frame` column
    /// (indexed → columnar). Idempotent: repeat calls leave exactly one
    /// `frame` column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a frame key cannot be represented as
    /// a signed 64-bit column value (unreachable for keys produced by this
    /// crate, which validates on append).
    pub fn reset_index(&mut self) -> Result<()> {
        if self.mode == IndexMode::Columnar {
            return Ok(());
        }
        let keys = self
            .frames
            .iter()
            .map(|&f| {
                i64::try_from(f).map_err(|_| {
                    Error::Storage(format!("frame number {f} exceeds the supported range"))
                })
            })
            .collect::<Result<Vec<i64>>>()?;
        self.headings.insert(0, FRAME_COLUMN.to_string());
        self.columns.insert(0, Column::Int(keys));
        self.lookup = build_lookup(&self.headings);
        self.frames.clear();
        self.mode = IndexMode::Columnar;
        Ok(())
    }

    /// Assemble a table from raw parts (persistence layer).
    pub(crate) fn from_parts(
        headings: Vec<String>,
        columns: Vec<Column>,
        frames: Vec<u64>,
        mode: IndexMode,
    ) -> Result<Self> {
        let rows = match mode {
            IndexMode::Indexed => frames.len(),
            IndexMode::Columnar => {
                if !frames.is_empty() {
                    return Err(Error::Storage(
                        "columnar table carries frame keys".to_string(),
                    ));
                }
                columns.first().map_or(0, Column::len)
            }
        };
        if headings.len() != columns.len() {
            return Err(Error::Storage(format!(
                "{} headings for {} columns",
                headings.len(),
                columns.len()
            )));
        }
        for (name, column) in headings.iter().zip(&columns) {
            if column.len() != rows {
                return Err(Error::Storage(format!(
                    "column `{name}` has {} rows, expected {rows}",
                    column.len()
                )));
            }
        }
        let lookup = build_lookup(&headings);
        if lookup.len() != headings.len() {
            return Err(Error::Storage("duplicate column names".to_string()));
        }
        Ok(Self {
            headings,
            columns,
            lookup,
            frames,
            mode,
        })
    }

    /// Decompose into headings and columns (input normalization).
    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Column>) {
        (self.headings, self.columns)
    }

    /// Iterate columns with their names, in table order.
    pub(crate) fn iter_columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.headings
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }

    fn remove_column_at(&mut self, slot: usize) {
        self.headings.remove(slot);
        self.columns.remove(slot);
        self.lookup = build_lookup(&self.headings);
    }
}

fn build_lookup(headings: &[String]) -> FxHashMap<String, usize> {
    headings
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

/// Reorder incoming columns to the target heading order and coerce each to
/// the existing column type. Pure: the table mutates only after every
/// column has been validated.
fn align_and_coerce(
    targets: &[(&str, &Column)],
    names: &[String],
    columns: &[Column],
) -> Result<Vec<Column>> {
    // Unique-name sets compare equal regardless of order.
    let compatible =
        targets.len() == names.len() && targets.iter().all(|(n, _)| names.iter().any(|m| m == n));
    if !compatible {
        return Err(Error::SchemaMismatch {
            expected: targets.iter().map(|(n, _)| (*n).to_string()).collect(),
            found: names.to_vec(),
        });
    }
    let mut staged = Vec::with_capacity(targets.len());
    for &(name, existing) in targets {
        let j = names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::Storage(format!("column `{name}` lost in alignment")))?;
        staged.push(columns[j].coerced(name, existing.dtype())?);
    }
    Ok(staged)
}

fn frame_keys(column: &Column) -> Result<Vec<u64>> {
    let ints = match column.coerced(FRAME_COLUMN, ColumnType::Int)? {
        Column::Int(values) => values,
        _ => {
            return Err(Error::Storage(
                "frame column coercion produced a non-integer column".to_string(),
            ))
        }
    };
    ints.into_iter()
        .map(|v| {
            u64::try_from(v).map_err(|_| Error::TypeCoercion {
                column: FRAME_COLUMN.to_string(),
                reason: format!("frame number {v} is negative"),
            })
        })
        .collect()
}
