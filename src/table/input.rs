//! Input variants accepted by `add_tracking_data`
//!
//! Upstream trackers hand over one frame's detections in a few shapes: a
//! pre-built sub-table, a row-major numeric block, or per-property value
//! lists. Each variant is validated and normalized to the same internal
//! row-append path; a shape the store cannot interpret is a reportable
//! error, never silently mis-read.

use super::column::Column;
use super::{IndexMode, MeasurementTable, FRAME_COLUMN};
use crate::{Error, Result};

/// Column names assumed for a 3-wide unnamed block: x/y position and radius.
pub const DEFAULT_TRACK_COLUMNS: [&str; 3] = ["x", "y", "r"];

/// One frame's detections, in any of the shapes produced by upstream trackers.
#[derive(Debug, Clone)]
pub enum TrackedInput {
    /// Pre-built sub-table: one row per particle, columnar, no `frame`
    /// column (the frame number is stamped by the store).
    Table(MeasurementTable),
    /// Row-major numeric block: one inner vector per particle, one value
    /// per property. Unnamed blocks must be exactly 3 wide
    /// ([`DEFAULT_TRACK_COLUMNS`]).
    Block {
        /// Rows, one per particle
        rows: Vec<Vec<f64>>,
        /// Property names, one per block column
        names: Option<Vec<String>>,
    },
    /// Column-major typed lists: one column per property, equal lengths.
    Columns {
        /// Columns, one per property
        columns: Vec<Column>,
        /// Property names, one per column
        names: Option<Vec<String>>,
    },
}

impl TrackedInput {
    /// Unnamed row-major block (3-wide blocks get `x`, `y`, `r`).
    #[must_use]
    pub const fn block(rows: Vec<Vec<f64>>) -> Self {
        Self::Block { rows, names: None }
    }

    /// Row-major block with explicit property names.
    pub fn named_block<I, S>(rows: Vec<Vec<f64>>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Block {
            rows,
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Column-major lists with explicit property names.
    pub fn named_columns<I, S>(columns: Vec<Column>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns {
            columns,
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Validate and normalize to named columns of equal length.
    pub(crate) fn normalize(self) -> Result<NewRows> {
        match self {
            Self::Table(table) => normalize_table(table),
            Self::Block { rows, names } => normalize_block(rows, names),
            Self::Columns { columns, names } => normalize_columns(columns, names),
        }
    }
}

impl From<MeasurementTable> for TrackedInput {
    fn from(table: MeasurementTable) -> Self {
        Self::Table(table)
    }
}

impl From<Vec<Vec<f64>>> for TrackedInput {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::block(rows)
    }
}

/// Normalized append payload: named columns of equal length.
#[derive(Debug)]
pub(crate) struct NewRows {
    pub names: Vec<String>,
    pub columns: Vec<Column>,
}

impl NewRows {
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }
}

fn normalize_table(table: MeasurementTable) -> Result<NewRows> {
    if table.mode() == IndexMode::Indexed {
        return Err(Error::UnsupportedInput(
            "tracked sub-table must be in columnar mode; the store assigns the frame key"
                .to_string(),
        ));
    }
    if table.headings().iter().any(|h| h == FRAME_COLUMN) {
        return Err(Error::UnsupportedInput(format!(
            "tracked sub-table already contains a `{FRAME_COLUMN}` column; \
             the frame number is supplied separately"
        )));
    }
    let (names, columns) = table.into_parts();
    if names.is_empty() {
        return Err(Error::UnsupportedInput(
            "tracked sub-table has no columns".to_string(),
        ));
    }
    Ok(NewRows { names, columns })
}

fn normalize_block(rows: Vec<Vec<f64>>, names: Option<Vec<String>>) -> Result<NewRows> {
    let width = match (rows.first(), &names) {
        (Some(row), _) => row.len(),
        (None, Some(names)) => names.len(),
        (None, None) => {
            return Err(Error::UnsupportedInput(
                "cannot infer column names from an empty unnamed block".to_string(),
            ))
        }
    };
    if width == 0 {
        return Err(Error::UnsupportedInput(
            "tracked block has rows with no values".to_string(),
        ));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(Error::UnsupportedInput(format!(
                "ragged block: row {i} has {} values, expected {width}",
                row.len()
            )));
        }
    }
    let names = resolve_names(names, width)?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); width];
    for row in &rows {
        for (slot, value) in columns.iter_mut().zip(row) {
            slot.push(*value);
        }
    }
    Ok(NewRows {
        names,
        columns: columns.into_iter().map(Column::Float).collect(),
    })
}

fn normalize_columns(columns: Vec<Column>, names: Option<Vec<String>>) -> Result<NewRows> {
    if columns.is_empty() {
        return Err(Error::UnsupportedInput(
            "tracked data has no columns".to_string(),
        ));
    }
    let len = columns[0].len();
    for (i, column) in columns.iter().enumerate() {
        if column.len() != len {
            return Err(Error::UnsupportedInput(format!(
                "column {i} has {} values, expected {len}",
                column.len()
            )));
        }
    }
    let names = resolve_names(names, columns.len())?;
    Ok(NewRows { names, columns })
}

fn resolve_names(names: Option<Vec<String>>, width: usize) -> Result<Vec<String>> {
    let names = match names {
        Some(names) => {
            if names.len() != width {
                return Err(Error::UnsupportedInput(format!(
                    "{} column names supplied for {width} columns",
                    names.len()
                )));
            }
            names
        }
        None => {
            if width != DEFAULT_TRACK_COLUMNS.len() {
                return Err(Error::UnsupportedInput(format!(
                    "column names required for a {width}-column block \
                     (defaults only cover {DEFAULT_TRACK_COLUMNS:?})"
                )));
            }
            DEFAULT_TRACK_COLUMNS.iter().map(ToString::to_string).collect()
        }
    };
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(Error::UnsupportedInput(format!(
                "duplicate column name `{name}`"
            )));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnamed_three_wide_block_gets_default_names() {
        let input = TrackedInput::block(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let rows = input.normalize().unwrap();
        assert_eq!(rows.names, vec!["x", "y", "r"]);
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.columns[0], Column::Float(vec![1.0, 4.0]));
        assert_eq!(rows.columns[2], Column::Float(vec![3.0, 6.0]));
    }

    #[test]
    fn test_unnamed_two_wide_block_is_rejected() {
        let input = TrackedInput::block(vec![vec![1.0, 2.0]]);
        let err = input.normalize().unwrap_err();
        assert!(matches!(err, Error::UnsupportedInput(_)));
        assert!(err.to_string().contains("column names required"));
    }

    #[test]
    fn test_ragged_block_is_rejected() {
        let input = TrackedInput::named_block(vec![vec![1.0, 2.0], vec![3.0]], ["x", "y"]);
        let err = input.normalize().unwrap_err();
        assert!(err.to_string().contains("ragged"));
    }

    #[test]
    fn test_name_count_mismatch_is_rejected() {
        let input = TrackedInput::named_block(vec![vec![1.0, 2.0]], ["x"]);
        assert!(input.normalize().is_err());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let input = TrackedInput::named_block(vec![vec![1.0, 2.0]], ["x", "x"]);
        let err = input.normalize().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_column_lists_of_unequal_length_are_rejected() {
        let input = TrackedInput::named_columns(
            vec![Column::Float(vec![1.0, 2.0]), Column::Float(vec![3.0])],
            ["x", "y"],
        );
        assert!(input.normalize().is_err());
    }

    #[test]
    fn test_typed_column_lists_pass_through() {
        let input = TrackedInput::named_columns(
            vec![Column::Float(vec![1.0]), Column::Str(vec!["dimer".to_string()])],
            ["x", "class"],
        );
        let rows = input.normalize().unwrap();
        assert_eq!(rows.names, vec!["x", "class"]);
        assert_eq!(rows.row_count(), 1);
    }

    #[test]
    fn test_empty_named_block_appends_nothing() {
        let input = TrackedInput::named_block(Vec::new(), ["x", "y"]);
        let rows = input.normalize().unwrap();
        assert_eq!(rows.row_count(), 0);
        assert_eq!(rows.names.len(), 2);
    }
}
