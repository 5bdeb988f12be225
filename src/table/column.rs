//! Typed column storage for measurement tables
//!
//! A [`Column`] holds one particle property across all rows (positions,
//! radii, trajectory ids, labels). Columns are strictly typed; changing a
//! column's type goes through [`Column::coerced`], a pure function that
//! produces a new column or a value-level error — never an in-place
//! silent downcast.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Semantic type of a measurement column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit signed integer (counts, ids, frame numbers)
    Int,
    /// 64-bit float (positions, radii, intensities)
    Float,
    /// UTF-8 string (labels, classifications)
    Str,
}

impl ColumnType {
    /// Lowercase name of the type, as used in manifests and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell of a measurement table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer cell
    Int(i64),
    /// Float cell
    Float(f64),
    /// String cell
    Str(String),
}

impl Value {
    /// Type of this value.
    #[must_use]
    pub const fn dtype(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Float(_) => ColumnType::Float,
            Self::Str(_) => ColumnType::Str,
        }
    }

    /// Numeric view of the value. Integers widen; strings return `None`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// Integer view of the value, `None` for floats and strings.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) | Self::Str(_) => None,
        }
    }

    /// String view of the value, `None` for numeric cells.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            Self::Int(_) | Self::Float(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A typed column of measurements, one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Integer column
    Int(Vec<i64>),
    /// Float column
    Float(Vec<f64>),
    /// String column
    Str(Vec<String>),
}

impl Column {
    /// Create an empty column of the given type.
    #[must_use]
    pub const fn empty(dtype: ColumnType) -> Self {
        match dtype {
            ColumnType::Int => Self::Int(Vec::new()),
            ColumnType::Float => Self::Float(Vec::new()),
            ColumnType::Str => Self::Str(Vec::new()),
        }
    }

    /// Number of rows in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Str(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type of the column.
    #[must_use]
    pub const fn dtype(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Float(_) => ColumnType::Float,
            Self::Str(_) => ColumnType::Str,
        }
    }

    /// Cell at `row`, or `None` past the end.
    #[must_use]
    pub fn value(&self, row: usize) -> Option<Value> {
        match self {
            Self::Int(v) => v.get(row).copied().map(Value::Int),
            Self::Float(v) => v.get(row).copied().map(Value::Float),
            Self::Str(v) => v.get(row).cloned().map(Value::Str),
        }
    }

    /// All cells as an owned flat sequence, in row order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        match self {
            Self::Int(v) => v.iter().copied().map(Value::Int).collect(),
            Self::Float(v) => v.iter().copied().map(Value::Float).collect(),
            Self::Str(v) => v.iter().cloned().map(Value::Str).collect(),
        }
    }

    /// Pure coercion to `target`, producing a new column.
    ///
    /// Same-type coercion is a clone. Numeric coercions reject values that
    /// are not representable (a float with a fractional part cannot become
    /// an integer); string parses reject malformed text. `name` is only
    /// used to label the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeCoercion`] naming the first offending value.
    pub fn coerced(&self, name: &str, target: ColumnType) -> Result<Self> {
        if self.dtype() == target {
            return Ok(self.clone());
        }
        match (self, target) {
            #[allow(clippy::cast_precision_loss)]
            (Self::Int(v), ColumnType::Float) => {
                Ok(Self::Float(v.iter().map(|&x| x as f64).collect()))
            }
            (Self::Float(v), ColumnType::Int) => v
                .iter()
                .map(|&x| float_to_int(x).ok_or_else(|| coercion_error(name, x)))
                .collect::<Result<Vec<i64>>>()
                .map(Self::Int),
            (Self::Str(v), ColumnType::Int) => v
                .iter()
                .map(|s| {
                    s.parse::<i64>().map_err(|_| Error::TypeCoercion {
                        column: name.to_string(),
                        reason: format!("`{s}` is not an integer"),
                    })
                })
                .collect::<Result<Vec<i64>>>()
                .map(Self::Int),
            (Self::Str(v), ColumnType::Float) => v
                .iter()
                .map(|s| {
                    s.parse::<f64>().map_err(|_| Error::TypeCoercion {
                        column: name.to_string(),
                        reason: format!("`{s}` is not a number"),
                    })
                })
                .collect::<Result<Vec<f64>>>()
                .map(Self::Float),
            (Self::Int(v), ColumnType::Str) => {
                Ok(Self::Str(v.iter().map(ToString::to_string).collect()))
            }
            (Self::Float(v), ColumnType::Str) => {
                Ok(Self::Str(v.iter().map(ToString::to_string).collect()))
            }
            // Same-type pairs are handled by the clone above.
            _ => Ok(self.clone()),
        }
    }

    /// Append another column of the same type.
    pub(crate) fn extend(&mut self, other: Self) -> Result<()> {
        let (have, got) = (self.dtype(), other.dtype());
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.extend(b),
            (Self::Float(a), Self::Float(b)) => a.extend(b),
            (Self::Str(a), Self::Str(b)) => a.extend(b),
            _ => {
                return Err(Error::Storage(format!(
                    "column dtype drift during append: {have} vs {got}"
                )))
            }
        }
        Ok(())
    }

}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Self::Str(v.into_iter().map(str::to_string).collect())
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn float_to_int(x: f64) -> Option<i64> {
    let representable =
        x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x <= i64::MAX as f64;
    representable.then(|| x as i64)
}

fn coercion_error(name: &str, value: f64) -> Error {
    Error::TypeCoercion {
        column: name.to_string(),
        reason: format!("`{value}` is not representable as an integer"),
    }
}
