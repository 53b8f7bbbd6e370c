//! Domain model types used throughout the gradebook.
//!
//! These types bridge the Sheets client, the identity resolver, and the web
//! layer.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Header of the column holding the student identifier.
pub const ID_COLUMN: &str = "ID";

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Convert a Sheets API cell value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Empty,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Empty),
            serde_json::Value::String(s) if s.is_empty() => Self::Empty,
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Numeric value of the cell, parsing text such as `"87.5"`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            // Whole numbers print without a fractional part so a numeric ID
            // cell 1801 compares equal to the string "1801".
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows & tables
// ---------------------------------------------------------------------------

/// One spreadsheet record keyed by column header, in sheet column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GradeRow {
    cells: Vec<(String, CellValue)>,
}

impl GradeRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Columns keep insertion order.
    pub fn push(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.push((column.into(), value));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// The student identifier cell rendered as text.
    pub fn id(&self) -> Option<String> {
        self.get(ID_COLUMN).map(|v| v.to_string())
    }

    /// All columns except the identifier.
    pub fn grades(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells
            .iter()
            .filter(|(name, _)| name != ID_COLUMN)
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for GradeRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Every record of the grade worksheet, in sheet order.
pub type GradeTable = Vec<GradeRow>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Google profile returned by the userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub verified_email: Option<bool>,
}

impl UserInfo {
    /// Name to greet the student with.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Student")
    }
}

/// A successful lookup: the derived ID and the student's row.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudentGrades {
    pub student_id: String,
    pub row: GradeRow,
}
