//! Display model for a student's grades.
//!
//! Each non-ID column of the matched row becomes a [`GradeCard`] colored by
//! its [`GradeBand`], and cards are laid out over [`CARD_COLUMNS`] columns.

use serde::Serialize;

use crate::models::{CellValue, GradeRow};

/// Number of card columns on the dashboard.
pub const CARD_COLUMNS: usize = 3;

/// Color class of a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    /// 90 and above.
    Green,
    /// 70 up to 90.
    Orange,
    /// Below 70.
    Red,
    /// Not a number.
    Blue,
}

impl GradeBand {
    pub fn for_value(value: &CellValue) -> Self {
        match value.as_number() {
            Some(n) if n >= 90.0 => Self::Green,
            Some(n) if n >= 70.0 => Self::Orange,
            Some(_) => Self::Red,
            None => Self::Blue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

impl std::fmt::Display for GradeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subject and its grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeCard {
    pub subject: String,
    pub grade: String,
    pub band: GradeBand,
}

/// Cards for every grade column of `row`, in column order.
pub fn grade_cards(row: &GradeRow) -> Vec<GradeCard> {
    row.grades()
        .map(|(subject, value)| GradeCard {
            subject: subject.to_string(),
            grade: value.to_string(),
            band: GradeBand::for_value(value),
        })
        .collect()
}

/// Split `items` into `columns` consecutive chunks of `ceil(n / columns)`.
///
/// Always returns exactly `columns` slices; trailing ones may be empty.
pub fn layout_columns<T>(items: &[T], columns: usize) -> Vec<&[T]> {
    if columns == 0 {
        return Vec::new();
    }
    let n = items.len();
    let per_column = n.div_ceil(columns);
    (0..columns)
        .map(|i| {
            let start = (i * per_column).min(n);
            let end = ((i + 1) * per_column).min(n);
            &items[start..end]
        })
        .collect()
}
