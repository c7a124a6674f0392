//! Seat layout model.
//!
//! A layout is a grid of rows (labels such as `"A"`) by 1-based columns. Rows
//! are grouped into priced categories; a row no category claims is `Basic`
//! at multiplier 1.0. Layouts arrive from the organizer as JSON text:
//!
//! ```json
//! {"rows": ["A", "B", "C"], "columns": 10,
//!  "categories": [{"label": "Gold", "rows": ["A"], "multiplier": 1.5}]}
//! ```
//!
//! [`SeatLayout::parse`] is the only way in, so every `SeatLayout` is valid:
//! unique non-empty row labels, at least one column, positive multipliers, and
//! seat codes that identify exactly one seat.

use crate::error::LayoutParseError;
use crate::types::{Multiplier, SeatCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Organizer-facing layout description, as found in event JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpec {
    /// Row labels, front to back
    pub rows: Vec<String>,
    /// Seats per row
    pub columns: u32,
    /// Priced row groups
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
}

/// One priced row group in a [`LayoutSpec`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Display label; normalized on parse
    pub label: String,
    /// Rows this category covers
    #[serde(default)]
    pub rows: Vec<String>,
    /// Price factor relative to the base price; 1.0 when absent
    #[serde(default)]
    pub multiplier: Option<f64>,
}

/// A seat category after normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    /// Normalized display name (`Premium`, `Gold`, `Basic`, or the label as given)
    pub name: String,
    /// Price factor
    pub multiplier: Multiplier,
}

impl Category {
    /// The category for rows no declared category covers
    #[must_use]
    pub fn basic() -> Self {
        Self {
            name: "Basic".to_string(),
            multiplier: Multiplier::ONE,
        }
    }
}

/// Maps organizer labels onto the three well-known tiers
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let lower = label.to_lowercase();
    if lower.contains("premium") {
        "Premium".to_string()
    } else if lower.contains("gold") {
        "Gold".to_string()
    } else if ["basic", "economy", "standard"]
        .iter()
        .any(|tier| lower.contains(tier))
    {
        "Basic".to_string()
    } else if label.trim().is_empty() {
        "Basic".to_string()
    } else {
        label.trim().to_string()
    }
}

/// A single addressable seat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Row label followed by column
    pub code: SeatCode,
    /// Row label
    pub row: String,
    /// 1-based column
    pub column: u32,
    /// Category of the seat's row
    pub category: Category,
}

/// Validated, immutable seat grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLayout {
    rows: Vec<String>,
    columns: u32,
    categories: Vec<Category>,
    row_category: HashMap<String, usize>,
    diagnostics: Vec<String>,
    basic: Category,
}

impl SeatLayout {
    /// Parses layout JSON
    ///
    /// # Errors
    ///
    /// Returns [`LayoutParseError`] when the text is not layout JSON or the
    /// layout it describes is invalid.
    pub fn parse(text: &str) -> Result<Self, LayoutParseError> {
        let spec: LayoutSpec = serde_json::from_str(text.trim())
            .map_err(|e| LayoutParseError::InvalidJson(e.to_string()))?;
        Self::from_spec(spec)
    }

    /// Validates a layout description
    ///
    /// Categories are applied in order; a row claimed by an earlier category
    /// keeps it. Rows named by a category but absent from the layout are
    /// ignored. Both cases are recorded in [`SeatLayout::diagnostics`].
    ///
    /// # Errors
    ///
    /// Returns [`LayoutParseError`] for empty or duplicate rows, zero columns,
    /// non-positive multipliers, and row labels whose seat codes collide.
    pub fn from_spec(spec: LayoutSpec) -> Result<Self, LayoutParseError> {
        if spec.rows.is_empty() {
            return Err(LayoutParseError::NoRows);
        }
        if spec.columns == 0 {
            return Err(LayoutParseError::ZeroColumns);
        }

        let mut rows = Vec::with_capacity(spec.rows.len());
        let mut seen = HashSet::new();
        for (index, raw) in spec.rows.iter().enumerate() {
            let label = raw.trim();
            if label.is_empty() {
                return Err(LayoutParseError::EmptyRowLabel { index });
            }
            if !seen.insert(label.to_string()) {
                return Err(LayoutParseError::DuplicateRow(label.to_string()));
            }
            rows.push(label.to_string());
        }

        check_unambiguous(&rows, spec.columns)?;

        let mut categories = Vec::with_capacity(spec.categories.len());
        let mut row_category = HashMap::new();
        let mut diagnostics = Vec::new();

        for category_spec in spec.categories {
            let multiplier = match category_spec.multiplier {
                None => Multiplier::ONE,
                Some(factor) => Multiplier::from_factor(factor).ok_or_else(|| {
                    LayoutParseError::InvalidMultiplier {
                        label: category_spec.label.clone(),
                        multiplier: factor.to_string(),
                    }
                })?,
            };
            let index = categories.len();
            let name = normalize_label(&category_spec.label);

            for row in &category_spec.rows {
                let row = row.trim();
                if !seen.contains(row) {
                    tracing::warn!(category = %name, row, "Category names a row not in the layout");
                    diagnostics.push(format!("category '{name}' names unknown row '{row}'"));
                    continue;
                }
                if let Some(&owner) = row_category.get(row) {
                    let owner: &Category = &categories[owner];
                    tracing::warn!(
                        row,
                        kept = %owner.name,
                        ignored = %name,
                        "Row claimed by more than one category"
                    );
                    diagnostics.push(format!(
                        "row '{row}' is in both '{}' and '{name}'; using '{}'",
                        owner.name, owner.name
                    ));
                    continue;
                }
                row_category.insert(row.to_string(), index);
            }

            categories.push(Category { name, multiplier });
        }

        Ok(Self {
            rows,
            columns: spec.columns,
            categories,
            row_category,
            diagnostics,
            basic: Category::basic(),
        })
    }

    /// Row labels, front to back
    #[must_use]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Seats per row
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Declared categories, in declaration order
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Warnings raised while building the layout
    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Number of seats (`rows × columns`), saturating at `u32::MAX`
    #[must_use]
    pub fn total_seats(&self) -> u32 {
        let rows = u32::try_from(self.rows.len()).unwrap_or(u32::MAX);
        rows.saturating_mul(self.columns)
    }

    /// Category of a row; `Basic` when no category claims it
    #[must_use]
    pub fn category_of_row(&self, row: &str) -> &Category {
        self.row_category
            .get(row)
            .map_or(&self.basic, |&index| &self.categories[index])
    }

    /// Looks up a seat by its code
    #[must_use]
    pub fn seat(&self, code: &SeatCode) -> Option<Seat> {
        let text = code.as_str();
        self.rows.iter().find_map(|row| {
            let column = parse_column(text.strip_prefix(row.as_str())?)?;
            (column <= self.columns).then(|| Seat {
                code: code.clone(),
                row: row.clone(),
                column,
                category: self.category_of_row(row).clone(),
            })
        })
    }

    /// Whether the code names a seat in this layout
    #[must_use]
    pub fn contains(&self, code: &SeatCode) -> bool {
        self.seat(code).is_some()
    }

    /// Every seat, row by row
    pub fn seats(&self) -> impl Iterator<Item = Seat> + '_ {
        self.rows.iter().flat_map(move |row| {
            let category = self.category_of_row(row);
            (1..=self.columns).map(move |column| Seat {
                code: SeatCode::new(row, column),
                row: row.clone(),
                column,
                category: category.clone(),
            })
        })
    }
}

/// Parses a canonical 1-based column number (digits only, no leading zero)
fn parse_column(text: &str) -> Option<u32> {
    if text.is_empty() || text.starts_with('0') || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Rejects row labels whose generated codes collide.
///
/// `r1 + c1 == r2 + c2` with `r1 != r2` requires `r2 = r1 + d` for a digit
/// string `d`, and then `c1 = d ++ c2`. The smallest such `c1` is `d ++ "1"`,
/// so the pair collides exactly when that number fits in the grid.
fn check_unambiguous(rows: &[String], columns: u32) -> Result<(), LayoutParseError> {
    for shorter in rows {
        for longer in rows {
            let Some(suffix) = longer.strip_prefix(shorter.as_str()) else {
                continue;
            };
            if suffix.is_empty() {
                continue;
            }
            let Some(first_column) = parse_column(&format!("{suffix}1")) else {
                continue;
            };
            if first_column <= columns {
                return Err(LayoutParseError::AmbiguousSeatCode {
                    code: SeatCode::new(longer, 1),
                });
            }
        }
    }
    Ok(())
}
