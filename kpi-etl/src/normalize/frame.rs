//! Sheet frames and the schema-union dataset builder

use chrono::{DateTime, Utc};

use super::value::Value;

/// Synthetic column tagging each row with its origin sheet
pub const SHEET_NAME_COLUMN: &str = "SheetName";
/// Synthetic column carrying the per-run load instant
pub const LOAD_TIMESTAMP_COLUMN: &str = "LoadTimestamp";

/// Parsed rows and columns of a single workbook sheet
#[derive(Debug, Clone)]
pub struct SheetFrame {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SheetFrame {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The concatenated, union-schema dataset handed to the staged loader
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Concatenate the retained frames against the union of their columns.
///
/// The union is computed once, first-seen order across frames in sheet
/// order; rows keep their frame order. A cell whose column is absent from
/// its frame is filled with null. Every row is stamped with its sheet name
/// and the single load timestamp.
pub fn build_dataset(frames: &[SheetFrame], load_timestamp: DateTime<Utc>) -> Dataset {
    let mut columns: Vec<String> = Vec::new();
    for frame in frames {
        for column in &frame.columns {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.clone());
            }
        }
    }

    let mut rows = Vec::new();
    for frame in frames {
        // Map union positions onto this frame's columns once per frame
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|column| frame.columns.iter().position(|c| c == column))
            .collect();

        for frame_row in &frame.rows {
            let mut row: Vec<Value> = positions
                .iter()
                .map(|position| match position {
                    Some(i) => frame_row.get(*i).cloned().unwrap_or(Value::Null),
                    None => Value::Null,
                })
                .collect();
            row.push(Value::String(frame.name.clone()));
            row.push(Value::DateTime(load_timestamp));
            rows.push(row);
        }
    }

    columns.push(SHEET_NAME_COLUMN.to_string());
    columns.push(LOAD_TIMESTAMP_COLUMN.to_string());

    Dataset { columns, rows }
}
