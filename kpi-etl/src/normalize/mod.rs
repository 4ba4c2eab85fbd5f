//! Workbook normalization: many sheets in, one union-schema dataset out

mod frame;
mod value;

pub use frame::{
    Dataset, SheetFrame, build_dataset, LOAD_TIMESTAMP_COLUMN, SHEET_NAME_COLUMN,
};
pub use value::Value;

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use chrono::Utc;

use crate::pipeline::PipelineError;

/// Normalize a raw workbook into a single tabular dataset.
///
/// Sheets are read in stored order. An empty sheet is skipped; a sheet that
/// fails to parse is logged and skipped without aborting the run. The load
/// timestamp is captured once, before sheet iteration, so every row of the
/// run carries the same instant. When no sheet survives the result is
/// `EmptyDataset`.
pub fn normalize(workbook: &[u8]) -> Result<Dataset, PipelineError> {
    let load_timestamp = Utc::now();

    let mut workbook = match Xlsx::new(Cursor::new(workbook)) {
        Ok(wb) => wb,
        Err(e) => {
            log::error!("Failed to open workbook: {e}");
            return Err(PipelineError::EmptyDataset);
        }
    };

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut frames = Vec::new();

    for sheet_name in sheet_names {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                log::warn!("Skipping sheet '{}': failed to parse: {}", sheet_name, e);
                continue;
            }
        };

        let sheet = read_frame(&sheet_name, &range);
        if sheet.is_empty() {
            log::debug!("Skipping empty sheet '{}'", sheet_name);
            continue;
        }
        frames.push(sheet);
    }

    if frames.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let dataset = build_dataset(&frames, load_timestamp);
    log::info!(
        "Normalized {} sheets into {} rows and {} columns",
        frames.len(),
        dataset.row_count(),
        dataset.columns.len()
    );
    Ok(dataset)
}

/// Read one sheet into a frame. The first row is the header row; columns
/// with empty headers are dropped.
fn read_frame(name: &str, range: &Range<Data>) -> SheetFrame {
    let mut sheet_rows = range.rows();

    let Some(header_row) = sheet_rows.next() else {
        return SheetFrame {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
        };
    };

    // Keep the source column index next to each retained header
    let columns: Vec<(usize, String)> = header_row
        .iter()
        .enumerate()
        .filter_map(|(i, cell)| match cell {
            Data::String(s) if !s.trim().is_empty() => Some((i, s.trim().to_string())),
            _ => None,
        })
        .collect();

    let rows: Vec<Vec<Value>> = sheet_rows
        .map(|row| {
            columns
                .iter()
                .map(|(i, _)| row.get(*i).map(Value::from_cell).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    SheetFrame {
        name: name.to_string(),
        columns: columns.into_iter().map(|(_, c)| c).collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use rust_xlsxwriter::Workbook;

    use super::*;

    /// Write a grid of strings into a named sheet
    fn string_sheet(workbook: &mut Workbook, name: &str, rows: &[&[&str]]) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    worksheet.write_string(r as u32, c as u16, *cell).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_two_sheets_one_empty() {
        // Scenario: Sheet1 has 3 data rows, Sheet2 is empty
        let mut workbook = Workbook::new();
        string_sheet(
            &mut workbook,
            "Sheet1",
            &[
                &["Area", "Metric"],
                &["North", "12"],
                &["South", "9"],
                &["West", "4"],
            ],
        );
        workbook.add_worksheet().set_name("Sheet2").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        assert_eq!(dataset.row_count(), 3);

        let sheet_idx = dataset.column_index(SHEET_NAME_COLUMN).unwrap();
        for row in &dataset.rows {
            assert_eq!(row[sheet_idx], Value::String("Sheet1".to_string()));
        }
    }

    #[test]
    fn test_row_count_is_sum_of_non_empty_sheets() {
        let mut workbook = Workbook::new();
        string_sheet(
            &mut workbook,
            "Referrals",
            &[&["Month", "Count"], &["Jan", "10"], &["Feb", "11"]],
        );
        string_sheet(&mut workbook, "Waits", &[&["Month", "Days"], &["Jan", "3"]]);
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        assert_eq!(dataset.row_count(), 3);
    }

    #[test]
    fn test_union_schema_nulls_missing_columns() {
        let mut workbook = Workbook::new();
        string_sheet(
            &mut workbook,
            "A",
            &[&["Month", "Count"], &["Jan", "10"]],
        );
        string_sheet(
            &mut workbook,
            "B",
            &[&["Month", "Days"], &["Feb", "5"]],
        );
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        assert_eq!(
            dataset.columns,
            vec![
                "Month",
                "Count",
                "Days",
                SHEET_NAME_COLUMN,
                LOAD_TIMESTAMP_COLUMN
            ]
        );

        let days_idx = dataset.column_index("Days").unwrap();
        let count_idx = dataset.column_index("Count").unwrap();
        assert_eq!(dataset.rows[0][days_idx], Value::Null);
        assert_eq!(dataset.rows[1][count_idx], Value::Null);
        assert_eq!(dataset.rows[1][days_idx], Value::Int(5));
    }

    #[test]
    fn test_every_row_shares_one_load_timestamp() {
        let mut workbook = Workbook::new();
        string_sheet(&mut workbook, "A", &[&["x"], &["1"], &["2"]]);
        string_sheet(&mut workbook, "B", &[&["x"], &["3"]]);
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        let ts_idx = dataset.column_index(LOAD_TIMESTAMP_COLUMN).unwrap();
        let first = &dataset.rows[0][ts_idx];
        assert!(matches!(first, Value::DateTime(_)));
        for row in &dataset.rows {
            assert_eq!(&row[ts_idx], first);
        }
    }

    #[test]
    fn test_header_only_sheet_is_empty() {
        let mut workbook = Workbook::new();
        string_sheet(&mut workbook, "HeadersOnly", &[&["Month", "Count"]]);
        string_sheet(&mut workbook, "Data", &[&["x"], &["1"]]);
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        assert_eq!(dataset.row_count(), 1);
        assert_eq!(dataset.columns[0], "x");
    }

    #[test]
    fn test_all_sheets_empty_is_empty_dataset() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("One").unwrap();
        workbook.add_worksheet().set_name("Two").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let err = normalize(&bytes).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset));
    }

    #[test]
    fn test_unreadable_workbook_is_empty_dataset() {
        let err = normalize(b"this is not a workbook").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset));
    }

    #[test]
    fn test_numeric_cells() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Numbers").unwrap();
        worksheet.write_string(0, 0, "Count").unwrap();
        worksheet.write_string(0, 1, "Rate").unwrap();
        worksheet.write_number(1, 0, 12.0).unwrap();
        worksheet.write_number(1, 1, 0.75).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        assert_eq!(dataset.rows[0][0], Value::Int(12));
        assert_eq!(dataset.rows[0][1], Value::Float(0.75));
    }

    #[test]
    fn test_empty_header_columns_are_dropped() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Sparse").unwrap();
        // Column B has no header; its cells must not survive
        worksheet.write_string(0, 0, "Month").unwrap();
        worksheet.write_string(0, 2, "Count").unwrap();
        worksheet.write_string(1, 0, "Jan").unwrap();
        worksheet.write_string(1, 1, "stray").unwrap();
        worksheet.write_string(1, 2, "10").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = normalize(&bytes).unwrap();
        assert_eq!(
            dataset.columns,
            vec!["Month", "Count", SHEET_NAME_COLUMN, LOAD_TIMESTAMP_COLUMN]
        );
        assert_eq!(dataset.rows[0][1], Value::String("10".to_string()));
    }
}
