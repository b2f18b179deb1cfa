// Excel/ODS read via calamine, bucket workbook write via rust_xlsxwriter

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};

use crate::error::IoError;
use crate::export::{Cell, SheetData};

/// Read all rows of one worksheet as display strings.
///
/// `sheet` is matched case-insensitively; `None` takes the first sheet.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::open(path, e))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.trim().eq_ignore_ascii_case(wanted.trim()))
            .cloned()
            .ok_or_else(|| IoError::MissingSheet {
                path: path.to_path_buf(),
                sheet: wanted.to_string(),
                available: sheet_names.clone(),
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| IoError::EmptyTable {
                path: path.to_path_buf(),
            })?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| IoError::open(path, format!("failed to read sheet '{name}': {e}")))?;
    log::debug!(
        "{}: sheet '{}' is {}x{}",
        path.display(),
        name,
        range.height(),
        range.width()
    );

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Integers without decimals, so "5" and not "5.0"
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => format!("{n}"),
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Write sheets into one workbook; bold frozen header row, autofit widths.
pub fn write_workbook(path: &Path, sheets: &[SheetData]) -> Result<(), IoError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| IoError::write(path, format!("sheet '{}': {e}", sheet.name)))?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| IoError::write(path, e))?;
        }

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            let row_num = row_idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) if s.is_empty() => {}
                    Cell::Text(s) => {
                        worksheet
                            .write_string(row_num, col as u16, s)
                            .map_err(|e| IoError::write(path, e))?;
                    }
                    Cell::Number(n) => {
                        worksheet
                            .write_number(row_num, col as u16, *n as f64)
                            .map_err(|e| IoError::write(path, e))?;
                    }
                }
            }
        }

        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| IoError::write(path, e))?;
        worksheet.autofit();
    }

    workbook.save(path).map_err(|e| IoError::write(path, e))?;
    Ok(())
}
