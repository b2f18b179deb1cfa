// Report readers and bucket exporters

pub mod csv;
pub mod error;
pub mod export;
pub mod xlsx;

use std::path::Path;

use shopsync_recon::model::RawTable;

pub use error::IoError;
pub use export::{export_buckets, EXPORT_HEADERS};

/// Read one report into a [`RawTable`] labelled `name`.
///
/// Spreadsheets (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`) go through
/// calamine and honour `sheet`; delimited text (`.csv`, `.tsv`, `.txt`) ignores
/// it. The first non-empty row becomes the header row.
pub fn read_table(path: &Path, name: &str, sheet: Option<&str>) -> Result<RawTable, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let rows = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => crate::xlsx::read_rows(path, sheet)?,
        "csv" | "txt" => crate::csv::read_rows(path, None)?,
        "tsv" => crate::csv::read_rows(path, Some(b'\t'))?,
        other => {
            return Err(IoError::open(
                path,
                format!("unsupported file type '.{other}'"),
            ))
        }
    };
    into_table(path, name, rows)
}

/// Split raw rows into header + data, skipping leading blank rows.
fn into_table(path: &Path, name: &str, rows: Vec<Vec<String>>) -> Result<RawTable, IoError> {
    let mut rows = rows
        .into_iter()
        .skip_while(|row| row.iter().all(|c| c.trim().is_empty()));
    let headers = rows.next().ok_or_else(|| IoError::EmptyTable {
        path: path.to_path_buf(),
    })?;
    let data: Vec<Vec<String>> = rows.collect();
    log::info!(
        "{}: read {} data row(s) from {}",
        name,
        data.len(),
        path.display()
    );
    Ok(RawTable::new(name, headers, data))
}
