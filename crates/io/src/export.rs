// Bucket export: one sheet per bucket in a workbook, or one CSV per bucket

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use shopsync_recon::config::ExportFormat;
use shopsync_recon::model::{Bucket, ClassifiedRecord, RulePath};

use crate::error::IoError;

/// Column headers shared by both export formats.
pub const EXPORT_HEADERS: [&str; 10] = [
    "product_key",
    "description",
    "category",
    "available_quantity",
    "threshold",
    "listing_status",
    "active_regions",
    "outcome",
    "rule_path",
    "regions_off",
];

/// Workbook file name used for xlsx exports.
pub const WORKBOOK_NAME: &str = "shopsync.xlsx";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(u64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

fn record_row(rec: &ClassifiedRecord) -> Vec<Cell> {
    let r = &rec.record;
    let path = match rec.classification.path {
        RulePath::Variant => "variant",
        RulePath::Region => "region",
        RulePath::Listing => "listing",
    };
    let regions_off: Vec<String> = rec
        .regions_off
        .iter()
        .map(|(region, threshold)| format!("{region} < {threshold}"))
        .collect();
    vec![
        Cell::Text(r.product_key.to_string()),
        Cell::Text(r.description.clone()),
        Cell::Text(r.category.clone()),
        Cell::Number(r.available_quantity),
        Cell::Number(rec.threshold),
        Cell::Text(r.listing_status.to_string()),
        Cell::Text(r.active_regions().join(", ")),
        Cell::Text(rec.classification.outcome.to_string()),
        Cell::Text(path.to_string()),
        Cell::Text(regions_off.join(", ")),
    ]
}

fn summary_sheet(buckets: &BTreeMap<Bucket, Vec<ClassifiedRecord>>) -> SheetData {
    SheetData {
        name: "Summary".into(),
        headers: vec!["bucket", "count"],
        rows: Bucket::ALL
            .iter()
            .map(|b| {
                let count = buckets.get(b).map_or(0, Vec::len);
                vec![Cell::Text(b.title().to_string()), Cell::Number(count as u64)]
            })
            .collect(),
    }
}

/// Export every non-empty bucket into `dir`, creating it when needed.
///
/// Returns the files written. Xlsx writes a single workbook with a summary
/// sheet followed by one sheet per non-empty bucket; CSV writes
/// `<bucket>.csv` per non-empty bucket.
pub fn export_buckets(
    buckets: &BTreeMap<Bucket, Vec<ClassifiedRecord>>,
    dir: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>, IoError> {
    std::fs::create_dir_all(dir).map_err(|e| IoError::write(dir, e))?;

    let non_empty = Bucket::ALL
        .iter()
        .filter_map(|b| buckets.get(b).filter(|r| !r.is_empty()).map(|r| (*b, r)));

    let written = match format {
        ExportFormat::Xlsx => {
            let mut sheets = vec![summary_sheet(buckets)];
            sheets.extend(non_empty.map(|(bucket, records)| SheetData {
                name: bucket.title().to_string(),
                headers: EXPORT_HEADERS.to_vec(),
                rows: records.iter().map(record_row).collect(),
            }));
            let path = dir.join(WORKBOOK_NAME);
            crate::xlsx::write_workbook(&path, &sheets)?;
            log::info!("wrote {} bucket sheet(s) to {}", sheets.len() - 1, path.display());
            vec![path]
        }
        ExportFormat::Csv => {
            let mut paths = Vec::new();
            for (bucket, records) in non_empty {
                let path = dir.join(format!("{bucket}.csv"));
                let rows: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| record_row(r).iter().map(Cell::to_string).collect())
                    .collect();
                crate::csv::write_rows(&path, &EXPORT_HEADERS, &rows)?;
                log::info!("wrote {} row(s) to {}", rows.len(), path.display());
                paths.push(path);
            }
            paths
        }
    };
    Ok(written)
}
