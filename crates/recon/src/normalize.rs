//! Schema normalization: map source-specific headers and cell encodings onto
//! the canonical record types.
//!
//! Each source kind (stock report, webshop report, variant/article table) has
//! its own [`AliasTable`]. Headers are compared case-insensitively with
//! whitespace trimmed and collapsed. Required fields are checked before any
//! row is read, so a wrong file fails fast with a [`SchemaError`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::{debug, info, warn};
use regex::Regex;

use crate::error::SchemaError;
use crate::model::{
    CoercionStats, ListingStatus, ProductKey, RawTable, RegionFlags, StockRecord, VariantRecord,
    WebListingRecord,
};

/// Webshop regions known to the built-in alias tables.
pub const DEFAULT_REGIONS: [&str; 5] = [
    "Nederland",
    "Duitsland",
    "België (NL)",
    "België (FR)",
    "Frankrijk",
];

// ---------------------------------------------------------------------------
// Fields + source kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    ProductKey,
    Description,
    Category,
    AvailableQuantity,
    ListingStatus,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProductKey => write!(f, "product_key"),
            Self::Description => write!(f, "description"),
            Self::Category => write!(f, "category"),
            Self::AvailableQuantity => write!(f, "available_quantity"),
            Self::ListingStatus => write!(f, "listing_status"),
        }
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product_key" => Ok(Self::ProductKey),
            "description" => Ok(Self::Description),
            "category" => Ok(Self::Category),
            "available_quantity" => Ok(Self::AvailableQuantity),
            "listing_status" => Ok(Self::ListingStatus),
            other => Err(format!("unknown field '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Stock,
    Listing,
    Variant,
}

impl SourceKind {
    pub fn required_fields(self) -> &'static [Field] {
        match self {
            Self::Stock => &[Field::ProductKey, Field::AvailableQuantity],
            Self::Listing => &[Field::ProductKey, Field::ListingStatus],
            Self::Variant => &[Field::ProductKey],
        }
    }

    /// Fields this source can provide at all.
    pub fn known_fields(self) -> &'static [Field] {
        match self {
            Self::Stock => &[
                Field::ProductKey,
                Field::Description,
                Field::Category,
                Field::AvailableQuantity,
            ],
            Self::Listing => &[
                Field::ProductKey,
                Field::Description,
                Field::Category,
                Field::ListingStatus,
            ],
            Self::Variant => &[Field::ProductKey],
        }
    }

    pub fn requires_regions(self) -> bool {
        matches!(self, Self::Variant)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stock => write!(f, "stock"),
            Self::Listing => write!(f, "listing"),
            Self::Variant => write!(f, "variant"),
        }
    }
}

// ---------------------------------------------------------------------------
// Alias tables
// ---------------------------------------------------------------------------

/// Accepted header names per canonical field and per webshop region.
#[derive(Debug, Clone)]
pub struct AliasTable {
    pub kind: SourceKind,
    pub fields: BTreeMap<Field, Vec<String>>,
    /// Region name → accepted headers. Empty for sources without region columns.
    pub regions: BTreeMap<String, Vec<String>>,
    /// Region whose column must be present, not just any region.
    pub required_region: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_region_aliases(region: &str) -> Vec<String> {
    match region {
        "België (NL)" => strings(&["België (NL)", "Belgie (NL)", "Belgium (NL)", "BE-NL"]),
        "België (FR)" => strings(&["België (FR)", "Belgie (FR)", "Belgium (FR)", "BE-FR"]),
        "Nederland" => strings(&["Nederland", "Netherlands", "NL"]),
        "Duitsland" => strings(&["Duitsland", "Germany", "Deutschland", "DE"]),
        "Frankrijk" => strings(&["Frankrijk", "France", "FR"]),
        other => vec![other.to_string()],
    }
}

impl AliasTable {
    /// Built-in aliases for the report layouts seen in practice.
    pub fn builtin(kind: SourceKind) -> Self {
        let mut fields = BTreeMap::new();
        let key_aliases = match kind {
            SourceKind::Stock => strings(&["Nr.", "Nr", "Stiercode", "Stiercode NL / KI code", "Artikelnummer"]),
            SourceKind::Listing => strings(&["Nummer", "Stiercode", "Stiercode NL / KI code", "SKU", "Nr."]),
            SourceKind::Variant => strings(&["Levensnummer", "Stiercode NL / KI code", "Stiercode", "Nummer", "Nr."]),
        };
        fields.insert(Field::ProductKey, key_aliases);

        if kind != SourceKind::Variant {
            fields.insert(
                Field::Description,
                strings(&["Omschrijving", "Stiernaam", "Naam", "Description", "Name"]),
            );
            fields.insert(
                Field::Category,
                strings(&["Ras omschrijving", "Ras", "Breed", "Category", "Categorie"]),
            );
        }
        match kind {
            SourceKind::Stock => {
                fields.insert(
                    Field::AvailableQuantity,
                    strings(&["Beschikbare voorraad", "Voorraad", "Available", "Quantity", "Qty"]),
                );
            }
            SourceKind::Listing => {
                fields.insert(
                    Field::ListingStatus,
                    strings(&["Status", "Webshop status", "Productstatus", "Product status"]),
                );
            }
            SourceKind::Variant => {}
        }

        let regions = match kind {
            SourceKind::Stock => BTreeMap::new(),
            SourceKind::Listing | SourceKind::Variant => DEFAULT_REGIONS
                .iter()
                .map(|r| (r.to_string(), builtin_region_aliases(r)))
                .collect(),
        };

        Self {
            kind,
            fields,
            regions,
            required_region: None,
        }
    }

    /// Replace the accepted headers for one field.
    pub fn with_field_aliases(mut self, field: Field, aliases: Vec<String>) -> Self {
        self.fields.insert(field, aliases);
        self
    }

    /// Restrict (or extend) the region columns. Known region names keep their
    /// built-in aliases; other names match only themselves.
    pub fn with_regions(mut self, regions: &[String]) -> Self {
        self.regions = regions
            .iter()
            .map(|r| (r.clone(), builtin_region_aliases(r)))
            .collect();
        self
    }

    /// Fail column resolution unless `region`'s column is found.
    pub fn require_region(mut self, region: &str) -> Self {
        self.required_region = Some(region.to_string());
        self
    }

    fn region_aliases(&self, region: &str) -> Vec<String> {
        self.regions
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(region))
            .map(|(_, aliases)| aliases.clone())
            .unwrap_or_else(|| builtin_region_aliases(region))
    }

    fn aliases_for(&self, field: Field) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Lower-case, trim and collapse inner whitespace.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Column indices for the canonical fields present in one table.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    pub fields: BTreeMap<Field, usize>,
    pub regions: Vec<(String, usize)>,
}

impl ColumnMap {
    fn get(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }
}

fn find_column(headers: &[String], aliases: &[String]) -> Option<usize> {
    // Alias order is priority order.
    aliases.iter().find_map(|alias| {
        let wanted = normalize_header(alias);
        headers.iter().position(|h| *h == wanted)
    })
}

/// Match headers against the alias table, failing on the first missing
/// required field.
pub fn resolve_columns(table: &RawTable, aliases: &AliasTable) -> Result<ColumnMap, SchemaError> {
    let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();
    let mut map = ColumnMap::default();

    for &field in aliases.kind.known_fields() {
        let field_aliases = aliases.aliases_for(field);
        match find_column(&headers, field_aliases) {
            Some(idx) => {
                map.fields.insert(field, idx);
            }
            None if aliases.kind.required_fields().contains(&field) => {
                return Err(SchemaError {
                    dataset: table.name.clone(),
                    field: field.to_string(),
                    aliases: field_aliases.to_vec(),
                });
            }
            None => debug!("{}: optional column '{}' not present", table.name, field),
        }
    }

    for (region, region_aliases) in &aliases.regions {
        if let Some(idx) = find_column(&headers, region_aliases) {
            map.regions.push((region.clone(), idx));
        }
    }

    if aliases.kind.requires_regions() && map.regions.is_empty() {
        return Err(SchemaError {
            dataset: table.name.clone(),
            field: "region_flags".into(),
            aliases: aliases.regions.values().flatten().cloned().collect(),
        });
    }

    if let Some(ref region) = aliases.required_region {
        if !map.regions.iter().any(|(r, _)| r.eq_ignore_ascii_case(region)) {
            return Err(SchemaError {
                dataset: table.name.clone(),
                field: "region_flags".into(),
                aliases: aliases.region_aliases(region),
            });
        }
    }

    Ok(map)
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Quantity,
    ListingStatus,
    RegionFlag,
}

/// A cell that could not be read and was replaced by a safe default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionWarning {
    pub kind: CoercionKind,
    pub value: String,
}

impl CoercionWarning {
    fn new(kind: CoercionKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl CoercionStats {
    pub fn record(&mut self, kind: CoercionKind) {
        match kind {
            CoercionKind::Quantity => self.quantity += 1,
            CoercionKind::ListingStatus => self.listing_status += 1,
            CoercionKind::RegionFlag => self.region_flag += 1,
        }
    }
}

/// Dutch thousands grouping: `1.000`, `12.500`, `1.234,5`. A leading zero
/// (`0.500`) is a decimal, not a group.
fn thousands_grouped() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[1-9]\d{0,2}(\.\d{3})+(,\d+)?$").unwrap())
}

/// Parse a stock quantity. Empty is `Ok(None)`; decimals are truncated;
/// negative or non-numeric values are warnings.
///
/// Dots followed by groups of three digits are thousands separators and a
/// comma is the decimal mark. Any other single dot is a decimal point (`7.9`).
pub fn parse_quantity(value: &str) -> Result<Option<u64>, CoercionWarning> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return u64::try_from(n)
            .map(Some)
            .map_err(|_| CoercionWarning::new(CoercionKind::Quantity, value));
    }
    let decimal = if thousands_grouped().is_match(trimmed) {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.replace(',', ".")
    };
    match decimal.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Ok(Some(f.trunc() as u64)),
        _ => Err(CoercionWarning::new(CoercionKind::Quantity, value)),
    }
}

pub fn parse_listing_status(value: &str) -> Result<ListingStatus, CoercionWarning> {
    match value.trim().to_lowercase().as_str() {
        "active" | "actief" | "online" | "published" | "gepubliceerd" => Ok(ListingStatus::Active),
        "archive" | "archief" | "archived" | "gearchiveerd" | "offline" => Ok(ListingStatus::Archive),
        "concept" | "draft" | "ontwerp" => Ok(ListingStatus::Concept),
        _ => Err(CoercionWarning::new(CoercionKind::ListingStatus, value)),
    }
}

pub fn parse_region_flag(value: &str) -> Result<bool, CoercionWarning> {
    match value.trim().to_lowercase().as_str() {
        "ja" | "yes" | "y" | "true" | "1" | "x" | "waar" => Ok(true),
        "nee" | "no" | "n" | "false" | "0" | "onwaar" | "" => Ok(false),
        _ => Err(CoercionWarning::new(CoercionKind::RegionFlag, value)),
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Typed records from one table plus what had to be coerced or skipped.
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub coercions: CoercionStats,
    /// Rows dropped because the product key cell was empty.
    pub skipped_rows: usize,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            coercions: CoercionStats::default(),
            skipped_rows: 0,
        }
    }
}

struct RowReader<'a> {
    dataset: &'a str,
    row_no: usize,
    row: &'a [String],
}

impl<'a> RowReader<'a> {
    fn cell(&self, idx: Option<usize>) -> &'a str {
        idx.and_then(|i| self.row.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    fn note(&self, stats: &mut CoercionStats, warning: &CoercionWarning) {
        debug!(
            "{} row {}: coerced {:?} value '{}'",
            self.dataset, self.row_no, warning.kind, warning.value
        );
        stats.record(warning.kind);
    }

    fn region_flags(&self, map: &ColumnMap, stats: &mut CoercionStats) -> RegionFlags {
        let mut flags = RegionFlags::new();
        for (region, idx) in &map.regions {
            let on = match parse_region_flag(self.cell(Some(*idx))) {
                Ok(on) => on,
                Err(w) => {
                    self.note(stats, &w);
                    false
                }
            };
            flags.insert(region.clone(), on);
        }
        flags
    }
}

/// Walk data rows, skipping those without a product key.
fn for_each_keyed_row<T>(
    table: &RawTable,
    map: &ColumnMap,
    out: &mut Normalized<T>,
    mut f: impl FnMut(&RowReader<'_>, ProductKey, &mut CoercionStats) -> T,
) {
    let key_idx = map.get(Field::ProductKey);
    for (i, row) in table.rows.iter().enumerate() {
        let reader = RowReader {
            dataset: &table.name,
            // +2: one for the header row, one for 1-based numbering
            row_no: i + 2,
            row,
        };
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let key = ProductKey::parse(reader.cell(key_idx));
        if key.is_empty() {
            out.skipped_rows += 1;
            continue;
        }
        let record = f(&reader, key, &mut out.coercions);
        out.records.push(record);
    }
    if out.skipped_rows > 0 {
        warn!(
            "{}: skipped {} row(s) without a product key",
            table.name, out.skipped_rows
        );
    }
    info!(
        "{}: {} record(s), {} coerced value(s)",
        table.name,
        out.records.len(),
        out.coercions.total()
    );
}

pub fn normalize_stock(
    table: &RawTable,
    aliases: &AliasTable,
) -> Result<Normalized<StockRecord>, SchemaError> {
    let map = resolve_columns(table, aliases)?;
    let mut out = Normalized::default();
    for_each_keyed_row(table, &map, &mut out, |r, product_key, stats| {
        let available_quantity = match parse_quantity(r.cell(map.get(Field::AvailableQuantity))) {
            Ok(q) => q,
            Err(w) => {
                r.note(stats, &w);
                None
            }
        };
        StockRecord {
            product_key,
            description: r.cell(map.get(Field::Description)).to_string(),
            category: r.cell(map.get(Field::Category)).to_string(),
            available_quantity,
        }
    });
    Ok(out)
}

pub fn normalize_listing(
    table: &RawTable,
    aliases: &AliasTable,
) -> Result<Normalized<WebListingRecord>, SchemaError> {
    let map = resolve_columns(table, aliases)?;
    let mut out = Normalized::default();
    for_each_keyed_row(table, &map, &mut out, |r, product_key, stats| {
        let listing_status = match parse_listing_status(r.cell(map.get(Field::ListingStatus))) {
            Ok(s) => s,
            Err(w) => {
                r.note(stats, &w);
                ListingStatus::Unknown
            }
        };
        WebListingRecord {
            product_key,
            description: r.cell(map.get(Field::Description)).to_string(),
            category: r.cell(map.get(Field::Category)).to_string(),
            listing_status,
            region_flags: r.region_flags(&map, stats),
        }
    });
    Ok(out)
}

pub fn normalize_variants(
    table: &RawTable,
    aliases: &AliasTable,
) -> Result<Normalized<VariantRecord>, SchemaError> {
    let map = resolve_columns(table, aliases)?;
    let mut out = Normalized::default();
    for_each_keyed_row(table, &map, &mut out, |r, product_key, stats| VariantRecord {
        product_key,
        region_flags: r.region_flags(&map, stats),
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn header_matching_ignores_case_and_spacing() {
        let t = table(
            "stock",
            &["  NR. ", "Ras   Omschrijving", "beschikbare voorraad"],
            &[&["B1", "Jersey", "5"]],
        );
        let out = normalize_stock(&t, &AliasTable::builtin(SourceKind::Stock)).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].product_key.as_str(), "B1");
        assert_eq!(out.records[0].category, "Jersey");
        assert_eq!(out.records[0].available_quantity, Some(5));
    }

    #[test]
    fn stiercode_variants_resolve_to_product_key() {
        for header in ["Stiercode", "Stiercode NL / KI code", "Nr."] {
            let t = table("stock", &[header, "Voorraad"], &[&["NL1", "3"]]);
            let out = normalize_stock(&t, &AliasTable::builtin(SourceKind::Stock)).unwrap();
            assert_eq!(out.records[0].product_key.as_str(), "NL1", "header {header}");
        }
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let t = table("stock", &["Nr.", "Omschrijving"], &[&["B1", "Bull"]]);
        let err = normalize_stock(&t, &AliasTable::builtin(SourceKind::Stock)).unwrap_err();
        assert_eq!(err.dataset, "stock");
        assert_eq!(err.field, "available_quantity");
        assert!(err.aliases.contains(&"Beschikbare voorraad".to_string()));
        assert!(err.to_string().contains("available_quantity"));
    }

    #[test]
    fn variant_table_requires_a_region_column() {
        let t = table("variants", &["Levensnummer", "Omschrijving"], &[&["B4-S", "x"]]);
        let err = normalize_variants(&t, &AliasTable::builtin(SourceKind::Variant)).unwrap_err();
        assert_eq!(err.field, "region_flags");
    }

    #[test]
    fn required_region_must_have_a_column() {
        let aliases = AliasTable::builtin(SourceKind::Variant).require_region("nederland");
        let t = table("variant", &["Levensnummer", "Duitsland"], &[&["B4-S", "Ja"]]);
        let err = normalize_variants(&t, &aliases).unwrap_err();
        assert_eq!(err.dataset, "variant");
        assert_eq!(err.field, "region_flags");
        assert!(err.aliases.contains(&"Netherlands".to_string()));
        assert!(!err.aliases.contains(&"Duitsland".to_string()));

        let t = table("variant", &["Levensnummer", "NL"], &[&["B4-S", "Ja"]]);
        let out = normalize_variants(&t, &aliases).unwrap();
        assert!(out.records[0].region_flags["Nederland"]);
    }

    #[test]
    fn overridden_aliases_replace_builtin() {
        let aliases = AliasTable::builtin(SourceKind::Stock)
            .with_field_aliases(Field::ProductKey, vec!["Code".into()]);
        let t = table("stock", &["Nr.", "Voorraad"], &[&["B1", "1"]]);
        assert!(normalize_stock(&t, &aliases).is_err());
        let t = table("stock", &["code", "Voorraad"], &[&["B1", "1"]]);
        assert_eq!(normalize_stock(&t, &aliases).unwrap().records.len(), 1);
    }

    #[test]
    fn quantity_coercion() {
        assert_eq!(parse_quantity("12"), Ok(Some(12)));
        assert_eq!(parse_quantity(" 7.9 "), Ok(Some(7)));
        assert_eq!(parse_quantity("3,5"), Ok(Some(3)));
        assert_eq!(parse_quantity("0.500"), Ok(Some(0)));
        assert_eq!(parse_quantity(""), Ok(None));

        // Dutch thousands separators
        assert_eq!(parse_quantity("1.000"), Ok(Some(1000)));
        assert_eq!(parse_quantity("1.250"), Ok(Some(1250)));
        assert_eq!(parse_quantity("12.345.678"), Ok(Some(12_345_678)));
        assert_eq!(parse_quantity("1.234,5"), Ok(Some(1234)));
        assert!(parse_quantity("1,234.5").is_err());
        assert!(parse_quantity("1.23.4").is_err());
        assert!(parse_quantity("-4").is_err());
        assert!(parse_quantity("n/a").is_err());
    }

    #[test]
    fn bad_quantity_is_counted_not_fatal() {
        let t = table(
            "stock",
            &["Nr.", "Beschikbare voorraad"],
            &[&["B1", "veel"], &["B2", "-1"], &["B3", ""], &["B4", "8"]],
        );
        let out = normalize_stock(&t, &AliasTable::builtin(SourceKind::Stock)).unwrap();
        assert_eq!(out.records.len(), 4);
        assert_eq!(out.coercions.quantity, 2);
        assert_eq!(out.records[0].available_quantity, None);
        assert_eq!(out.records[2].available_quantity, None);
        assert_eq!(out.records[3].available_quantity, Some(8));
    }

    #[test]
    fn listing_status_and_regions() {
        let t = table(
            "listing",
            &["Nummer", "Status", "Nederland", "Belgie (FR)", "Frankrijk"],
            &[
                &["B1", "Actief", "Ja", "Nee", ""],
                &["B2", "Gearchiveerd", "nee", "ja", "misschien"],
                &["B3", "weg", "", "", ""],
            ],
        );
        let out = normalize_listing(&t, &AliasTable::builtin(SourceKind::Listing)).unwrap();
        assert_eq!(out.records[0].listing_status, ListingStatus::Active);
        assert_eq!(out.records[1].listing_status, ListingStatus::Archive);
        assert_eq!(out.records[2].listing_status, ListingStatus::Unknown);
        assert!(out.records[0].region_flags["Nederland"]);
        assert!(!out.records[0].region_flags["België (FR)"]);
        assert!(out.records[1].region_flags["België (FR)"]);
        assert!(!out.records[0].region_flags.contains_key("Duitsland"));
        assert_eq!(out.coercions.listing_status, 1);
        assert_eq!(out.coercions.region_flag, 1);
    }

    #[test]
    fn rows_without_key_are_skipped() {
        let t = table(
            "stock",
            &["Nr.", "Voorraad"],
            &[&["", "5"], &["", ""], &["B1", "2"]],
        );
        let out = normalize_stock(&t, &AliasTable::builtin(SourceKind::Stock)).unwrap();
        assert_eq!(out.records.len(), 1);
        // Fully blank rows are ignored, not counted.
        assert_eq!(out.skipped_rows, 1);
    }
}
