use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A sheet or CSV as read from disk: one header row plus string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Dataset label used in error messages ("stock", "listing", ...).
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }
}

/// Pre-loaded tables for one classification pass.
pub struct RunInput {
    pub stock: RawTable,
    pub listing: RawTable,
    pub variants: Option<RawTable>,
}

// ---------------------------------------------------------------------------
// Product keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantMarker {
    Regular,
    /// Trailing `-S`.
    SuffixS,
    /// Trailing `-M`.
    SuffixM,
}

impl VariantMarker {
    pub fn is_variant(self) -> bool {
        !matches!(self, Self::Regular)
    }
}

/// Product key tagged with its variant marker at ingest.
///
/// Identity is the canonical form (trimmed, ASCII upper-case), so `nl123-s`
/// and ` NL123-S` are the same key. `raw` keeps the trimmed spelling of the
/// first occurrence for display.
#[derive(Debug, Clone)]
pub struct ProductKey {
    raw: String,
    canonical: String,
    marker: VariantMarker,
}

impl ProductKey {
    pub fn parse(input: &str) -> Self {
        let raw = input.trim().to_string();
        let canonical = raw.to_ascii_uppercase();
        let marker = if canonical.len() > 2 && canonical.ends_with("-S") {
            VariantMarker::SuffixS
        } else if canonical.len() > 2 && canonical.ends_with("-M") {
            VariantMarker::SuffixM
        } else {
            VariantMarker::Regular
        };
        Self {
            raw,
            canonical,
            marker,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn marker(&self) -> VariantMarker {
        self.marker
    }

    pub fn is_variant(&self) -> bool {
        self.marker.is_variant()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

impl PartialEq for ProductKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ProductKey {}

impl Hash for ProductKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ProductKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProductKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ProductKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Archive,
    Concept,
    /// No listing found, or a status value that could not be read.
    Unknown,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Archive => write!(f, "archive"),
            Self::Concept => write!(f, "concept"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Region name → enabled on the webshop in that region.
pub type RegionFlags = BTreeMap<String, bool>;

#[derive(Debug, Clone)]
pub struct StockRecord {
    pub product_key: ProductKey,
    pub description: String,
    pub category: String,
    /// `None` when the cell was empty or unreadable; the joiner treats it as 0.
    pub available_quantity: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct WebListingRecord {
    pub product_key: ProductKey,
    pub description: String,
    pub category: String,
    pub listing_status: ListingStatus,
    pub region_flags: RegionFlags,
}

#[derive(Debug, Clone)]
pub struct VariantRecord {
    pub product_key: ProductKey,
    pub region_flags: RegionFlags,
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// One row per product key after the stock/listing outer join.
#[derive(Debug, Clone, Serialize)]
pub struct JoinedRecord {
    pub product_key: ProductKey,
    pub variant_marker: VariantMarker,
    pub description: String,
    pub category: String,
    pub available_quantity: u64,
    pub listing_status: ListingStatus,
    pub in_stock: bool,
    pub on_webshop: bool,
    pub region_flags: RegionFlags,
    /// Availability flag from the variant table, when the key is a variant
    /// SKU with a matching variant row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_flag: Option<bool>,
}

impl JoinedRecord {
    /// Regions where the product is currently switched on.
    pub fn active_regions(&self) -> Vec<&str> {
        self.region_flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(region, _)| region.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub records: Vec<JoinedRecord>,
    /// Variant rows whose key matched no stock or listing record.
    pub unmatched_variants: usize,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    RemoveFromShop,
    Reactivate,
    AddToShop,
    ConceptLowStock,
    ConceptReady,
    NoAction,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoveFromShop => write!(f, "remove_from_shop"),
            Self::Reactivate => write!(f, "reactivate"),
            Self::AddToShop => write!(f, "add_to_shop"),
            Self::ConceptLowStock => write!(f, "concept_low_stock"),
            Self::ConceptReady => write!(f, "concept_ready"),
            Self::NoAction => write!(f, "no_action"),
        }
    }
}

/// Which part of the decision table produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePath {
    Variant,
    /// Per-region threshold check on the webshop region flags.
    Region,
    Listing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub outcome: Outcome,
    pub path: RulePath,
}

impl Classification {
    pub fn listing(outcome: Outcome) -> Self {
        Self {
            outcome,
            path: RulePath::Listing,
        }
    }

    pub fn variant(outcome: Outcome) -> Self {
        Self {
            outcome,
            path: RulePath::Variant,
        }
    }

    pub fn region(outcome: Outcome) -> Self {
        Self {
            outcome,
            path: RulePath::Region,
        }
    }

    /// Reporting bucket, or `None` for no-action records.
    pub fn bucket(&self) -> Option<Bucket> {
        let variant = self.path == RulePath::Variant;
        match self.outcome {
            Outcome::RemoveFromShop if variant => Some(Bucket::RemoveVariant),
            Outcome::RemoveFromShop if self.path == RulePath::Region => {
                Some(Bucket::RemoveFromRegions)
            }
            Outcome::RemoveFromShop => Some(Bucket::RemoveFromShop),
            Outcome::Reactivate if variant => Some(Bucket::ReactivateVariant),
            Outcome::Reactivate => Some(Bucket::Reactivate),
            Outcome::AddToShop => Some(Bucket::AddToShop),
            Outcome::ConceptLowStock => Some(Bucket::ConceptLowStock),
            Outcome::ConceptReady => Some(Bucket::ConceptReady),
            Outcome::NoAction => None,
        }
    }
}

/// Exported result groups. Variant removals and reactivations are reported
/// apart from regular products, and so are per-region removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    RemoveFromShop,
    RemoveVariant,
    RemoveFromRegions,
    Reactivate,
    ReactivateVariant,
    AddToShop,
    ConceptLowStock,
    ConceptReady,
}

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::RemoveFromShop,
        Bucket::RemoveVariant,
        Bucket::RemoveFromRegions,
        Bucket::Reactivate,
        Bucket::ReactivateVariant,
        Bucket::AddToShop,
        Bucket::ConceptLowStock,
        Bucket::ConceptReady,
    ];

    pub fn outcome(self) -> Outcome {
        match self {
            Self::RemoveFromShop | Self::RemoveVariant | Self::RemoveFromRegions => {
                Outcome::RemoveFromShop
            }
            Self::Reactivate | Self::ReactivateVariant => Outcome::Reactivate,
            Self::AddToShop => Outcome::AddToShop,
            Self::ConceptLowStock => Outcome::ConceptLowStock,
            Self::ConceptReady => Outcome::ConceptReady,
        }
    }

    /// Short human title, used for sheet names and the stderr summary.
    pub fn title(self) -> &'static str {
        match self {
            Self::RemoveFromShop => "Remove from shop",
            Self::RemoveVariant => "Remove variant",
            Self::RemoveFromRegions => "Remove from regions",
            Self::Reactivate => "Reactivate",
            Self::ReactivateVariant => "Reactivate variant",
            Self::AddToShop => "Add to shop",
            Self::ConceptLowStock => "Concept low stock",
            Self::ConceptReady => "Concept ready",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoveFromShop => write!(f, "remove_from_shop"),
            Self::RemoveVariant => write!(f, "remove_variant"),
            Self::RemoveFromRegions => write!(f, "remove_from_regions"),
            Self::Reactivate => write!(f, "reactivate"),
            Self::ReactivateVariant => write!(f, "reactivate_variant"),
            Self::AddToShop => write!(f, "add_to_shop"),
            Self::ConceptLowStock => write!(f, "concept_low_stock"),
            Self::ConceptReady => write!(f, "concept_ready"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRecord {
    #[serde(flatten)]
    pub record: JoinedRecord,
    pub threshold: u64,
    pub classification: Classification,
    /// Region → missed threshold, for per-region removals.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub regions_off: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub buckets: BTreeMap<Bucket, Vec<ClassifiedRecord>>,
    pub no_action: usize,
}

impl Aggregation {
    pub fn actionable(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Values that could not be read and were replaced with a safe default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoercionStats {
    pub quantity: usize,
    pub listing_status: usize,
    pub region_flag: usize,
}

impl CoercionStats {
    pub fn total(&self) -> usize {
        self.quantity + self.listing_status + self.region_flag
    }

    pub fn add(&mut self, other: &CoercionStats) {
        self.quantity += other.quantity;
        self.listing_status += other.listing_status;
        self.region_flag += other.region_flag;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub in_stock: usize,
    pub on_webshop: usize,
    pub actionable: usize,
    pub no_action: usize,
    pub bucket_counts: BTreeMap<String, usize>,
    pub coercions: CoercionStats,
    pub skipped_rows: usize,
    pub unmatched_variants: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub buckets: BTreeMap<Bucket, Vec<ClassifiedRecord>>,
}
