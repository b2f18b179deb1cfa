//! Threshold classification as an ordered decision table.
//!
//! Each [`Rule`] is a predicate over one joined record and its threshold.
//! Rules are tried in order and the first one that fires decides the
//! outcome; when none fires the record needs no action. All comparisons are
//! strict, so a quantity exactly at the threshold never flips a product.

use serde::{Deserialize, Serialize};

use crate::model::{Classification, JoinedRecord, ListingStatus, Outcome};
use crate::threshold::Threshold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Variant SKU with a variant-table flag. Supersedes the listing status.
    VariantRegion,
    /// Enabled in a region whose own threshold the stock is below. Not in
    /// the default rules.
    RegionBelow,
    /// Draft listing: ready once stock exceeds the threshold.
    Concept,
    /// In stock but not on the webshop.
    Unlisted,
    /// Live listing that ran below the threshold.
    ActiveBelow,
    /// Archived listing that is back above the threshold.
    ArchiveAbove,
}

pub const DEFAULT_RULES: [Rule; 5] = [
    Rule::VariantRegion,
    Rule::Concept,
    Rule::Unlisted,
    Rule::ActiveBelow,
    Rule::ArchiveAbove,
];

impl Rule {
    pub fn apply(self, record: &JoinedRecord, resolved: &Threshold) -> Option<Classification> {
        let qty = record.available_quantity;
        let threshold = resolved.value;
        match self {
            Self::VariantRegion => {
                if !record.variant_marker.is_variant() {
                    return None;
                }
                let flag = record.variant_flag?;
                let outcome = if qty < threshold && flag {
                    Outcome::RemoveFromShop
                } else if qty > threshold && !flag {
                    Outcome::Reactivate
                } else {
                    Outcome::NoAction
                };
                Some(Classification::variant(outcome))
            }
            Self::Concept => (record.listing_status == ListingStatus::Concept).then(|| {
                Classification::listing(if qty > threshold {
                    Outcome::ConceptReady
                } else {
                    Outcome::ConceptLowStock
                })
            }),
            Self::Unlisted => (record.listing_status == ListingStatus::Unknown).then(|| {
                Classification::listing(if qty > threshold {
                    Outcome::AddToShop
                } else {
                    Outcome::NoAction
                })
            }),
            Self::ActiveBelow => (record.listing_status == ListingStatus::Active && qty < threshold)
                .then(|| Classification::listing(Outcome::RemoveFromShop)),
            Self::ArchiveAbove => (record.listing_status == ListingStatus::Archive
                && qty > threshold)
                .then(|| Classification::listing(Outcome::Reactivate)),
            Self::RegionBelow => (!resolved.regions_below(qty, &record.region_flags).is_empty())
                .then(|| Classification::region(Outcome::RemoveFromShop)),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VariantRegion => write!(f, "variant_region"),
            Self::RegionBelow => write!(f, "region_below"),
            Self::Concept => write!(f, "concept"),
            Self::Unlisted => write!(f, "unlisted"),
            Self::ActiveBelow => write!(f, "active_below"),
            Self::ArchiveAbove => write!(f, "archive_above"),
        }
    }
}

/// Maps a joined record and its threshold to an outcome. Must be total.
pub trait Classifier {
    fn classify(&self, record: &JoinedRecord, threshold: &Threshold) -> Classification;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTable {
    rules: Vec<Rule>,
}

impl DecisionTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl Default for DecisionTable {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl Classifier for DecisionTable {
    fn classify(&self, record: &JoinedRecord, threshold: &Threshold) -> Classification {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(record, threshold))
            .unwrap_or(Classification::listing(Outcome::NoAction))
    }
}
