use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::model::{
    JoinOutput, JoinedRecord, ListingStatus, ProductKey, RegionFlags, StockRecord, VariantRecord,
    WebListingRecord,
};

/// Which variant-table region decides a variant SKU's availability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VariantRegion {
    /// Enabled when any region column says so.
    #[default]
    Any,
    /// Only this region's column counts.
    Named(String),
}

impl VariantRegion {
    pub fn flag(&self, flags: &RegionFlags) -> Option<bool> {
        match self {
            Self::Any if flags.is_empty() => None,
            Self::Any => Some(flags.values().any(|on| *on)),
            Self::Named(region) => flags
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(region))
                .map(|(_, on)| *on),
        }
    }
}

fn fill(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

/// Collapse duplicate stock rows; later non-empty values win per field.
fn merge_stock(stock: &[StockRecord]) -> BTreeMap<ProductKey, StockRecord> {
    let mut merged: BTreeMap<ProductKey, StockRecord> = BTreeMap::new();
    for rec in stock {
        match merged.get_mut(&rec.product_key) {
            Some(existing) => {
                debug!("stock: duplicate key {}", rec.product_key);
                fill(&mut existing.description, &rec.description);
                fill(&mut existing.category, &rec.category);
                if rec.available_quantity.is_some() {
                    existing.available_quantity = rec.available_quantity;
                }
            }
            None => {
                merged.insert(rec.product_key.clone(), rec.clone());
            }
        }
    }
    merged
}

/// Collapse duplicate listing rows; `Unknown` status counts as empty.
fn merge_listing(listing: &[WebListingRecord]) -> BTreeMap<ProductKey, WebListingRecord> {
    let mut merged: BTreeMap<ProductKey, WebListingRecord> = BTreeMap::new();
    for rec in listing {
        match merged.get_mut(&rec.product_key) {
            Some(existing) => {
                debug!("listing: duplicate key {}", rec.product_key);
                fill(&mut existing.description, &rec.description);
                fill(&mut existing.category, &rec.category);
                if rec.listing_status != ListingStatus::Unknown {
                    existing.listing_status = rec.listing_status;
                }
                existing
                    .region_flags
                    .extend(rec.region_flags.iter().map(|(k, v)| (k.clone(), *v)));
            }
            None => {
                merged.insert(rec.product_key.clone(), rec.clone());
            }
        }
    }
    merged
}

fn merge_variants(variants: &[VariantRecord]) -> BTreeMap<ProductKey, RegionFlags> {
    let mut merged: BTreeMap<ProductKey, RegionFlags> = BTreeMap::new();
    for rec in variants {
        merged
            .entry(rec.product_key.clone())
            .or_default()
            .extend(rec.region_flags.iter().map(|(k, v)| (k.clone(), *v)));
    }
    merged
}

/// Full outer join with the default variant region ([`VariantRegion::Any`]).
pub fn join(
    stock: &[StockRecord],
    listing: &[WebListingRecord],
    variants: Option<&[VariantRecord]>,
) -> JoinOutput {
    join_with(stock, listing, variants, &VariantRegion::Any)
}

/// Full outer join of stock and listing on product key, ordered by key.
///
/// Category comes from the listing when it has one, description from stock.
/// Missing quantities become 0. Variant rows only annotate existing keys that
/// carry a variant marker; they never add rows.
pub fn join_with(
    stock: &[StockRecord],
    listing: &[WebListingRecord],
    variants: Option<&[VariantRecord]>,
    variant_region: &VariantRegion,
) -> JoinOutput {
    let stock_map = merge_stock(stock);
    let listing_map = merge_listing(listing);
    let variant_map = variants.map(merge_variants).unwrap_or_default();

    let mut pairs: BTreeMap<&ProductKey, (Option<&StockRecord>, Option<&WebListingRecord>)> =
        BTreeMap::new();
    for (key, rec) in &stock_map {
        pairs.entry(key).or_default().0 = Some(rec);
    }
    for (key, rec) in &listing_map {
        pairs.entry(key).or_default().1 = Some(rec);
    }

    let mut records = Vec::with_capacity(pairs.len());
    for (key, (s, l)) in pairs {
        let product_key = s
            .map(|r| r.product_key.clone())
            .unwrap_or_else(|| key.clone());

        let mut category = s.map(|r| r.category.clone()).unwrap_or_default();
        if let Some(l) = l {
            fill(&mut category, &l.category);
        }
        let mut description = l.map(|r| r.description.clone()).unwrap_or_default();
        if let Some(s) = s {
            fill(&mut description, &s.description);
        }

        let variant_flag = if product_key.is_variant() {
            variant_map
                .get(&product_key)
                .and_then(|flags| variant_region.flag(flags))
        } else {
            None
        };

        records.push(JoinedRecord {
            variant_marker: product_key.marker(),
            description,
            category,
            available_quantity: s.and_then(|r| r.available_quantity).unwrap_or(0),
            listing_status: l.map(|r| r.listing_status).unwrap_or(ListingStatus::Unknown),
            in_stock: s.is_some(),
            on_webshop: l.is_some(),
            region_flags: l.map(|r| r.region_flags.clone()).unwrap_or_default(),
            variant_flag,
            product_key,
        });
    }

    let unmatched_variants = variant_map
        .keys()
        .filter(|k| !stock_map.contains_key(*k) && !listing_map.contains_key(*k))
        .count();
    if unmatched_variants > 0 {
        warn!("variant table: {unmatched_variants} key(s) not found in stock or listing");
    }
    for key in variant_map.keys().filter(|k| !k.is_variant()) {
        debug!("variant table: key {key} has no variant marker, ignored");
    }

    info!(
        "joined {} stock and {} listing key(s) into {} record(s)",
        stock_map.len(),
        listing_map.len(),
        records.len()
    );

    JoinOutput {
        records,
        unmatched_variants,
    }
}
