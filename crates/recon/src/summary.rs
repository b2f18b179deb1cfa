use std::collections::BTreeMap;

use crate::model::{Aggregation, CoercionStats, JoinOutput, RunSummary};

/// Compute summary statistics for one pass.
pub fn compute_summary(
    joined: &JoinOutput,
    aggregation: &Aggregation,
    coercions: CoercionStats,
    skipped_rows: usize,
) -> RunSummary {
    let bucket_counts: BTreeMap<String, usize> = aggregation
        .buckets
        .iter()
        .map(|(bucket, records)| (bucket.to_string(), records.len()))
        .collect();

    RunSummary {
        total_records: joined.records.len(),
        in_stock: joined.records.iter().filter(|r| r.in_stock).count(),
        on_webshop: joined.records.iter().filter(|r| r.on_webshop).count(),
        actionable: aggregation.actionable(),
        no_action: aggregation.no_action,
        bucket_counts,
        coercions,
        skipped_rows,
        unmatched_variants: joined.unmatched_variants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::classify::DecisionTable;
    use crate::join::join;
    use crate::model::{ListingStatus, ProductKey, RegionFlags, StockRecord, WebListingRecord};

    #[test]
    fn summary_counts() {
        let stock = vec![
            StockRecord {
                product_key: ProductKey::parse("B1"),
                description: String::new(),
                category: "Jersey".into(),
                available_quantity: Some(5),
            },
            StockRecord {
                product_key: ProductKey::parse("B3"),
                description: String::new(),
                category: "Other".into(),
                available_quantity: Some(30),
            },
        ];
        let listing = vec![
            WebListingRecord {
                product_key: ProductKey::parse("B1"),
                description: String::new(),
                category: String::new(),
                listing_status: ListingStatus::Active,
                region_flags: RegionFlags::new(),
            },
            WebListingRecord {
                product_key: ProductKey::parse("B9"),
                description: String::new(),
                category: String::new(),
                listing_status: ListingStatus::Archive,
                region_flags: RegionFlags::new(),
            },
        ];
        let joined = join(&stock, &listing, None);
        let agg = aggregate(&joined.records, &10u64, &DecisionTable::default());
        let coercions = CoercionStats {
            quantity: 2,
            ..CoercionStats::default()
        };
        let summary = compute_summary(&joined, &agg, coercions, 1);

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.in_stock, 2);
        assert_eq!(summary.on_webshop, 2);
        assert_eq!(summary.actionable, 2);
        assert_eq!(summary.no_action, 1);
        assert_eq!(summary.bucket_counts["remove_from_shop"], 1);
        assert_eq!(summary.bucket_counts["add_to_shop"], 1);
        assert_eq!(summary.coercions.total(), 2);
        assert_eq!(summary.skipped_rows, 1);
    }
}
