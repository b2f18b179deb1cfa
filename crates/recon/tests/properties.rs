// Property-based tests for join, threshold and classification logic.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use proptest::prelude::*;
use shopsync_recon::aggregate::aggregate;
use shopsync_recon::classify::{Classifier, DecisionTable, Rule};
use shopsync_recon::join::join;
use shopsync_recon::model::{
    JoinedRecord, ListingStatus, Outcome, ProductKey, RegionFlags, StockRecord, VariantRecord,
    WebListingRecord,
};
use shopsync_recon::threshold::{Threshold, ThresholdResolver, ThresholdTable};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const CATEGORIES: [&str; 4] = ["Jersey", "Holstein", "Belgisch Witblauw", ""];

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"B[0-9]{1,3}",
        1 => r"B[0-9]{1,3}-[SM]",
    ]
}

fn arb_status() -> impl Strategy<Value = ListingStatus> {
    prop_oneof![
        Just(ListingStatus::Active),
        Just(ListingStatus::Archive),
        Just(ListingStatus::Concept),
        Just(ListingStatus::Unknown),
    ]
}

fn arb_category() -> impl Strategy<Value = String> {
    (0..CATEGORIES.len()).prop_map(|i| CATEGORIES[i].to_string())
}

fn arb_flags() -> impl Strategy<Value = RegionFlags> {
    (any::<bool>(), any::<bool>()).prop_map(|(nl, de)| {
        let mut flags = RegionFlags::new();
        flags.insert("Nederland".into(), nl);
        flags.insert("Duitsland".into(), de);
        flags
    })
}

fn arb_stock() -> impl Strategy<Value = StockRecord> {
    (arb_key(), arb_category(), proptest::option::of(0u64..200)).prop_map(
        |(key, category, qty)| StockRecord {
            product_key: ProductKey::parse(&key),
            description: String::new(),
            category,
            available_quantity: qty,
        },
    )
}

fn arb_listing() -> impl Strategy<Value = WebListingRecord> {
    (arb_key(), arb_category(), arb_status(), arb_flags()).prop_map(
        |(key, category, listing_status, region_flags)| WebListingRecord {
            product_key: ProductKey::parse(&key),
            description: String::new(),
            category,
            listing_status,
            region_flags,
        },
    )
}

fn arb_variant() -> impl Strategy<Value = VariantRecord> {
    (r"B[0-9]{1,3}-[SM]", arb_flags()).prop_map(|(key, region_flags)| VariantRecord {
        product_key: ProductKey::parse(&key),
        region_flags,
    })
}

fn arb_record() -> impl Strategy<Value = JoinedRecord> {
    (
        arb_key(),
        arb_category(),
        0u64..200,
        arb_status(),
        any::<bool>(),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(key, category, qty, status, in_stock, flag)| {
            let product_key = ProductKey::parse(&key);
            let variant_flag = if product_key.is_variant() { flag } else { None };
            JoinedRecord {
                variant_marker: product_key.marker(),
                product_key,
                description: String::new(),
                category,
                available_quantity: qty,
                listing_status: status,
                in_stock,
                on_webshop: status != ListingStatus::Unknown,
                region_flags: RegionFlags::new(),
                variant_flag,
            }
        })
}

fn table() -> ThresholdTable {
    ThresholdTable::new(10, 50)
        .with_special(["Jersey"])
        .with_override("Holstein", 25)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Every key from either side shows up exactly once after the join.
    #[test]
    fn join_is_full_outer_and_unique(
        stock in proptest::collection::vec(arb_stock(), 0..30),
        listing in proptest::collection::vec(arb_listing(), 0..30),
        variants in proptest::collection::vec(arb_variant(), 0..10),
    ) {
        let out = join(&stock, &listing, Some(variants.as_slice()));

        let expected: BTreeSet<String> = stock
            .iter()
            .map(|s| s.product_key.canonical().to_string())
            .chain(listing.iter().map(|l| l.product_key.canonical().to_string()))
            .collect();
        let seen: Vec<String> = out
            .records
            .iter()
            .map(|r| r.product_key.canonical().to_string())
            .collect();
        let unique: BTreeSet<String> = seen.iter().cloned().collect();

        prop_assert_eq!(seen.len(), unique.len());
        prop_assert_eq!(unique, expected);

        for r in &out.records {
            if r.variant_flag.is_some() {
                prop_assert!(r.product_key.is_variant());
            }
        }
    }

    /// The classifier always answers, and a quantity exactly at the
    /// threshold never moves a product.
    #[test]
    fn classification_is_total_and_threshold_is_exclusive(
        record in arb_record(),
        threshold in 0u64..200,
    ) {
        let table = DecisionTable::default();
        let resolved = Threshold::from(threshold);
        let _ = table.classify(&record, &resolved);

        let mut at = record.clone();
        at.available_quantity = threshold;
        let outcome = table.classify(&at, &resolved).outcome;
        prop_assert!(
            !matches!(
                outcome,
                Outcome::RemoveFromShop | Outcome::Reactivate | Outcome::AddToShop
            ),
            "quantity == threshold produced {}",
            outcome
        );
    }

    /// A region is only reported for switching off when its own threshold
    /// is strictly above the stock and the product is enabled there.
    #[test]
    fn region_removal_respects_each_region_threshold(
        qty in 0u64..100,
        base in 0u64..100,
        nl in 0u64..100,
        flags in arb_flags(),
    ) {
        let resolved = Threshold::from(base).with_region("Nederland", nl);
        let rules = DecisionTable::new(vec![Rule::RegionBelow]);
        let mut record = JoinedRecord {
            variant_marker: ProductKey::parse("B1").marker(),
            product_key: ProductKey::parse("B1"),
            description: String::new(),
            category: "Jersey".into(),
            available_quantity: qty,
            listing_status: ListingStatus::Active,
            in_stock: true,
            on_webshop: true,
            region_flags: flags.clone(),
            variant_flag: None,
        };

        let below = resolved.regions_below(qty, &flags);
        prop_assert_eq!(below.contains_key("Nederland"), flags["Nederland"] && qty < nl);
        prop_assert_eq!(below.contains_key("Duitsland"), flags["Duitsland"] && qty < base);

        let outcome = rules.classify(&record, &resolved).outcome;
        prop_assert_eq!(outcome == Outcome::RemoveFromShop, !below.is_empty());

        record.available_quantity = nl.max(base);
        prop_assert_eq!(rules.classify(&record, &resolved).outcome, Outcome::NoAction);
    }

    /// Running the aggregation twice on the same input yields the same
    /// buckets in the same order.
    #[test]
    fn aggregation_is_deterministic(
        records in proptest::collection::vec(arb_record(), 0..40),
    ) {
        let thresholds = table();
        let classifier = DecisionTable::default();
        let a = aggregate(&records, &thresholds, &classifier);
        let b = aggregate(&records, &thresholds, &classifier);

        prop_assert_eq!(a.no_action, b.no_action);
        prop_assert_eq!(a.actionable() + a.no_action, records.len());
        for (bucket, left) in &a.buckets {
            let right = &b.buckets[bucket];
            let lk: Vec<&str> = left.iter().map(|r| r.record.product_key.as_str()).collect();
            let rk: Vec<&str> = right.iter().map(|r| r.record.product_key.as_str()).collect();
            prop_assert_eq!(lk, rk);
            for r in left {
                prop_assert_eq!(r.classification.bucket(), Some(*bucket));
            }
        }
    }

    /// Override beats special default beats general default, whatever the
    /// spelling of the category.
    #[test]
    fn threshold_precedence(
        category in r"[A-Za-z]{1,12}",
        general in 0u64..100,
        special in 0u64..100,
        overridden in 0u64..100,
        upper in any::<bool>(),
    ) {
        let lookup = if upper { category.to_uppercase() } else { format!("  {category} ") };

        let plain = ThresholdTable::new(general, special);
        prop_assert_eq!(plain.resolve(&lookup), general);

        let with_special = ThresholdTable::new(general, special).with_special([category.as_str()]);
        prop_assert_eq!(with_special.resolve(&lookup), special);

        let with_override = ThresholdTable::new(general, special)
            .with_special([category.as_str()])
            .with_override(&category, overridden);
        prop_assert_eq!(with_override.resolve(&lookup), overridden);
    }
}
