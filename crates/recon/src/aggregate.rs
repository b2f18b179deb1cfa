use std::collections::BTreeMap;

use crate::classify::Classifier;
use crate::model::{Aggregation, Bucket, ClassifiedRecord, JoinedRecord, RulePath};
use crate::threshold::{normalize_category, Threshold, ThresholdResolver};

/// Case-insensitive (category, product key) ordering with the exact strings
/// as tie-breakers, so the order is total and reproducible.
fn sort_key(rec: &ClassifiedRecord) -> (String, String, &str, &str) {
    (
        rec.record.category.to_lowercase(),
        rec.record.product_key.as_str().to_lowercase(),
        rec.record.category.as_str(),
        rec.record.product_key.as_str(),
    )
}

/// Classify every record and group the results by bucket.
///
/// Thresholds are resolved once per distinct category. No-action records
/// are counted but not kept; empty buckets are omitted.
pub fn aggregate<R, C>(records: &[JoinedRecord], resolver: &R, classifier: &C) -> Aggregation
where
    R: ThresholdResolver + ?Sized,
    C: Classifier + ?Sized,
{
    let mut thresholds: BTreeMap<String, Threshold> = BTreeMap::new();
    let mut buckets: BTreeMap<Bucket, Vec<ClassifiedRecord>> = BTreeMap::new();
    let mut no_action = 0;

    for record in records {
        let threshold = thresholds
            .entry(normalize_category(&record.category))
            .or_insert_with(|| resolver.resolve_with_regions(&record.category));
        let classification = classifier.classify(record, threshold);

        match classification.bucket() {
            Some(bucket) => {
                let regions_off = if classification.path == RulePath::Region {
                    threshold.regions_below(record.available_quantity, &record.region_flags)
                } else {
                    BTreeMap::new()
                };
                buckets.entry(bucket).or_default().push(ClassifiedRecord {
                    record: record.clone(),
                    threshold: threshold.value,
                    classification,
                    regions_off,
                });
            }
            None => no_action += 1,
        }
    }

    for list in buckets.values_mut() {
        list.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    }

    Aggregation { buckets, no_action }
}
