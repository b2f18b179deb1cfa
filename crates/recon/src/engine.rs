use log::info;

use crate::aggregate::aggregate;
use crate::config::RunConfig;
use crate::error::ReconError;
use crate::join::join_with;
use crate::model::{CoercionStats, RunInput, RunMeta, RunReport};
use crate::normalize::{
    normalize_listing, normalize_stock, normalize_variants, Normalized, SourceKind,
};
use crate::summary::compute_summary;

/// Run one classification pass per config. Schema errors stop the pass
/// before the join.
pub fn run(config: &RunConfig, input: &RunInput) -> Result<RunReport, ReconError> {
    let stock_aliases = config.alias_table(SourceKind::Stock)?;
    let listing_aliases = config.alias_table(SourceKind::Listing)?;
    let variant_aliases = config.alias_table(SourceKind::Variant)?;

    let stock = normalize_stock(&input.stock, &stock_aliases)?;
    let listing = normalize_listing(&input.listing, &listing_aliases)?;
    let variants = match &input.variants {
        Some(table) => Some(normalize_variants(table, &variant_aliases)?),
        None => None,
    };

    let mut coercions = CoercionStats::default();
    let mut skipped_rows = 0;
    tally(&stock, &mut coercions, &mut skipped_rows);
    tally(&listing, &mut coercions, &mut skipped_rows);
    if let Some(ref v) = variants {
        tally(v, &mut coercions, &mut skipped_rows);
    }

    let joined = join_with(
        &stock.records,
        &listing.records,
        variants.as_ref().map(|v| v.records.as_slice()),
        &config.classifier.variant_region(),
    );

    let thresholds = config.thresholds.to_table();
    let aggregation = aggregate(&joined.records, &thresholds, &config.classifier.decision_table());
    let summary = compute_summary(&joined, &aggregation, coercions, skipped_rows);

    info!(
        "{}: {} record(s), {} actionable, {} no action",
        config.name, summary.total_records, summary.actionable, summary.no_action
    );

    Ok(RunReport {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        buckets: aggregation.buckets,
    })
}

fn tally<T>(normalized: &Normalized<T>, coercions: &mut CoercionStats, skipped: &mut usize) {
    coercions.add(&normalized.coercions);
    *skipped += normalized.skipped_rows;
}
