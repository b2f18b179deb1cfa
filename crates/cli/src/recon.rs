//! `shopsync run` / `shopsync validate`: config-driven classification passes.

use std::path::{Path, PathBuf};

use shopsync_io::{export_buckets, read_table};
use shopsync_recon::config::{ExportFormat, SourceConfig};
use shopsync_recon::model::{Bucket, RawTable, RunInput, RunReport};
use shopsync_recon::normalize::{resolve_columns, SourceKind};
use shopsync_recon::RunConfig;

use crate::exit_codes::{EXIT_ACTIONS, EXIT_CONFIG, EXIT_OUTPUT};
use crate::CliError;

/// Where a finished report goes.
pub struct Outputs {
    pub json_stdout: bool,
    pub json_file: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub format: ExportFormat,
    pub fail_on_action: bool,
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    fail_on_action: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = base_dir(&config_path);
    let input = load_input(&config, base_dir)?;
    let report = shopsync_recon::run(&config, &input)?;

    let outputs = Outputs {
        json_stdout: json_output,
        json_file: output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p))),
        export_dir: config.output.dir.as_ref().map(|d| base_dir.join(d)),
        format: config.output.format,
        fail_on_action,
    };
    emit(&report, &outputs)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base_dir = base_dir(&config_path);

    for (kind, source) in sources(&config) {
        let table = read_source(kind, source, base_dir)?;
        let aliases = config.alias_table(kind)?;
        let columns = resolve_columns(&table, &aliases).map_err(shopsync_recon::ReconError::from)?;

        let mut mapped: Vec<String> = columns
            .fields
            .iter()
            .map(|(field, idx)| format!("{field}={}", table.headers[*idx].trim()))
            .collect();
        mapped.extend(
            columns
                .regions
                .iter()
                .map(|(region, idx)| format!("region:{region}={}", table.headers[*idx].trim())),
        );
        eprintln!(
            "{kind}: {} ({} row(s)) {}",
            source.file,
            table.rows.len(),
            mapped.join(", ")
        );
    }

    eprintln!("ok: {}", config.name);
    Ok(())
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

pub fn load_config(config_path: &Path) -> Result<RunConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(
            EXIT_CONFIG,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    Ok(RunConfig::from_toml(&config_str)?)
}

fn sources(config: &RunConfig) -> Vec<(SourceKind, &SourceConfig)> {
    let mut out = vec![
        (SourceKind::Stock, &config.sources.stock),
        (SourceKind::Listing, &config.sources.listing),
    ];
    if let Some(ref variant) = config.sources.variant {
        out.push((SourceKind::Variant, variant));
    }
    out
}

fn read_source(kind: SourceKind, source: &SourceConfig, base_dir: &Path) -> Result<RawTable, CliError> {
    let path = base_dir.join(&source.file);
    Ok(read_table(&path, &kind.to_string(), source.sheet.as_deref())?)
}

/// Read every configured report.
pub fn load_input(config: &RunConfig, base_dir: &Path) -> Result<RunInput, CliError> {
    let stock = read_source(SourceKind::Stock, &config.sources.stock, base_dir)?;
    let listing = read_source(SourceKind::Listing, &config.sources.listing, base_dir)?;
    let variants = match &config.sources.variant {
        Some(source) => Some(read_source(SourceKind::Variant, source, base_dir)?),
        None => None,
    };
    Ok(RunInput {
        stock,
        listing,
        variants,
    })
}

/// Write JSON and exports, print the human summary, and apply
/// `--fail-on-action`.
pub fn emit(report: &RunReport, outputs: &Outputs) -> Result<(), CliError> {
    let json_str = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = outputs.json_file {
        std::fs::write(path, &json_str).map_err(|e| {
            CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display()))
        })?;
        eprintln!("wrote {}", path.display());
    }

    if outputs.json_stdout {
        println!("{json_str}");
    }

    if let Some(ref dir) = outputs.export_dir {
        for path in export_buckets(&report.buckets, dir, outputs.format)? {
            eprintln!("wrote {}", path.display());
        }
    }

    print_summary(report);

    let actionable = report.summary.actionable;
    if outputs.fail_on_action && actionable > 0 {
        return Err(CliError::new(
            EXIT_ACTIONS,
            format!("{actionable} product(s) need action"),
        ));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(report: &RunReport) {
    let s = &report.summary;
    eprintln!(
        "{}: {} product(s), {} in stock, {} on webshop",
        report.meta.config_name, s.total_records, s.in_stock, s.on_webshop
    );
    for bucket in Bucket::ALL {
        let count = report.buckets.get(&bucket).map_or(0, Vec::len);
        if count > 0 {
            eprintln!("  {:<20} {:>5}", bucket.title(), count);
        }
    }
    eprintln!("  {:<20} {:>5}", "No action", s.no_action);

    if s.coercions.total() > 0 || s.skipped_rows > 0 || s.unmatched_variants > 0 {
        eprintln!(
            "warnings: {} unreadable value(s), {} row(s) without product key, {} unmatched variant(s)",
            s.coercions.total(),
            s.skipped_rows,
            s.unmatched_variants
        );
    }
}
