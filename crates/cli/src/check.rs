//! `shopsync check`: a one-off pass with everything given on the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

use shopsync_recon::config::{
    ClassifierConfig, ExportFormat, OutputConfig, SourceConfig, SourcesConfig, ThresholdConfig,
    DEFAULT_SPECIAL_THRESHOLD, DEFAULT_THRESHOLD,
};
use shopsync_recon::RunConfig;

use crate::exit_codes::EXIT_USAGE;
use crate::recon::{emit, load_input, Outputs};
use crate::CliError;

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Xlsx,
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Xlsx => ExportFormat::Xlsx,
            FormatArg::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Args)]
pub struct CheckArgs {
    /// Stock report (xlsx, xls, ods, csv, tsv)
    #[arg(long)]
    stock: PathBuf,

    /// Webshop product report
    #[arg(long)]
    listing: PathBuf,

    /// Variant/article table with per-region flags
    #[arg(long)]
    variants: Option<PathBuf>,

    /// Worksheet in the stock workbook
    #[arg(long)]
    sheet_stock: Option<String>,

    /// Worksheet in the webshop workbook
    #[arg(long)]
    sheet_listing: Option<String>,

    /// Worksheet in the variant workbook
    #[arg(long)]
    sheet_variants: Option<String>,

    /// Threshold for categories without a special entry or override
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    default: u64,

    /// Threshold for categories listed with --special
    #[arg(long, default_value_t = DEFAULT_SPECIAL_THRESHOLD)]
    special_default: u64,

    /// Category that uses the special default (repeatable)
    #[arg(long)]
    special: Vec<String>,

    /// Per-category threshold as CATEGORY=N (repeatable)
    #[arg(long, value_name = "CATEGORY=N")]
    threshold: Vec<String>,

    /// Variant-table region that decides variant availability
    #[arg(long)]
    variant_region: Option<String>,

    /// Write one export per non-empty bucket into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Export format
    #[arg(long, value_enum, default_value = "xlsx")]
    format: FormatArg,

    /// Print the JSON report to stdout
    #[arg(long)]
    json: bool,

    /// Write the JSON report to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Exit 1 when any product needs action
    #[arg(long)]
    fail_on_action: bool,
}

/// Parse `CATEGORY=N`; the category may itself contain '='.
fn parse_threshold(arg: &str) -> Result<(String, u64), CliError> {
    let usage = || {
        CliError::new(EXIT_USAGE, format!("invalid --threshold '{arg}'"))
            .with_hint("syntax: --threshold 'Holstein zwartbont=25'")
    };
    let (category, value) = arg.rsplit_once('=').ok_or_else(usage)?;
    let category = category.trim();
    if category.is_empty() {
        return Err(usage());
    }
    let value: u64 = value.trim().parse().map_err(|_| usage())?;
    Ok((category.to_string(), value))
}

fn source(path: &Path, sheet: Option<String>) -> Result<SourceConfig, CliError> {
    let file = path.to_str().ok_or_else(|| {
        CliError::new(
            EXIT_USAGE,
            format!("path is not valid UTF-8: {}", path.display()),
        )
    })?;
    Ok(SourceConfig {
        sheet,
        ..SourceConfig::new(file)
    })
}

fn build_config(args: &CheckArgs) -> Result<RunConfig, CliError> {
    let mut overrides = BTreeMap::new();
    for arg in &args.threshold {
        let (category, value) = parse_threshold(arg)?;
        overrides.insert(category, value);
    }

    let config = RunConfig {
        name: "check".into(),
        thresholds: ThresholdConfig {
            default: args.default,
            special_default: args.special_default,
            special: args.special.clone(),
            overrides,
            regions: BTreeMap::new(),
        },
        classifier: ClassifierConfig {
            variant_region: args.variant_region.clone(),
            ..ClassifierConfig::default()
        },
        sources: SourcesConfig {
            stock: source(&args.stock, args.sheet_stock.clone())?,
            listing: source(&args.listing, args.sheet_listing.clone())?,
            variant: args
                .variants
                .as_deref()
                .map(|p| source(p, args.sheet_variants.clone()))
                .transpose()?,
        },
        output: OutputConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

pub fn cmd_check(args: CheckArgs) -> Result<(), CliError> {
    let config = build_config(&args)?;
    // Paths are used as given, relative to the working directory
    let input = load_input(&config, Path::new(""))?;
    let report = shopsync_recon::run(&config, &input)?;

    let outputs = Outputs {
        json_stdout: args.json,
        json_file: args.output,
        export_dir: args.out_dir,
        format: args.format.into(),
        fail_on_action: args.fail_on_action,
    };
    emit(&report, &outputs)
}
