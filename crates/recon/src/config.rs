use std::collections::{BTreeMap, HashSet};

use log::warn;
use serde::Deserialize;

use crate::classify::{DecisionTable, Rule, DEFAULT_RULES};
use crate::error::ReconError;
use crate::join::VariantRegion;
use crate::normalize::{AliasTable, Field, SourceKind, DEFAULT_REGIONS};
use crate::threshold::ThresholdTable;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub name: String,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

pub const DEFAULT_THRESHOLD: u64 = 10;
pub const DEFAULT_SPECIAL_THRESHOLD: u64 = 50;

fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD
}

fn default_special_threshold() -> u64 {
    DEFAULT_SPECIAL_THRESHOLD
}

/// Unsigned fields, so negative thresholds are rejected while parsing.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_threshold")]
    pub default: u64,
    #[serde(default = "default_special_threshold")]
    pub special_default: u64,
    /// Categories that get `special_default` instead of `default`.
    #[serde(default)]
    pub special: Vec<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, u64>,
    /// Category → webshop region → threshold, used by the `region_below`
    /// rule. Regions not listed fall back to the category threshold.
    #[serde(default)]
    pub regions: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_THRESHOLD,
            special_default: DEFAULT_SPECIAL_THRESHOLD,
            special: Vec::new(),
            overrides: BTreeMap::new(),
            regions: BTreeMap::new(),
        }
    }
}

impl ThresholdConfig {
    pub fn to_table(&self) -> ThresholdTable {
        let mut table =
            ThresholdTable::new(self.default, self.special_default).with_special(&self.special);
        for (category, threshold) in &self.overrides {
            table.set_override(category, *threshold);
        }
        for (category, regions) in &self.regions {
            for (region, threshold) in regions {
                table.set_region_override(category, region, *threshold);
            }
        }
        table
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

fn default_rules() -> Vec<Rule> {
    DEFAULT_RULES.to_vec()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,
    /// Variant-table region that decides variant availability. Any region
    /// when unset.
    #[serde(default)]
    pub variant_region: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            variant_region: None,
        }
    }
}

impl ClassifierConfig {
    pub fn decision_table(&self) -> DecisionTable {
        DecisionTable::new(self.rules.clone())
    }

    pub fn variant_region(&self) -> VariantRegion {
        match &self.variant_region {
            Some(region) => VariantRegion::Named(region.clone()),
            None => VariantRegion::Any,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub stock: SourceConfig,
    pub listing: SourceConfig,
    #[serde(default)]
    pub variant: Option<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Path relative to the config file.
    pub file: String,
    /// Worksheet name for workbooks; first sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Canonical field name → accepted headers, replacing the built-in list.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Region columns to read; built-in regions when unset.
    #[serde(default)]
    pub regions: Option<Vec<String>>,
}

impl SourceConfig {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sheet: None,
            aliases: BTreeMap::new(),
            regions: None,
        }
    }

    /// Built-in aliases for `kind` with this source's overrides applied.
    pub fn alias_table(&self, kind: SourceKind) -> Result<AliasTable, ReconError> {
        let mut table = AliasTable::builtin(kind);
        for (name, aliases) in &self.aliases {
            let field: Field = name
                .parse()
                .map_err(|e| ReconError::ConfigValidation(format!("{kind} source: {e}")))?;
            if !kind.known_fields().contains(&field) {
                return Err(ReconError::ConfigValidation(format!(
                    "{kind} source: field '{field}' does not apply to this source"
                )));
            }
            table = table.with_field_aliases(field, aliases.clone());
        }
        if let Some(regions) = &self.regions {
            table = table.with_regions(regions);
        }
        Ok(table)
    }

    fn validate(&self, kind: SourceKind) -> Result<(), ReconError> {
        if self.file.trim().is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "{kind} source: file must not be empty"
            )));
        }
        for (name, aliases) in &self.aliases {
            if aliases.iter().all(|a| a.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "{kind} source: alias list for '{name}' is empty"
                )));
            }
        }
        if let Some(regions) = &self.regions {
            if kind == SourceKind::Stock {
                return Err(ReconError::ConfigValidation(
                    "stock source: regions are not read from the stock report".into(),
                ));
            }
            if regions.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "{kind} source: regions must not be empty when given"
                )));
            }
        }
        self.alias_table(kind).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// One workbook, one sheet per bucket.
    #[default]
    Xlsx,
    /// One CSV file per bucket.
    Csv,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Directory for bucket exports; nothing is exported when unset.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Alias table for one source. The variant source also requires the
    /// column of the configured variant region.
    pub fn alias_table(&self, kind: SourceKind) -> Result<AliasTable, ReconError> {
        let source = match kind {
            SourceKind::Stock => Some(&self.sources.stock),
            SourceKind::Listing => Some(&self.sources.listing),
            SourceKind::Variant => self.sources.variant.as_ref(),
        };
        let table = match source {
            Some(source) => source.alias_table(kind)?,
            None => AliasTable::builtin(kind),
        };
        Ok(match (kind, &self.classifier.variant_region) {
            (SourceKind::Variant, Some(region)) => table.require_region(region),
            _ => table,
        })
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.sources.stock.validate(SourceKind::Stock)?;
        self.sources.listing.validate(SourceKind::Listing)?;
        if let Some(ref variant) = self.sources.variant {
            variant.validate(SourceKind::Variant)?;
        }

        if self.classifier.rules.is_empty() {
            return Err(ReconError::ConfigValidation(
                "classifier.rules must list at least one rule".into(),
            ));
        }
        let mut seen = HashSet::new();
        for rule in &self.classifier.rules {
            if !seen.insert(rule) {
                return Err(ReconError::ConfigValidation(format!(
                    "classifier.rules: '{rule}' listed twice"
                )));
            }
        }

        if let Some(ref region) = self.classifier.variant_region {
            let Some(ref variant) = self.sources.variant else {
                return Err(ReconError::ConfigValidation(
                    "classifier.variant_region is set but there is no [sources.variant]".into(),
                ));
            };
            let known: Vec<&str> = match &variant.regions {
                Some(regions) => regions.iter().map(String::as_str).collect(),
                None => DEFAULT_REGIONS.to_vec(),
            };
            if !known.iter().any(|r| r.eq_ignore_ascii_case(region)) {
                return Err(ReconError::ConfigValidation(format!(
                    "classifier.variant_region '{region}' is not a variant region (known: {})",
                    known.join(", ")
                )));
            }
        }

        for category in self.thresholds.overrides.keys() {
            if category.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "thresholds.overrides: category name must not be empty".into(),
                ));
            }
        }

        self.validate_region_thresholds()
    }

    fn validate_region_thresholds(&self) -> Result<(), ReconError> {
        if self.thresholds.regions.is_empty() {
            return Ok(());
        }
        let known: Vec<&str> = match &self.sources.listing.regions {
            Some(regions) => regions.iter().map(String::as_str).collect(),
            None => DEFAULT_REGIONS.to_vec(),
        };
        for (category, regions) in &self.thresholds.regions {
            if category.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "thresholds.regions: category name must not be empty".into(),
                ));
            }
            for region in regions.keys() {
                if !known.iter().any(|r| r.eq_ignore_ascii_case(region.trim())) {
                    return Err(ReconError::ConfigValidation(format!(
                        "thresholds.regions.{category}: '{region}' is not a webshop region (known: {})",
                        known.join(", ")
                    )));
                }
            }
        }
        if !self.classifier.rules.contains(&Rule::RegionBelow) {
            warn!("thresholds.regions is set but 'region_below' is not in classifier.rules");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::ThresholdResolver;

    const MINIMAL: &str = r#"
name = "Weekly check"

[sources.stock]
file = "voorraad.csv"

[sources.listing]
file = "website.csv"
"#;

    #[test]
    fn parse_minimal_uses_defaults() {
        let config = RunConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "Weekly check");
        assert_eq!(config.thresholds.default, 10);
        assert_eq!(config.thresholds.special_default, 50);
        assert_eq!(config.classifier.rules, DEFAULT_RULES.to_vec());
        assert_eq!(config.classifier.variant_region(), VariantRegion::Any);
        assert!(config.sources.variant.is_none());
        assert_eq!(config.output.format, ExportFormat::Xlsx);
    }

    #[test]
    fn parse_full() {
        let input = r#"
name = "Full"

[thresholds]
default = 12
special_default = 40
special = ["Jersey"]

[thresholds.overrides]
"Holstein zwartbont" = 25

[classifier]
rules = ["variant_region", "unlisted", "active_below"]
variant_region = "Nederland"

[sources.stock]
file = "voorraad.xlsx"
sheet = "Voorraad"

[sources.stock.aliases]
product_key = ["Code"]

[sources.listing]
file = "website.xlsx"
regions = ["Nederland", "Duitsland"]

[sources.variant]
file = "artikeltabel.xlsx"

[output]
dir = "out"
format = "csv"
json = "result.json"
"#;
        let config = RunConfig::from_toml(input).unwrap();
        let table = config.thresholds.to_table();
        assert_eq!(table.resolve("jersey"), 40);
        assert_eq!(table.resolve("Holstein Zwartbont"), 25);
        assert_eq!(table.resolve("Other"), 12);
        assert_eq!(config.classifier.rules.len(), 3);
        assert_eq!(
            config.classifier.variant_region(),
            VariantRegion::Named("Nederland".into())
        );
        assert_eq!(config.sources.stock.sheet.as_deref(), Some("Voorraad"));
        let aliases = config.sources.stock.alias_table(SourceKind::Stock).unwrap();
        assert_eq!(aliases.fields[&Field::ProductKey], vec!["Code".to_string()]);
        let listing = config.sources.listing.alias_table(SourceKind::Listing).unwrap();
        assert_eq!(listing.regions.len(), 2);
        assert_eq!(config.output.format, ExportFormat::Csv);
        assert_eq!(config.output.json.as_deref(), Some("result.json"));
    }

    #[test]
    fn reject_negative_threshold() {
        let input = format!("{MINIMAL}\n[thresholds]\ndefault = -1\n");
        let err = RunConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)), "{err}");
    }

    #[test]
    fn reject_duplicate_rule() {
        let input = format!("{MINIMAL}\n[classifier]\nrules = [\"concept\", \"concept\"]\n");
        let err = RunConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn reject_unknown_rule() {
        let input = format!("{MINIMAL}\n[classifier]\nrules = [\"sometimes\"]\n");
        assert!(RunConfig::from_toml(&input).is_err());
    }

    #[test]
    fn reject_empty_rules() {
        let input = format!("{MINIMAL}\n[classifier]\nrules = []\n");
        let err = RunConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("at least one rule"));
    }

    #[test]
    fn reject_variant_region_without_variant_source() {
        let input = format!("{MINIMAL}\n[classifier]\nvariant_region = \"Nederland\"\n");
        let err = RunConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("[sources.variant]"));
    }

    #[test]
    fn reject_unknown_variant_region() {
        let input = format!(
            "{MINIMAL}\n[classifier]\nvariant_region = \"Spanje\"\n\n[sources.variant]\nfile = \"v.csv\"\n"
        );
        let err = RunConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("Spanje"));
    }

    #[test]
    fn parse_region_thresholds() {
        let input = format!(
            r#"{MINIMAL}
[classifier]
rules = ["region_below", "active_below"]

[thresholds.regions."Holstein zwartbont"]
Nederland = 25
"België (FR)" = 40
"#
        );
        let config = RunConfig::from_toml(&input).unwrap();
        assert_eq!(config.classifier.rules[0], Rule::RegionBelow);
        let resolved = config.thresholds.to_table().resolve_with_regions("holstein zwartbont");
        assert_eq!(resolved.value, 10);
        assert_eq!(resolved.for_region("Nederland"), 25);
        assert_eq!(resolved.for_region("België (FR)"), 40);
        assert_eq!(resolved.for_region("Duitsland"), 10);
    }

    #[test]
    fn reject_unknown_threshold_region() {
        let input = format!("{MINIMAL}\n[thresholds.regions.Jersey]\nSpanje = 5\n");
        let err = RunConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("Spanje"), "{err}");
    }

    #[test]
    fn reject_alias_for_unknown_field() {
        let input = r#"
name = "Bad"
[sources.stock]
file = "s.csv"
[sources.stock.aliases]
listing_status = ["Status"]
[sources.listing]
file = "l.csv"
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("does not apply"));
    }

    #[test]
    fn reject_empty_file() {
        let input = r#"
name = "Bad"
[sources.stock]
file = ""
[sources.listing]
file = "l.csv"
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("stock source"));
    }
}
