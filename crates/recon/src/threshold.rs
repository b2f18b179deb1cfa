use std::collections::{BTreeMap, BTreeSet};

use crate::model::RegionFlags;

/// Minimum stock per category.
pub trait ThresholdResolver {
    fn resolve(&self, category: &str) -> u64;

    /// The category threshold plus any per-region exceptions.
    fn resolve_with_regions(&self, category: &str) -> Threshold {
        Threshold::from(self.resolve(category))
    }
}

/// Resolved threshold for one category. Regions without an entry use
/// `value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Threshold {
    pub value: u64,
    /// Normalized region name → threshold.
    regions: BTreeMap<String, u64>,
}

impl From<u64> for Threshold {
    fn from(value: u64) -> Self {
        Self {
            value,
            regions: BTreeMap::new(),
        }
    }
}

impl Threshold {
    pub fn with_region(mut self, region: &str, threshold: u64) -> Self {
        self.regions.insert(normalize_category(region), threshold);
        self
    }

    pub fn for_region(&self, region: &str) -> u64 {
        self.regions
            .get(&normalize_category(region))
            .copied()
            .unwrap_or(self.value)
    }

    /// Enabled regions where `qty` is below that region's threshold, with
    /// the threshold that was missed.
    pub fn regions_below(&self, qty: u64, flags: &RegionFlags) -> BTreeMap<String, u64> {
        flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(region, _)| (region, self.for_region(region)))
            .filter(|(_, threshold)| qty < *threshold)
            .map(|(region, threshold)| (region.clone(), threshold))
            .collect()
    }
}

/// Trim, lower-case and collapse inner whitespace so that "Jersey",
/// " jersey " and "JERSEY" share one entry.
pub fn normalize_category(category: &str) -> String {
    category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Category thresholds in three tiers: explicit override, special-category
/// default, general default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdTable {
    general_default: u64,
    special_default: u64,
    special: BTreeSet<String>,
    overrides: BTreeMap<String, u64>,
    /// Normalized category → normalized region → threshold.
    regional: BTreeMap<String, BTreeMap<String, u64>>,
}

impl ThresholdTable {
    pub fn new(general_default: u64, special_default: u64) -> Self {
        Self {
            general_default,
            special_default,
            ..Self::default()
        }
    }

    pub fn with_special<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.special
            .extend(categories.into_iter().map(|c| normalize_category(c.as_ref())));
        self
    }

    pub fn with_override(mut self, category: &str, threshold: u64) -> Self {
        self.set_override(category, threshold);
        self
    }

    pub fn set_override(&mut self, category: &str, threshold: u64) {
        self.overrides.insert(normalize_category(category), threshold);
    }

    pub fn with_region_override(mut self, category: &str, region: &str, threshold: u64) -> Self {
        self.set_region_override(category, region, threshold);
        self
    }

    /// Threshold for `category` in one region only. Beats every other tier
    /// for that region.
    pub fn set_region_override(&mut self, category: &str, region: &str, threshold: u64) {
        self.regional
            .entry(normalize_category(category))
            .or_default()
            .insert(normalize_category(region), threshold);
    }
}

impl ThresholdResolver for ThresholdTable {
    fn resolve(&self, category: &str) -> u64 {
        let key = normalize_category(category);
        if let Some(&t) = self.overrides.get(&key) {
            t
        } else if self.special.contains(&key) {
            self.special_default
        } else {
            self.general_default
        }
    }

    fn resolve_with_regions(&self, category: &str) -> Threshold {
        let mut threshold = Threshold::from(self.resolve(category));
        if let Some(regions) = self.regional.get(&normalize_category(category)) {
            threshold.regions = regions.clone();
        }
        threshold
    }
}

/// A fixed threshold for every category.
impl ThresholdResolver for u64 {
    fn resolve(&self, _category: &str) -> u64 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ThresholdTable {
        ThresholdTable::new(10, 50)
            .with_special(["Jersey", "Brown Swiss"])
            .with_override("Holstein zwartbont", 25)
            .with_override("brown  swiss", 40)
    }

    #[test]
    fn general_default_when_in_no_tier() {
        assert_eq!(table().resolve("Unknown Breed"), 10);
        assert_eq!(table().resolve(""), 10);
    }

    #[test]
    fn special_default_for_special_categories() {
        assert_eq!(table().resolve("Jersey"), 50);
        assert_eq!(table().resolve("  JERSEY "), 50);
    }

    #[test]
    fn override_without_special() {
        assert_eq!(table().resolve("holstein ZWARTBONT"), 25);
    }

    #[test]
    fn override_beats_special_default() {
        // Present in both the special set and the overrides.
        assert_eq!(table().resolve("Brown Swiss"), 40);
    }

    #[test]
    fn region_override_only_touches_its_region() {
        let t = table().with_region_override("holstein  zwartbont", "nederland", 30);
        let resolved = t.resolve_with_regions("Holstein zwartbont");
        assert_eq!(resolved.value, 25);
        assert_eq!(resolved.for_region("Nederland"), 30);
        assert_eq!(resolved.for_region("Duitsland"), 25);
        // Other categories are untouched.
        assert_eq!(t.resolve_with_regions("Jersey"), Threshold::from(50));
    }

    #[test]
    fn regions_below_lists_enabled_regions_under_their_threshold() {
        let threshold = Threshold::from(10).with_region("Duitsland", 40);
        let mut flags = RegionFlags::new();
        flags.insert("Nederland".into(), true);
        flags.insert("Duitsland".into(), true);
        flags.insert("Frankrijk".into(), false);

        let below = threshold.regions_below(20, &flags);
        assert_eq!(below.into_iter().collect::<Vec<_>>(), vec![("Duitsland".to_string(), 40)]);

        let below = threshold.regions_below(5, &flags);
        assert_eq!(below.len(), 2);
        // Strict: at the threshold is not below it.
        assert!(threshold.regions_below(40, &flags).is_empty());
    }

    #[test]
    fn fixed_threshold_has_no_regions() {
        assert_eq!(7u64.resolve_with_regions("Jersey"), Threshold::from(7));
    }

    #[test]
    fn override_can_be_zero() {
        let t = table().with_override("Jersey", 0);
        assert_eq!(t.resolve("jersey"), 0);
    }
}
