//! The metric schema: a fixed, ordered list of per-contributor metrics.
//!
//! ## Layout
//!
//! | Block            | Entries | Denominator for averages |
//! |------------------|---------|--------------------------|
//! | Issue raw counts | 13      | -                        |
//! | Issue averages   | 9       | `num_issues`             |
//! | Commit raw counts| 13      | -                        |
//! | Commit averages  | 10      | `num_commits`            |
//!
//! Declaration order is vector position. The [`Translation`] persisted next
//! to the datasets is exactly this order, so vectors built for different
//! repositories line up position by position.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::FeatureVector;

macro_rules! metric_schema {
    ($($variant:ident => $name:literal,)*) => {
        /// One entry of the metric schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Metric {
            $($variant,)*
        }

        impl Metric {
            /// Every metric in schema order.
            pub const ALL: &'static [Metric] = &[$(Metric::$variant,)*];

            /// Persisted name of this metric.
            pub fn name(self) -> &'static str {
                match self {
                    $(Metric::$variant => $name,)*
                }
            }
        }

        impl FromStr for Metric {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Metric::$variant),)*
                    other => Err(format!("unknown metric: {other}")),
                }
            }
        }
    };
}

metric_schema! {
    // Issues: raw counts
    NumIssues => "num_issues",
    Open => "open",
    Closed => "closed",
    NumComments => "num_comments",
    NumLabels => "num_labels",
    Wordcount => "wordcount",
    TitleWordcount => "title_wordcount",
    BodyVocab => "body_vocab",
    BodyVocabFilescope => "body_vocab_filescope",
    TitleVocab => "title_vocab",
    TitleVocabFilescope => "title_vocab_filescope",
    TotalVocab => "total_vocab",
    TotalVocabFilescope => "total_vocab_filescope",
    // Issues: averages
    AvgOpen => "avg_open",
    AvgClosed => "avg_closed",
    AvgNumComments => "avg_num_comments",
    AvgNumLabels => "avg_num_labels",
    AvgWordcount => "avg_wordcount",
    AvgTitleWordcount => "avg_title_wordcount",
    AvgBodyVocab => "avg_body_vocab",
    AvgTitleVocab => "avg_title_vocab",
    AvgTotalVocab => "avg_total_vocab",
    // Commits: raw counts
    NumCommits => "num_commits",
    LocAdditions => "loc_additions",
    LocDeletions => "loc_deletions",
    LocChanges => "loc_changes",
    NumFiles => "num_files",
    LocTimesFiles => "loc_times_files",
    LocPowFiles => "loc_pow_files",
    MsgWordcount => "msg_wordcount",
    MsgVocab => "msg_vocab",
    MsgVocabFilescope => "msg_vocab_filescope",
    PatchWordcount => "patch_wordcount",
    PatchVocab => "patch_vocab",
    PatchVocabFilescope => "patch_vocab_filescope",
    // Commits: averages
    AvgLocAdditions => "avg_loc_additions",
    AvgLocDeletions => "avg_loc_deletions",
    AvgLocChanges => "avg_loc_changes",
    AvgNumFiles => "avg_num_files",
    AvgLocTimesFiles => "avg_loc_times_files",
    AvgLocPowFiles => "avg_loc_pow_files",
    AvgMsgWordcount => "avg_msg_wordcount",
    AvgMsgVocab => "avg_msg_vocab",
    AvgPatchWordcount => "avg_patch_wordcount",
    AvgPatchVocab => "avg_patch_vocab",
}

pub const METRIC_COUNT: usize = Metric::ALL.len();

/// Issue averages as (average, numerator), all divided by `num_issues`.
///
/// Vocabulary averages use the item-scope sums: they measure how varied a
/// single issue is, not how large the contributor's overall vocabulary is.
pub const ISSUE_AVERAGES: &[(Metric, Metric)] = &[
    (Metric::AvgOpen, Metric::Open),
    (Metric::AvgClosed, Metric::Closed),
    (Metric::AvgNumComments, Metric::NumComments),
    (Metric::AvgNumLabels, Metric::NumLabels),
    (Metric::AvgWordcount, Metric::Wordcount),
    (Metric::AvgTitleWordcount, Metric::TitleWordcount),
    (Metric::AvgBodyVocab, Metric::BodyVocabFilescope),
    (Metric::AvgTitleVocab, Metric::TitleVocabFilescope),
    (Metric::AvgTotalVocab, Metric::TotalVocabFilescope),
];

/// Commit averages as (average, numerator), all divided by `num_commits`.
pub const COMMIT_AVERAGES: &[(Metric, Metric)] = &[
    (Metric::AvgLocAdditions, Metric::LocAdditions),
    (Metric::AvgLocDeletions, Metric::LocDeletions),
    (Metric::AvgLocChanges, Metric::LocChanges),
    (Metric::AvgNumFiles, Metric::NumFiles),
    (Metric::AvgLocTimesFiles, Metric::LocTimesFiles),
    (Metric::AvgLocPowFiles, Metric::LocPowFiles),
    (Metric::AvgMsgWordcount, Metric::MsgWordcount),
    (Metric::AvgMsgVocab, Metric::MsgVocabFilescope),
    (Metric::AvgPatchWordcount, Metric::PatchWordcount),
    (Metric::AvgPatchVocab, Metric::PatchVocabFilescope),
];

impl Metric {
    /// Position in the canonical schema.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_average(self) -> bool {
        self.name().starts_with("avg_")
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One number per schema metric.
///
/// Used both for a contributor's aggregated activity and for learned
/// weights. Every metric always has a value, so a persisted map carries
/// exactly the schema's key set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricMap {
    values: [f64; METRIC_COUNT],
}

/// Aggregated activity of one login in one repository.
pub type ContributorMetrics = MetricMap;

/// Learned per-metric weights.
pub type WeightMap = MetricMap;

impl Default for MetricMap {
    fn default() -> Self {
        Self {
            values: [0.0; METRIC_COUNT],
        }
    }
}

impl MetricMap {
    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.values[metric.index()] = value;
    }

    /// Accumulate into `metric`, pinning the total to `±f64::MAX`.
    ///
    /// Stored values must stay finite: JSON has no representation for
    /// infinity.
    pub fn add(&mut self, metric: Metric, amount: f64) {
        let slot = &mut self.values[metric.index()];
        *slot = saturate(*slot + amount);
    }

    /// First metric holding a non-finite value, if any.
    pub fn first_non_finite(&self) -> Option<(Metric, f64)> {
        self.iter().find(|(_, v)| !v.is_finite())
    }

    /// (metric, value) pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.iter().map(move |&m| (m, self.get(m)))
    }

    /// Build from a name-keyed map; requires exactly the schema's key set.
    pub fn from_named(named: &HashMap<String, f64>) -> Result<Self, String> {
        let mut map = Self::default();
        let mut seen = [false; METRIC_COUNT];
        for (name, &value) in named {
            let metric: Metric = name.parse()?;
            map.set(metric, value);
            seen[metric.index()] = true;
        }
        let missing: Vec<&str> = Metric::ALL
            .iter()
            .filter(|m| !seen[m.index()])
            .map(|m| m.name())
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing metrics: {}", missing.join(", ")));
        }
        Ok(map)
    }
}

/// Clamp overflowed values back into the finite range; NaN becomes 0.
pub fn saturate(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else if v.is_nan() {
        0.0
    } else {
        v.signum() * f64::MAX
    }
}

impl Index<Metric> for MetricMap {
    type Output = f64;

    fn index(&self, metric: Metric) -> &f64 {
        &self.values[metric.index()]
    }
}

impl IndexMut<Metric> for MetricMap {
    fn index_mut(&mut self, metric: Metric) -> &mut f64 {
        &mut self.values[metric.index()]
    }
}

impl Serialize for MetricMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(METRIC_COUNT))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.name(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let named = HashMap::<String, f64>::deserialize(deserializer)?;
        MetricMap::from_named(&named).map_err(serde::de::Error::custom)
    }
}

/// Stable metric-name ↔ vector-position mapping shared by all repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// `order[position]` is the metric stored at that position.
    order: Vec<Metric>,
}

impl Translation {
    /// The schema's own declaration order.
    pub fn canonical() -> Self {
        Self {
            order: Metric::ALL.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Lay a contributor's metrics out as a feature vector.
    pub fn vectorize(&self, metrics: &ContributorMetrics) -> FeatureVector {
        self.order.iter().map(|&m| metrics.get(m)).collect()
    }

    /// Map positional coefficients back onto metric names.
    pub fn weights_from(&self, coefficients: &[f64]) -> Result<WeightMap, String> {
        if coefficients.len() != self.order.len() {
            return Err(format!(
                "expected {} coefficients, got {}",
                self.order.len(),
                coefficients.len()
            ));
        }
        let mut weights = WeightMap::default();
        for (&metric, &c) in self.order.iter().zip(coefficients) {
            weights.set(metric, c);
        }
        Ok(weights)
    }

    /// Rebuild from a persisted name → position map.
    ///
    /// Positions must be a permutation of `0..METRIC_COUNT` and the names
    /// exactly the schema's.
    pub fn from_positions(positions: &HashMap<String, usize>) -> Result<Self, String> {
        let mut slots: Vec<Option<Metric>> = vec![None; METRIC_COUNT];
        for (name, &pos) in positions {
            let metric: Metric = name.parse()?;
            let slot = slots
                .get_mut(pos)
                .ok_or_else(|| format!("position {pos} of {name} out of range"))?;
            if let Some(prev) = slot.replace(metric) {
                return Err(format!("position {pos} used by both {prev} and {metric}"));
            }
        }
        let order: Vec<Metric> = slots
            .into_iter()
            .enumerate()
            .map(|(pos, slot)| slot.ok_or_else(|| format!("no metric at position {pos}")))
            .collect::<Result<_, _>>()?;
        Ok(Self { order })
    }
}

impl Serialize for Translation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (pos, metric) in self.order.iter().enumerate() {
            map.serialize_entry(metric.name(), &pos)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Translation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionsVisitor;

        impl<'de> Visitor<'de> for PositionsVisitor {
            type Value = HashMap<String, usize>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of metric name to vector position")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut positions = HashMap::new();
                while let Some((name, pos)) = access.next_entry::<String, usize>()? {
                    if positions.insert(name.clone(), pos).is_some() {
                        return Err(serde::de::Error::custom(format!("duplicate metric {name}")));
                    }
                }
                Ok(positions)
            }
        }

        let positions = deserializer.deserialize_map(PositionsVisitor)?;
        Translation::from_positions(&positions).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_size_and_order() {
        assert_eq!(METRIC_COUNT, 45);
        assert_eq!(Metric::ALL[0], Metric::NumIssues);
        assert_eq!(Metric::ALL[METRIC_COUNT - 1], Metric::AvgPatchVocab);
        for (i, m) in Metric::ALL.iter().enumerate() {
            assert_eq!(m.index(), i, "{m} declared out of order");
        }
    }

    #[test]
    fn test_names_round_trip() {
        for &m in Metric::ALL {
            assert_eq!(m.name().parse::<Metric>().unwrap(), m);
        }
        assert!("avg_nothing".parse::<Metric>().is_err());
    }

    #[test]
    fn test_average_tables_cover_avg_metrics() {
        let mut avgs: Vec<Metric> = ISSUE_AVERAGES
            .iter()
            .chain(COMMIT_AVERAGES)
            .map(|(avg, _)| *avg)
            .collect();
        avgs.sort();
        let expected: Vec<Metric> = Metric::ALL.iter().copied().filter(|m| m.is_average()).collect();
        assert_eq!(avgs, expected);
    }

    #[test]
    fn test_metric_map_rejects_missing_keys() {
        let mut named: HashMap<String, f64> =
            Metric::ALL.iter().map(|m| (m.name().to_string(), 1.0)).collect();
        assert!(MetricMap::from_named(&named).is_ok());

        named.remove("loc_pow_files");
        let err = MetricMap::from_named(&named).unwrap_err();
        assert!(err.contains("loc_pow_files"), "error should name the gap: {err}");
    }

    #[test]
    fn test_metric_map_serializes_in_schema_order() {
        let mut map = MetricMap::default();
        map[Metric::NumCommits] = 3.0;
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.starts_with(r#"{"num_issues":0.0"#));

        let back: MetricMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(Metric::NumCommits), 3.0);
    }

    #[test]
    fn test_translation_validates_permutation() {
        let canonical = Translation::canonical();
        let json = serde_json::to_string(&canonical).unwrap();
        let back: Translation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, canonical);

        let mut positions: HashMap<String, usize> = Metric::ALL
            .iter()
            .map(|m| (m.name().to_string(), m.index()))
            .collect();
        positions.insert("open".to_string(), 0);
        assert!(Translation::from_positions(&positions).is_err());
    }

    #[test]
    fn test_translation_maps_coefficients() {
        let t = Translation::canonical();
        let mut coef = vec![0.0; METRIC_COUNT];
        coef[Metric::Closed.index()] = 0.5;
        let weights = t.weights_from(&coef).unwrap();
        assert_eq!(weights.get(Metric::Closed), 0.5);
        assert!(t.weights_from(&coef[1..]).is_err());
    }
}
