use serde::{Deserialize, Serialize};

/// One positional argument of the benchmark command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgToken {
    /// Value of the named axis for the current combination.
    Axis { axis: String },
    /// Fixed string, e.g. a mode switch.
    Literal { literal: String },
}

impl ArgToken {
    pub fn axis(name: impl Into<String>) -> Self {
        ArgToken::Axis { axis: name.into() }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        ArgToken::Literal {
            literal: value.into(),
        }
    }
}

/// Where a metric's samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    /// Parsed from every repeat of the combination itself.
    #[default]
    Run,
    /// Parsed from the shared baseline runs of the combination's group.
    Baseline,
}

/// Extraction rule for one tracked metric: a line label followed by a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    /// Literal label text; regex metacharacters are escaped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Raw regex prefix for labels with variable parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub source: MetricSource,
}

impl MetricSpec {
    pub fn labelled(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: Some(label.into()),
            pattern: None,
            source: MetricSource::Run,
        }
    }

    pub fn patterned(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            pattern: Some(pattern.into()),
            source: MetricSource::Run,
        }
    }

    pub fn from_baseline(mut self) -> Self {
        self.source = MetricSource::Baseline;
        self
    }
}

/// Literal success/failure phrases emitted by the benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CorrectnessSpec {
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub failure: Vec<String>,
    /// When set, output without any marker counts as a failed repeat.
    #[serde(default)]
    pub required: bool,
}

/// Ratio of two metric means, e.g. serial over parallel time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSpec {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

impl DerivedSpec {
    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }
}

/// Shared reference run executed once per group of combinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSpec {
    /// Axes that identify a group; every other axis shares the baseline.
    pub group_by: Vec<String>,
    pub args: Vec<ArgToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<u32>,
}

/// Everything that is specific to one benchmark program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySpec {
    pub name: String,
    pub args: Vec<ArgToken>,
    pub metrics: Vec<MetricSpec>,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correctness: Option<CorrectnessSpec>,
    #[serde(default)]
    pub derived: Vec<DerivedSpec>,
    /// Metrics that also get `_min` / `_max` columns.
    #[serde(default)]
    pub extremes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineSpec>,
}

impl FamilySpec {
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|metric| metric.name.clone()).collect()
    }

    /// Metrics every repeat of a combination must report.
    pub fn run_metrics(&self) -> Vec<String> {
        self.metrics_from(MetricSource::Run)
    }

    /// Metrics every baseline repeat must report.
    pub fn baseline_metrics(&self) -> Vec<String> {
        self.metrics_from(MetricSource::Baseline)
    }

    fn metrics_from(&self, source: MetricSource) -> Vec<String> {
        self.metrics
            .iter()
            .filter(|metric| metric.source == source)
            .map(|metric| metric.name.clone())
            .collect()
    }
}
