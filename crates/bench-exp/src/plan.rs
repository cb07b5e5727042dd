use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use bench_core::errors::{config_error, BenchError, ErrorInfo};
use bench_core::AxisValue;
use serde::{Deserialize, Serialize};

use crate::extract::MetricExtractor;
use crate::family::{ArgToken, FamilySpec, MetricSource};
use crate::hash::stable_hash_string;
use crate::serde::{from_yaml_str, to_yaml_string};
use crate::sink::TableSchema;

/// Complete, immutable description of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Short identifier used in logs and the store manifest.
    pub name: String,
    /// Benchmark executable invoked for every repeat.
    pub executable: PathBuf,
    /// CSV result table.
    pub store: PathBuf,
    /// Axes in priority order; the first axis varies slowest.
    pub axes: Vec<AxisSpec>,
    /// Conditional narrowing of axis domains.
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    /// Repeat count policy.
    #[serde(default)]
    pub repeats: RepeatPolicy,
    /// Benchmark family: argument template, extraction rules, derived metrics.
    pub family: FamilySpec,
    /// What to do with combinations where every repeat failed.
    #[serde(default)]
    pub empty_rows: EmptyRowPolicy,
    /// Raw output logging.
    #[serde(default)]
    pub logs: LogSpec,
}

/// One declared sweep axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub name: String,
    pub values: Vec<AxisValue>,
    /// Decimal places used when a float value is rendered as an argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
}

/// Storage kind of an axis, decided by its declared values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Int,
    Float,
}

impl AxisSpec {
    pub fn new(name: impl Into<String>, values: Vec<AxisValue>) -> Self {
        Self {
            name: name.into(),
            values,
            precision: None,
        }
    }

    pub fn ints(name: impl Into<String>, values: &[i64]) -> Self {
        Self::new(name, values.iter().copied().map(AxisValue::Int).collect())
    }

    pub fn floats(name: impl Into<String>, values: &[f64], precision: usize) -> Self {
        Self {
            precision: Some(precision),
            ..Self::new(name, values.iter().copied().map(AxisValue::Float).collect())
        }
    }

    /// An axis is integral only when every declared value is.
    pub fn kind(&self) -> AxisKind {
        if self
            .values
            .iter()
            .all(|value| matches!(value, AxisValue::Int(_)))
        {
            AxisKind::Int
        } else {
            AxisKind::Float
        }
    }

    /// Coerces a value to this axis' kind so that keys and reloaded rows agree.
    pub fn coerce(&self, value: AxisValue) -> AxisValue {
        match (self.kind(), value) {
            (AxisKind::Float, AxisValue::Int(raw)) => AxisValue::Float(raw as f64),
            (_, other) => other,
        }
    }
}

/// Comparison operator used by [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Numeric predicate over a single axis value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub axis: String,
    pub op: CmpOp,
    pub value: f64,
}

impl Condition {
    pub fn new(axis: impl Into<String>, op: CmpOp, value: f64) -> Self {
        Self {
            axis: axis.into(),
            op,
            value,
        }
    }

    /// Evaluates the predicate; an axis without a value never satisfies it.
    pub fn holds<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a AxisValue>,
    {
        let Some(actual) = lookup(&self.axis).map(AxisValue::as_f64) else {
            return false;
        };
        match self.op {
            CmpOp::Lt => actual < self.value,
            CmpOp::Le => actual <= self.value,
            CmpOp::Gt => actual > self.value,
            CmpOp::Ge => actual >= self.value,
            CmpOp::Eq => actual == self.value,
            CmpOp::Ne => actual != self.value,
        }
    }
}

/// Lookup closure over ordered `(axis, value)` pairs.
pub fn axis_lookup<'a>(
    axes: &'a [(String, AxisValue)],
) -> impl Fn(&str) -> Option<&'a AxisValue> + Copy + 'a {
    move |name: &str| {
        axes.iter()
            .find(|(axis, _)| axis == name)
            .map(|(_, value)| value)
    }
}

fn all_hold<'a, F>(conditions: &[Condition], lookup: F) -> bool
where
    F: Fn(&str) -> Option<&'a AxisValue> + Copy,
{
    conditions.iter().all(|condition| condition.holds(lookup))
}

/// Replaces an axis domain with `values` when every condition holds.
///
/// Conditions may only reference axes declared before `axis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    pub when: Vec<Condition>,
    pub axis: String,
    pub values: Vec<AxisValue>,
}

impl Restriction {
    pub fn applies<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a AxisValue> + Copy,
    {
        all_hold(&self.when, lookup)
    }
}

/// Reduced repeat count for combinations matching every condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatRule {
    pub when: Vec<Condition>,
    pub repeats: u32,
}

/// Adaptive repeat policy. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatPolicy {
    #[serde(default = "RepeatPolicy::default_repeats")]
    pub default: u32,
    #[serde(default)]
    pub rules: Vec<RepeatRule>,
}

impl RepeatPolicy {
    const fn default_repeats() -> u32 {
        3
    }

    pub fn fixed(repeats: u32) -> Self {
        Self {
            default: repeats,
            rules: Vec::new(),
        }
    }

    /// Single cost split: combinations with `axis >= threshold` get `reduced`.
    pub fn cost_split(axis: impl Into<String>, threshold: f64, default: u32, reduced: u32) -> Self {
        Self {
            default,
            rules: vec![RepeatRule {
                when: vec![Condition::new(axis, CmpOp::Ge, threshold)],
                repeats: reduced,
            }],
        }
    }

    /// Resolves the repeat count; `explicit` always wins.
    pub fn resolve<'a, F>(&self, lookup: F, explicit: Option<u32>) -> u32
    where
        F: Fn(&str) -> Option<&'a AxisValue> + Copy,
    {
        if let Some(repeats) = explicit {
            return repeats;
        }
        self.rules
            .iter()
            .find(|rule| all_hold(&rule.when, lookup))
            .map(|rule| rule.repeats)
            .unwrap_or(self.default)
    }
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self::fixed(Self::default_repeats())
    }
}

/// Handling of combinations without a single successful repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyRowPolicy {
    /// Persist a row whose statistics are all `NA`.
    #[default]
    Persist,
    /// Drop the combination with a warning.
    Skip,
}

/// Which attempts keep their captured output on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    None,
    Fail,
    All,
}

/// Raw output logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogSpec {
    #[serde(default)]
    pub mode: LogMode,
    /// Root directory for logs; defaults to `logs/` next to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl SweepPlan {
    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|axis| axis.name == name)
    }

    fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|axis| axis.name == name)
    }

    pub fn logs_dir(&self) -> PathBuf {
        match &self.logs.dir {
            Some(dir) => dir.clone(),
            None => self
                .store
                .parent()
                .map(|parent| parent.join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }

    /// Hash of everything that shapes the result table. Paths are excluded so
    /// moving a store does not look like a different sweep.
    pub fn fingerprint(&self) -> Result<String, BenchError> {
        stable_hash_string(&(
            &self.axes,
            &self.restrictions,
            &self.repeats,
            &self.family,
            &self.empty_rows,
        ))
    }

    pub fn to_yaml(&self) -> Result<String, BenchError> {
        to_yaml_string(self)
    }

    /// Rejects plans that would enumerate, run or persist inconsistently.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.axes.is_empty() {
            return Err(BenchError::Config(ErrorInfo::new(
                "plan-no-axes",
                "a sweep needs at least one axis",
            )));
        }
        let mut names = BTreeSet::new();
        for axis in &self.axes {
            if !names.insert(axis.name.as_str()) {
                return Err(config_error(
                    "plan-duplicate-axis",
                    "axis declared twice",
                    "axis",
                    &axis.name,
                ));
            }
            check_domain(&axis.name, &axis.values, axis.precision)?;
        }

        for restriction in &self.restrictions {
            let Some(target) = self.axis_index(&restriction.axis) else {
                return Err(unknown_axis("restriction", &restriction.axis));
            };
            let axis = &self.axes[target];
            check_domain(&restriction.axis, &restriction.values, axis.precision)?;
            if axis.kind() == AxisKind::Int {
                if let Some(value) = restriction
                    .values
                    .iter()
                    .find(|value| matches!(value, AxisValue::Float(_)))
                {
                    return Err(BenchError::Config(
                        ErrorInfo::new(
                            "plan-restriction-kind",
                            "restriction value does not match the axis kind",
                        )
                        .with_context("axis", &restriction.axis)
                        .with_context("value", value.canonical())
                        .with_hint("integer axes only accept integer restriction values"),
                    ));
                }
            }
            for condition in &restriction.when {
                match self.axis_index(&condition.axis) {
                    Some(idx) if idx < target => {}
                    Some(_) => {
                        return Err(BenchError::Config(
                            ErrorInfo::new(
                                "plan-restriction-order",
                                "restriction conditions must reference earlier axes",
                            )
                            .with_context("axis", &restriction.axis)
                            .with_context("condition", &condition.axis),
                        ))
                    }
                    None => return Err(unknown_axis("restriction condition", &condition.axis)),
                }
            }
        }

        if self.repeats.default == 0 {
            return Err(BenchError::Config(ErrorInfo::new(
                "plan-zero-repeats",
                "default repeat count must be at least one",
            )));
        }
        for rule in &self.repeats.rules {
            if rule.repeats == 0 {
                return Err(BenchError::Config(ErrorInfo::new(
                    "plan-zero-repeats",
                    "repeat rules must assign at least one repeat",
                )));
            }
            for condition in &rule.when {
                if self.axis(&condition.axis).is_none() {
                    return Err(unknown_axis("repeat rule", &condition.axis));
                }
            }
        }

        self.validate_family()?;
        // Compiling the extractor surfaces invalid label patterns.
        MetricExtractor::from_family(&self.family)?;

        let columns = TableSchema::from_plan(self).columns();
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(config_error(
                    "plan-duplicate-column",
                    "two table columns share a name",
                    "column",
                    column,
                ));
            }
        }
        Ok(())
    }

    fn validate_family(&self) -> Result<(), BenchError> {
        let family = &self.family;
        for token in &family.args {
            if let ArgToken::Axis { axis } = token {
                if self.axis(axis).is_none() {
                    return Err(unknown_axis("argument template", axis));
                }
            }
        }

        let mut metric_names = BTreeSet::new();
        for metric in &family.metrics {
            if !metric_names.insert(metric.name.as_str()) {
                return Err(config_error(
                    "plan-duplicate-metric",
                    "metric declared twice",
                    "metric",
                    &metric.name,
                ));
            }
            if metric.label.is_some() == metric.pattern.is_some() {
                return Err(BenchError::Config(
                    ErrorInfo::new(
                        "plan-metric-rule",
                        "a metric needs exactly one of `label` or `pattern`",
                    )
                    .with_context("metric", &metric.name),
                ));
            }
        }
        if family.run_metrics().is_empty() {
            return Err(BenchError::Config(ErrorInfo::new(
                "plan-no-metrics",
                "at least one metric must be read from the benchmark runs",
            )));
        }

        for derived in &family.derived {
            for operand in [&derived.numerator, &derived.denominator] {
                if !metric_names.contains(operand.as_str()) {
                    return Err(BenchError::Config(
                        ErrorInfo::new("plan-derived-operand", "derived metric uses unknown metric")
                            .with_context("derived", &derived.name)
                            .with_context("metric", operand),
                    ));
                }
            }
        }
        for name in &family.extremes {
            if !metric_names.contains(name.as_str()) {
                return Err(config_error(
                    "plan-extremes",
                    "extremes reference unknown metric",
                    "metric",
                    name,
                ));
            }
        }

        let baseline_metrics = family
            .metrics
            .iter()
            .filter(|metric| metric.source == MetricSource::Baseline)
            .count();
        match &family.baseline {
            None if baseline_metrics > 0 => Err(BenchError::Config(ErrorInfo::new(
                "plan-baseline-missing",
                "metrics sourced from a baseline need a `baseline` section",
            ))),
            None => Ok(()),
            Some(_) if baseline_metrics == 0 => Err(BenchError::Config(ErrorInfo::new(
                "plan-baseline-unused",
                "a baseline needs at least one metric with `source: baseline`",
            ))),
            Some(baseline) => {
                if baseline.repeats == Some(0) {
                    return Err(BenchError::Config(ErrorInfo::new(
                        "plan-zero-repeats",
                        "baseline repeat count must be at least one",
                    )));
                }
                for axis in &baseline.group_by {
                    if self.axis(axis).is_none() {
                        return Err(unknown_axis("baseline group", axis));
                    }
                }
                for token in &baseline.args {
                    if let ArgToken::Axis { axis } = token {
                        if !baseline.group_by.contains(axis) {
                            return Err(BenchError::Config(
                                ErrorInfo::new(
                                    "plan-baseline-args",
                                    "baseline arguments may only use grouping axes",
                                )
                                .with_context("axis", axis),
                            ));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn check_domain(
    axis: &str,
    values: &[AxisValue],
    precision: Option<usize>,
) -> Result<(), BenchError> {
    if values.is_empty() {
        return Err(config_error(
            "plan-empty-axis",
            "axis has no values",
            "axis",
            axis,
        ));
    }
    let mut seen = BTreeSet::new();
    let mut rendered = BTreeSet::new();
    for value in values {
        if !value.as_f64().is_finite() {
            return Err(BenchError::Config(
                ErrorInfo::new("plan-axis-value", "axis values must be finite")
                    .with_context("axis", axis),
            ));
        }
        if !seen.insert(value.canonical()) {
            return Err(BenchError::Config(
                ErrorInfo::new("plan-duplicate-value", "axis lists a value twice")
                    .with_context("axis", axis)
                    .with_context("value", value.canonical()),
            ));
        }
        // Distinct floats may still print the same argument at the axis precision.
        if !rendered.insert(value.render(precision)) {
            return Err(BenchError::Config(
                ErrorInfo::new(
                    "plan-duplicate-argument",
                    "two axis values render to the same argument",
                )
                .with_context("axis", axis)
                .with_context("argument", value.render(precision))
                .with_hint("raise the axis precision or drop one of the values"),
            ));
        }
    }
    Ok(())
}

fn unknown_axis(place: &str, axis: &str) -> BenchError {
    BenchError::Config(
        ErrorInfo::new("plan-unknown-axis", format!("{place} references an undeclared axis"))
            .with_context("axis", axis),
    )
}

/// Parses and validates a plan from YAML text.
pub fn parse_plan(text: &str) -> Result<SweepPlan, BenchError> {
    let plan: SweepPlan = from_yaml_str(text)?;
    plan.validate()?;
    Ok(plan)
}

/// Loads a plan from a YAML file.
pub fn load_plan(path: &Path) -> Result<SweepPlan, BenchError> {
    let text = fs::read_to_string(path).map_err(|err| {
        BenchError::Config(
            ErrorInfo::new("plan-read", "failed to read sweep plan")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    parse_plan(&text)
}
