use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::PathBuf;

use bench_core::errors::BenchError;
use bench_core::Combination;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::extract::{Correctness, MetricExtractor, ParsedOutput};
use crate::family::DerivedSpec;
use crate::outlog::OutputLog;
use crate::plan::SweepPlan;
use crate::runner::{ArgTemplate, RawOutput, Runner};
use crate::stats::{ratio, MetricStats};

/// Why a repeat was excluded from the statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    NonZeroExit(i32),
    MissingMetrics(Vec<String>),
    /// The benchmark printed a failure marker.
    Incorrect(String),
    /// A required correctness marker never appeared.
    MarkerAbsent,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NonZeroExit(status) => write!(f, "exit status {status}"),
            FailureReason::MissingMetrics(names) => {
                write!(f, "missing metrics: {}", names.join(", "))
            }
            FailureReason::Incorrect(detail) => write!(f, "incorrect result: {detail}"),
            FailureReason::MarkerAbsent => write!(f, "no correctness marker in output"),
        }
    }
}

/// Classified result of one repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum RepeatOutcome {
    Success(BTreeMap<String, f64>),
    Failed(FailureReason),
}

impl RepeatOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RepeatOutcome::Success(_))
    }

    pub fn value(&self, metric: &str) -> Option<f64> {
        match self {
            RepeatOutcome::Success(values) => values.get(metric).copied(),
            RepeatOutcome::Failed(_) => None,
        }
    }
}

/// One executed repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// One-based repeat index.
    pub index: u32,
    pub exit_status: i32,
    pub outcome: RepeatOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
}

/// Classifies a repeat: exit status first, then missing metrics, then the
/// correctness verdict.
pub fn classify(raw: &RawOutput, parsed: &ParsedOutput, required: &[String]) -> RepeatOutcome {
    if raw.exit_status != 0 {
        return RepeatOutcome::Failed(FailureReason::NonZeroExit(raw.exit_status));
    }
    let missing = parsed.missing(required);
    if !missing.is_empty() {
        return RepeatOutcome::Failed(FailureReason::MissingMetrics(missing));
    }
    match &parsed.correctness {
        Correctness::Failed(detail) => {
            RepeatOutcome::Failed(FailureReason::Incorrect(detail.clone()))
        }
        Correctness::Missing => RepeatOutcome::Failed(FailureReason::MarkerAbsent),
        Correctness::Passed | Correctness::NotApplicable => RepeatOutcome::Success(
            required
                .iter()
                .filter_map(|name| parsed.value(name).map(|value| (name.clone(), value)))
                .collect(),
        ),
    }
}

/// Aggregated statistics of a shared baseline group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub n_ok: u32,
    pub n_fail: u32,
    pub metrics: BTreeMap<String, MetricStats>,
}

impl BaselineStats {
    pub fn is_empty(&self) -> bool {
        self.n_ok == 0
    }
}

/// One persisted record of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub combination: Combination,
    pub n_ok: u32,
    pub n_fail: u32,
    pub last_exit_status: i32,
    /// Per-metric statistics over successful repeats only.
    pub metrics: BTreeMap<String, MetricStats>,
    /// Ratios of metric means; `None` when undefined.
    pub derived: BTreeMap<String, Option<f64>>,
    /// RFC 3339 time at which the row was aggregated.
    pub timestamp: String,
}

impl AggregatedRow {
    pub fn repeats(&self) -> u32 {
        self.combination.repeats()
    }

    /// True when no repeat succeeded and every statistic is `NA`.
    pub fn is_undefined(&self) -> bool {
        self.n_ok == 0
    }

    pub fn stats(&self, metric: &str) -> MetricStats {
        self.metrics.get(metric).copied().unwrap_or_default()
    }

    pub fn mean(&self, metric: &str) -> Option<f64> {
        self.stats(metric).mean
    }

    pub fn std(&self, metric: &str) -> Option<f64> {
        self.stats(metric).std
    }

    pub fn derived(&self, name: &str) -> Option<f64> {
        self.derived.get(name).copied().flatten()
    }

    /// Whether the sweep driver should warn about this row.
    pub fn needs_attention(&self) -> bool {
        self.n_ok == 0 || self.n_fail > 0 || self.last_exit_status != 0
    }
}

/// Row plus the per-repeat records it was reduced from.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub row: AggregatedRow,
    pub attempts: Vec<AttemptRecord>,
}

/// Runs a combination its configured number of times and reduces the
/// successful repeats into an [`AggregatedRow`].
#[derive(Debug, Clone)]
pub struct RepeatAggregator {
    extractor: MetricExtractor,
    args: ArgTemplate,
    baseline_args: Option<ArgTemplate>,
    baseline_group: Vec<String>,
    metric_names: Vec<String>,
    run_metrics: Vec<String>,
    baseline_metrics: Vec<String>,
    derived: Vec<DerivedSpec>,
}

impl RepeatAggregator {
    pub fn new(plan: &SweepPlan) -> Result<Self, BenchError> {
        let family = &plan.family;
        Ok(Self {
            extractor: MetricExtractor::from_family(family)?,
            args: ArgTemplate::new(&family.args, &plan.axes),
            baseline_args: family
                .baseline
                .as_ref()
                .map(|baseline| ArgTemplate::new(&baseline.args, &plan.axes)),
            baseline_group: family
                .baseline
                .as_ref()
                .map(|baseline| baseline.group_by.clone())
                .unwrap_or_default(),
            metric_names: family.metric_names(),
            run_metrics: family.run_metrics(),
            baseline_metrics: family.baseline_metrics(),
            derived: family.derived.clone(),
        })
    }

    /// The baseline group a combination belongs to, when the family has one.
    pub fn baseline_group(&self, combination: &Combination) -> Option<Combination> {
        self.baseline_args.as_ref()?;
        let axes = combination
            .axes()
            .iter()
            .filter(|(name, _)| self.baseline_group.contains(name))
            .cloned()
            .collect();
        Some(Combination::new(axes, combination.repeats()))
    }

    /// Executes every repeat of `combination`. Only a launch failure is an error.
    pub fn aggregate<R: Runner>(
        &self,
        runner: &mut R,
        combination: &Combination,
        baseline: Option<&BaselineStats>,
        log: &OutputLog,
    ) -> Result<Aggregation, BenchError> {
        let attempts = self.attempts(
            runner,
            &self.args,
            combination,
            combination.repeats(),
            &self.run_metrics,
            &combination.slug(),
            log,
        )?;
        let row = self.reduce(combination, &attempts, baseline, now_timestamp());
        Ok(Aggregation { row, attempts })
    }

    /// Runs the shared baseline for the group of `combination`.
    pub fn run_baseline<R: Runner>(
        &self,
        runner: &mut R,
        group: &Combination,
        repeats: u32,
        log: &OutputLog,
    ) -> Result<BaselineStats, BenchError> {
        let Some(template) = &self.baseline_args else {
            return Ok(BaselineStats {
                n_ok: 0,
                n_fail: 0,
                metrics: BTreeMap::new(),
            });
        };
        let stem = format!("baseline_{}", group.slug());
        let attempts = self.attempts(
            runner,
            template,
            group,
            repeats,
            &self.baseline_metrics,
            &stem,
            log,
        )?;
        let n_ok = attempts.iter().filter(|a| a.outcome.is_success()).count() as u32;
        let metrics = self
            .baseline_metrics
            .iter()
            .map(|name| (name.clone(), stats_for(name, &attempts)))
            .collect();
        Ok(BaselineStats {
            n_ok,
            n_fail: attempts.len() as u32 - n_ok,
            metrics,
        })
    }

    /// Pure reduction of executed repeats into a row.
    pub fn reduce(
        &self,
        combination: &Combination,
        attempts: &[AttemptRecord],
        baseline: Option<&BaselineStats>,
        timestamp: String,
    ) -> AggregatedRow {
        let n_ok = attempts.iter().filter(|a| a.outcome.is_success()).count() as u32;
        let n_fail = attempts.len() as u32 - n_ok;
        let last_exit_status = attempts.last().map(|a| a.exit_status).unwrap_or(0);

        let metrics: BTreeMap<String, MetricStats> = self
            .metric_names
            .iter()
            .map(|name| {
                let stats = if n_ok == 0 {
                    MetricStats::undefined()
                } else if self.baseline_metrics.contains(name) {
                    baseline
                        .and_then(|baseline| baseline.metrics.get(name).copied())
                        .unwrap_or_default()
                } else {
                    stats_for(name, attempts)
                };
                (name.clone(), stats)
            })
            .collect();

        let derived = self
            .derived
            .iter()
            .map(|spec| {
                let mean = |metric: &str| metrics.get(metric).and_then(|stats| stats.mean);
                (
                    spec.name.clone(),
                    ratio(mean(&spec.numerator), mean(&spec.denominator)),
                )
            })
            .collect();

        AggregatedRow {
            combination: combination.clone(),
            n_ok,
            n_fail,
            last_exit_status,
            metrics,
            derived,
            timestamp,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn attempts<R: Runner>(
        &self,
        runner: &mut R,
        template: &ArgTemplate,
        combination: &Combination,
        repeats: u32,
        required: &[String],
        stem: &str,
        log: &OutputLog,
    ) -> Result<Vec<AttemptRecord>, BenchError> {
        let args = template.render(combination)?;
        let mut attempts = Vec::with_capacity(repeats as usize);
        for index in 1..=repeats {
            let raw = runner.run(&args)?;
            let parsed = self.extractor.parse(&raw.text);
            let outcome = classify(&raw, &parsed, required);
            match &outcome {
                RepeatOutcome::Success(_) => {
                    debug!(combination = %combination.label(), attempt = index, "repeat ok")
                }
                RepeatOutcome::Failed(reason) => warn!(
                    combination = %combination.label(),
                    attempt = index,
                    reason = %reason,
                    "repeat failed"
                ),
            }
            let log_path = log.record(stem, index, !outcome.is_success(), &raw.text);
            attempts.push(AttemptRecord {
                index,
                exit_status: raw.exit_status,
                outcome,
                log: log_path,
            });
        }
        Ok(attempts)
    }
}

fn stats_for(metric: &str, attempts: &[AttemptRecord]) -> MetricStats {
    let samples: Vec<f64> = attempts
        .iter()
        .filter_map(|attempt| attempt.outcome.value(metric))
        .collect();
    MetricStats::from_samples(&samples)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
