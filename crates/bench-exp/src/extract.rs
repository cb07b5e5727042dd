use std::collections::BTreeMap;

use bench_core::errors::{BenchError, ErrorInfo};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::family::{CorrectnessSpec, FamilySpec};

/// Number pattern following a metric label: integer or decimal, optional exponent.
pub const NUMBER_PATTERN: &str = r"(?P<value>-?[0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?)";

/// Verdict derived from the benchmark's own correctness markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Correctness {
    Passed,
    /// A failure marker was printed; carries the offending line.
    Failed(String),
    /// The family emits no markers, or markers are optional and none appeared.
    NotApplicable,
    /// Markers are required but none appeared.
    Missing,
}

impl Correctness {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Correctness::Passed | Correctness::NotApplicable)
    }
}

/// Metrics and verdict extracted from one run's captured text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedOutput {
    /// Every tracked metric; `None` when its label never appeared.
    pub metrics: BTreeMap<String, Option<f64>>,
    pub correctness: Correctness,
}

impl ParsedOutput {
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().flatten()
    }

    /// Names from `required` that were not found.
    pub fn missing(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.value(name).is_none())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
struct MetricRule {
    name: String,
    pattern: Regex,
}

#[derive(Debug, Clone)]
struct CorrectnessRule {
    success: Vec<Regex>,
    failure: Vec<Regex>,
    required: bool,
}

/// Compiled extraction rules for one benchmark family.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    rules: Vec<MetricRule>,
    correctness: Option<CorrectnessRule>,
}

impl MetricExtractor {
    pub fn from_family(family: &FamilySpec) -> Result<Self, BenchError> {
        let case_insensitive = family.case_insensitive;
        let mut rules = Vec::with_capacity(family.metrics.len());
        for metric in &family.metrics {
            let prefix = match (&metric.label, &metric.pattern) {
                (Some(label), _) => regex::escape(label),
                (None, Some(pattern)) => pattern.clone(),
                (None, None) => {
                    return Err(BenchError::Config(
                        ErrorInfo::new("extract-rule", "metric has neither label nor pattern")
                            .with_context("metric", &metric.name),
                    ))
                }
            };
            let source = format!(r"{prefix}\s*{NUMBER_PATTERN}");
            rules.push(MetricRule {
                name: metric.name.clone(),
                pattern: compile(&source, case_insensitive, &metric.name)?,
            });
        }
        let correctness = family
            .correctness
            .as_ref()
            .map(|spec| compile_correctness(spec, case_insensitive))
            .transpose()?;
        Ok(Self { rules, correctness })
    }

    /// Extracts every metric (last occurrence wins) and the correctness verdict.
    pub fn parse(&self, text: &str) -> ParsedOutput {
        let metrics = self
            .rules
            .iter()
            .map(|rule| (rule.name.clone(), last_value(&rule.pattern, text)))
            .collect();
        ParsedOutput {
            metrics,
            correctness: self.verdict(text),
        }
    }

    fn verdict(&self, text: &str) -> Correctness {
        let Some(rule) = &self.correctness else {
            return Correctness::NotApplicable;
        };
        if let Some(line) = text
            .lines()
            .find(|line| rule.failure.iter().any(|marker| marker.is_match(line)))
        {
            return Correctness::Failed(line.trim().to_string());
        }
        if rule.success.iter().any(|marker| marker.is_match(text)) {
            Correctness::Passed
        } else if rule.required {
            Correctness::Missing
        } else {
            Correctness::NotApplicable
        }
    }
}

fn last_value(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures_iter(text)
        .last()
        .and_then(|captures| captures.name("value"))
        .and_then(|value| value.as_str().parse::<f64>().ok())
        // `1e999` parses to infinity; treat it like an unreadable value.
        .filter(|value| value.is_finite())
}

fn compile_correctness(
    spec: &CorrectnessSpec,
    case_insensitive: bool,
) -> Result<CorrectnessRule, BenchError> {
    let literal = |phrase: &String| compile(&regex::escape(phrase), case_insensitive, phrase);
    Ok(CorrectnessRule {
        success: spec.success.iter().map(literal).collect::<Result<_, _>>()?,
        failure: spec.failure.iter().map(literal).collect::<Result<_, _>>()?,
        required: spec.required,
    })
}

fn compile(source: &str, case_insensitive: bool, owner: &str) -> Result<Regex, BenchError> {
    RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|err| {
            BenchError::Config(
                ErrorInfo::new("extract-pattern", "invalid extraction pattern")
                    .with_context("rule", owner)
                    .with_context("pattern", source)
                    .with_hint(err.to_string()),
            )
        })
}
