use std::collections::BTreeMap;
use std::path::PathBuf;

use bench_core::errors::BenchError;
use bench_core::{Combination, CombinationKey};
use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{BaselineStats, RepeatAggregator};
use crate::enumerate::{enumerate, total_repeats};
use crate::outlog::OutputLog;
use crate::plan::{EmptyRowPolicy, SweepPlan};
use crate::runner::Runner;
use crate::sink::{PlanManifest, ResultSink, ResultTable, SinkMode, TableSchema};

/// How a sweep treats the existing result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Discard previous results and run every combination.
    #[default]
    Fresh,
    /// Keep previous rows and run only the missing combinations.
    Resume,
    /// Load previous rows without running anything.
    Skip,
}

/// Counters reported at the end of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub mode: RunMode,
    pub store: PathBuf,
    /// Rows present in the store before any execution.
    pub loaded_rows: usize,
    pub planned: usize,
    /// Planned combinations whose row already existed.
    pub skipped_present: usize,
    pub executed: usize,
    pub persisted: usize,
    /// Persisted rows without a single successful repeat.
    pub undefined: usize,
    /// Executed combinations dropped by the empty-row policy.
    pub dropped_empty: usize,
    /// Benchmark launches, baselines included.
    pub attempts: u64,
    pub failed_attempts: u64,
}

impl SweepSummary {
    fn new(mode: RunMode, store: PathBuf) -> Self {
        Self {
            mode,
            store,
            loaded_rows: 0,
            planned: 0,
            skipped_present: 0,
            executed: 0,
            persisted: 0,
            undefined: 0,
            dropped_empty: 0,
            attempts: 0,
            failed_attempts: 0,
        }
    }
}

/// Drives one plan through enumeration, execution and persistence.
///
/// Combinations run strictly one after another; each finished row is on disk
/// before the next combination starts.
#[derive(Debug)]
pub struct SweepDriver<R: Runner> {
    plan: SweepPlan,
    runner: R,
    repeats_override: Option<u32>,
    run_id: String,
}

impl<R: Runner> SweepDriver<R> {
    pub fn new(plan: SweepPlan, runner: R) -> Self {
        Self {
            plan,
            runner,
            repeats_override: None,
            run_id: Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    /// Forces the same repeat count on every combination.
    pub fn with_repeats_override(mut self, repeats: Option<u32>) -> Self {
        self.repeats_override = repeats;
        self
    }

    /// Names the log subdirectory for this run.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Loads whatever the store holds without executing anything.
    pub fn load(&self) -> Result<ResultTable, BenchError> {
        let sink = ResultSink::open(
            &self.plan.store,
            SinkMode::ReadOnly,
            TableSchema::from_plan(&self.plan),
        )?;
        sink.load()
    }

    pub fn run(&mut self, mode: RunMode) -> Result<SweepSummary, BenchError> {
        self.plan.validate()?;
        let mut summary = SweepSummary::new(mode, self.plan.store.clone());
        let schema = TableSchema::from_plan(&self.plan);

        if mode == RunMode::Skip {
            let sink = ResultSink::open(&self.plan.store, SinkMode::ReadOnly, schema)?;
            self.check_manifest(&sink)?;
            let table = sink.load()?;
            summary.loaded_rows = table.len();
            info!(
                plan = %self.plan.name,
                store = %self.plan.store.display(),
                rows = table.len(),
                "skipping experiments; loaded existing results"
            );
            return Ok(summary);
        }

        let combinations = enumerate(&self.plan, self.repeats_override)?;
        summary.planned = combinations.len();

        let (mut sink, table) = match mode {
            RunMode::Fresh => {
                self.runner.preflight()?;
                let sink = ResultSink::open(&self.plan.store, SinkMode::Fresh, schema)?;
                sink.write_manifest(&self.manifest(&sink)?)?;
                (sink, ResultTable::default())
            }
            _ => {
                let sink = ResultSink::open(&self.plan.store, SinkMode::Resume, schema)?;
                let table = sink.load()?;
                self.check_manifest(&sink)?;
                (sink, table)
            }
        };
        summary.loaded_rows = table.len();

        let present = table.keys();
        let pending: Vec<Combination> = combinations
            .iter()
            .filter(|combination| !present.contains(&combination.key()))
            .cloned()
            .collect();
        summary.skipped_present = combinations.len() - pending.len();
        if mode == RunMode::Resume && !pending.is_empty() {
            self.runner.preflight()?;
        }
        info!(
            plan = %self.plan.name,
            combinations = combinations.len(),
            pending = pending.len(),
            launches = total_repeats(&pending),
            "starting sweep"
        );

        let aggregator = RepeatAggregator::new(&self.plan)?;
        let log = OutputLog::new(self.plan.logs.mode, &self.plan.logs_dir(), &self.run_id);
        let mut baselines: BTreeMap<CombinationKey, BaselineStats> = BTreeMap::new();

        for (idx, combination) in combinations.iter().enumerate() {
            let position = idx + 1;
            if present.contains(&combination.key()) {
                debug!(
                    combination = %combination.label(),
                    "row already present; not rerunning"
                );
                continue;
            }
            info!(
                "combo {}/{} | {} | repeats={}",
                position,
                combinations.len(),
                combination.label(),
                combination.repeats()
            );

            let baseline_key = match aggregator.baseline_group(combination) {
                Some(group) => {
                    let key = group.key();
                    if !baselines.contains_key(&key) {
                        let repeats = self.baseline_repeats(&key, &combinations);
                        info!(group = %group.label(), repeats, "running shared baseline");
                        let stats =
                            aggregator.run_baseline(&mut self.runner, &group, repeats, &log)?;
                        summary.attempts += u64::from(stats.n_ok + stats.n_fail);
                        summary.failed_attempts += u64::from(stats.n_fail);
                        if stats.is_empty() {
                            warn!(
                                group = %group.label(),
                                failed = stats.n_fail,
                                "baseline produced no successful repeat; its metrics are undefined"
                            );
                        }
                        baselines.insert(key.clone(), stats);
                    }
                    Some(key)
                }
                None => None,
            };
            let baseline = baseline_key.as_ref().and_then(|key| baselines.get(key));

            let aggregation = aggregator.aggregate(&mut self.runner, combination, baseline, &log)?;
            let row = aggregation.row;
            summary.executed += 1;
            summary.attempts += aggregation.attempts.len() as u64;
            summary.failed_attempts += u64::from(row.n_fail);

            if row.needs_attention() {
                warn!(
                    combination = %combination.label(),
                    n_ok = row.n_ok,
                    n_fail = row.n_fail,
                    last_exit_status = row.last_exit_status,
                    "combination had failed repeats"
                );
            }
            if row.is_undefined() && self.plan.empty_rows == EmptyRowPolicy::Skip {
                warn!(
                    combination = %combination.label(),
                    "dropping combination without successful repeats"
                );
                summary.dropped_empty += 1;
                continue;
            }
            sink.append(&row)?;
            summary.persisted += 1;
            if row.is_undefined() {
                summary.undefined += 1;
            }
        }

        info!(
            plan = %self.plan.name,
            store = %sink.path().display(),
            executed = summary.executed,
            persisted = summary.persisted,
            skipped = summary.skipped_present,
            failed_attempts = summary.failed_attempts,
            "sweep finished"
        );
        Ok(summary)
    }

    /// Explicit baseline repeats, else those of the group's first combination.
    fn baseline_repeats(&self, key: &CombinationKey, combinations: &[Combination]) -> u32 {
        let Some(baseline) = &self.plan.family.baseline else {
            return 0;
        };
        if let Some(repeats) = self.repeats_override.or(baseline.repeats) {
            return repeats;
        }
        combinations
            .iter()
            .find(|combination| &combination.sub_key(&baseline.group_by) == key)
            .map(Combination::repeats)
            .unwrap_or(self.plan.repeats.default)
    }

    fn manifest(&self, sink: &ResultSink) -> Result<PlanManifest, BenchError> {
        Ok(PlanManifest {
            plan: self.plan.name.clone(),
            fingerprint: self.plan.fingerprint()?,
            columns: sink.schema().columns(),
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    fn check_manifest(&self, sink: &ResultSink) -> Result<(), BenchError> {
        let Some(recorded) = sink.read_manifest()? else {
            debug!(store = %sink.path().display(), "no plan manifest next to store");
            return Ok(());
        };
        let current = self.plan.fingerprint()?;
        if recorded.fingerprint != current {
            warn!(
                store = %sink.path().display(),
                recorded_plan = %recorded.plan,
                "store was written by a different plan; existing rows are kept as-is"
            );
        }
        Ok(())
    }
}
