//! Parameter sweep orchestration for external benchmark executables: plan
//! enumeration, process execution, metric extraction, repeat aggregation and
//! an append-only result table that survives interruption.

mod aggregate;
mod driver;
mod enumerate;
mod extract;
mod family;
mod hash;
mod outlog;
mod plan;
pub mod presets;
mod runner;
mod serde;
mod sink;
mod stats;

pub use aggregate::{
    classify, AggregatedRow, Aggregation, AttemptRecord, BaselineStats, FailureReason,
    RepeatAggregator, RepeatOutcome,
};
pub use driver::{RunMode, SweepDriver, SweepSummary};
pub use enumerate::{enumerate, total_repeats};
pub use extract::{Correctness, MetricExtractor, ParsedOutput, NUMBER_PATTERN};
pub use family::{
    ArgToken, BaselineSpec, CorrectnessSpec, DerivedSpec, FamilySpec, MetricSource, MetricSpec,
};
pub use hash::stable_hash_string;
pub use outlog::OutputLog;
pub use plan::{
    axis_lookup, load_plan, parse_plan, AxisKind, AxisSpec, CmpOp, Condition, EmptyRowPolicy,
    LogMode, LogSpec, RepeatPolicy, RepeatRule, Restriction, SweepPlan,
};
pub use presets::{preset, preset_names};
pub use runner::{ArgTemplate, ProcessRunner, RawOutput, Runner};
pub use sink::{
    manifest_path, PlanManifest, ResultSink, ResultTable, SinkMode, TableSchema, UNDEFINED,
};
pub use stats::{mean_std, ratio, MetricStats};

pub use serde::{from_json_slice, from_yaml_str, to_canonical_json_bytes, to_yaml_string};
