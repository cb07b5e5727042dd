mod common;

use std::fs::OpenOptions;
use std::io::Write;

use bench_core::{AxisValue, BenchError};
use bench_exp::{
    enumerate, manifest_path, AttemptRecord, AxisSpec, MetricSpec, RawOutput, RepeatAggregator,
    RepeatOutcome, ResultSink, RunMode, SinkMode, SweepDriver, TableSchema,
};
use common::{scaling_plan, timings, ScriptedRunner};

fn jittered(_args: &[String], call: usize) -> RawOutput {
    let parallel = 0.1 + call as f64 / 7.0;
    RawOutput::new(0, timings(1.0 / 3.0, parallel))
}

fn success(index: u32, serial: f64, parallel: f64) -> AttemptRecord {
    AttemptRecord {
        index,
        exit_status: 0,
        outcome: RepeatOutcome::Success(
            [("serial".to_string(), serial), ("parallel".to_string(), parallel)]
                .into_iter()
                .collect(),
        ),
        log: None,
    }
}

#[test]
fn reload_reproduces_written_values_exactly() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let mut plan = scaling_plan(&store, &[1000], &[1], 3);
    plan.axes[1] = AxisSpec::floats("workers", &[0.1], 3);
    let combination = enumerate(&plan, None).expect("enumerate").remove(0);
    let aggregator = RepeatAggregator::new(&plan).expect("aggregator");
    let attempts = vec![
        success(1, 1.0 / 3.0, 0.1 + 0.2),
        success(2, 2.0 / 3.0, 1e-9),
        success(3, 1e7 / 7.0, 0.7),
    ];
    let row = aggregator.reduce(&combination, &attempts, None, "2024-01-01T00:00:00Z".into());

    let schema = TableSchema::from_plan(&plan);
    let mut sink = ResultSink::open(&store, SinkMode::Fresh, schema).expect("open");
    sink.append(&row).expect("append");
    let table = sink.load().expect("load");
    let loaded = &table.rows[0];

    assert_eq!(loaded.combination.key(), row.combination.key());
    assert_eq!(loaded.combination.get("workers"), Some(&AxisValue::Float(0.1)));
    assert_eq!((loaded.n_ok, loaded.n_fail), (row.n_ok, row.n_fail));
    for metric in ["serial", "parallel"] {
        assert_eq!(loaded.mean(metric), row.mean(metric));
        assert_eq!(loaded.std(metric), row.std(metric));
    }
    assert_eq!(loaded.stats("parallel"), row.stats("parallel"));
    assert_eq!(loaded.derived("speedup"), row.derived("speedup"));
    assert_eq!(loaded.timestamp, row.timestamp);
}

#[test]
fn fresh_sweep_writes_plan_manifest() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let plan = scaling_plan(&store, &[1000], &[1], 1);
    SweepDriver::new(plan.clone(), ScriptedRunner::new(jittered))
        .run(RunMode::Fresh)
        .expect("sweep");
    let sink = ResultSink::open(&store, SinkMode::ReadOnly, TableSchema::from_plan(&plan))
        .expect("open");
    let manifest = sink.read_manifest().expect("read").expect("manifest");
    assert!(manifest_path(&store).exists());
    assert_eq!(manifest.plan, "scaling");
    assert_eq!(manifest.fingerprint, plan.fingerprint().expect("fingerprint"));
    assert_eq!(manifest.columns, sink.schema().columns());
}

#[test]
fn resume_runs_only_missing_combinations() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let plan = scaling_plan(&store, &[1000], &[1, 2, 4], 2);
    let mut fresh = SweepDriver::new(plan.clone(), ScriptedRunner::new(jittered));
    fresh.run(RunMode::Fresh).expect("fresh sweep");

    let text = std::fs::read_to_string(&store).expect("read");
    let kept: Vec<&str> = text.lines().take(3).collect();
    std::fs::write(&store, format!("{}\n", kept.join("\n"))).expect("rewrite");

    let mut resumed = SweepDriver::new(plan, ScriptedRunner::new(jittered));
    let summary = resumed.run(RunMode::Resume).expect("resume");
    assert_eq!(summary.loaded_rows, 2);
    assert_eq!(summary.skipped_present, 2);
    assert_eq!(summary.executed, 1);
    assert_eq!(resumed.runner().calls.len(), 2);
    assert!(resumed.runner().calls.iter().all(|args| args[1] == "4"));

    let table = resumed.load().expect("load");
    assert_eq!(table.len(), 3);
    let text = std::fs::read_to_string(&store).expect("read");
    assert_eq!(text.lines().filter(|line| line.starts_with("size,")).count(), 1);
}

#[test]
fn resume_of_complete_table_executes_nothing() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let plan = scaling_plan(&store, &[1000], &[1, 2], 1);
    SweepDriver::new(plan.clone(), ScriptedRunner::new(jittered))
        .run(RunMode::Fresh)
        .expect("fresh sweep");
    let mut resumed = SweepDriver::new(plan, ScriptedRunner::new(jittered));
    let summary = resumed.run(RunMode::Resume).expect("resume");
    assert_eq!(summary.executed, 0);
    assert!(resumed.runner().calls.is_empty());
}

#[test]
fn torn_tail_is_truncated_on_resume() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let plan = scaling_plan(&store, &[1000], &[1, 2], 1);
    SweepDriver::new(plan.clone(), ScriptedRunner::new(jittered))
        .run(RunMode::Fresh)
        .expect("fresh sweep");
    let intact = std::fs::read_to_string(&store).expect("read");

    let mut file = OpenOptions::new().append(true).open(&store).expect("open");
    file.write_all(b"1000,3,1,1,0,0,0.5").expect("write torn");
    drop(file);

    let schema = TableSchema::from_plan(&plan);
    let readonly = ResultSink::open(&store, SinkMode::ReadOnly, schema.clone()).expect("open");
    assert_eq!(readonly.load().expect("load").len(), 2);

    ResultSink::open(&store, SinkMode::Resume, schema).expect("resume open");
    assert_eq!(std::fs::read_to_string(&store).expect("read"), intact);
}

#[test]
fn resume_without_store_is_fatal() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = scaling_plan(&temp.path().join("missing.csv"), &[1000], &[1], 1);
    let mut driver = SweepDriver::new(plan, ScriptedRunner::new(jittered));
    let err = driver.run(RunMode::Resume).expect_err("missing store");
    assert!(matches!(err, BenchError::StoreMissing(_)));
    assert!(driver.runner().calls.is_empty());
}

#[test]
fn header_mismatch_is_reported_before_any_work() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let plan = scaling_plan(&store, &[1000], &[1], 1);
    SweepDriver::new(plan.clone(), ScriptedRunner::new(jittered))
        .run(RunMode::Fresh)
        .expect("fresh sweep");

    let mut changed = plan.clone();
    changed
        .family
        .metrics
        .push(MetricSpec::labelled("gen", "Generate time (s):"));
    let mut driver = SweepDriver::new(changed, ScriptedRunner::new(jittered));
    let err = driver.run(RunMode::Resume).expect_err("schema mismatch");
    assert!(matches!(err, BenchError::Store(_)));
    assert_eq!(err.info().code, "store-schema");
    assert!(driver.runner().calls.is_empty());
}

#[test]
fn fresh_mode_discards_previous_results() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    std::fs::write(&store, "unrelated,content\n1,2\n").expect("seed");
    let plan = scaling_plan(&store, &[1000], &[1], 1);
    let mut driver = SweepDriver::new(plan, ScriptedRunner::new(jittered));
    driver.run(RunMode::Fresh).expect("sweep");
    let text = std::fs::read_to_string(&store).expect("read");
    assert!(text.starts_with("size,workers,repeats,n_ok,n_fail,last_exit_status,"));
    assert_eq!(text.lines().count(), 2);
}
