use std::path::PathBuf;

use bench_core::AxisValue;
use bench_exp::{
    enumerate, load_plan, parse_plan, preset, preset_names, total_repeats, ArgToken, AxisSpec,
    CmpOp, Condition, DerivedSpec, LogMode, MetricSource, MetricSpec, Restriction, TableSchema,
};

mod common;
use common::scaling_plan;

fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(relative)
}

fn code_of(result: Result<(), bench_core::BenchError>) -> String {
    result.expect_err("invalid plan").info().code.clone()
}

#[test]
fn yaml_plan_loads_and_enumerates() {
    let plan = load_plan(&fixture_path("plans/sparse-small.yaml")).expect("load plan");
    assert_eq!(plan.name, "sparse-small");
    assert_eq!(plan.logs.mode, LogMode::Fail);
    assert_eq!(plan.axes[1].values[0], AxisValue::Float(0.0));
    assert_eq!(plan.family.args[2], ArgToken::literal("1"));
    let combinations = enumerate(&plan, None).expect("enumerate");
    assert_eq!(combinations.len(), 15);
    assert_eq!(total_repeats(&combinations), 41);

    let columns = TableSchema::from_plan(&plan).columns();
    assert_eq!(
        columns,
        vec![
            "matrix_size",
            "sparsity",
            "threads",
            "repeats",
            "n_ok",
            "n_fail",
            "last_exit_status",
            "csr_mult_serial_s_mean",
            "csr_mult_serial_s_std",
            "csr_mult_parallel_s_mean",
            "csr_mult_parallel_s_std",
            "csr_mult_parallel_s_min",
            "csr_mult_parallel_s_max",
            "csr_speedup",
            "timestamp",
        ]
    );
}

#[test]
fn yaml_round_trip_preserves_plan_and_fingerprint() {
    for name in preset_names() {
        let plan = preset(name).expect("preset");
        plan.validate().expect("preset validates");
        let text = plan.to_yaml().expect("yaml");
        let reparsed = parse_plan(&text).expect("reparse");
        assert_eq!(reparsed, plan);
        assert_eq!(
            reparsed.fingerprint().expect("fingerprint"),
            plan.fingerprint().expect("fingerprint")
        );
    }
}

#[test]
fn fingerprint_ignores_paths_but_not_axes() {
    let plan = scaling_plan("a.csv".as_ref(), &[1000], &[1, 2], 3);
    let mut moved = plan.clone();
    moved.store = "elsewhere/b.csv".into();
    moved.executable = "other/bin".into();
    assert_eq!(plan.fingerprint().expect("a"), moved.fingerprint().expect("b"));
    let mut widened = plan.clone();
    widened.axes[1] = AxisSpec::ints("workers", &[1, 2, 4]);
    assert_ne!(plan.fingerprint().expect("a"), widened.fingerprint().expect("c"));
}

#[test]
fn unknown_preset_lists_alternatives() {
    let err = preset("fft").expect_err("unknown");
    assert_eq!(err.info().code, "preset-unknown");
    assert!(err.info().message.contains("poly"));
}

#[test]
fn validation_rejects_inconsistent_plans() {
    let base = scaling_plan("v.csv".as_ref(), &[1000], &[1, 2], 3);

    let mut plan = base.clone();
    plan.axes.clear();
    assert_eq!(code_of(plan.validate()), "plan-no-axes");

    let mut plan = base.clone();
    plan.axes.push(AxisSpec::ints("size", &[5]));
    assert_eq!(code_of(plan.validate()), "plan-duplicate-axis");

    let mut plan = base.clone();
    plan.axes[1] = AxisSpec::ints("workers", &[1, 1]);
    assert_eq!(code_of(plan.validate()), "plan-duplicate-value");

    let mut plan = base.clone();
    plan.axes[1] = AxisSpec::ints("workers", &[]);
    assert_eq!(code_of(plan.validate()), "plan-empty-axis");

    let mut plan = base.clone();
    plan.family.args.push(ArgToken::axis("threads"));
    assert_eq!(code_of(plan.validate()), "plan-unknown-axis");

    let mut plan = base.clone();
    plan.restrictions.push(Restriction {
        when: vec![Condition::new("workers", CmpOp::Eq, 1.0)],
        axis: "size".into(),
        values: vec![AxisValue::Int(10)],
    });
    assert_eq!(code_of(plan.validate()), "plan-restriction-order");

    let mut plan = base.clone();
    plan.restrictions.push(Restriction {
        when: Vec::new(),
        axis: "workers".into(),
        values: vec![AxisValue::Float(1.5)],
    });
    assert_eq!(code_of(plan.validate()), "plan-restriction-kind");

    let mut plan = base.clone();
    plan.axes[1] = AxisSpec::floats("workers", &[0.499, 0.501], 1);
    assert_eq!(code_of(plan.validate()), "plan-duplicate-argument");

    let mut plan = base.clone();
    plan.repeats.default = 0;
    assert_eq!(code_of(plan.validate()), "plan-zero-repeats");

    let mut plan = base.clone();
    plan.family
        .derived
        .push(DerivedSpec::ratio("efficiency", "speedup", "workers"));
    assert_eq!(code_of(plan.validate()), "plan-derived-operand");

    let mut plan = base.clone();
    plan.family.extremes.push("gen".into());
    assert_eq!(code_of(plan.validate()), "plan-extremes");

    let mut plan = base.clone();
    plan.family.metrics[0].pattern = Some("Serial".into());
    assert_eq!(code_of(plan.validate()), "plan-metric-rule");

    let mut plan = base.clone();
    plan.family.metrics[0].source = MetricSource::Baseline;
    assert_eq!(code_of(plan.validate()), "plan-baseline-missing");

    let mut plan = base.clone();
    plan.family
        .derived
        .push(DerivedSpec::ratio("parallel_mean", "serial", "parallel"));
    assert_eq!(code_of(plan.validate()), "plan-duplicate-column");

    let mut plan = base;
    plan.family.metrics = vec![MetricSpec::patterned("serial", r"Serial time (s")];
    plan.family.derived.clear();
    plan.family.extremes.clear();
    assert_eq!(code_of(plan.validate()), "extract-pattern");
}

#[test]
fn integer_restriction_on_float_axis_is_widened() {
    let mut plan = scaling_plan("w.csv".as_ref(), &[1000], &[1], 1);
    plan.axes[1] = AxisSpec::floats("workers", &[0.25, 0.5], 2);
    plan.restrictions.push(Restriction {
        when: Vec::new(),
        axis: "workers".into(),
        values: vec![AxisValue::Int(1)],
    });
    plan.validate().expect("int value on a float axis");
    let combinations = enumerate(&plan, None).expect("enumerate");
    assert_eq!(combinations.len(), 1);
    assert_eq!(combinations[0].get("workers"), Some(&AxisValue::Float(1.0)));
}

#[test]
fn malformed_yaml_is_a_serde_error() {
    let err = parse_plan("name: [unterminated").expect_err("bad yaml");
    assert!(matches!(err, bench_core::BenchError::Serde(_)));
}
