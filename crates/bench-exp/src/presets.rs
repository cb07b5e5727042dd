//! Built-in plans for the three benchmark programs the engine was built for.

use std::path::PathBuf;

use bench_core::errors::{config_error, BenchError};
use bench_core::AxisValue;

use crate::family::{
    ArgToken, BaselineSpec, CorrectnessSpec, DerivedSpec, FamilySpec, MetricSpec,
};
use crate::plan::{
    AxisSpec, CmpOp, Condition, EmptyRowPolicy, LogSpec, RepeatPolicy, RepeatRule, Restriction,
    SweepPlan,
};

const PRESETS: [&str; 3] = ["poly", "sparse", "sort"];

pub fn preset_names() -> &'static [&'static str] {
    &PRESETS
}

/// Looks up a built-in plan by name.
pub fn preset(name: &str) -> Result<SweepPlan, BenchError> {
    match name {
        "poly" => Ok(poly()),
        "sparse" => Ok(sparse()),
        "sort" => Ok(sort()),
        other => Err(config_error(
            "preset-unknown",
            format!("unknown preset; available: {}", PRESETS.join(", ")),
            "preset",
            other,
        )),
    }
}

fn base(name: &str, axes: Vec<AxisSpec>, repeats: RepeatPolicy, family: FamilySpec) -> SweepPlan {
    SweepPlan {
        name: name.to_string(),
        executable: PathBuf::from("bin/main"),
        store: PathBuf::from(format!("data/runs/{name}.csv")),
        axes,
        restrictions: Vec::new(),
        repeats,
        family,
        empty_rows: EmptyRowPolicy::Persist,
        logs: LogSpec::default(),
    }
}

/// Polynomial multiplication: serial vs threaded, shorter thread list and
/// fewer repeats for the largest degree.
pub fn poly() -> SweepPlan {
    let family = FamilySpec {
        name: "poly".into(),
        args: vec![ArgToken::axis("degree"), ArgToken::axis("threads")],
        metrics: vec![
            MetricSpec::patterned("gen", r"Generate Time\s*\(s\):"),
            MetricSpec::patterned("serial", r"Serial Time\s*\(s\):"),
            MetricSpec::patterned("parallel", r"Parallel Time\s*\(s\):"),
        ],
        case_insensitive: true,
        correctness: Some(CorrectnessSpec {
            success: vec!["Results match!".into()],
            failure: vec!["Mismatch at i=".into()],
            required: true,
        }),
        derived: vec![DerivedSpec::ratio("speedup", "serial", "parallel")],
        extremes: vec!["parallel".into()],
        baseline: None,
    };
    let mut plan = base(
        "poly",
        vec![
            AxisSpec::ints("degree", &[1_000, 10_000, 100_000]),
            AxisSpec::ints("threads", &[1, 2, 3, 4, 5, 6, 7, 8]),
        ],
        RepeatPolicy::cost_split("degree", 1e5, 5, 3),
        family,
    );
    plan.restrictions.push(Restriction {
        when: vec![Condition::new("degree", CmpOp::Ge, 1e5)],
        axis: "threads".into(),
        values: [1, 2, 4, 8].into_iter().map(AxisValue::Int).collect(),
    });
    plan
}

/// Sparse (CSR) against dense matrix-vector products.
pub fn sparse() -> SweepPlan {
    let metrics = [
        ("csr_build_serial_s", r"Serial CSR build time \(s\):"),
        ("csr_build_parallel_s", r"Parallel CSR build time \(s\):"),
        ("dense_mult_serial_s", r"Dense matrix \d+x mult Serial time \(s\):"),
        ("dense_mult_parallel_s", r"Dense matrix \d+x mult Parallel time \(s\):"),
        ("csr_mult_serial_s", r"Sparse matrix \d+x mult Serial time \(s\):"),
        ("csr_mult_parallel_s", r"Sparse matrix \d+x mult Parallel time \(s\):"),
    ]
    .into_iter()
    .map(|(name, pattern)| MetricSpec::patterned(name, pattern))
    .collect();
    let family = FamilySpec {
        name: "sparse".into(),
        args: vec![
            ArgToken::axis("matrix_size"),
            ArgToken::axis("sparsity"),
            ArgToken::axis("num_mults"),
            ArgToken::axis("threads"),
        ],
        metrics,
        case_insensitive: false,
        correctness: Some(CorrectnessSpec {
            success: vec!["Results match!".into()],
            failure: vec!["Results mismatch!".into(), "CSR builds don't match!".into()],
            required: false,
        }),
        derived: vec![
            DerivedSpec::ratio("csr_build_speedup", "csr_build_serial_s", "csr_build_parallel_s"),
            DerivedSpec::ratio("dense_speedup", "dense_mult_serial_s", "dense_mult_parallel_s"),
            DerivedSpec::ratio("csr_speedup", "csr_mult_serial_s", "csr_mult_parallel_s"),
            DerivedSpec::ratio(
                "ratio_dense_over_csr_serial",
                "dense_mult_serial_s",
                "csr_mult_serial_s",
            ),
            DerivedSpec::ratio(
                "ratio_dense_over_csr_parallel",
                "dense_mult_parallel_s",
                "csr_mult_parallel_s",
            ),
        ],
        extremes: Vec::new(),
        baseline: None,
    };
    let large_dense = vec![
        Condition::new("matrix_size", CmpOp::Ge, 1e4),
        Condition::new("sparsity", CmpOp::Lt, 0.95),
    ];
    let mut costly = large_dense.clone();
    costly.push(Condition::new("num_mults", CmpOp::Ge, 10.0));
    costly.push(Condition::new("threads", CmpOp::Lt, 4.0));
    let repeats = RepeatPolicy {
        default: 3,
        rules: vec![
            RepeatRule {
                when: costly,
                repeats: 1,
            },
            RepeatRule {
                when: large_dense,
                repeats: 2,
            },
        ],
    };
    base(
        "sparse",
        vec![
            AxisSpec::ints("matrix_size", &[1_000, 10_000]),
            AxisSpec::floats("sparsity", &[0.0, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99], 6),
            AxisSpec::ints("num_mults", &[1, 5, 10, 20]),
            AxisSpec::ints("threads", &[1, 2, 4, 8]),
        ],
        repeats,
        family,
    )
}

/// Merge sort with one serial baseline per degree shared by every thread count.
pub fn sort() -> SweepPlan {
    let family = FamilySpec {
        name: "sort".into(),
        args: vec![
            ArgToken::axis("degree"),
            ArgToken::literal("p"),
            ArgToken::axis("threads"),
        ],
        metrics: vec![
            MetricSpec::patterned("gen", r"Generate Time\s*\(s\):"),
            MetricSpec::patterned("serial", r"Serial Time\s*\(s\):").from_baseline(),
            MetricSpec::patterned("parallel", r"Parallel Time\s*\(s\):"),
        ],
        case_insensitive: true,
        correctness: Some(CorrectnessSpec {
            success: vec!["Correct sorting!".into()],
            failure: vec!["Incorrect sorting".into(), "Not sorted".into()],
            required: true,
        }),
        derived: vec![DerivedSpec::ratio("speedup", "serial", "parallel")],
        extremes: vec!["parallel".into()],
        baseline: Some(BaselineSpec {
            group_by: vec!["degree".into()],
            args: vec![ArgToken::axis("degree"), ArgToken::literal("s")],
            repeats: None,
        }),
    };
    base(
        "sort",
        vec![
            AxisSpec::ints("degree", &[10_000_000, 100_000_000]),
            AxisSpec::ints("threads", &[1, 2, 3, 4, 5, 6, 8]),
        ],
        RepeatPolicy::fixed(2),
        family,
    )
}
