#![allow(dead_code)]

use std::path::Path;

use bench_core::BenchError;
use bench_exp::{
    ArgToken, AxisSpec, CorrectnessSpec, DerivedSpec, EmptyRowPolicy, FamilySpec, LogSpec,
    MetricSpec, RawOutput, RepeatPolicy, Runner, SweepPlan,
};

/// Runner that answers from a closure and records every argument vector.
pub struct ScriptedRunner<F> {
    respond: F,
    pub calls: Vec<Vec<String>>,
}

impl<F> ScriptedRunner<F>
where
    F: FnMut(&[String], usize) -> RawOutput,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Vec::new(),
        }
    }
}

impl<F> Runner for ScriptedRunner<F>
where
    F: FnMut(&[String], usize) -> RawOutput,
{
    fn run(&mut self, args: &[String]) -> Result<RawOutput, BenchError> {
        let call = self.calls.len();
        self.calls.push(args.to_vec());
        Ok((self.respond)(args, call))
    }
}

pub fn timings(serial: f64, parallel: f64) -> String {
    format!("Serial time (s): {serial}\nParallel time (s): {parallel}\nResults match!\n")
}

/// Two-axis scaling plan over `size` and `workers` with a speedup ratio.
pub fn scaling_plan(store: &Path, sizes: &[i64], workers: &[i64], repeats: u32) -> SweepPlan {
    SweepPlan {
        name: "scaling".into(),
        executable: "bin/scaling".into(),
        store: store.to_path_buf(),
        axes: vec![
            AxisSpec::ints("size", sizes),
            AxisSpec::ints("workers", workers),
        ],
        restrictions: Vec::new(),
        repeats: RepeatPolicy::fixed(repeats),
        family: FamilySpec {
            name: "scaling".into(),
            args: vec![ArgToken::axis("size"), ArgToken::axis("workers")],
            metrics: vec![
                MetricSpec::labelled("serial", "Serial time (s):"),
                MetricSpec::labelled("parallel", "Parallel time (s):"),
            ],
            case_insensitive: false,
            correctness: Some(CorrectnessSpec {
                success: vec!["Results match!".into()],
                failure: vec!["Results mismatch!".into()],
                required: false,
            }),
            derived: vec![DerivedSpec::ratio("speedup", "serial", "parallel")],
            extremes: vec!["parallel".into()],
            baseline: None,
        },
        empty_rows: EmptyRowPolicy::Persist,
        logs: LogSpec::default(),
    }
}
