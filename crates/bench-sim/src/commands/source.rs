use std::error::Error;
use std::path::PathBuf;

use bench_exp::{load_plan, preset, SweepPlan};
use clap::Args;

/// Where the sweep plan comes from, plus path overrides.
#[derive(Args, Debug)]
pub struct PlanSource {
    /// YAML sweep plan.
    #[arg(long, conflicts_with = "preset", required_unless_present = "preset")]
    pub plan: Option<PathBuf>,
    /// Built-in plan name (see `bench-sim presets`).
    #[arg(long)]
    pub preset: Option<String>,
    /// Benchmark executable, overriding the plan.
    #[arg(long)]
    pub exe: Option<PathBuf>,
    /// Result table, overriding the plan.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

impl PlanSource {
    pub fn resolve(&self) -> Result<SweepPlan, Box<dyn Error>> {
        let mut plan = match (&self.plan, &self.preset) {
            (Some(path), _) => load_plan(path)?,
            (None, Some(name)) => preset(name)?,
            (None, None) => return Err("either --plan or --preset is required".into()),
        };
        if let Some(exe) = &self.exe {
            plan.executable = exe.clone();
        }
        if let Some(store) = &self.store {
            plan.store = store.clone();
        }
        plan.validate()?;
        Ok(plan)
    }
}
