use std::error::Error;
use std::path::PathBuf;

use bench_exp::{LogMode, ProcessRunner, RunMode, SweepDriver, SweepSummary};
use clap::{Args, ValueEnum};
use tracing::info;

use super::source::PlanSource;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Fresh,
    Resume,
    Skip,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fresh => RunMode::Fresh,
            ModeArg::Resume => RunMode::Resume,
            ModeArg::Skip => RunMode::Skip,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogModeArg {
    None,
    Fail,
    All,
}

impl From<LogModeArg> for LogMode {
    fn from(mode: LogModeArg) -> Self {
        match mode {
            LogModeArg::None => LogMode::None,
            LogModeArg::Fail => LogMode::Fail,
            LogModeArg::All => LogMode::All,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: PlanSource,
    /// Treatment of an existing result table.
    #[arg(long, value_enum, default_value_t = ModeArg::Fresh)]
    pub mode: ModeArg,
    /// Load existing results without running anything (same as `--mode skip`).
    #[arg(short = 's', long = "skip-experiments")]
    pub skip_experiments: bool,
    /// Run every combination this many times, ignoring the plan's policy.
    #[arg(long)]
    pub repeats: Option<u32>,
    /// Which attempts keep their captured output on disk.
    #[arg(long, value_enum)]
    pub log_mode: Option<LogModeArg>,
    /// Root directory for attempt logs.
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,
    /// Print the sweep summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    fn run_mode(&self) -> RunMode {
        if self.skip_experiments {
            RunMode::Skip
        } else {
            self.mode.into()
        }
    }
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut plan = args.source.resolve()?;
    if let Some(mode) = args.log_mode {
        plan.logs.mode = mode.into();
    }
    if let Some(dir) = &args.logs_dir {
        plan.logs.dir = Some(dir.clone());
    }
    let mode = args.run_mode();
    info!(
        plan = %plan.name,
        executable = %plan.executable.display(),
        store = %plan.store.display(),
        ?mode,
        "resolved sweep plan"
    );

    let runner = ProcessRunner::new(plan.executable.clone());
    let mut driver = SweepDriver::new(plan, runner).with_repeats_override(args.repeats);
    let summary = driver.run(mode)?;
    print_summary(&summary, args.json)
}

fn print_summary(summary: &SweepSummary, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    match summary.mode {
        RunMode::Skip => println!(
            "{} rows loaded from {}",
            summary.loaded_rows,
            summary.store.display()
        ),
        _ => println!(
            "{} of {} combinations executed ({} already present), {} rows written to {}; {} of {} attempts failed",
            summary.executed,
            summary.planned,
            summary.skipped_present,
            summary.persisted,
            summary.store.display(),
            summary.failed_attempts,
            summary.attempts
        ),
    }
    Ok(())
}
