use std::error::Error;

use bench_exp::{enumerate, total_repeats, TableSchema};
use clap::Args;
use serde_json::json;

use super::source::PlanSource;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: PlanSource,
    /// Repeat override, as accepted by `run`.
    #[arg(long)]
    pub repeats: Option<u32>,
    /// Emit the listing as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &PlanArgs) -> Result<(), Box<dyn Error>> {
    let plan = args.source.resolve()?;
    let combinations = enumerate(&plan, args.repeats)?;
    let launches = total_repeats(&combinations);

    if args.json {
        let listing = json!({
            "plan": plan.name,
            "fingerprint": plan.fingerprint()?,
            "columns": TableSchema::from_plan(&plan).columns(),
            "combinations": combinations
                .iter()
                .map(|combination| json!({
                    "label": combination.label(),
                    "repeats": combination.repeats(),
                }))
                .collect::<Vec<_>>(),
            "launches": launches,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for (idx, combination) in combinations.iter().enumerate() {
        println!(
            "{:>4}  {}  repeats={}",
            idx + 1,
            combination.label(),
            combination.repeats()
        );
    }
    println!(
        "{} combinations, {} launches",
        combinations.len(),
        launches
    );
    Ok(())
}
