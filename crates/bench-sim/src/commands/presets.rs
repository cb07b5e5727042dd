use std::error::Error;

use bench_exp::{enumerate, preset, preset_names, total_repeats};
use clap::Args;

#[derive(Args, Debug)]
pub struct PresetsArgs {
    /// Print this preset as a YAML plan instead of listing names.
    pub name: Option<String>,
}

pub fn run(args: &PresetsArgs) -> Result<(), Box<dyn Error>> {
    if let Some(name) = &args.name {
        print!("{}", preset(name)?.to_yaml()?);
        return Ok(());
    }
    for name in preset_names() {
        let plan = preset(name)?;
        let combinations = enumerate(&plan, None)?;
        println!(
            "{name:<8} {} combinations, {} launches, store {}",
            combinations.len(),
            total_repeats(&combinations),
            plan.store.display()
        );
    }
    Ok(())
}
