use bench_core::errors::{BenchError, ErrorInfo};
use bench_core::{AxisValue, Combination};

use crate::plan::{axis_lookup, AxisSpec, SweepPlan};

/// Expands the plan into its ordered list of combinations.
///
/// The first declared axis varies slowest. Restrictions narrow later axes
/// based on earlier values, and each combination carries the repeat count
/// resolved by the plan's policy unless `explicit_repeats` overrides it.
pub fn enumerate(
    plan: &SweepPlan,
    explicit_repeats: Option<u32>,
) -> Result<Vec<Combination>, BenchError> {
    if explicit_repeats == Some(0) {
        return Err(BenchError::Config(ErrorInfo::new(
            "repeats-override",
            "explicit repeat count must be at least one",
        )));
    }
    let mut prefixes = Vec::new();
    expand_grid(plan, 0, Vec::new(), &mut prefixes);
    Ok(prefixes
        .into_iter()
        .map(|axes| {
            let repeats = plan
                .repeats
                .resolve(axis_lookup(&axes), explicit_repeats);
            Combination::new(axes, repeats)
        })
        .collect())
}

fn expand_grid(
    plan: &SweepPlan,
    idx: usize,
    current: Vec<(String, AxisValue)>,
    outputs: &mut Vec<Vec<(String, AxisValue)>>,
) {
    if idx == plan.axes.len() {
        outputs.push(current);
        return;
    }
    let axis = &plan.axes[idx];
    for value in domain(plan, axis, &current) {
        let mut next = current.clone();
        next.push((axis.name.clone(), axis.coerce(*value)));
        expand_grid(plan, idx + 1, next, outputs);
    }
}

fn domain<'p>(
    plan: &'p SweepPlan,
    axis: &'p AxisSpec,
    prefix: &[(String, AxisValue)],
) -> &'p [AxisValue] {
    let lookup = axis_lookup(prefix);
    plan.restrictions
        .iter()
        .find(|restriction| restriction.axis == axis.name && restriction.applies(lookup))
        .map(|restriction| restriction.values.as_slice())
        .unwrap_or(axis.values.as_slice())
}

/// Total number of process launches the combinations will need.
pub fn total_repeats(combinations: &[Combination]) -> u64 {
    combinations
        .iter()
        .map(|combination| u64::from(combination.repeats()))
        .sum()
}
