//! Plan selection for a bundle spec.

use anyhow::{Result, anyhow};

use crate::bundle::{BundleSpec, Plan};
use crate::prompt::{MAX_PROMPT_ATTEMPTS, Prompt};

/// Return the spec's only plan, or prompt for one by exact name.
///
/// A spec with zero plans is a precondition violation and fails immediately.
/// Name matching is case-sensitive with no substring fallback.
pub fn select_plan<'a>(spec: &'a BundleSpec, prompt: &mut dyn Prompt) -> Result<&'a Plan> {
    if spec.plans.is_empty() {
        return Err(anyhow!("bundle spec [{}] has no plans", spec.fq_name));
    }
    if spec.plans.len() == 1 {
        return Ok(&spec.plans[0]);
    }

    for _ in 0..MAX_PROMPT_ATTEMPTS {
        println!("List of available plans:");
        for plan in &spec.plans {
            println!("name: {}", plan.name);
        }
        let name = prompt.text("Enter name of plan to execute: ")?;
        if let Some(plan) = spec.plans.iter().find(|plan| plan.name == name) {
            return Ok(plan);
        }
        println!("Did not find plan [{name}], try again.\n");
    }
    Err(anyhow!(
        "no plan selected after {MAX_PROMPT_ATTEMPTS} attempts"
    ))
}
