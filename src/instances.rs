//! Provisioned-instance records and deprovision target resolution.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::prompt::{MAX_PROMPT_ATTEMPTS, Prompt};

/// Instance IDs previously provisioned for a bundle. IDs within a record are
/// unique.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionedInstance {
    pub bundle_name: String,
    pub instance_ids: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no provisioned instances for bundle [{0}]")]
    NoInstances(String),
    #[error(transparent)]
    Prompt(#[from] anyhow::Error),
}

/// Resolve the instance ID to deprovision for `bundle_name`.
///
/// Exactly one recorded ID is returned directly; several trigger an indexed
/// selection prompt that re-asks on non-integer or out-of-range input. Zero
/// is an error, never a guess.
pub fn resolve_instance_id(
    records: &[ProvisionedInstance],
    bundle_name: &str,
    prompt: &mut dyn Prompt,
) -> Result<String, ResolveError> {
    let record = records
        .iter()
        .find(|record| record.bundle_name == bundle_name)
        .ok_or_else(|| ResolveError::NoInstances(bundle_name.to_string()))?;

    match record.instance_ids.len() {
        0 => Err(ResolveError::NoInstances(bundle_name.to_string())),
        1 => Ok(record.instance_ids[0].clone()),
        count => {
            println!("Found more than one service instance for bundle [{bundle_name}]:");
            for (index, id) in record.instance_ids.iter().enumerate() {
                println!("[{index}] - {id}");
            }
            for _ in 0..MAX_PROMPT_ATTEMPTS {
                let input =
                    prompt.text("Enter the number of the instance ID you wish to deprovision: ")?;
                if input.is_empty() {
                    continue;
                }
                let index: usize = match input.parse() {
                    Ok(index) => index,
                    Err(_) => {
                        println!("Input was not a valid integer, please enter again.");
                        continue;
                    }
                };
                if index >= count {
                    println!(
                        "Input is out of range. Please select an integer from 0-{}",
                        count - 1
                    );
                    continue;
                }
                return Ok(record.instance_ids[index].clone());
            }
            Err(ResolveError::Prompt(anyhow::anyhow!(
                "no instance selected after {MAX_PROMPT_ATTEMPTS} attempts"
            )))
        }
    }
}

/// Record a newly provisioned instance ID, keeping IDs unique per bundle.
pub fn record_instance(records: &mut Vec<ProvisionedInstance>, bundle_name: &str, id: &str) {
    if let Some(record) = records
        .iter_mut()
        .find(|record| record.bundle_name == bundle_name)
    {
        if !record.instance_ids.iter().any(|existing| existing == id) {
            record.instance_ids.push(id.to_string());
        }
        return;
    }
    records.push(ProvisionedInstance {
        bundle_name: bundle_name.to_string(),
        instance_ids: vec![id.to_string()],
    });
    debug!(bundle = bundle_name, id, "recorded provisioned instance");
}

/// Drop a deprovisioned instance ID; empty records are removed entirely.
pub fn forget_instance(records: &mut Vec<ProvisionedInstance>, bundle_name: &str, id: &str) {
    if let Some(record) = records
        .iter_mut()
        .find(|record| record.bundle_name == bundle_name)
    {
        record.instance_ids.retain(|existing| existing != id);
    }
    records.retain(|record| !record.instance_ids.is_empty());
}
