//! Assembles the serialized extra-vars payload handed to the bundle image.

use anyhow::Result;
use serde_json::Value as JsonValue;

use crate::bundle::{Parameters, Plan};

/// Cluster platform identifier injected into every payload.
pub const CLUSTER_PLATFORM: &str = "openshift";

pub const PLAN_ID_KEY: &str = "_apb_plan_id";
pub const SERVICE_INSTANCE_ID_KEY: &str = "_apb_service_instance_id";
pub const SERVICE_CLASS_ID_KEY: &str = "_apb_service_class_id";

/// Merge collected parameters with the contextual keys the executed image
/// expects. Contextual keys overwrite user-supplied values of the same name.
pub fn build_extra_vars(
    instance_id: &str,
    target_namespace: &str,
    params: Option<Parameters>,
    plan: &Plan,
) -> Result<String> {
    let mut vars = params.unwrap_or_default();

    if !target_namespace.is_empty() {
        vars.insert(
            "namespace".to_string(),
            JsonValue::String(target_namespace.to_string()),
        );
    }
    vars.insert(
        "cluster".to_string(),
        JsonValue::String(CLUSTER_PLATFORM.to_string()),
    );
    vars.insert(
        PLAN_ID_KEY.to_string(),
        JsonValue::String(plan.name.clone()),
    );
    vars.insert(
        SERVICE_INSTANCE_ID_KEY.to_string(),
        JsonValue::String(instance_id.to_string()),
    );
    vars.insert(
        SERVICE_CLASS_ID_KEY.to_string(),
        JsonValue::String(instance_id.to_string()),
    );

    Ok(serde_json::to_string(&vars)?)
}
