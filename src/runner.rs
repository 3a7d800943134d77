//! Execution orchestrator: resolves the target spec, selects a plan,
//! collects parameters, assembles extra-vars, and asks the cluster to run
//! the bundle image as a short-lived pod.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bundle::BundleSpec;
use crate::cluster::{Action, ClusterClient, ExecutionContext};
use crate::extra_vars::build_extra_vars;
use crate::instances::{self, ResolveError};
use crate::params::collect_parameters;
use crate::plan::select_plan;
use crate::prompt::Prompt;
use crate::store::ConfigData;

/// Delay between attempts to open the pod log stream.
const LOG_POLL_DELAY: Duration = Duration::from_secs(3);
/// Attempt cap for log polling. The tool this replaces polled forever; the
/// cap keeps unattended runs from hanging on a pod that never starts.
const LOG_POLL_ATTEMPTS: usize = 100;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Ambiguous(String),
    #[error("{0}")]
    Validation(String),
    #[error("error creating sandbox: {0}")]
    Sandbox(#[source] anyhow::Error),
    #[error("error launching pod: {0}")]
    Launch(#[source] anyhow::Error),
    #[error("prompt failed: {0}")]
    Prompt(#[source] anyhow::Error),
}

/// Options for one bundle run, built once at the command-parsing boundary.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub action: Action,
    pub namespace: String,
    pub bundle_name: String,
    pub sandbox_role: String,
    pub registry_filter: Option<String>,
    pub follow_logs: bool,
    pub skip_params: bool,
}

/// What a successful run produced. The instance ID is what provision
/// bookkeeping records and deprovision bookkeeping forgets.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub pod_name: String,
    pub instance_id: String,
}

/// Run a bundle action end to end. See the module docs for the step order;
/// sandbox failure is fatal and never followed by a launch attempt.
pub fn run_bundle(
    opts: &RunOptions,
    config: &ConfigData,
    cluster: &dyn ClusterClient,
    prompt: &mut dyn Prompt,
) -> Result<RunOutcome, RunnerError> {
    let instance_id = if opts.action == Action::Deprovision {
        match instances::resolve_instance_id(
            &config.provisioned_instances,
            &opts.bundle_name,
            prompt,
        ) {
            Ok(id) => id,
            Err(ResolveError::NoInstances(name)) => {
                return Err(RunnerError::NotFound(format!(
                    "no provisioned instances for bundle [{name}]"
                )));
            }
            Err(ResolveError::Prompt(err)) => return Err(RunnerError::Prompt(err)),
        }
    } else {
        Uuid::new_v4().to_string()
    };

    let pod_name = format!("bundle-{}-{}", opts.action, instance_id);
    let target_spec = find_target_spec(config, &opts.bundle_name, opts.registry_filter.as_deref())?;
    debug!(spec = %target_spec.fq_name, pod = %pod_name, "resolved target spec");

    let plan = select_plan(target_spec, prompt)
        .map_err(|err| RunnerError::Validation(err.to_string()))?;
    println!("Plan: {}", plan.name);

    let params = if opts.skip_params {
        None
    } else {
        let collected = collect_parameters(plan, prompt)
            .map_err(|err| RunnerError::Validation(err.to_string()))?;
        Some(collected)
    };

    let extra_vars = build_extra_vars(&instance_id, &opts.namespace, params, plan)
        .map_err(|err| RunnerError::Validation(err.to_string()))?;

    let mut labels = BTreeMap::new();
    labels.insert("bundle-fqname".to_string(), target_spec.fq_name.clone());
    labels.insert("bundle-action".to_string(), opts.action.as_str().to_string());
    labels.insert("bundle-pod-name".to_string(), pod_name.clone());

    let targets = vec![opts.namespace.clone()];
    let (account, location) = cluster
        .create_sandbox(
            &pod_name,
            &opts.namespace,
            &targets,
            &opts.sandbox_role,
            &labels,
        )
        .map_err(RunnerError::Sandbox)?;

    let context = ExecutionContext {
        pod_name: pod_name.clone(),
        targets,
        labels,
        action: opts.action,
        image: target_spec.image.clone(),
        account,
        location,
        extra_vars,
    };
    cluster.launch_pod(&context).map_err(RunnerError::Launch)?;
    println!(
        "Successfully created pod [{pod_name}] to {} [{}] in namespace [{}]",
        opts.action, opts.bundle_name, opts.namespace
    );

    if opts.follow_logs {
        follow_logs(cluster, &pod_name, &opts.namespace, opts.action);
    }

    Ok(RunOutcome {
        pod_name,
        instance_id,
    })
}

/// Scan configured registries for cached specs matching the bundle name.
/// Zero matches and multiple matches are both errors; the caller must
/// disambiguate duplicates with a registry filter, never by guessing.
fn find_target_spec<'a>(
    config: &'a ConfigData,
    bundle_name: &str,
    registry_filter: Option<&str>,
) -> Result<&'a BundleSpec, RunnerError> {
    let mut candidates = Vec::new();
    for registry in &config.registries {
        if let Some(filter) = registry_filter
            && registry.config.name != filter
        {
            continue;
        }
        for spec in &registry.specs {
            if spec.fq_name == bundle_name {
                println!(
                    "Found bundle [{bundle_name}] in registry [{}]",
                    registry.config.name
                );
                candidates.push(spec);
            }
        }
    }

    match candidates.len() {
        0 => Err(RunnerError::NotFound(match registry_filter {
            Some(filter) => {
                format!("failed to find bundle [{bundle_name}] in registry [{filter}]")
            }
            None => format!("failed to find bundle [{bundle_name}] in configured registries"),
        })),
        1 => Ok(candidates[0]),
        _ => Err(RunnerError::Ambiguous(format!(
            "found multiple bundles with matching name [{bundle_name}]. \
             Specify a registry with --registry"
        ))),
    }
}

/// Poll until the pod's log stream opens, then copy it to stdout. Bounded;
/// giving up is reported but does not fail the run, which already launched.
fn follow_logs(cluster: &dyn ClusterClient, pod_name: &str, namespace: &str, action: Action) {
    let mut stream: Option<Box<dyn Read + Send>> = None;
    for _ in 0..LOG_POLL_ATTEMPTS {
        match cluster.open_log_stream(pod_name, namespace) {
            Ok(opened) => {
                println!("Pod started. Reading logs...");
                stream = Some(opened);
                break;
            }
            Err(err) => {
                println!("Waiting for {action} pod [{pod_name}] to start...");
                debug!(error = %err, "log stream not ready");
                std::thread::sleep(LOG_POLL_DELAY);
            }
        }
    }
    let Some(mut stream) = stream else {
        warn!(pod = pod_name, "gave up waiting for pod log stream");
        return;
    };

    println!("-+- ---------------------- -+-");
    println!(" |        BUNDLE LOGS       | ");
    println!("-+- ---------------------- -+-");
    if let Err(err) = std::io::copy(&mut stream, &mut std::io::stdout()) {
        warn!(error = %err, "log stream ended with error");
    }
}
