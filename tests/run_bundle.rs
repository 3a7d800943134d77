use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use sbcli::bundle::{BundleSpec, ParamType, ParameterDescriptor, Plan};
use sbcli::cluster::{Action, ClusterClient, ExecutionContext};
use sbcli::instances::ProvisionedInstance;
use sbcli::prompt::ScriptedPrompt;
use sbcli::registry::{Registry, RegistryConfig, RegistryType};
use sbcli::runner::{RunOptions, RunnerError, run_bundle};
use sbcli::store::ConfigData;

#[derive(Default)]
struct FakeCluster {
    sandbox_fails: bool,
    sandboxes: Mutex<Vec<String>>,
    launched: Mutex<Vec<ExecutionContext>>,
}

impl ClusterClient for FakeCluster {
    fn current_namespace(&self) -> Option<String> {
        Some("default".to_string())
    }

    fn create_sandbox(
        &self,
        name: &str,
        namespace: &str,
        _targets: &[String],
        _role: &str,
        _labels: &BTreeMap<String, String>,
    ) -> Result<(String, String)> {
        if self.sandbox_fails {
            return Err(anyhow!("namespace not found"));
        }
        self.sandboxes.lock().unwrap().push(name.to_string());
        Ok((name.to_string(), namespace.to_string()))
    }

    fn launch_pod(&self, context: &ExecutionContext) -> Result<()> {
        self.launched.lock().unwrap().push(context.clone());
        Ok(())
    }

    fn open_log_stream(&self, _pod_name: &str, _namespace: &str) -> Result<Box<dyn Read + Send>> {
        Err(anyhow!("no logs in tests"))
    }
}

fn spec_named(fq_name: &str, plans: Vec<Plan>) -> BundleSpec {
    BundleSpec {
        fq_name: fq_name.to_string(),
        image: format!("docker.io/example/{fq_name}:latest"),
        plans,
        ..BundleSpec::default()
    }
}

fn default_plan() -> Plan {
    Plan {
        name: "default".to_string(),
        ..Plan::default()
    }
}

fn registry_with_specs(name: &str, specs: Vec<BundleSpec>) -> Registry {
    let mut config = RegistryConfig::preset(RegistryType::Dockerhub);
    config.name = name.to_string();
    Registry { config, specs }
}

fn options(action: Action, bundle_name: &str) -> RunOptions {
    RunOptions {
        action,
        namespace: "myns".to_string(),
        bundle_name: bundle_name.to_string(),
        sandbox_role: "edit".to_string(),
        registry_filter: None,
        follow_logs: false,
        skip_params: false,
    }
}

#[test]
fn provision_launches_pod_with_injected_extra_vars() {
    let config = ConfigData {
        registries: vec![registry_with_specs(
            "dockerhub",
            vec![spec_named("foo-apb", vec![default_plan()])],
        )],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    let mut prompt = ScriptedPrompt::default();

    let outcome = run_bundle(
        &options(Action::Provision, "foo-apb"),
        &config,
        &cluster,
        &mut prompt,
    )
    .unwrap();

    assert!(outcome.pod_name.starts_with("bundle-provision-"));
    let launched = cluster.launched.lock().unwrap();
    assert_eq!(launched.len(), 1);
    let context = &launched[0];
    assert_eq!(context.action, Action::Provision);
    assert_eq!(context.image, "docker.io/example/foo-apb:latest");
    assert_eq!(context.labels["bundle-fqname"], "foo-apb");
    assert_eq!(context.labels["bundle-action"], "provision");
    assert_eq!(context.labels["bundle-pod-name"], outcome.pod_name);

    let vars: serde_json::Value = serde_json::from_str(&context.extra_vars).unwrap();
    assert_eq!(vars["namespace"], "myns");
    assert_eq!(vars["cluster"], "openshift");
    assert_eq!(vars["_apb_plan_id"], "default");
    assert_eq!(vars["_apb_service_instance_id"], outcome.instance_id.as_str());
}

#[test]
fn duplicate_name_across_registries_requires_registry_filter() {
    let config = ConfigData {
        registries: vec![
            registry_with_specs("dockerhub", vec![spec_named("foo-apb", vec![default_plan()])]),
            registry_with_specs("quay", vec![spec_named("foo-apb", vec![default_plan()])]),
        ],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    let mut prompt = ScriptedPrompt::default();

    let err = run_bundle(
        &options(Action::Provision, "foo-apb"),
        &config,
        &cluster,
        &mut prompt,
    )
    .unwrap_err();

    match err {
        RunnerError::Ambiguous(message) => assert!(message.contains("--registry")),
        other => panic!("expected Ambiguous, got {other:?}"),
    }
    assert!(cluster.launched.lock().unwrap().is_empty());
}

#[test]
fn registry_filter_disambiguates_duplicates() {
    let config = ConfigData {
        registries: vec![
            registry_with_specs("dockerhub", vec![spec_named("foo-apb", vec![default_plan()])]),
            registry_with_specs("quay", vec![spec_named("foo-apb", vec![default_plan()])]),
        ],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    let mut prompt = ScriptedPrompt::default();
    let mut opts = options(Action::Provision, "foo-apb");
    opts.registry_filter = Some("quay".to_string());

    run_bundle(&opts, &config, &cluster, &mut prompt).unwrap();
    assert_eq!(cluster.launched.lock().unwrap().len(), 1);
}

#[test]
fn missing_bundle_distinguishes_named_registry() {
    let config = ConfigData {
        registries: vec![registry_with_specs("dockerhub", vec![])],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    let mut prompt = ScriptedPrompt::default();

    let err = run_bundle(
        &options(Action::Provision, "ghost-apb"),
        &config,
        &cluster,
        &mut prompt,
    )
    .unwrap_err();
    match err {
        RunnerError::NotFound(message) => assert!(message.contains("configured registries")),
        other => panic!("expected NotFound, got {other:?}"),
    }

    let mut opts = options(Action::Provision, "ghost-apb");
    opts.registry_filter = Some("dockerhub".to_string());
    let err = run_bundle(&opts, &config, &cluster, &mut prompt).unwrap_err();
    match err {
        RunnerError::NotFound(message) => assert!(message.contains("[dockerhub]")),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn deprovision_selection_carries_id_into_extra_vars() {
    let config = ConfigData {
        registries: vec![registry_with_specs(
            "dockerhub",
            vec![spec_named("foo-apb", vec![default_plan()])],
        )],
        provisioned_instances: vec![ProvisionedInstance {
            bundle_name: "foo-apb".to_string(),
            instance_ids: vec!["first-id".to_string(), "second-id".to_string()],
        }],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    // Index selection happens before any parameter prompts.
    let mut prompt = ScriptedPrompt::new(["0"]);
    let mut opts = options(Action::Deprovision, "foo-apb");
    opts.skip_params = true;

    let outcome = run_bundle(&opts, &config, &cluster, &mut prompt).unwrap();
    assert_eq!(outcome.instance_id, "first-id");
    assert_eq!(outcome.pod_name, "bundle-deprovision-first-id");

    let launched = cluster.launched.lock().unwrap();
    let vars: serde_json::Value = serde_json::from_str(&launched[0].extra_vars).unwrap();
    assert_eq!(vars["_apb_service_instance_id"], "first-id");
    assert_eq!(vars["_apb_service_class_id"], "first-id");
}

#[test]
fn deprovision_without_instances_is_not_found() {
    let config = ConfigData {
        registries: vec![registry_with_specs(
            "dockerhub",
            vec![spec_named("foo-apb", vec![default_plan()])],
        )],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    let mut prompt = ScriptedPrompt::default();

    let err = run_bundle(
        &options(Action::Deprovision, "foo-apb"),
        &config,
        &cluster,
        &mut prompt,
    )
    .unwrap_err();
    assert!(matches!(err, RunnerError::NotFound(_)));
}

#[test]
fn sandbox_failure_is_fatal_and_skips_launch() {
    let config = ConfigData {
        registries: vec![registry_with_specs(
            "dockerhub",
            vec![spec_named("foo-apb", vec![default_plan()])],
        )],
        ..ConfigData::default()
    };
    let cluster = FakeCluster {
        sandbox_fails: true,
        ..FakeCluster::default()
    };
    let mut prompt = ScriptedPrompt::default();

    let err = run_bundle(
        &options(Action::Provision, "foo-apb"),
        &config,
        &cluster,
        &mut prompt,
    )
    .unwrap_err();
    assert!(matches!(err, RunnerError::Sandbox(_)));
    assert!(cluster.launched.lock().unwrap().is_empty());
}

#[test]
fn plan_and_parameters_flow_through_prompts() {
    let plan_a = Plan {
        name: "dev".to_string(),
        ..Plan::default()
    };
    let plan_b = Plan {
        name: "prod".to_string(),
        parameters: vec![ParameterDescriptor {
            name: "replicas".to_string(),
            param_type: ParamType::Integer,
            required: true,
            ..ParameterDescriptor::default()
        }],
        ..Plan::default()
    };
    let config = ConfigData {
        registries: vec![registry_with_specs(
            "dockerhub",
            vec![spec_named("multi-apb", vec![plan_a, plan_b])],
        )],
        ..ConfigData::default()
    };
    let cluster = FakeCluster::default();
    // Bad plan name, then the real one; bad integer, then a valid value.
    let mut prompt = ScriptedPrompt::new(["staging", "prod", "lots", "3"]);

    run_bundle(
        &options(Action::Provision, "multi-apb"),
        &config,
        &cluster,
        &mut prompt,
    )
    .unwrap();

    let launched = cluster.launched.lock().unwrap();
    let vars: serde_json::Value = serde_json::from_str(&launched[0].extra_vars).unwrap();
    assert_eq!(vars["_apb_plan_id"], "prod");
    assert_eq!(vars["replicas"], 3);
}
