use std::sync::{Mutex, OnceLock};

use sbcli::bundle::BundleSpec;
use sbcli::instances::ProvisionedInstance;
use sbcli::registry::{Registry, RegistryConfig, RegistryType};
use sbcli::store::{self, ConfigData};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

#[test]
fn load_defaults_when_config_missing() {
    let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
    let temp = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("SBCLI_CONFIG_DIR", temp.path());
    }
    let data = store::load().unwrap();
    assert!(data.registries.is_empty());
    assert!(data.provisioned_instances.is_empty());
    assert_eq!(
        data.defaults.broker_namespace,
        "openshift-automation-service-broker"
    );
    unsafe {
        std::env::remove_var("SBCLI_CONFIG_DIR");
    }
}

#[test]
fn save_and_load_round_trip() {
    let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
    let temp = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("SBCLI_CONFIG_DIR", temp.path());
    }

    let mut config = RegistryConfig::preset(RegistryType::Dockerhub);
    config.name = "dockerhub".to_string();
    let data = ConfigData {
        registries: vec![Registry {
            config,
            specs: vec![BundleSpec {
                fq_name: "foo-apb".to_string(),
                image: "docker.io/example/foo-apb".to_string(),
                ..BundleSpec::default()
            }],
        }],
        provisioned_instances: vec![ProvisionedInstance {
            bundle_name: "foo-apb".to_string(),
            instance_ids: vec!["id-1".to_string()],
        }],
        ..ConfigData::default()
    };
    store::save(&data).unwrap();

    let loaded = store::load().unwrap();
    assert_eq!(loaded.registries.len(), 1);
    assert_eq!(loaded.registries[0].config.name, "dockerhub");
    assert_eq!(loaded.registries[0].specs[0].fq_name, "foo-apb");
    assert_eq!(loaded.provisioned_instances[0].instance_ids, vec!["id-1"]);

    unsafe {
        std::env::remove_var("SBCLI_CONFIG_DIR");
    }
}

#[test]
fn store_document_uses_original_key_names() {
    let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
    let temp = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("SBCLI_CONFIG_DIR", temp.path());
    }

    store::save(&ConfigData::default()).unwrap();
    let raw = std::fs::read_to_string(store::config_path().unwrap()).unwrap();
    let document: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(document.get("Registries").is_some());
    assert!(document.get("Defaults").is_some());
    assert!(document.get("ProvisionedInstances").is_some());

    unsafe {
        std::env::remove_var("SBCLI_CONFIG_DIR");
    }
}
