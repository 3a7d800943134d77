//! Persisted configuration store: one JSON document holding registries with
//! their cached specs, broker-interaction defaults, and provisioned-instance
//! records.
//!
//! The document is read wholesale at the start of a command and written back
//! wholesale by mutating commands. Single-writer, single-process usage is
//! assumed; there is no locking against concurrent mutation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::instances::ProvisionedInstance;
use crate::registry::Registry;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(rename = "Registries", default)]
    pub registries: Vec<Registry>,
    #[serde(rename = "Defaults", default)]
    pub defaults: DefaultSettings,
    #[serde(rename = "ProvisionedInstances", default)]
    pub provisioned_instances: Vec<ProvisionedInstance>,
}

/// Defaults for broker interaction. Kept in the store so sibling commands
/// share them; the execution workflow itself does not read these.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultSettings {
    pub broker_namespace: String,
    pub broker_resource_url: String,
    pub broker_route_name: String,
    pub cluster_service_broker_name: String,
    #[serde(default)]
    pub broker_route_suffix: String,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        DefaultSettings {
            broker_namespace: "openshift-automation-service-broker".to_string(),
            broker_resource_url: "/apis/servicecatalog.k8s.io/v1beta1/clusterservicebrokers/"
                .to_string(),
            broker_route_name: "openshift-automation-service-broker".to_string(),
            cluster_service_broker_name: "openshift-automation-service-broker".to_string(),
            broker_route_suffix: String::new(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(value) = std::env::var("SBCLI_CONFIG_DIR") {
        return Ok(Path::new(&value).join("sbcli.json"));
    }
    let dirs = ProjectDirs::from("", "sbcli", "sbcli")
        .ok_or_else(|| anyhow::anyhow!("unable to determine config directory"))?;
    Ok(dirs.config_dir().join("sbcli.json"))
}

pub fn load() -> Result<ConfigData> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(ConfigData::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("unable to read config {}", path.display()))?;
    let data: ConfigData = serde_json::from_str(&contents)
        .with_context(|| format!("unable to parse config {}", path.display()))?;
    Ok(data)
}

pub fn save(data: &ConfigData) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(data)?;
    std::fs::write(&path, contents)
        .with_context(|| format!("unable to write config {}", path.display()))?;
    Ok(())
}
