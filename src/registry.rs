//! Registry configuration and the bundle-source capability.
//!
//! Remote scanners (dockerhub, quay, helm, local_openshift) are external
//! collaborators; this crate consumes them behind [`RegistryAdapter`] and
//! otherwise works from the specs cached in the configuration store. The one
//! built-in adapter reads bundle spec documents from a local directory, which
//! is enough for local workflows and tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bundle::BundleSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryType {
    Dockerhub,
    LocalOpenshift,
    Helm,
    Quay,
    LocalDir,
}

impl RegistryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryType::Dockerhub => "dockerhub",
            RegistryType::LocalOpenshift => "local_openshift",
            RegistryType::Helm => "helm",
            RegistryType::Quay => "quay",
            RegistryType::LocalDir => "local_dir",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "dockerhub" => Ok(RegistryType::Dockerhub),
            "local_openshift" => Ok(RegistryType::LocalOpenshift),
            "helm" => Ok(RegistryType::Helm),
            "quay" => Ok(RegistryType::Quay),
            "local_dir" => Ok(RegistryType::LocalDir),
            other => Err(anyhow!(
                "unrecognized registry type [{other}]; supported types are: \
                 dockerhub, local_openshift, helm, quay, local_dir"
            )),
        }
    }
}

/// Named, typed configuration for a bundle-image source. Unique by name
/// within the persisted configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub registry_type: RegistryType,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub white_list: Vec<String>,
    #[serde(default)]
    pub runner: Option<String>,
}

impl RegistryConfig {
    /// Preset configuration for a registry type; the caller applies name and
    /// flag overrides on top.
    pub fn preset(registry_type: RegistryType) -> Self {
        let base = RegistryConfig {
            name: String::new(),
            registry_type,
            url: String::new(),
            org: String::new(),
            tag: String::new(),
            namespaces: Vec::new(),
            white_list: vec![".*$".to_string()],
            runner: None,
        };
        match registry_type {
            RegistryType::Dockerhub => RegistryConfig {
                url: "docker.io".to_string(),
                org: "ansibleplaybookbundle".to_string(),
                ..base
            },
            RegistryType::LocalOpenshift => RegistryConfig {
                namespaces: vec!["openshift".to_string()],
                ..base
            },
            RegistryType::Helm => RegistryConfig {
                url: "https://kubernetes-charts.storage.googleapis.com".to_string(),
                runner: Some("docker.io/automationbroker/helm-runner:latest".to_string()),
                ..base
            },
            RegistryType::Quay => RegistryConfig {
                url: "http://quay.io".to_string(),
                org: "redhat".to_string(),
                ..base
            },
            RegistryType::LocalDir => base,
        }
    }

    /// Overlay explicitly supplied fields onto a preset.
    pub fn apply_overrides(&mut self, overrides: &RegistryOverrides) {
        if let Some(org) = &overrides.org {
            self.org = org.clone();
        }
        if let Some(url) = &overrides.url {
            self.url = url.clone();
        }
        if let Some(tag) = &overrides.tag {
            self.tag = tag.clone();
        }
        if !overrides.namespaces.is_empty() {
            self.namespaces = overrides.namespaces.clone();
        }
        if !overrides.white_list.is_empty() {
            self.white_list = overrides.white_list.clone();
        }
    }
}

/// Flag-supplied overrides for `registry add`.
#[derive(Clone, Debug, Default)]
pub struct RegistryOverrides {
    pub org: Option<String>,
    pub url: Option<String>,
    pub tag: Option<String>,
    pub namespaces: Vec<String>,
    pub white_list: Vec<String>,
}

/// A registry config together with the specs cached from its last scan.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    pub config: RegistryConfig,
    #[serde(default)]
    pub specs: Vec<BundleSpec>,
}

/// Capability that enumerates bundle specifications for one registry.
pub trait RegistryAdapter {
    fn registry_name(&self) -> &str;

    /// Returns the discovered specs and the number of images scanned.
    fn load_specs(&self) -> Result<(Vec<BundleSpec>, usize)>;
}

/// Look up the adapter for a registry config. Remote scanner types are
/// served by external adapters and cannot be refreshed from here.
pub fn adapter_for(config: &RegistryConfig) -> Result<Box<dyn RegistryAdapter>> {
    match config.registry_type {
        RegistryType::LocalDir => Ok(Box::new(LocalDirAdapter {
            name: config.name.clone(),
            root: PathBuf::from(&config.url),
            namespaces: config.namespaces.clone(),
            white_list: config.white_list.clone(),
        })),
        other => Err(anyhow!(
            "registry type [{other}] requires an external registry adapter; \
             only cached specs are available for [{}]",
            config.name
        )),
    }
}

/// Adapter that scans a directory of bundle spec JSON documents. The
/// configured `url` is the root directory; `namespaces` select
/// subdirectories to scan (all of the root when empty).
pub struct LocalDirAdapter {
    name: String,
    root: PathBuf,
    namespaces: Vec<String>,
    white_list: Vec<String>,
}

impl RegistryAdapter for LocalDirAdapter {
    fn registry_name(&self) -> &str {
        &self.name
    }

    fn load_specs(&self) -> Result<(Vec<BundleSpec>, usize)> {
        let mut dirs = Vec::new();
        if self.namespaces.is_empty() {
            dirs.push(self.root.clone());
        } else {
            for namespace in &self.namespaces {
                dirs.push(self.root.join(namespace));
            }
        }

        let mut specs = Vec::new();
        let mut scanned = 0;
        for dir in dirs {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("unable to read spec directory {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                scanned += 1;
                let spec = read_spec(&path)?;
                if whitelisted(&spec.fq_name, &self.white_list) {
                    specs.push(spec);
                } else {
                    debug!(name = %spec.fq_name, "spec filtered by whitelist");
                }
            }
        }
        Ok((specs, scanned))
    }
}

fn read_spec(path: &Path) -> Result<BundleSpec> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read spec file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("unable to parse spec file {}", path.display()))
}

/// Best-effort matching for the whitelist shapes the presets use (`.*$`,
/// `.*-apb$`, literal prefixes). An empty whitelist accepts everything.
pub fn whitelisted(name: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    patterns.iter().any(|pattern| {
        let pattern = pattern.strip_suffix('$').unwrap_or(pattern);
        match pattern.strip_prefix(".*") {
            Some("") => true,
            Some(suffix) => name.ends_with(suffix),
            None => pattern.is_empty() || name.starts_with(pattern),
        }
    })
}
