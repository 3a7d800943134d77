//! Cluster capability consumed by the execution orchestrator.
//!
//! The orchestrator only needs four operations: discover the current
//! namespace, provision a sandbox (service account + role binding), launch
//! the bundle pod, and open a log stream. `ClusterClient` keeps that surface
//! injectable; `KubectlClient` is the shipped implementation and shells out
//! to `kubectl`/`oc`.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::debug;

/// Lifecycle action carried out by a bundle run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Provision,
    Deprovision,
    Test,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Provision => "provision",
            Action::Deprovision => "deprovision",
            Action::Test => "test",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One launch of a bundle image. Created per execution and handed to the
/// cluster; the cluster owns the pod's lifecycle thereafter.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub pod_name: String,
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub action: Action,
    pub image: String,
    pub account: String,
    pub location: String,
    pub extra_vars: String,
}

pub trait ClusterClient {
    /// Namespace of the active cluster context, when one can be determined.
    fn current_namespace(&self) -> Option<String>;

    /// Provision a service account and role bindings for the run. Returns
    /// the account name and the namespace the pod will run in.
    fn create_sandbox(
        &self,
        name: &str,
        namespace: &str,
        targets: &[String],
        role: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(String, String)>;

    /// Launch the bundle pod described by `context`.
    fn launch_pod(&self, context: &ExecutionContext) -> Result<()>;

    /// Open a follow-mode log stream for a running pod. Fails while the pod
    /// has not started; callers poll.
    fn open_log_stream(&self, pod_name: &str, namespace: &str) -> Result<Box<dyn Read + Send>>;
}

/// `ClusterClient` backed by the `kubectl` binary.
pub struct KubectlClient {
    kubectl: PathBuf,
    kubeconfig: Option<PathBuf>,
}

impl KubectlClient {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        let kubectl = std::env::var_os("SBCLI_KUBECTL")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("kubectl"));
        Self { kubectl, kubeconfig }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.kubectl);
        if let Some(path) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(path);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self
            .command()
            .args(args)
            .output()
            .with_context(|| format!("failed to invoke {}", self.kubectl.display()))?;
        if !output.status.success() {
            return Err(anyhow!(
                "kubectl {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl ClusterClient for KubectlClient {
    fn current_namespace(&self) -> Option<String> {
        let output = self
            .run(&[
                "config",
                "view",
                "--minify",
                "--output",
                "jsonpath={..namespace}",
            ])
            .ok()?;
        let namespace = output.trim();
        if namespace.is_empty() {
            None
        } else {
            Some(namespace.to_string())
        }
    }

    fn create_sandbox(
        &self,
        name: &str,
        namespace: &str,
        targets: &[String],
        role: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(String, String)> {
        self.run(&["create", "serviceaccount", name, "--namespace", namespace])?;

        let mut label_args = vec![
            "label".to_string(),
            "serviceaccount".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        for (key, value) in labels {
            label_args.push(format!("{key}={value}"));
        }
        let label_refs: Vec<&str> = label_args.iter().map(String::as_str).collect();
        self.run(&label_refs)?;

        for target in targets {
            let binding = format!("{name}-{target}");
            let clusterrole = format!("--clusterrole={role}");
            let subject = format!("--serviceaccount={namespace}:{name}");
            self.run(&[
                "create",
                "rolebinding",
                &binding,
                &clusterrole,
                &subject,
                "--namespace",
                target,
            ])?;
        }

        debug!(account = name, namespace, role, "created sandbox");
        Ok((name.to_string(), namespace.to_string()))
    }

    fn launch_pod(&self, context: &ExecutionContext) -> Result<()> {
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": context.pod_name,
                "labels": context.labels,
            },
            "spec": {
                "containers": [{
                    "name": context.pod_name,
                    "image": context.image,
                    "args": [context.action.as_str(), "--extra-vars", context.extra_vars],
                    "env": [
                        {"name": "POD_NAME", "valueFrom": {"fieldRef": {"fieldPath": "metadata.name"}}},
                        {"name": "POD_NAMESPACE", "valueFrom": {"fieldRef": {"fieldPath": "metadata.namespace"}}},
                    ],
                    "imagePullPolicy": "Always",
                }],
                "restartPolicy": "Never",
                "serviceAccountName": context.account,
            },
        });

        let mut child = self
            .command()
            .args(["create", "--namespace", &context.location, "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to invoke {}", self.kubectl.display()))?;
        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| anyhow!("kubectl stdin unavailable"))?;
            serde_json::to_writer(stdin, &manifest)?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(anyhow!(
                "kubectl create pod failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    fn open_log_stream(&self, pod_name: &str, namespace: &str) -> Result<Box<dyn Read + Send>> {
        let phase = self.run(&[
            "get",
            "pod",
            pod_name,
            "--namespace",
            namespace,
            "--output",
            "jsonpath={.status.phase}",
        ])?;
        match phase.trim() {
            "Running" | "Succeeded" | "Failed" => {}
            other => return Err(anyhow!("pod [{pod_name}] not started (phase: {other})")),
        }

        let mut child = self
            .command()
            .args(["logs", "--follow", pod_name, "--namespace", namespace])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to invoke {}", self.kubectl.display()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("kubectl stdout unavailable"))?;
        Ok(Box::new(LogStream { child, stdout }))
    }
}

/// Keeps the `kubectl logs --follow` child alive for the life of the reader.
struct LogStream {
    child: Child,
    stdout: ChildStdout,
}

impl Read for LogStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
