//! Command surface. Flags are parsed here and folded into explicit option
//! structs before any core logic runs; no module below this one reads CLI
//! state.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use crate::bundle::BundleSpec;
use crate::cluster::{Action, ClusterClient, KubectlClient};
use crate::instances;
use crate::logging;
use crate::prompt::{Prompt, TerminalPrompt};
use crate::registry::{self, Registry, RegistryConfig, RegistryOverrides, RegistryType};
use crate::runner::{RunOptions, RunnerError, run_bundle};
use crate::store;
use crate::table::{self, TableColumn};

#[derive(Parser)]
#[command(name = "sbcli")]
#[command(about = "Tool for working with service bundles", version)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase diagnostic log verbosity."
    )]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "List, inspect and execute service bundles")]
    Bundle(BundleCommand),
    #[command(about = "Alias of bundle list")]
    List(ListArgs),
    #[command(about = "Configure registry adapters")]
    Registry(RegistryCommand),
    #[command(about = "Set tool defaults")]
    Config,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        logging::init(self.verbose);
        match self.command {
            Command::Bundle(cmd) => cmd.run(),
            Command::List(args) => args.run(),
            Command::Registry(cmd) => cmd.run(),
            Command::Config => run_config(),
        }
    }
}

#[derive(Parser)]
struct BundleCommand {
    #[command(subcommand)]
    command: BundleSubcommand,
}

#[derive(Subcommand)]
enum BundleSubcommand {
    #[command(about = "List bundle images from the configured registries")]
    List(ListArgs),
    #[command(about = "Print metadata, plans, and params of a bundle image")]
    Info(InfoArgs),
    #[command(about = "Provision a bundle")]
    Provision(ExecArgs),
    #[command(about = "Deprovision a bundle")]
    Deprovision(ExecArgs),
    #[command(about = "Run a bundle's test action")]
    Test(ExecArgs),
}

impl BundleCommand {
    fn run(self) -> anyhow::Result<()> {
        match self.command {
            BundleSubcommand::List(args) => args.run(),
            BundleSubcommand::Info(args) => args.run(),
            BundleSubcommand::Provision(args) => args.run(Action::Provision),
            BundleSubcommand::Deprovision(args) => args.run(Action::Deprovision),
            BundleSubcommand::Test(args) => args.run(Action::Test),
        }
    }
}

#[derive(Parser)]
struct ListArgs {
    #[arg(short, long, help = "Re-scan registries instead of using cached specs.")]
    refresh: bool,
}

impl ListArgs {
    fn run(self) -> anyhow::Result<()> {
        let mut data = store::load()?;
        for registry in &mut data.registries {
            if !registry.specs.is_empty() && !self.refresh {
                println!(
                    "Found specs already in registry: [{}]",
                    registry.config.name
                );
                continue;
            }
            println!("Getting specs for registry: [{}]", registry.config.name);
            match load_registry_specs(registry) {
                Ok(specs) => registry.specs = specs,
                Err(err) => {
                    println!("Error getting images - {err}");
                    continue;
                }
            }
        }
        print_registry_specs(&data.registries);
        store::save(&data)?;
        Ok(())
    }
}

fn load_registry_specs(registry: &Registry) -> anyhow::Result<Vec<BundleSpec>> {
    let adapter = registry::adapter_for(&registry.config)?;
    let (specs, scanned) = adapter.load_specs()?;
    info!(
        "Registry {} has {} valid bundles available from {} images scanned",
        adapter.registry_name(),
        specs.len(),
        scanned
    );
    Ok(specs)
}

fn print_registry_specs(registries: &[Registry]) {
    let mut name = TableColumn::new("BUNDLE");
    let mut image = TableColumn::new("IMAGE");
    let mut registry_name = TableColumn::new("REGISTRY");
    for registry in registries {
        for spec in &registry.specs {
            name.push(spec.fq_name.clone());
            image.push(spec.image.clone());
            registry_name.push(registry.config.name.clone());
        }
    }
    table::print(&[name, image, registry_name]);
}

#[derive(Parser)]
struct InfoArgs {
    #[arg(help = "Fully-qualified bundle name.")]
    name: String,
    #[arg(short, long, help = "Registry to retrieve bundle info from.")]
    registry: Option<String>,
}

impl InfoArgs {
    fn run(self) -> anyhow::Result<()> {
        let data = store::load()?;
        let mut matches = Vec::new();
        for registry in &data.registries {
            if let Some(filter) = &self.registry
                && &registry.config.name != filter
            {
                continue;
            }
            for spec in &registry.specs {
                if spec.fq_name == self.name {
                    println!(
                        "Found bundle [{}] in registry: [{}]",
                        self.name, registry.config.name
                    );
                    matches.push(spec);
                }
            }
        }

        match matches.len() {
            0 => bail!("no bundles found with name [{}]", self.name),
            1 => {
                println!();
                print_bundle_info(matches[0]);
                Ok(())
            }
            _ => bail!(
                "found multiple bundles matching name [{}]. Specify a registry with -r or --registry",
                self.name
            ),
        }
    }
}

fn print_bundle_info(spec: &BundleSpec) {
    println!(" {:<11}  |  {}", "NAME", spec.fq_name);
    println!(" {:<11}  |  {}", "DESCRIPTION", spec.description);
    println!(" {:<11}  |  {}", "IMAGE", spec.image);
    println!(" {:<11}  |  {}", "ASYNC BIND", spec.async_bind);
    println!(" {:<11}  |  {}", "BINDABLE", spec.bindable);
    println!(" {:<11}  |  {}", "VERSION", spec.version);
    println!(" {:<11}  |  {}", "RUNTIME", spec.runtime);
    println!(" {:<11}  | ", "");
    for (index, plan) in spec.plans.iter().enumerate() {
        println!(" {:<11}  |  {}", "PLAN", plan.name);
        for param in &plan.parameters {
            println!("   {:<9}  |    {}", "param", param.name);
        }
        if index < spec.plans.len() - 1 {
            println!(" {:<11}  | ", "");
        }
    }
    println!();
}

#[derive(Parser)]
struct ExecArgs {
    #[arg(help = "Fully-qualified bundle name.")]
    name: String,
    #[arg(short, long, help = "Namespace to run the bundle in.")]
    namespace: Option<String>,
    #[arg(
        short,
        long,
        default_value = "edit",
        help = "ClusterRole applied to the bundle sandbox."
    )]
    role: String,
    #[arg(long, help = "Registry to load the bundle from.")]
    registry: Option<String>,
    #[arg(short, long, help = "Print logs from the bundle pod.")]
    follow: bool,
    #[arg(short, long, help = "Don't prompt for parameters.")]
    skip_params: bool,
    #[arg(short, long, help = "Path to kubeconfig to use.")]
    kubeconfig: Option<PathBuf>,
}

impl ExecArgs {
    fn run(self, action: Action) -> anyhow::Result<()> {
        let cluster = KubectlClient::new(self.kubeconfig.clone());
        let namespace = match self.namespace.clone() {
            Some(namespace) => namespace,
            None => cluster.current_namespace().ok_or_else(|| {
                anyhow!("failed to get current namespace. Try supplying it with --namespace")
            })?,
        };
        info!(
            "Running bundle [{}] with action [{}] in namespace [{}].",
            self.name, action, namespace
        );

        let opts = RunOptions {
            action,
            namespace: namespace.clone(),
            bundle_name: self.name.clone(),
            sandbox_role: self.role.clone(),
            registry_filter: self.registry.clone(),
            follow_logs: self.follow,
            skip_params: self.skip_params,
        };

        let mut data = store::load()?;
        let mut prompt = TerminalPrompt;
        let outcome = match run_bundle(&opts, &data, &cluster, &mut prompt) {
            Ok(outcome) => outcome,
            Err(err @ RunnerError::Sandbox(_)) => {
                println!(
                    "\nProblem creating sandbox to run bundle. \
                     Did you run `oc new-project {namespace}` first?\n"
                );
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        match action {
            Action::Provision => {
                instances::record_instance(
                    &mut data.provisioned_instances,
                    &self.name,
                    &outcome.instance_id,
                );
                store::save(&data)?;
            }
            Action::Deprovision => {
                instances::forget_instance(
                    &mut data.provisioned_instances,
                    &self.name,
                    &outcome.instance_id,
                );
                store::save(&data)?;
            }
            Action::Test => {}
        }
        Ok(())
    }
}

#[derive(Parser)]
struct RegistryCommand {
    #[command(subcommand)]
    command: RegistrySubcommand,
}

#[derive(Subcommand)]
enum RegistrySubcommand {
    #[command(about = "Add a new registry adapter")]
    Add(RegistryAddArgs),
    #[command(about = "List the configured registry adapters")]
    List,
    #[command(about = "Remove a registry adapter")]
    Remove(RegistryRemoveArgs),
}

impl RegistryCommand {
    fn run(self) -> anyhow::Result<()> {
        match self.command {
            RegistrySubcommand::Add(args) => args.run(),
            RegistrySubcommand::List => run_registry_list(),
            RegistrySubcommand::Remove(args) => args.run(),
        }
    }
}

#[derive(Parser)]
struct RegistryAddArgs {
    #[arg(help = "Name for the new registry.")]
    name: String,
    #[arg(
        short = 't',
        long = "type",
        default_value = "dockerhub",
        help = "Registry type (dockerhub, local_openshift, helm, quay, local_dir)."
    )]
    registry_type: String,
    #[arg(long, help = "Organization to search (e.g. 'ansibleplaybookbundle').")]
    org: Option<String>,
    #[arg(long, help = "Registry URL (e.g. docker.io), or directory for local_dir.")]
    url: Option<String>,
    #[arg(long, help = "Tag of images in the registry (e.g. 'latest').")]
    tag: Option<String>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Namespaces to search (e.g. 'openshift,my-project')."
    )]
    namespaces: Vec<String>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Patterns for filtering registry contents (e.g. '.*-apb$')."
    )]
    whitelist: Vec<String>,
}

impl RegistryAddArgs {
    fn run(self) -> anyhow::Result<()> {
        let registry_type = RegistryType::from_str(&self.registry_type)?;
        let mut config = RegistryConfig::preset(registry_type);
        config.name = self.name.clone();
        config.apply_overrides(&RegistryOverrides {
            org: self.org,
            url: self.url,
            tag: self.tag,
            namespaces: self.namespaces,
            white_list: self.whitelist,
        });

        let mut data = store::load()?;
        if data
            .registries
            .iter()
            .any(|registry| registry.config.name == self.name)
        {
            bail!(
                "error adding registry [{}], found registry with conflicting name. \
                 Try specifying a different name",
                self.name
            );
        }

        let mut registry = Registry {
            config,
            specs: Vec::new(),
        };
        // Refresh is best-effort: remote types have no built-in adapter and
        // keep an empty cache until one scans them.
        match load_registry_specs(&registry) {
            Ok(specs) => registry.specs = specs,
            Err(err) => println!("Added registry without specs: {err}"),
        }
        data.registries.push(registry);
        store::save(&data)?;
        println!("Successfully added registry [{}]", self.name);
        Ok(())
    }
}

fn run_registry_list() -> anyhow::Result<()> {
    let data = store::load()?;
    if data.registries.is_empty() {
        println!("Found no registries in configuration. Try `sbcli registry add`.");
        return Ok(());
    }
    println!("Found registries already in config:");
    let mut name = TableColumn::new("NAME");
    let mut registry_type = TableColumn::new("TYPE");
    let mut org = TableColumn::new("ORG");
    let mut url = TableColumn::new("URL");
    for registry in &data.registries {
        name.push(registry.config.name.clone());
        registry_type.push(registry.config.registry_type.to_string());
        org.push(registry.config.org.clone());
        url.push(registry.config.url.clone());
    }
    table::print(&[name, registry_type, org, url]);
    Ok(())
}

#[derive(Parser)]
struct RegistryRemoveArgs {
    #[arg(help = "Name of the registry to remove.")]
    name: String,
}

impl RegistryRemoveArgs {
    fn run(self) -> anyhow::Result<()> {
        let mut data = store::load()?;
        let before = data.registries.len();
        data.registries
            .retain(|registry| registry.config.name != self.name);
        if data.registries.len() == before {
            bail!(
                "failed to remove registry [{}]. Check the spelling and try again",
                self.name
            );
        }
        println!("Found registry [{}]. Removing from list.", self.name);
        store::save(&data)?;
        Ok(())
    }
}

fn run_config() -> anyhow::Result<()> {
    let mut data = store::load()?;
    let mut prompt = TerminalPrompt;
    data.defaults.broker_namespace = ask_with_default(
        &mut prompt,
        "Broker namespace",
        &data.defaults.broker_namespace,
    )?;
    data.defaults.broker_route_name = ask_with_default(
        &mut prompt,
        "Broker route name",
        &data.defaults.broker_route_name,
    )?;
    data.defaults.cluster_service_broker_name = ask_with_default(
        &mut prompt,
        "Cluster service broker name",
        &data.defaults.cluster_service_broker_name,
    )?;
    data.defaults.broker_route_suffix = ask_with_default(
        &mut prompt,
        "Broker route suffix",
        &data.defaults.broker_route_suffix,
    )?;
    store::save(&data).context("unable to save defaults")?;
    println!("Saved defaults to {}", store::config_path()?.display());
    Ok(())
}

fn ask_with_default(prompt: &mut dyn Prompt, label: &str, current: &str) -> anyhow::Result<String> {
    let answer = prompt.text(&format!("{label} [{current}]: "))?;
    if answer.is_empty() {
        Ok(current.to_string())
    } else {
        Ok(answer)
    }
}
