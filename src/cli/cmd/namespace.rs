//! `astra set namespace` and `astra create namespace`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::infrastructure::constants::NAMESPACE_WAIT_TIMEOUT_SECS;
use crate::infrastructure::kubernetes::kubeconfig::{kubeconfig_path, KubeconfigFile};
use crate::shared::error::AstraError;
use crate::shared::retry::poll_until;
use clap::{Args, Subcommand};
use std::path::Path;
use std::time::Duration;

const ACTIVE_PHASE: &str = "Active";

/// Make `namespace` the namespace of the current kubeconfig context.
fn switch_namespace(kubeconfig: &Path, namespace: &str) -> anyhow::Result<()> {
    let mut file = KubeconfigFile::load(kubeconfig)?;
    file.set_namespace(namespace)?;
    file.save()?;
    Ok(())
}

#[derive(Args, Debug, Clone)]
pub struct SetCommand {
    #[command(subcommand)]
    pub subcommand: SetSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SetSubcommand {
    /// Set the current namespace
    #[command(alias = "project")]
    Namespace(SetNamespaceCommand),
}

impl SetCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            SetSubcommand::Namespace(cmd) => Box::new(cmd),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SetNamespaceCommand {
    /// Namespace to switch to
    pub name: String,
}

impl SetNamespaceCommand {
    async fn set(&self, ctx: &CommandContext, kubeconfig: &Path) -> anyhow::Result<()> {
        if let Some(kube) = ctx.clients.kube_ref() {
            if kube.namespace_phase(&self.name).await?.is_none() {
                return Err(AstraError::not_found("namespace", &self.name, "").into());
            }
        }
        switch_namespace(kubeconfig, &self.name)
    }
}

#[async_trait::async_trait]
impl Runnable for SetNamespaceCommand {
    fn name(&self) -> &'static str {
        "set namespace"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::KubernetesNullable]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        self.set(ctx, &kubeconfig_path()?).await?;
        ui::success(format!("Current active namespace set to {:?}", self.name));
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct CreateCommand {
    #[command(subcommand)]
    pub subcommand: CreateSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CreateSubcommand {
    /// Create a namespace and switch to it
    #[command(alias = "project")]
    Namespace(CreateNamespaceCommand),
}

impl CreateCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            CreateSubcommand::Namespace(cmd) => Box::new(cmd),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CreateNamespaceCommand {
    /// Name of the namespace to create
    pub name: String,

    /// Wait until the namespace is ready
    #[arg(short, long)]
    pub wait: bool,
}

impl CreateNamespaceCommand {
    async fn create(&self, ctx: &CommandContext, kubeconfig: &Path) -> anyhow::Result<()> {
        let kube = ctx.clients.kube()?;
        kube.create_namespace(&self.name).await?;

        if self.wait {
            let kube = kube.as_ref();
            let name = self.name.as_str();
            poll_until(
                "namespace",
                Duration::from_secs(1),
                Duration::from_secs(NAMESPACE_WAIT_TIMEOUT_SECS),
                || async move {
                    Ok(kube.namespace_phase(name).await?.as_deref() == Some(ACTIVE_PHASE))
                },
            )
            .await?;
        }
        switch_namespace(kubeconfig, &self.name)
    }
}

#[async_trait::async_trait]
impl Runnable for CreateNamespaceCommand {
    fn name(&self) -> &'static str {
        "create namespace"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Kubernetes]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        self.create(ctx, &kubeconfig_path()?).await?;
        ui::success(format!("New namespace created and now using namespace: {}", self.name));
        Ok(())
    }
}
