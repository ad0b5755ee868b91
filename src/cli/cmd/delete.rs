//! `astra delete`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::domain::component::PodmanResources;
use crate::domain::exec::ExecTarget;
use crate::domain::labels::RunningMode;
use crate::infrastructure::constants::NAMESPACE_WAIT_TIMEOUT_SECS;
use crate::infrastructure::kubernetes::ResourceRef;
use crate::shared::error::AstraError;
use crate::shared::prompt;
use crate::shared::retry::poll_until;
use clap::{Args, Subcommand};
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    #[command(subcommand)]
    pub subcommand: DeleteSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DeleteSubcommand {
    /// Delete the resources of a component
    Component(DeleteComponentCommand),

    /// Delete a namespace
    #[command(alias = "project")]
    Namespace(DeleteNamespaceCommand),
}

impl DeleteCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            DeleteSubcommand::Component(cmd) => Box::new(cmd),
            DeleteSubcommand::Namespace(cmd) => Box::new(cmd),
        }
    }
}

/// Ask before deleting, unless forced.
fn confirmed(force: bool, question: &str) -> anyhow::Result<bool> {
    if force {
        return Ok(true);
    }
    if !prompt::is_interactive() {
        return Err(AstraError::validation("refusing to delete without confirmation, use --force").into());
    }
    Ok(prompt::proceed(question)?)
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteComponentCommand {
    /// Name of the component to delete, the devfile component otherwise
    #[arg(long)]
    pub name: Option<String>,

    /// Namespace of the named component
    #[arg(long)]
    pub namespace: Option<String>,

    /// Delete without asking
    #[arg(short, long)]
    pub force: bool,

    /// Wait for the resources to be gone
    #[arg(short, long)]
    pub wait: bool,

    /// Only delete what was created in this mode (dev or deploy)
    #[arg(long = "running-in")]
    pub running_in: Option<String>,
}

struct Targets {
    cluster: Vec<ResourceRef>,
    podman: PodmanResources,
}

impl DeleteComponentCommand {
    fn mode(&self) -> anyhow::Result<Option<RunningMode>> {
        Ok(self
            .running_in
            .as_deref()
            .map(RunningMode::from_flag)
            .transpose()?)
    }

    fn component<'a>(&'a self, ctx: &'a CommandContext) -> &'a str {
        self.name.as_deref().unwrap_or(&ctx.component_name)
    }

    async fn targets(&self, ctx: &CommandContext, namespace: &str) -> anyhow::Result<Targets> {
        let mode = self.mode()?;
        let component = self.component(ctx);
        let platforms = ctx.platforms(namespace).restrict(ctx.platform())?;
        let client = ctx.clients.delete_component()?;

        let cluster = if platforms.kube.is_some() {
            client
                .list_cluster_resources_to_delete(component, &ctx.app, namespace, mode)
                .await?
        } else {
            Vec::new()
        };
        let podman = match platforms.podman {
            Some(_) => match client.list_podman_resources_to_delete(component, &ctx.app, mode).await {
                Ok(found) => found,
                Err(e) if ctx.platform().is_none() => {
                    tracing::warn!("unable to list podman resources: {}", e);
                    PodmanResources::default()
                }
                Err(e) => return Err(e.into()),
            },
            None => PodmanResources::default(),
        };
        Ok(Targets { cluster, podman })
    }
}

#[async_trait::async_trait]
impl Runnable for DeleteComponentCommand {
    fn name(&self) -> &'static str {
        "delete component"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::DeleteComponent,
            Dependency::KubernetesNullable,
            Dependency::PodmanNullable,
        ]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn require_devfile(&self) -> bool {
        false
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        self.mode()?;
        if self.namespace.is_some() && self.name.is_none() {
            return Err(AstraError::validation("--namespace can be used only with --name").into());
        }
        if self.name.is_none() {
            ctx.devfile()?;
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let namespace = self.namespace.clone().unwrap_or_else(|| ctx.namespace.clone());
        let component = self.component(ctx).to_string();
        let targets = self.targets(ctx, &namespace).await?;

        if targets.cluster.is_empty() && targets.podman.is_empty() {
            ui::info(format!("No resource found for component {:?}", component));
            return Ok(());
        }

        ui::title("The following resources will be deleted");
        if !targets.cluster.is_empty() {
            ui::plain(format!("Namespace: {}", namespace));
            for resource in &targets.cluster {
                ui::plain(format!("  - {}: {}", resource.kind, resource.name));
            }
        }
        for pod in &targets.podman.pods {
            ui::plain(format!("  - podman pod: {}", pod));
        }
        for volume in &targets.podman.volumes {
            ui::plain(format!("  - podman volume: {}", volume));
        }

        let question = format!("Are you sure you want to delete {:?} and all its resources?", component);
        if !confirmed(self.force, &question)? {
            ui::error(format!("Aborting deletion of component {:?}", component));
            return Ok(());
        }

        let client = ctx.clients.delete_component()?;
        if let (None, Some(devfile)) = (&self.name, &ctx.devfile) {
            let target = ExecTarget {
                component: component.clone(),
                app: ctx.app.clone(),
                namespace: namespace.clone(),
            };
            client.execute_pre_stop_events(&devfile.data, &target).await?;
        }

        if !targets.cluster.is_empty() {
            let failed = client.delete_resources(&namespace, &targets.cluster, self.wait).await;
            if !failed.is_empty() {
                let names: Vec<String> = failed
                    .iter()
                    .map(|r| format!("{}/{}", r.kind, r.name))
                    .collect();
                return Err(AstraError::KubeError(format!(
                    "failed to delete resources: {}",
                    names.join(", ")
                ))
                .into());
            }
        }
        if !targets.podman.is_empty() {
            client.delete_podman_resources(&targets.podman).await?;
        }

        ui::success(format!("The component {:?} is successfully deleted", component));
        Ok(())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteNamespaceCommand {
    /// Name of the namespace to delete
    pub name: String,

    /// Delete without asking
    #[arg(short, long)]
    pub force: bool,

    /// Wait until the namespace is gone
    #[arg(short, long)]
    pub wait: bool,
}

#[async_trait::async_trait]
impl Runnable for DeleteNamespaceCommand {
    fn name(&self) -> &'static str {
        "delete namespace"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Kubernetes]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let kube = ctx.clients.kube()?;
        if kube.namespace_phase(&self.name).await?.is_none() {
            return Err(AstraError::not_found("namespace", &self.name, "").into());
        }

        let question = format!("Are you sure you want to delete namespace {:?}?", self.name);
        if !confirmed(self.force, &question)? {
            ui::error(format!("Aborting deletion of namespace {:?}", self.name));
            return Ok(());
        }

        kube.delete_namespace(&self.name).await?;
        if self.wait {
            let kube = kube.as_ref();
            let name = self.name.as_str();
            poll_until(
                "namespace deletion",
                Duration::from_secs(1),
                Duration::from_secs(NAMESPACE_WAIT_TIMEOUT_SECS),
                || async move { Ok(kube.namespace_phase(name).await?.is_none()) },
            )
            .await?;
            ui::success(format!("Namespace {:?} deleted", self.name));
        } else {
            ui::success(format!("Namespace {:?} will be deleted asynchronously", self.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::component::ComponentDeleter;
    use crate::domain::config::EnvConfig;
    use crate::domain::devfile::DevfileObj;
    use crate::domain::labels::get_labels;
    use crate::infrastructure::fake::FakeKube;
    use crate::infrastructure::kubernetes::KubernetesClient;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context(dir: &std::path::Path, kube: Arc<FakeKube>) -> CommandContext {
        std::fs::write(
            dir.join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        let deleter = ComponentDeleter::new(Some(kube.clone()), None, None);
        CommandContext {
            json: false,
            platform: Some("cluster".to_string()),
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir, &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default()
                .with_kube(kube)
                .with_delete_component(Arc::new(deleter)),
        }
    }

    fn resource(name: &str, mode: RunningMode) -> ResourceRef {
        ResourceRef {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: name.to_string(),
            labels: get_labels("my-api", "app", Some(mode), false),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_delete_only_requested_mode() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::default());
        kube.add_resources(vec![
            resource("my-api-app", RunningMode::Dev),
            resource("my-api-prod", RunningMode::Deploy),
        ]);
        let ctx = context(dir.path(), kube.clone());

        let mut cmd = DeleteComponentCommand {
            force: true,
            running_in: Some("deploy".to_string()),
            ..Default::default()
        };
        cmd.validate(&ctx).unwrap();
        cmd.run(&ctx).await.unwrap();

        let deleted: Vec<String> = kube.deleted().into_iter().map(|r| r.name).collect();
        assert_eq!(deleted, vec!["my-api-prod"]);
    }

    #[tokio::test]
    async fn test_delete_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::default());
        let ctx = context(dir.path(), kube.clone());
        let mut cmd = DeleteComponentCommand {
            name: Some("other".to_string()),
            force: true,
            ..Default::default()
        };
        cmd.run(&ctx).await.unwrap();
        assert!(kube.deleted().is_empty());
    }

    #[test]
    fn test_invalid_running_in() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakeKube::default()));
        let cmd = DeleteComponentCommand {
            running_in: Some("debug".to_string()),
            ..Default::default()
        };
        assert!(cmd.validate(&ctx).is_err());
    }

    #[tokio::test]
    async fn test_delete_namespace_and_wait() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::default());
        kube.create_namespace("scratch").await.unwrap();
        let ctx = context(dir.path(), kube.clone());

        let mut cmd = DeleteNamespaceCommand {
            name: "scratch".to_string(),
            force: true,
            wait: true,
        };
        cmd.run(&ctx).await.unwrap();
        assert_eq!(kube.namespace_phase("scratch").await.unwrap(), None);

        assert!(cmd.run(&ctx).await.is_err());
    }
}
