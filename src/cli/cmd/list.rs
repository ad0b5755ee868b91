//! `astra list`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::display::TableRenderer;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::cli::ui;
use crate::domain::api::{Namespace, ResourcesList, ServiceBinding};
use crate::domain::component::list_all_components;
use clap::{Args, Subcommand};
use serde_json::json;

#[derive(Args, Debug, Clone, Default)]
pub struct ListCommand {
    #[command(subcommand)]
    pub subcommand: Option<ListSubcommand>,

    /// Namespace to list the components and bindings of
    #[arg(long)]
    pub namespace: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ListSubcommand {
    /// List all components in the current namespace
    Component(ListComponentCommand),

    /// List all the namespaces
    #[command(alias = "project")]
    Namespace(ListNamespaceCommand),

    /// List bindings
    Binding(ListBindingCommand),
}

impl ListCommand {
    pub fn into_runnable(self) -> Box<dyn crate::cli::runner::Runnable> {
        match self.subcommand {
            Some(ListSubcommand::Component(cmd)) => Box::new(cmd),
            Some(ListSubcommand::Namespace(cmd)) => Box::new(cmd),
            Some(ListSubcommand::Binding(cmd)) => Box::new(cmd),
            None => Box::new(ListAllCommand {
                namespace: self.namespace,
            }),
        }
    }
}

fn namespace_of(flag: &Option<String>, ctx: &CommandContext) -> String {
    flag.clone().unwrap_or_else(|| ctx.namespace.clone())
}

/// Components on the selected platforms, with the devfile component.
pub(crate) async fn list_components(
    ctx: &CommandContext,
    namespace: &str,
) -> anyhow::Result<ResourcesList> {
    let platforms = ctx.platforms(namespace).restrict(ctx.platform())?;
    let devfile_component = ctx.devfile.as_ref().map(|devfile| {
        (
            ctx.component_name.as_str(),
            devfile.data.metadata.project_type.as_deref().unwrap_or_default(),
        )
    });
    Ok(list_all_components(devfile_component, platforms.kube, platforms.podman).await?)
}

/// Bindings of the devfile, then those only found in the namespace.
///
/// Returns the names declared in the devfile as well. A devfile binding also
/// found on the cluster takes the cluster status.
pub(crate) async fn list_bindings(
    ctx: &CommandContext,
    namespace: &str,
) -> anyhow::Result<(Vec<String>, Vec<ServiceBinding>)> {
    let client = ctx.clients.binding()?;
    let mut bindings = match &ctx.devfile {
        Some(devfile) => client.bindings_from_devfile(devfile)?,
        None => Vec::new(),
    };
    let in_devfile: Vec<String> = bindings.iter().map(|b| b.name.clone()).collect();

    if ctx.clients.kube_ref().is_some() {
        for found in client.bindings_from_cluster(namespace).await? {
            match bindings.iter_mut().find(|b| b.name == found.name) {
                Some(existing) => existing.status = found.status,
                None => bindings.push(found),
            }
        }
    }
    Ok((in_devfile, bindings))
}

pub struct ListAllCommand {
    namespace: Option<String>,
}

impl ListAllCommand {
    async fn resources(&self, ctx: &CommandContext) -> anyhow::Result<ResourcesList> {
        let namespace = namespace_of(&self.namespace, ctx);
        let mut list = list_components(ctx, &namespace).await?;
        let (in_devfile, bindings) = list_bindings(ctx, &namespace).await?;
        list.bindings_in_devfile = in_devfile;
        list.bindings = bindings;
        Ok(list)
    }
}

#[async_trait::async_trait]
impl Runnable for ListAllCommand {
    fn name(&self) -> &'static str {
        "list"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::KubernetesNullable,
            Dependency::PodmanNullable,
            Dependency::Binding,
        ]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn require_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let list = self.resources(ctx).await?;
        let renderer = TableRenderer::new();
        ui::title("Components");
        ui::plain(renderer.render_components(&list));
        ui::plain("");
        ui::title("Bindings");
        ui::plain(renderer.render_bindings(&list.bindings_in_devfile, &list.bindings));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for ListAllCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(self.resources(ctx).await?)?)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListComponentCommand {
    /// Namespace to list the components of
    #[arg(long)]
    pub namespace: Option<String>,
}

#[async_trait::async_trait]
impl Runnable for ListComponentCommand {
    fn name(&self) -> &'static str {
        "list component"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::KubernetesNullable, Dependency::PodmanNullable]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn require_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let list = list_components(ctx, &namespace_of(&self.namespace, ctx)).await?;
        ui::plain(TableRenderer::new().render_components(&list));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for ListComponentCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let list = list_components(ctx, &namespace_of(&self.namespace, ctx)).await?;
        Ok(serde_json::to_value(list)?)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListNamespaceCommand {}

impl ListNamespaceCommand {
    async fn namespaces(&self, ctx: &CommandContext) -> anyhow::Result<Vec<Namespace>> {
        let kube = ctx.clients.kube()?;
        let current = kube.current_namespace().to_string();
        let mut names = kube.list_namespaces().await?;
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| Namespace {
                active: name == current,
                name,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl Runnable for ListNamespaceCommand {
    fn name(&self) -> &'static str {
        "list namespace"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Kubernetes]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let namespaces = self.namespaces(ctx).await?;
        ui::plain(TableRenderer::new().render_namespaces(&namespaces));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for ListNamespaceCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(self.namespaces(ctx).await?)?)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListBindingCommand {
    /// Namespace to list the bindings of
    #[arg(long)]
    pub namespace: Option<String>,
}

#[async_trait::async_trait]
impl Runnable for ListBindingCommand {
    fn name(&self) -> &'static str {
        "list binding"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Binding]
    }

    fn require_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let (in_devfile, bindings) = list_bindings(ctx, &namespace_of(&self.namespace, ctx)).await?;
        ui::plain(TableRenderer::new().render_bindings(&in_devfile, &bindings));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for ListBindingCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let (in_devfile, bindings) = list_bindings(ctx, &namespace_of(&self.namespace, ctx)).await?;
        Ok(json!({
            "bindingsInDevfile": in_devfile,
            "bindings": bindings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::binding::DevfileBindingClient;
    use crate::domain::config::EnvConfig;
    use crate::domain::devfile::DevfileObj;
    use crate::domain::labels::{get_labels, RunningMode};
    use crate::infrastructure::fake::FakeKube;
    use crate::infrastructure::kubernetes::ResourceRef;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context(dir: &std::path::Path, kube: Arc<FakeKube>, with_devfile: bool) -> CommandContext {
        let devfile = with_devfile.then(|| {
            std::fs::write(
                dir.join("devfile.yaml"),
                "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\n  projectType: nodejs\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
            )
            .unwrap();
            DevfileObj::load_from_dir(dir, &HashMap::new()).unwrap()
        });
        CommandContext {
            json: true,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile,
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default()
                .with_kube(kube.clone())
                .with_binding(Arc::new(DevfileBindingClient::new(Some(kube)))),
        }
    }

    #[tokio::test]
    async fn test_list_all_includes_devfile_component() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::default());
        kube.add_resources(vec![ResourceRef {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "backend-app".to_string(),
            labels: get_labels("backend", "app", Some(RunningMode::Deploy), false),
            ..Default::default()
        }]);
        let ctx = context(dir.path(), kube, true);

        let mut cmd = ListAllCommand { namespace: None };
        let value = cmd.run_for_json_output(&ctx).await.unwrap();
        assert_eq!(value["componentInDevfile"], "my-api");
        let names: Vec<&str> = value["components"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["name"].as_str())
            .collect();
        assert_eq!(names, vec!["backend", "my-api"]);
        assert_eq!(value["components"][0]["runningIn"]["deploy"], true);
        assert_eq!(value["components"][1]["projectType"], "nodejs");
    }

    #[tokio::test]
    async fn test_list_namespaces_marks_current() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::new("dev"));
        let ctx = context(dir.path(), kube.clone(), false);
        crate::infrastructure::kubernetes::KubernetesClient::create_namespace(kube.as_ref(), "other")
            .await
            .unwrap();

        let namespaces = ListNamespaceCommand::default().namespaces(&ctx).await.unwrap();
        assert_eq!(
            namespaces,
            vec![
                Namespace {
                    name: "dev".to_string(),
                    active: true
                },
                Namespace {
                    name: "other".to_string(),
                    active: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_without_devfile() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakeKube::default()), false);
        let value = ListComponentCommand::default()
            .run_for_json_output(&ctx)
            .await
            .unwrap();
        assert!(value.get("componentInDevfile").is_none());
        assert!(value["components"].as_array().unwrap().is_empty());
    }
}
