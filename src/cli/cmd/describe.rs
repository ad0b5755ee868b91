//! `astra describe`

use super::list::list_bindings;
use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::display::TableRenderer;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::cli::ui;
use crate::domain::api::{Component, ServiceBinding};
use crate::domain::component::{describe_devfile_component, describe_named_component};
use crate::shared::error::AstraError;
use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct DescribeCommand {
    #[command(subcommand)]
    pub subcommand: DescribeSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DescribeSubcommand {
    /// Describe a component
    Component(DescribeComponentCommand),

    /// Describe a binding of the devfile or of the namespace
    Binding(DescribeBindingCommand),
}

impl DescribeCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            DescribeSubcommand::Component(cmd) => Box::new(cmd),
            DescribeSubcommand::Binding(cmd) => Box::new(cmd),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DescribeComponentCommand {
    /// Name of a component running on the cluster or podman
    #[arg(long)]
    pub name: Option<String>,

    /// Namespace of the named component
    #[arg(long)]
    pub namespace: Option<String>,
}

impl DescribeComponentCommand {
    async fn describe(&self, ctx: &CommandContext) -> anyhow::Result<(String, Component)> {
        let namespace = self.namespace.as_deref().unwrap_or(&ctx.namespace);
        let platforms = ctx.platforms(namespace);
        match &self.name {
            Some(name) => {
                let component =
                    describe_named_component(name, &ctx.app, ctx.platform(), platforms).await?;
                Ok((name.clone(), component))
            }
            None => {
                let state = ctx.clients.state()?;
                let component = describe_devfile_component(
                    ctx.devfile()?,
                    &ctx.component_name,
                    &ctx.app,
                    ctx.platform(),
                    platforms,
                    state.as_ref(),
                )
                .await?;
                Ok((ctx.component_name.clone(), component))
            }
        }
    }
}

#[async_trait::async_trait]
impl Runnable for DescribeComponentCommand {
    fn name(&self) -> &'static str {
        "describe component"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::KubernetesNullable,
            Dependency::PodmanNullable,
            Dependency::State,
        ]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn require_devfile(&self) -> bool {
        false
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if self.namespace.is_some() && self.name.is_none() {
            return Err(AstraError::validation("--namespace can be used only with --name").into());
        }
        if self.name.is_none() {
            ctx.devfile()?;
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let (name, component) = self.describe(ctx).await?;
        ui::plain(TableRenderer::new().render_component(&name, &component));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for DescribeComponentCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let (_, component) = self.describe(ctx).await?;
        Ok(serde_json::to_value(component)?)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DescribeBindingCommand {
    /// Name of the binding, all bindings of the devfile otherwise
    #[arg(long)]
    pub name: Option<String>,
}

impl DescribeBindingCommand {
    async fn bindings(&self, ctx: &CommandContext) -> anyhow::Result<Vec<ServiceBinding>> {
        let (in_devfile, bindings) = list_bindings(ctx, &ctx.namespace).await?;
        match &self.name {
            Some(name) => match bindings.into_iter().find(|b| &b.name == name) {
                Some(binding) => Ok(vec![binding]),
                None => Err(AstraError::not_found("ServiceBinding", name, &ctx.namespace).into()),
            },
            None => {
                ctx.devfile()?;
                Ok(bindings
                    .into_iter()
                    .filter(|b| in_devfile.contains(&b.name))
                    .collect())
            }
        }
    }
}

#[async_trait::async_trait]
impl Runnable for DescribeBindingCommand {
    fn name(&self) -> &'static str {
        "describe binding"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Binding]
    }

    fn require_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let bindings = self.bindings(ctx).await?;
        if bindings.is_empty() {
            ui::info("No bindings found in the devfile");
            return Ok(());
        }
        let renderer = TableRenderer::new();
        for binding in &bindings {
            ui::plain(renderer.render_binding(binding));
        }
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for DescribeBindingCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let mut bindings = self.bindings(ctx).await?;
        if self.name.is_some() {
            if let Some(binding) = bindings.pop() {
                return Ok(serde_json::to_value(binding)?);
            }
        }
        Ok(serde_json::to_value(bindings)?)
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
    use crate::domain::state::StateFile;
    use crate::infrastructure::fake::FakeKube;
    use crate::infrastructure::filesystem::DefaultFs;
    use crate::infrastructure::kubernetes::ResourceRef;
    use std::collections::HashMap;
    use std::sync::Arc;

    const DEVFILE: &str = r#"
schemaVersion: 2.2.0
metadata:
  name: my-api
components:
- name: runtime
  container:
    image: node
    endpoints:
    - name: http
      targetPort: 3000
- name: my-api-db
  kubernetes:
    inlined: |
      apiVersion: binding.operators.coreos.com/v1alpha1
      kind: ServiceBinding
      metadata:
        name: my-api-db
      spec:
        application:
          group: apps
          version: v1
          kind: Deployment
          name: my-api-app
        services:
        - group: postgresql.k8s.enterprisedb.io
          version: v1
          kind: Cluster
          name: db
        bindAsFiles: true
commands:
- id: run
  exec:
    component: runtime
    commandLine: npm start
    group:
      kind: run
"#;

    fn context(dir: &std::path::Path, kube: Arc<FakeKube>) -> CommandContext {
        std::fs::write(dir.join("devfile.yaml"), DEVFILE).unwrap();
        let fs = Arc::new(DefaultFs);
        CommandContext {
            json: true,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir, &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default()
                .with_kube(kube.clone())
                .with_state(Arc::new(StateFile::new(dir, fs)))
                .with_binding(Arc::new(DevfileBindingClient::new(Some(kube)))),
        }
    }

    #[tokio::test]
    async fn test_describe_devfile_component() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakeKube::default()));
        let mut cmd = DescribeComponentCommand::default();
        let value = cmd.run_for_json_output(&ctx).await.unwrap();
        assert_eq!(value["devfileData"]["devfile"]["metadata"]["name"], "my-api");
        assert_eq!(value["runningIn"]["dev"], false);
        assert_eq!(value["managedBy"], "astra");
    }

    #[tokio::test]
    async fn test_describe_named_component_running_on_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::default());
        kube.add_resources(vec![ResourceRef {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "backend-app".to_string(),
            labels: get_labels("backend", "app", Some(RunningMode::Deploy), false),
            ..Default::default()
        }]);
        let ctx = context(dir.path(), kube);
        let mut cmd = DescribeComponentCommand {
            name: Some("backend".to_string()),
            namespace: None,
        };
        let value = cmd.run_for_json_output(&ctx).await.unwrap();
        assert_eq!(value["runningIn"]["deploy"], true);
        assert!(value.get("devfileData").is_none());

        let mut missing = DescribeComponentCommand {
            name: Some("nope".to_string()),
            namespace: None,
        };
        assert!(missing.run_for_json_output(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_describe_binding_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakeKube::default()));
        let mut cmd = DescribeBindingCommand {
            name: Some("my-api-db".to_string()),
        };
        let value = cmd.run_for_json_output(&ctx).await.unwrap();
        assert_eq!(value["name"], "my-api-db");
        assert_eq!(value["spec"]["services"][0]["kind"], "Cluster");

        let mut all = DescribeBindingCommand::default();
        let value = all.run_for_json_output(&ctx).await.unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_namespace_requires_name() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakeKube::default()));
        let cmd = DescribeComponentCommand {
            name: None,
            namespace: Some("other".to_string()),
        };
        assert!(cmd.validate(&ctx).is_err());
    }
}
