//! `astra deploy`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::{PreIniter, Runnable};
use crate::cli::ui;
use crate::domain::deploy::DeployTarget;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct DeployCommand {}

impl DeployCommand {
    fn target(&self, ctx: &CommandContext) -> anyhow::Result<DeployTarget> {
        Ok(DeployTarget {
            component: ctx.component_name.clone(),
            app: ctx.app.clone(),
            namespace: ctx.namespace.clone(),
            project_type: ctx.devfile()?.data.metadata.project_type.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Runnable for DeployCommand {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Deploy, Dependency::Init]
    }

    fn supports_variables(&self) -> bool {
        true
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let devfile = ctx.devfile()?;
        let target = self.target(ctx)?;

        ui::title(format!("Deploying using the {:?} Devfile", target.component));
        ui::info(format!("Namespace: {}", target.namespace));

        let applied = ctx.clients.deploy()?.deploy(devfile, &target).await?;
        for resource in &applied {
            ui::success(format!("Applied {} {:?}", resource.kind, resource.name));
        }
        ui::plain(format!(
            "\nYour Devfile has been successfully deployed, {} resources applied",
            applied.len()
        ));
        Ok(())
    }

    fn pre_initer(&self) -> Option<&dyn PreIniter> {
        Some(self)
    }
}

impl PreIniter for DeployCommand {
    fn pre_init_message(&self) -> String {
        "There are no Devfiles in the current directory. Initializing a component in the current directory"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::domain::deploy::Deployer;
    use crate::domain::devfile::DevfileObj;
    use crate::domain::labels::ASTRA_MODE_LABEL;
    use crate::infrastructure::fake::FakeKube;
    use crate::infrastructure::filesystem::DefaultFs;
    use std::collections::HashMap;
    use std::sync::Arc;

    const DEVFILE: &str = r#"
schemaVersion: 2.2.0
metadata:
  name: my-api
  projectType: nodejs
components:
- name: runtime
  container:
    image: node
- name: prod
  kubernetes:
    inlined: |
      apiVersion: v1
      kind: ConfigMap
      metadata:
        name: my-api-config
commands:
- id: deploy
  apply:
    component: prod
    group:
      kind: deploy
      isDefault: true
"#;

    #[tokio::test]
    async fn test_deploy_applies_inline_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devfile.yaml"), DEVFILE).unwrap();
        let kube = Arc::new(FakeKube::default());
        let deployer = Deployer::new(kube.clone(), Arc::new(DefaultFs));
        let ctx = CommandContext {
            json: false,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.path().to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir.path(), &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default().with_deploy(Arc::new(deployer)),
        };

        DeployCommand::default().run(&ctx).await.unwrap();

        let manifests = kube.manifests();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0]["metadata"]["labels"][ASTRA_MODE_LABEL], "Deploy");
    }
}
