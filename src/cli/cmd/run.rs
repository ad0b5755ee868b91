//! `astra run`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::domain::component::PLATFORM_CLUSTER;
use crate::domain::exec::{run_devfile_command, ExecTarget};
use crate::shared::error::AstraError;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Id of the devfile command to run
    pub command: String,
}

#[async_trait::async_trait]
impl Runnable for RunCommand {
    fn name(&self) -> &'static str {
        "run"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::Exec,
            Dependency::KubernetesNullable,
            Dependency::PodmanNullable,
        ]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if ctx.devfile()?.data.command(&self.command).is_none() {
            return Err(AstraError::validation(format!(
                "no command named {:?} found in the devfile",
                self.command
            ))
            .into());
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let platform = ctx.platform().unwrap_or(PLATFORM_CLUSTER);
        let running_on = ctx
            .platforms(&ctx.namespace)
            .restrict(Some(platform))?
            .running_on(&ctx.component_name, &ctx.app)
            .await?;
        let in_dev = running_on.get(platform).map(|m| m.dev).unwrap_or(false);
        if !in_dev {
            return Err(AstraError::validation(format!(
                "Dev mode is not running for component {:?} on platform {:?}, run 'astra dev' first",
                ctx.component_name, platform
            ))
            .into());
        }

        let data = &ctx.devfile()?.data;
        let command = data
            .command(&self.command)
            .ok_or_else(|| AstraError::validation(format!("no command named {:?}", self.command)))?;
        let target = ExecTarget {
            component: ctx.component_name.clone(),
            app: ctx.app.clone(),
            namespace: ctx.namespace.clone(),
        };
        ui::info(format!("Executing command {:?} in the dev container", self.command));
        run_devfile_command(ctx.clients.exec()?.as_ref(), data, command, &target, false).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::domain::devfile::DevfileObj;
    use crate::domain::exec::PodmanExecClient;
    use crate::domain::labels::{get_labels, RunningMode};
    use crate::infrastructure::fake::FakePodman;
    use crate::infrastructure::podman::PodSummary;
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
commands:
- id: test
  exec:
    component: runtime
    commandLine: npm test
"#;

    fn context(dir: &std::path::Path, podman: Arc<FakePodman>) -> CommandContext {
        std::fs::write(dir.join("devfile.yaml"), DEVFILE).unwrap();
        let clients = Clientset::default()
            .with_podman(podman.clone())
            .with_exec(Arc::new(PodmanExecClient::new(podman)));
        CommandContext {
            json: false,
            platform: Some("podman".to_string()),
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir, &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients,
        }
    }

    #[tokio::test]
    async fn test_run_requires_dev_mode() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakePodman::default()));
        let mut cmd = RunCommand {
            command: "test".to_string(),
        };
        let err = cmd.run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("Dev mode is not running"));
    }

    #[tokio::test]
    async fn test_run_executes_in_dev_container() {
        let dir = tempfile::tempdir().unwrap();
        let podman = Arc::new(FakePodman::default());
        podman.add_pod(PodSummary {
            name: "my-api-app".to_string(),
            status: "Running".to_string(),
            labels: get_labels("my-api", "app", Some(RunningMode::Dev), true),
            ..Default::default()
        });
        let ctx = context(dir.path(), podman.clone());

        let mut cmd = RunCommand {
            command: "test".to_string(),
        };
        cmd.validate(&ctx).unwrap();
        cmd.run(&ctx).await.unwrap();

        let commands = podman.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].1.join(" ").contains("npm test"));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakePodman::default()));
        let cmd = RunCommand {
            command: "nope".to_string(),
        };
        assert!(cmd.validate(&ctx).is_err());
    }
}
