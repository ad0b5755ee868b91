//! `astra dev`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::{PreIniter, Runnable, SignalHandler};
use crate::cli::ui;
use crate::domain::component::PLATFORM_PODMAN;
use crate::domain::dev::{DevClient, DevSession, StartOptions};
use crate::shared::error::AstraError;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Clone, Default)]
pub struct DevCommand {
    /// Alternative build command to execute
    #[arg(long = "build-command")]
    pub build_command: Option<String>,

    /// Alternative run command to execute
    #[arg(long = "run-command")]
    pub run_command: Option<String>,

    /// Do not run any commands, only start the dev containers
    #[arg(long = "no-commands")]
    pub no_commands: bool,

    /// Keep the resources when astra dev exits
    #[arg(long = "no-cleanup")]
    pub no_cleanup: bool,
}

impl DevCommand {
    fn session(&self, ctx: &CommandContext) -> anyhow::Result<DevSession> {
        Ok(DevSession {
            component: ctx.component_name.clone(),
            app: ctx.app.clone(),
            namespace: ctx.namespace.clone(),
            project_type: ctx.devfile()?.data.metadata.project_type.clone(),
        })
    }

    fn options(&self) -> StartOptions {
        StartOptions {
            build_command: self.build_command.clone(),
            run_command: self.run_command.clone(),
            no_commands: self.no_commands,
        }
    }
}

/// The dev client of the platform, or the reason it could not be built.
pub(crate) fn dev_client(ctx: &CommandContext) -> anyhow::Result<Arc<dyn DevClient>> {
    match ctx.clients.dev() {
        Ok(client) => Ok(client),
        Err(_) if ctx.platform() == Some(PLATFORM_PODMAN) => Err(AstraError::PodmanNotFound {
            reason: "podman client not initialized".to_string(),
        }
        .into()),
        Err(_) => Err(AstraError::NoConnection("no cluster client".to_string()).into()),
    }
}

#[async_trait::async_trait]
impl Runnable for DevCommand {
    fn name(&self) -> &'static str {
        "dev"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Dev, Dependency::Init, Dependency::State]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn supports_variables(&self) -> bool {
        true
    }

    fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        if self.no_commands && (self.build_command.is_some() || self.run_command.is_some()) {
            return Err(AstraError::validation(
                "--no-commands cannot be used with --build-command or --run-command",
            )
            .into());
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let dev = dev_client(ctx)?;
        let devfile = ctx.devfile()?;
        let session = self.session(ctx)?;

        ui::title(format!("Developing using the {:?} Devfile", session.component));
        if ctx.platform() == Some(PLATFORM_PODMAN) {
            ui::info("Platform: podman");
        } else {
            ui::info(format!("Namespace: {}", session.namespace));
        }

        let ports = dev.start(devfile, &session, &self.options()).await?;
        ui::success("Dev mode is running");
        for port in &ports {
            ui::plain(format!(
                "  -  Forwarding from {}:{} -> {}",
                port.local_address, port.local_port, port.container_port
            ));
        }

        if self.no_cleanup {
            ui::plain("\nPress Ctrl+c to exit `astra dev`, the resources will be kept");
        } else {
            ui::plain("\nPress Ctrl+c to exit `astra dev` and delete resources from the cluster");
        }
        std::future::pending::<()>().await;
        Ok(())
    }

    fn signal_handler(&mut self) -> Option<&mut dyn SignalHandler> {
        Some(self)
    }

    fn pre_initer(&self) -> Option<&dyn PreIniter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl SignalHandler for DevCommand {
    async fn handle_signal(&mut self, ctx: &CommandContext, _signal: &str) -> anyhow::Result<()> {
        let dev = dev_client(ctx)?;
        if self.no_cleanup {
            dev.forget()?;
            return Ok(());
        }
        ui::info("Cleaning resources, please wait");
        dev.cleanup(ctx.devfile()?, &self.session(ctx)?).await?;
        Ok(())
    }
}

impl PreIniter for DevCommand {
    fn pre_init_message(&self) -> String {
        "Dev mode ran, but no Devfile was found. Initializing a component in the current directory"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::api::ForwardedPort;
    use crate::domain::config::EnvConfig;
    use crate::domain::devfile::DevfileObj;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDev {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl DevClient for RecordingDev {
        async fn start(
            &self,
            _devfile: &DevfileObj,
            session: &DevSession,
            _options: &StartOptions,
        ) -> crate::shared::error::Result<Vec<ForwardedPort>> {
            self.calls.lock().unwrap().push(format!("start {}", session.component));
            Ok(Vec::new())
        }

        async fn cleanup(&self, _devfile: &DevfileObj, session: &DevSession) -> crate::shared::error::Result<()> {
            self.calls.lock().unwrap().push(format!("cleanup {}", session.component));
            Ok(())
        }

        fn forget(&self) -> crate::shared::error::Result<()> {
            self.calls.lock().unwrap().push("forget".to_string());
            Ok(())
        }
    }

    fn context(dir: &std::path::Path, dev: Option<Arc<RecordingDev>>, platform: Option<&str>) -> CommandContext {
        std::fs::write(
            dir.join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        let mut clients = Clientset::default();
        if let Some(dev) = dev {
            clients = clients.with_dev(dev);
        }
        CommandContext {
            json: false,
            platform: platform.map(str::to_string),
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
    async fn test_signal_cleans_up_unless_no_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let dev = Arc::new(RecordingDev::default());
        let ctx = context(dir.path(), Some(dev.clone()), None);

        DevCommand::default().handle_signal(&ctx, "SIGINT").await.unwrap();
        let mut keep = DevCommand {
            no_cleanup: true,
            ..Default::default()
        };
        keep.handle_signal(&ctx, "SIGTERM").await.unwrap();

        assert_eq!(*dev.calls.lock().unwrap(), vec!["cleanup my-api", "forget"]);
    }

    #[test]
    fn test_missing_dev_client_names_the_platform() {
        let dir = tempfile::tempdir().unwrap();
        let podman = context(dir.path(), None, Some("podman"));
        assert!(matches!(
            dev_client(&podman).err().unwrap().downcast_ref::<AstraError>(),
            Some(AstraError::PodmanNotFound { .. })
        ));
        let cluster = context(dir.path(), None, None);
        assert!(matches!(
            dev_client(&cluster).err().unwrap().downcast_ref::<AstraError>(),
            Some(AstraError::NoConnection(_))
        ));
    }

    #[test]
    fn test_no_commands_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None, None);
        let cmd = DevCommand {
            no_commands: true,
            run_command: Some("run".to_string()),
            ..Default::default()
        };
        assert!(cmd.validate(&ctx).is_err());
    }
}
