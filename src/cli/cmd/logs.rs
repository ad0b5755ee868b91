//! `astra logs`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::domain::labels::RunningMode;
use crate::infrastructure::container::LineStream;
use clap::Args;
use futures::stream::{self, StreamExt};

#[derive(Args, Debug, Clone, Default)]
pub struct LogsCommand {
    /// Show the logs of the containers started by `astra dev`
    #[arg(long, conflicts_with = "deploy")]
    pub dev: bool,

    /// Show the logs of the containers started by `astra deploy`
    #[arg(long)]
    pub deploy: bool,

    /// Keep streaming new lines
    #[arg(short, long)]
    pub follow: bool,
}

impl LogsCommand {
    fn mode(&self) -> Option<RunningMode> {
        match (self.dev, self.deploy) {
            (true, _) => Some(RunningMode::Dev),
            (_, true) => Some(RunningMode::Deploy),
            _ => None,
        }
    }

    /// Lines of every container, each prefixed with `<container>: `.
    async fn lines(&self, ctx: &CommandContext) -> anyhow::Result<Option<LineStream>> {
        let client = ctx.clients.logs()?;
        let sources = client
            .sources(&ctx.component_name, &ctx.app, &ctx.namespace, self.mode())
            .await?;
        if sources.is_empty() {
            return Ok(None);
        }

        let mut streams = Vec::with_capacity(sources.len());
        for source in &sources {
            let prefix = format!("{}: ", source.display_name);
            let lines = client.stream(&ctx.namespace, source, self.follow).await?;
            streams.push(lines.map(move |line| line.map(|l| format!("{}{}", prefix, l))));
        }

        let merged: LineStream = if self.follow {
            Box::pin(stream::select_all(streams))
        } else {
            Box::pin(stream::iter(streams).flatten())
        };
        Ok(Some(merged))
    }
}

#[async_trait::async_trait]
impl Runnable for LogsCommand {
    fn name(&self) -> &'static str {
        "logs"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Logs]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let Some(mut lines) = self.lines(ctx).await? else {
            let mode = match self.mode() {
                Some(mode) => format!("{} mode", mode),
                None => "any mode".to_string(),
            };
            ui::info(format!(
                "No containers of component {:?} are running in {}",
                ctx.component_name, mode
            ));
            return Ok(());
        };
        while let Some(line) = lines.next().await {
            ui::plain(line?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::domain::devfile::DevfileObj;
    use crate::domain::labels::get_labels;
    use crate::domain::logs::KubeLogsClient;
    use crate::infrastructure::fake::FakeKube;
    use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn pod(name: &str, mode: RunningMode, containers: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(get_labels("my-api", "app", Some(mode), false)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|c| Container {
                        name: c.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn context(dir: &std::path::Path, kube: Arc<FakeKube>) -> CommandContext {
        std::fs::write(
            dir.join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        CommandContext {
            json: false,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir, &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default().with_logs(Arc::new(KubeLogsClient::new(kube))),
        }
    }

    #[tokio::test]
    async fn test_lines_are_prefixed_by_container() {
        let dir = tempfile::tempdir().unwrap();
        let kube = Arc::new(FakeKube::default());
        kube.add_pod(pod("my-api-app", RunningMode::Dev, &["runtime", "sidecar"]));
        kube.add_pod(pod("my-api-prod", RunningMode::Deploy, &["web"]));
        kube.set_logs("my-api-app", "runtime", vec!["started".to_string()]);
        kube.set_logs("my-api-app", "sidecar", vec!["ready".to_string()]);
        kube.set_logs("my-api-prod", "web", vec!["serving".to_string()]);
        let ctx = context(dir.path(), kube);

        let cmd = LogsCommand {
            dev: true,
            ..Default::default()
        };
        let lines: Vec<String> = cmd
            .lines(&ctx)
            .await
            .unwrap()
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["runtime: started", "sidecar: ready"]);

        let all = LogsCommand::default();
        let count = all.lines(&ctx).await.unwrap().unwrap().count().await;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_no_running_containers() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(FakeKube::default()));
        let cmd = LogsCommand {
            deploy: true,
            ..Default::default()
        };
        assert!(cmd.lines(&ctx).await.unwrap().is_none());
    }
}
