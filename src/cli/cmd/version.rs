//! `astra version`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::cli::ui;
use crate::infrastructure::constants::{APP_NAME, APP_VERSION, GIT_COMMIT};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug, Clone, Default)]
pub struct VersionCommand {
    /// Only print the client version
    #[arg(long)]
    pub client: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodmanInfo {
    pub client: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub git_commit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podman: Option<PodmanInfo>,
}

impl VersionCommand {
    async fn info(&self, ctx: &CommandContext) -> VersionInfo {
        let mut info = VersionInfo {
            version: format!("v{}", APP_VERSION),
            git_commit: GIT_COMMIT.to_string(),
            ..Default::default()
        };
        if self.client {
            return info;
        }

        if let Some(kube) = ctx.clients.kube_ref() {
            let kubernetes_version = match kube.server_version().await {
                Ok(version) => Some(version),
                Err(e) => {
                    tracing::debug!("unable to get the Kubernetes version: {}", e);
                    None
                }
            };
            info.cluster = Some(ClusterInfo {
                server_url: kube.server_url(),
                kubernetes_version,
            });
        }
        if let Some(podman) = ctx.clients.podman_ref() {
            match podman.version().await {
                Ok(version) => {
                    info.podman = Some(PodmanInfo {
                        client: version.client,
                        server: version.server,
                    })
                }
                Err(e) => tracing::debug!("unable to get the podman version: {}", e),
            }
        }
        info
    }
}

#[async_trait::async_trait]
impl Runnable for VersionCommand {
    fn name(&self) -> &'static str {
        "version"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        if self.client {
            Vec::new()
        } else {
            vec![Dependency::KubernetesNullable, Dependency::PodmanNullable]
        }
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let info = self.info(ctx).await;
        ui::plain(format!("{} {} ({})", APP_NAME, info.version, info.git_commit));
        if let Some(cluster) = &info.cluster {
            ui::plain("");
            ui::plain(format!("Server: {}", cluster.server_url));
            if let Some(version) = &cluster.kubernetes_version {
                ui::plain(format!("Kubernetes: {}", version));
            }
        }
        if let Some(podman) = &info.podman {
            ui::plain(format!("Podman Client: {}", podman.client));
            if let Some(server) = &podman.server {
                ui::plain(format!("Podman Server: {}", server));
            }
        }
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for VersionCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(self.info(ctx).await)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::infrastructure::fake::{FakeKube, FakePodman};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context() -> CommandContext {
        CommandContext {
            json: true,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: std::env::temp_dir(),
            variables: HashMap::new(),
            devfile: None,
            component_name: "app".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default()
                .with_kube(Arc::new(FakeKube::default()))
                .with_podman(Arc::new(FakePodman::default())),
        }
    }

    #[tokio::test]
    async fn test_version_reports_backends() {
        let value = VersionCommand::default()
            .run_for_json_output(&context())
            .await
            .unwrap();
        assert_eq!(value["version"], format!("v{}", APP_VERSION));
        assert_eq!(value["cluster"]["serverUrl"], "https://127.0.0.1:6443");
        assert_eq!(value["cluster"]["kubernetesVersion"], "v1.30.0");
        assert_eq!(value["podman"]["client"], "4.9.0");
    }

    #[tokio::test]
    async fn test_client_only() {
        let mut cmd = VersionCommand { client: true };
        assert!(cmd.dependencies().is_empty());
        let value = cmd.run_for_json_output(&context()).await.unwrap();
        assert!(value.get("cluster").is_none());
        assert!(value.get("podman").is_none());
    }
}
