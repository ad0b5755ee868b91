// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::config::EnvConfig;
use crate::infrastructure::container::{drain, lines_stream, ExecOutput, LineStream};
use crate::shared::duration::format_duration;
use crate::shared::error::{AstraError, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodmanVersion {
    pub client: String,
    pub server: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionOutput {
    client: VersionEntry,
    #[serde(default)]
    server: Option<VersionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionEntry {
    version: String,
}

/// One entry of `podman pod ps --format json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PodSummary {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub containers: Vec<PodContainer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PodContainer {
    pub names: String,
    #[serde(default)]
    pub status: String,
}

impl PodSummary {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeEntry {
    name: String,
}

/// Name podman gives to a container started by `kube play`.
pub fn container_name(pod: &str, container: &str) -> String {
    format!("{}-{}", pod, container)
}

#[async_trait::async_trait]
pub trait PodmanClient: Send + Sync {
    async fn version(&self) -> Result<PodmanVersion>;

    /// Create the pod, replacing any pod with the same name.
    async fn play_kube(&self, pod: &Pod) -> Result<()>;

    /// Pods whose labels match every `key=value` of the selector.
    async fn list_pods(&self, selector: &str) -> Result<Vec<PodSummary>>;

    async fn remove_pod(&self, name: &str) -> Result<()>;

    async fn list_volumes(&self) -> Result<Vec<String>>;

    async fn remove_volume(&self, name: &str) -> Result<()>;

    async fn exec(&self, container: &str, command: &[String], show_output: bool)
        -> Result<ExecOutput>;

    async fn logs(&self, container: &str, follow: bool) -> Result<LineStream>;
}

/// Podman driven through its command line.
pub struct PodmanCli {
    cmd: String,
    global_args: Vec<String>,
    run_args: Vec<String>,
}

impl PodmanCli {
    /// Check that podman answers within `PODMAN_CMD_INIT_TIMEOUT`.
    pub async fn new(env: &EnvConfig) -> Result<Self> {
        let timeout = env.podman_cmd_init_timeout;
        let cli = Self {
            cmd: env.podman_cmd.clone(),
            global_args: env.container_backend_global_args.clone(),
            run_args: env.container_run_args.clone(),
        };

        match tokio::time::timeout(timeout, cli.version()).await {
            Ok(Ok(version)) => {
                tracing::debug!("podman client version {}", version.client);
                Ok(cli)
            }
            Ok(Err(e)) => Err(AstraError::PodmanNotFound {
                reason: e.to_string(),
            }),
            Err(_) => Err(AstraError::PodmanNotFound {
                reason: format!(
                    "{} did not answer within {}",
                    env.podman_cmd,
                    format_duration(timeout)
                ),
            }),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.cmd);
        command.args(&self.global_args);
        command.kill_on_drop(true);
        command
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut command = self.command();
        command.args(args);
        tracing::debug!("running {} {}", self.cmd, args.join(" "));

        let output = command.output().await.map_err(|e| {
            AstraError::PodmanError(format!("failed to run {}: {}", self.cmd, e))
        })?;
        if !output.status.success() {
            return Err(AstraError::PodmanError(format!(
                "{} {} failed: {}",
                self.cmd,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub(crate) fn parse_version(output: &str) -> Result<PodmanVersion> {
    let parsed: VersionOutput = serde_json::from_str(output)?;
    Ok(PodmanVersion {
        client: parsed.client.version,
        server: parsed.server.map(|s| s.version),
    })
}

pub(crate) fn label_filters(selector: &str) -> Vec<String> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .flat_map(|label| ["--filter".to_string(), format!("label={}", label)])
        .collect()
}

#[async_trait::async_trait]
impl PodmanClient for PodmanCli {
    async fn version(&self) -> Result<PodmanVersion> {
        let output = self.run(&["version", "--format", "json"]).await?;
        parse_version(&output)
    }

    async fn play_kube(&self, pod: &Pod) -> Result<()> {
        let manifest = serde_yaml::to_string(pod)?;
        let mut command = self.command();
        command
            .args(["kube", "play", "--replace"])
            .args(&self.run_args)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        tracing::debug!("podman kube play:\n{}", manifest);

        let mut child = command.spawn().map_err(|e| {
            AstraError::PodmanError(format!("failed to run {}: {}", self.cmd, e))
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(manifest.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AstraError::PodmanError(format!(
                "podman kube play failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<PodSummary>> {
        let filters = label_filters(selector);
        let mut args = vec!["pod", "ps", "--format", "json"];
        args.extend(filters.iter().map(String::as_str));
        let output = self.run(&args).await?;
        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&output)?)
    }

    async fn remove_pod(&self, name: &str) -> Result<()> {
        self.run(&["pod", "rm", "--force", "--ignore", name]).await?;
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<String>> {
        let output = self.run(&["volume", "ls", "--format", "json"]).await?;
        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        let volumes: Vec<VolumeEntry> = serde_json::from_str(&output)?;
        Ok(volumes.into_iter().map(|v| v.name).collect())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.run(&["volume", "rm", "--force", name]).await?;
        Ok(())
    }

    async fn exec(
        &self,
        container: &str,
        command: &[String],
        show_output: bool,
    ) -> Result<ExecOutput> {
        let mut cmd = self.command();
        cmd.arg("exec")
            .arg(container)
            .args(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| {
            AstraError::PodmanError(format!("failed to run {}: {}", self.cmd, e))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr) = tokio::join!(
            drain(stdout, show_output, false),
            drain(stderr, show_output, true)
        );
        let status = child.wait().await?;

        Ok(ExecOutput {
            stdout: stdout?,
            stderr: stderr?,
            exit_code: status.code(),
        })
    }

    async fn logs(&self, container: &str, follow: bool) -> Result<LineStream> {
        let mut cmd = self.command();
        cmd.arg("logs");
        if follow {
            cmd.arg("--follow");
        }
        cmd.arg(container)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            AstraError::PodmanError(format!("failed to run {}: {}", self.cmd, e))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AstraError::PodmanError("no stdout for podman logs".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AstraError::PodmanError("no stderr for podman logs".to_string()))?;

        let merged = futures::stream::select(
            lines_stream(BufReader::new(stdout)),
            lines_stream(BufReader::new(stderr)),
        );
        // The child is killed when the stream is dropped.
        Ok(Box::pin(merged.map(move |line| {
            let _ = &child;
            line
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let output = r#"{"Client":{"APIVersion":"4.9.3","Version":"4.9.3"},"Server":{"Version":"4.9.0"}}"#;
        let version = parse_version(output).unwrap();
        assert_eq!(version.client, "4.9.3");
        assert_eq!(version.server.as_deref(), Some("4.9.0"));
    }

    #[test]
    fn test_label_filters() {
        assert_eq!(
            label_filters("a=b,c=d"),
            vec!["--filter", "label=a=b", "--filter", "label=c=d"]
        );
        assert!(label_filters("").is_empty());
    }

    #[test]
    fn test_pod_summary_from_json() {
        let json = r#"[{"Name":"api-app","Status":"Running","Labels":{"component":"api"},
            "Containers":[{"Id":"1","Names":"api-app-runtime","Status":"running"}]}]"#;
        let pods: Vec<PodSummary> = serde_json::from_str(json).unwrap();
        assert!(pods[0].is_running());
        assert_eq!(pods[0].containers[0].names, "api-app-runtime");
        assert_eq!(container_name("api-app", "runtime"), "api-app-runtime");
    }
}
