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

//! Running devfile `exec` commands inside dev containers.

use crate::domain::devfile::{Command, CommandType, DevfileData};
use crate::domain::labels::{get_selector, RunningMode};
use crate::infrastructure::container::{background_command, shell_command, ExecOutput};
use crate::infrastructure::kubernetes::resources::resource_name;
use crate::infrastructure::kubernetes::KubernetesClient;
use crate::infrastructure::podman::{container_name, PodmanClient};
use crate::shared::error::{AstraError, Result};
use std::sync::Arc;

/// The dev session a command runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub component: String,
    pub app: String,
    pub namespace: String,
}

#[async_trait::async_trait]
pub trait ExecClient: Send + Sync {
    async fn exec(
        &self,
        target: &ExecTarget,
        container: &str,
        command: &[String],
        show_output: bool,
    ) -> Result<ExecOutput>;
}

pub struct KubeExecClient {
    kube: Arc<dyn KubernetesClient>,
}

impl KubeExecClient {
    pub fn new(kube: Arc<dyn KubernetesClient>) -> Self {
        Self { kube }
    }
}

#[async_trait::async_trait]
impl ExecClient for KubeExecClient {
    async fn exec(
        &self,
        target: &ExecTarget,
        container: &str,
        command: &[String],
        show_output: bool,
    ) -> Result<ExecOutput> {
        let selector = get_selector(&target.component, &target.app, Some(RunningMode::Dev), true);
        let pods = self.kube.list_pods(&target.namespace, &selector).await?;
        let pod = pods
            .iter()
            .find(|p| {
                p.metadata.deletion_timestamp.is_none()
                    && p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
            })
            .and_then(|p| p.metadata.name.clone())
            .ok_or_else(|| {
                AstraError::not_found("running pod of component", &target.component, &target.namespace)
            })?;
        self.kube
            .exec(&target.namespace, &pod, container, command, show_output)
            .await
    }
}

pub struct PodmanExecClient {
    podman: Arc<dyn PodmanClient>,
}

impl PodmanExecClient {
    pub fn new(podman: Arc<dyn PodmanClient>) -> Self {
        Self { podman }
    }
}

#[async_trait::async_trait]
impl ExecClient for PodmanExecClient {
    async fn exec(
        &self,
        target: &ExecTarget,
        container: &str,
        command: &[String],
        show_output: bool,
    ) -> Result<ExecOutput> {
        let pod = resource_name(&target.component, &target.app);
        self.podman
            .exec(&container_name(&pod, container), command, show_output)
            .await
    }
}

/// Run a devfile command and its composite children.
///
/// With `background` set the leaves are started detached and their output goes
/// to the container logs. Otherwise each leaf must exit with status 0.
pub async fn run_devfile_command(
    client: &dyn ExecClient,
    devfile: &DevfileData,
    command: &Command,
    target: &ExecTarget,
    background: bool,
) -> Result<()> {
    for leaf in devfile.flatten_command(command)? {
        let Some(exec) = leaf.exec.as_ref() else {
            if leaf.command_type() == CommandType::Apply {
                return Err(AstraError::UnsupportedCommand {
                    id: leaf.id.clone(),
                });
            }
            continue;
        };

        tracing::info!("Executing the {:?} command in container {:?}", leaf.id, exec.component);
        let mut line = String::new();
        for env in &exec.env {
            line.push_str(&format!("export {}={}; ", env.name, shell_quote(&env.value)));
        }
        line.push_str(&exec.command_line);

        let argv = if background {
            background_command(&line, exec.working_dir.as_deref())
        } else {
            shell_command(&line, exec.working_dir.as_deref())
        };
        let output = client.exec(target, &exec.component, &argv, !background).await?;
        if !background && !output.success() {
            return Err(AstraError::validation(format!(
                "command {:?} failed with exit code {}",
                leaf.id,
                output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            )));
        }
    }
    Ok(())
}

/// Single-quoted for `sh`, so `$`, backticks and quotes stay literal.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        exit_code: i32,
    }

    #[async_trait::async_trait]
    impl ExecClient for Recorder {
        async fn exec(
            &self,
            _target: &ExecTarget,
            container: &str,
            command: &[String],
            _show_output: bool,
        ) -> Result<ExecOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((container.to_string(), command.to_vec()));
            Ok(ExecOutput {
                exit_code: Some(self.exit_code),
                ..Default::default()
            })
        }
    }

    fn devfile() -> DevfileData {
        serde_yaml::from_str(
            r#"
schemaVersion: 2.2.0
components:
- name: runtime
  container:
    image: node
commands:
- id: install
  exec:
    component: runtime
    commandLine: npm install
    workingDir: /projects
- id: start
  exec:
    component: runtime
    commandLine: npm start
    env:
    - name: PORT
      value: "3000"
- id: all
  composite:
    commands: [install, start]
"#,
        )
        .unwrap()
    }

    fn target() -> ExecTarget {
        ExecTarget {
            component: "api".to_string(),
            app: "app".to_string(),
            namespace: "default".to_string(),
        }
    }

    #[tokio::test]
    async fn test_composite_runs_leaves_in_order() {
        let data = devfile();
        let recorder = Recorder::default();
        let all = data.command("all").unwrap();
        run_devfile_command(&recorder, &data, all, &target(), false)
            .await
            .unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1[2], "cd /projects && (npm install)");
        assert_eq!(calls[1].1[2], "export PORT='3000'; npm start");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("$HOME `id`"), "'$HOME `id`'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[tokio::test]
    async fn test_failed_command_is_an_error() {
        let data = devfile();
        let recorder = Recorder {
            exit_code: 2,
            ..Default::default()
        };
        let err = run_devfile_command(&recorder, &data, data.command("install").unwrap(), &target(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit code 2"));
    }
}
