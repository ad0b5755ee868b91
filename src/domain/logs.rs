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

use crate::domain::labels::{get_selector, RunningMode};
use crate::infrastructure::container::LineStream;
use crate::infrastructure::kubernetes::KubernetesClient;
use crate::infrastructure::podman::PodmanClient;
use crate::shared::error::Result;
use std::sync::Arc;

/// One container whose output can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub pod: String,
    pub container: String,
    /// Name shown in front of each line.
    pub display_name: String,
}

#[async_trait::async_trait]
pub trait LogsClient: Send + Sync {
    /// Containers of the component. `mode` `None` means both modes.
    async fn sources(
        &self,
        component: &str,
        app: &str,
        namespace: &str,
        mode: Option<RunningMode>,
    ) -> Result<Vec<LogSource>>;

    async fn stream(&self, namespace: &str, source: &LogSource, follow: bool) -> Result<LineStream>;
}

pub struct KubeLogsClient {
    kube: Arc<dyn KubernetesClient>,
}

impl KubeLogsClient {
    pub fn new(kube: Arc<dyn KubernetesClient>) -> Self {
        Self { kube }
    }
}

#[async_trait::async_trait]
impl LogsClient for KubeLogsClient {
    async fn sources(
        &self,
        component: &str,
        app: &str,
        namespace: &str,
        mode: Option<RunningMode>,
    ) -> Result<Vec<LogSource>> {
        let selector = get_selector(component, app, mode, false);
        let pods = self.kube.list_pods(namespace, &selector).await?;

        let mut sources = Vec::new();
        for pod in pods {
            let Some(pod_name) = pod.metadata.name.clone() else {
                continue;
            };
            let containers = pod.spec.map(|s| s.containers).unwrap_or_default();
            for container in containers {
                sources.push(LogSource {
                    pod: pod_name.clone(),
                    display_name: container.name.clone(),
                    container: container.name,
                });
            }
        }
        Ok(sources)
    }

    async fn stream(&self, namespace: &str, source: &LogSource, follow: bool) -> Result<LineStream> {
        self.kube
            .pod_logs(namespace, &source.pod, &source.container, follow)
            .await
    }
}

pub struct PodmanLogsClient {
    podman: Arc<dyn PodmanClient>,
}

impl PodmanLogsClient {
    pub fn new(podman: Arc<dyn PodmanClient>) -> Self {
        Self { podman }
    }
}

#[async_trait::async_trait]
impl LogsClient for PodmanLogsClient {
    async fn sources(
        &self,
        component: &str,
        app: &str,
        _namespace: &str,
        mode: Option<RunningMode>,
    ) -> Result<Vec<LogSource>> {
        let selector = get_selector(component, app, mode, false);
        let pods = self.podman.list_pods(&selector).await?;

        let mut sources = Vec::new();
        for pod in pods {
            let prefix = format!("{}-", pod.name);
            for container in &pod.containers {
                if container.names.ends_with("-infra") {
                    continue;
                }
                sources.push(LogSource {
                    pod: pod.name.clone(),
                    container: container.names.clone(),
                    display_name: container
                        .names
                        .strip_prefix(&prefix)
                        .unwrap_or(&container.names)
                        .to_string(),
                });
            }
        }
        Ok(sources)
    }

    async fn stream(&self, _namespace: &str, source: &LogSource, follow: bool) -> Result<LineStream> {
        self.podman.logs(&source.container, follow).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::get_labels;
    use crate::infrastructure::fake::{FakeKube, FakePodman};
    use crate::infrastructure::podman::{PodContainer, PodSummary};
    use futures::StreamExt;
    use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[tokio::test]
    async fn test_kube_sources_follow_mode() {
        let kube = Arc::new(FakeKube::default());
        kube.add_pod(Pod {
            metadata: ObjectMeta {
                name: Some("api-app-0".to_string()),
                labels: Some(get_labels("api", "app", Some(RunningMode::Deploy), false)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "main".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        });
        kube.set_logs("api-app-0", "main", vec!["listening on 8080".to_string()]);
        let client = KubeLogsClient::new(kube.clone());

        let dev = client
            .sources("api", "app", "default", Some(RunningMode::Dev))
            .await
            .unwrap();
        assert!(dev.is_empty());

        let all = client.sources("api", "app", "default", None).await.unwrap();
        assert_eq!(all.len(), 1);
        let lines: Vec<String> = client
            .stream("default", &all[0], false)
            .await
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["listening on 8080".to_string()]);
    }

    #[tokio::test]
    async fn test_podman_sources_skip_infra() {
        let podman = Arc::new(FakePodman::default());
        podman.add_pod(PodSummary {
            name: "api-app".to_string(),
            status: "Running".to_string(),
            labels: get_labels("api", "app", Some(RunningMode::Dev), true),
            containers: vec![
                PodContainer {
                    names: "api-app-infra".to_string(),
                    status: "running".to_string(),
                },
                PodContainer {
                    names: "api-app-runtime".to_string(),
                    status: "running".to_string(),
                },
            ],
        });
        let sources = PodmanLogsClient::new(podman)
            .sources("api", "app", "", None)
            .await
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].display_name, "runtime");
        assert_eq!(sources[0].container, "api-app-runtime");
    }
}
