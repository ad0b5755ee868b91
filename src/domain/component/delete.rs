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

use super::list::created_in;
use crate::domain::devfile::DevfileData;
use crate::domain::exec::{run_devfile_command, ExecClient, ExecTarget};
use crate::domain::labels::{get_selector, RunningMode};
use crate::infrastructure::constants::NAMESPACE_WAIT_TIMEOUT_SECS;
use crate::infrastructure::kubernetes::{KubernetesClient, ResourceRef};
use crate::infrastructure::podman::PodmanClient;
use crate::shared::error::{AstraError, Result};
use crate::shared::retry::poll_until;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// What `astra delete component` removes on podman.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodmanResources {
    pub pods: Vec<String>,
    pub volumes: Vec<String>,
}

impl PodmanResources {
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty() && self.volumes.is_empty()
    }
}

#[async_trait::async_trait]
pub trait DeleteComponentClient: Send + Sync {
    /// Cluster resources of the component, in `mode` or in any mode when `None`.
    ///
    /// Resources being deleted and resources owned by another listed resource
    /// are left out, their owner takes them along.
    async fn list_cluster_resources_to_delete(
        &self,
        component: &str,
        app: &str,
        namespace: &str,
        mode: Option<RunningMode>,
    ) -> Result<Vec<ResourceRef>>;

    /// Delete `resources`, returning those that could not be deleted.
    async fn delete_resources(
        &self,
        namespace: &str,
        resources: &[ResourceRef],
        wait: bool,
    ) -> Vec<ResourceRef>;

    /// Run the `preStop` events in the dev container. Failures are only logged.
    async fn execute_pre_stop_events(&self, devfile: &DevfileData, target: &ExecTarget) -> Result<()>;

    async fn list_podman_resources_to_delete(
        &self,
        component: &str,
        app: &str,
        mode: Option<RunningMode>,
    ) -> Result<PodmanResources>;

    async fn delete_podman_resources(&self, resources: &PodmanResources) -> Result<()>;
}

pub struct ComponentDeleter {
    kube: Option<Arc<dyn KubernetesClient>>,
    podman: Option<Arc<dyn PodmanClient>>,
    exec: Option<Arc<dyn ExecClient>>,
}

impl ComponentDeleter {
    pub fn new(
        kube: Option<Arc<dyn KubernetesClient>>,
        podman: Option<Arc<dyn PodmanClient>>,
        exec: Option<Arc<dyn ExecClient>>,
    ) -> Self {
        Self { kube, podman, exec }
    }

    fn kube(&self) -> Result<&Arc<dyn KubernetesClient>> {
        self.kube
            .as_ref()
            .ok_or_else(|| AstraError::NoConnection("no cluster client".to_string()))
    }

    fn podman(&self) -> Result<&Arc<dyn PodmanClient>> {
        self.podman
            .as_ref()
            .ok_or_else(|| AstraError::PodmanNotFound {
                reason: "podman client not initialized".to_string(),
            })
    }
}

#[async_trait::async_trait]
impl DeleteComponentClient for ComponentDeleter {
    async fn list_cluster_resources_to_delete(
        &self,
        component: &str,
        app: &str,
        namespace: &str,
        mode: Option<RunningMode>,
    ) -> Result<Vec<ResourceRef>> {
        let selector = get_selector(component, app, mode, false);
        let resources = self.kube()?.list_resources(namespace, &selector).await?;
        let uids: HashSet<&str> = resources.iter().filter_map(|r| r.uid.as_deref()).collect();

        Ok(resources
            .iter()
            .filter(|r| !r.deleting)
            .filter(|r| created_in(r, mode))
            .filter(|r| !r.owner_uids.iter().any(|o| uids.contains(o.as_str())))
            .cloned()
            .collect())
    }

    async fn delete_resources(
        &self,
        namespace: &str,
        resources: &[ResourceRef],
        wait: bool,
    ) -> Vec<ResourceRef> {
        let kube = match self.kube() {
            Ok(kube) => kube,
            Err(_) => return resources.to_vec(),
        };

        let mut failed = Vec::new();
        let mut deleted = Vec::new();
        for resource in resources {
            match kube.delete_resource(namespace, resource).await {
                Ok(()) => {
                    tracing::debug!("deleted {} {}", resource.kind, resource.name);
                    deleted.push(resource);
                }
                Err(e) => {
                    tracing::warn!("failed to delete {} {}: {}", resource.kind, resource.name, e);
                    failed.push(resource.clone());
                }
            }
        }

        if wait && !deleted.is_empty() {
            let names: HashSet<(String, String)> = deleted
                .iter()
                .map(|r| (r.kind.clone(), r.name.clone()))
                .collect();
            let names = &names;
            let kube = kube.as_ref();
            let result = poll_until(
                "resource deletion",
                Duration::from_secs(1),
                Duration::from_secs(NAMESPACE_WAIT_TIMEOUT_SECS),
                || async move {
                    let remaining = kube.list_resources(namespace, "").await?;
                    Ok(!remaining
                        .iter()
                        .any(|r| names.contains(&(r.kind.clone(), r.name.clone()))))
                },
            )
            .await;
            if let Err(e) = result {
                tracing::warn!("{}", e);
            }
        }
        failed
    }

    async fn execute_pre_stop_events(&self, devfile: &DevfileData, target: &ExecTarget) -> Result<()> {
        let Some(exec) = &self.exec else {
            return Ok(());
        };
        for id in &devfile.events.pre_stop {
            let command = devfile
                .command(id)
                .ok_or_else(|| AstraError::devfile_error(format!("preStop event {:?} is not a command", id)))?;
            if let Err(e) = run_devfile_command(exec.as_ref(), devfile, command, target, false).await {
                tracing::warn!("failed to run preStop event {:?}: {}", id, e);
                if e.is_not_found() {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn list_podman_resources_to_delete(
        &self,
        component: &str,
        app: &str,
        mode: Option<RunningMode>,
    ) -> Result<PodmanResources> {
        if mode == Some(RunningMode::Deploy) {
            return Ok(PodmanResources::default());
        }
        let podman = self.podman()?;
        let selector = get_selector(component, app, Some(RunningMode::Dev), false);
        let pods: Vec<String> = podman
            .list_pods(&selector)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();

        let suffix = format!("-{}-{}", component, app);
        let volumes = if pods.is_empty() {
            Vec::new()
        } else {
            podman
                .list_volumes()
                .await?
                .into_iter()
                .filter(|v| v.ends_with(&suffix))
                .collect()
        };
        Ok(PodmanResources { pods, volumes })
    }

    async fn delete_podman_resources(&self, resources: &PodmanResources) -> Result<()> {
        let podman = self.podman()?;
        for pod in &resources.pods {
            podman.remove_pod(pod).await?;
        }
        for volume in &resources.volumes {
            podman.remove_volume(volume).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exec::PodmanExecClient;
    use crate::domain::labels::get_labels;
    use crate::infrastructure::fake::{FakeKube, FakePodman};
    use crate::infrastructure::podman::PodSummary;

    fn resource(kind: &str, uid: &str, mode: RunningMode) -> ResourceRef {
        ResourceRef {
            api_version: "v1".to_string(),
            kind: kind.to_string(),
            name: format!("api-{}", kind.to_lowercase()),
            uid: Some(uid.to_string()),
            labels: get_labels("api", "app", Some(mode), false),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_owned_and_deleting_resources_are_skipped() {
        let kube = Arc::new(FakeKube::default());
        let mut replica_set = resource("ReplicaSet", "2", RunningMode::Dev);
        replica_set.owner_uids = vec!["1".to_string()];
        let mut terminating = resource("ConfigMap", "3", RunningMode::Dev);
        terminating.deleting = true;
        kube.add_resources(vec![
            resource("Deployment", "1", RunningMode::Dev),
            replica_set,
            terminating,
            resource("Service", "4", RunningMode::Deploy),
        ]);

        let deleter = ComponentDeleter::new(Some(kube.clone()), None, None);
        let dev = deleter
            .list_cluster_resources_to_delete("api", "app", "default", Some(RunningMode::Dev))
            .await
            .unwrap();
        assert_eq!(dev.len(), 1);
        assert_eq!(dev[0].kind, "Deployment");

        let all = deleter
            .list_cluster_resources_to_delete("api", "app", "default", None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let failed = deleter.delete_resources("default", &all, true).await;
        assert!(failed.is_empty());
        assert_eq!(kube.deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_podman_resources() {
        let podman = Arc::new(FakePodman::default());
        podman.add_pod(PodSummary {
            name: "api-app".to_string(),
            status: "Running".to_string(),
            labels: get_labels("api", "app", Some(RunningMode::Dev), true),
            containers: Vec::new(),
        });
        podman.add_volume("cache-api-app");
        podman.add_volume("cache-web-app");

        let exec = Arc::new(PodmanExecClient::new(podman.clone()));
        let deleter = ComponentDeleter::new(None, Some(podman.clone()), Some(exec));
        let deploy = deleter
            .list_podman_resources_to_delete("api", "app", Some(RunningMode::Deploy))
            .await
            .unwrap();
        assert!(deploy.is_empty());

        let found = deleter
            .list_podman_resources_to_delete("api", "app", None)
            .await
            .unwrap();
        assert_eq!(found.pods, vec!["api-app".to_string()]);
        assert_eq!(found.volumes, vec!["cache-api-app".to_string()]);

        deleter.delete_podman_resources(&found).await.unwrap();
        assert_eq!(podman.removed_pods(), vec!["api-app".to_string()]);
        assert_eq!(podman.removed_volumes(), vec!["cache-api-app".to_string()]);
    }

    #[tokio::test]
    async fn test_pre_stop_events_run_in_container() {
        let podman = Arc::new(FakePodman::default());
        let exec = Arc::new(PodmanExecClient::new(podman.clone()));
        let deleter = ComponentDeleter::new(None, Some(podman.clone()), Some(exec));
        let devfile: DevfileData = serde_yaml::from_str(
            r#"
schemaVersion: 2.2.0
components:
- name: runtime
  container:
    image: node
commands:
- id: flush
  exec:
    component: runtime
    commandLine: ./flush.sh
events:
  preStop: [flush]
"#,
        )
        .unwrap();
        let target = ExecTarget {
            component: "api".to_string(),
            app: "app".to_string(),
            namespace: String::new(),
        };
        deleter.execute_pre_stop_events(&devfile, &target).await.unwrap();
        let commands = podman.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "api-app-runtime");
    }
}
