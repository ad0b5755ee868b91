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

use super::{run_dev_commands, DevClient, DevSession, StartOptions};
use crate::domain::api::ForwardedPort;
use crate::domain::component::{DeleteComponentClient, PLATFORM_CLUSTER};
use crate::domain::devfile::DevfileObj;
use crate::domain::exec::ExecClient;
use crate::domain::labels::{get_labels, get_selector, RunningMode};
use crate::domain::preference::PreferenceClient;
use crate::domain::state::StateClient;
use crate::infrastructure::constants::DEV_POD_POLL_INTERVAL_SECS;
use crate::infrastructure::kubernetes::resources::containers::{mounts_sources, PROJECTS_VOLUME_NAME};
use crate::infrastructure::kubernetes::resources::{DeploymentBuilder, ServiceBuilder};
use crate::infrastructure::kubernetes::KubernetesClient;
use crate::shared::error::{AstraError, Result};
use crate::shared::retry::poll_until;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Dev sessions on the cluster: a Deployment, a Service and `exec` in the pod.
pub struct KubeDevClient {
    kube: Arc<dyn KubernetesClient>,
    exec: Arc<dyn ExecClient>,
    deleter: Arc<dyn DeleteComponentClient>,
    state: Arc<dyn StateClient>,
    prefs: Arc<dyn PreferenceClient>,
    ready_timeout: Duration,
}

impl KubeDevClient {
    pub fn new(
        kube: Arc<dyn KubernetesClient>,
        exec: Arc<dyn ExecClient>,
        deleter: Arc<dyn DeleteComponentClient>,
        state: Arc<dyn StateClient>,
        prefs: Arc<dyn PreferenceClient>,
    ) -> Self {
        let ready_timeout = prefs.push_timeout();
        Self {
            kube,
            exec,
            deleter,
            state,
            prefs,
            ready_timeout,
        }
    }

    /// Keep the sources on a claim that outlives the pod unless `Ephemeral` is set.
    async fn persist_sources(&self, session: &DevSession, deployment: &mut Deployment) -> Result<()> {
        let claim = format!("{}-{}-{}", PROJECTS_VOLUME_NAME, session.component, session.app);
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {
                "name": claim,
                "labels": get_labels(&session.component, &session.app, Some(RunningMode::Dev), false),
            },
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {"requests": {"storage": "2Gi"}},
            },
        });
        self.kube.apply_manifest(&session.namespace, &manifest).await?;

        let volumes = deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .and_then(|s| s.volumes.as_mut());
        for volume in volumes.into_iter().flatten() {
            if volume.name == PROJECTS_VOLUME_NAME {
                volume.empty_dir = None;
                volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.clone(),
                    ..Default::default()
                });
            }
        }
        Ok(())
    }

    async fn wait_for_pod(&self, session: &DevSession) -> Result<()> {
        let selector = get_selector(&session.component, &session.app, Some(RunningMode::Dev), true);
        let kube = self.kube.as_ref();
        let selector = selector.as_str();
        let namespace = session.namespace.as_str();

        tracing::info!("Waiting for the pod of {} to be running", session.component);
        poll_until(
            "dev pod",
            Duration::from_secs(DEV_POD_POLL_INTERVAL_SECS),
            self.ready_timeout,
            || async move {
                let pods = kube.list_pods(namespace, selector).await?;
                for pod in &pods {
                    let status = pod.status.as_ref();
                    let phase = status.and_then(|s| s.phase.as_deref());
                    if phase == Some("Failed") {
                        return Err(AstraError::KubeError(format!(
                            "pod {} failed: {}",
                            pod.metadata.name.as_deref().unwrap_or_default(),
                            status.and_then(|s| s.message.as_deref()).unwrap_or("unknown reason")
                        )));
                    }
                }
                Ok(pods.iter().any(|p| {
                    p.metadata.deletion_timestamp.is_none()
                        && p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
                }))
            },
        )
        .await
    }
}

#[async_trait::async_trait]
impl DevClient for KubeDevClient {
    async fn start(
        &self,
        devfile: &DevfileObj,
        session: &DevSession,
        options: &StartOptions,
    ) -> Result<Vec<ForwardedPort>> {
        self.state.init(PLATFORM_CLUSTER)?;

        let mut deployment = DeploymentBuilder::new(
            session.component.clone(),
            session.app.clone(),
            session.namespace.clone(),
        )
        .with_project_type(session.project_type.clone())
        .build(&devfile.data)?;
        if mounts_sources(&devfile.data) && !self.prefs.ephemeral_source_volume() {
            self.persist_sources(session, &mut deployment).await?;
        }
        self.kube
            .apply_deployment(&session.namespace, &deployment)
            .await?;

        let service = ServiceBuilder::new(
            session.component.clone(),
            session.app.clone(),
            session.namespace.clone(),
        )
        .build(&devfile.data);
        if let Some(service) = service {
            self.kube.apply_service(&session.namespace, &service).await?;
        }

        self.wait_for_pod(session).await?;
        run_dev_commands(self.exec.as_ref(), devfile, session, options).await?;

        // Port forwarding is not done on the cluster, the Service is the way in.
        self.state.set_forwarded_ports(&[])?;
        Ok(Vec::new())
    }

    async fn cleanup(&self, devfile: &DevfileObj, session: &DevSession) -> Result<()> {
        self.deleter
            .execute_pre_stop_events(&devfile.data, &session.target())
            .await?;
        let resources = self
            .deleter
            .list_cluster_resources_to_delete(
                &session.component,
                &session.app,
                &session.namespace,
                Some(RunningMode::Dev),
            )
            .await?;
        let failed = self
            .deleter
            .delete_resources(&session.namespace, &resources, false)
            .await;
        self.state.save_exit()?;
        if !failed.is_empty() {
            return Err(AstraError::KubeError(format!(
                "failed to delete {}",
                failed
                    .iter()
                    .map(|r| format!("{}/{}", r.kind, r.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }

    fn forget(&self) -> Result<()> {
        self.state.save_exit()
    }
}
