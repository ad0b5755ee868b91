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

use crate::infrastructure::constants::{DEFAULT_NAMESPACE, FIELD_MANAGER};
use crate::infrastructure::container::{drain, ExecOutput, LineStream};
use crate::shared::error::{is_kube_not_found, AstraError, Result};
use futures::{AsyncBufReadExt, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Status};
use kube::api::{
    Api, AttachParams, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams,
    PostParams,
};
use kube::discovery::{verbs, ApiCapabilities, ApiResource, Discovery, Scope};
use kube::{Client, Config, ResourceExt};
use std::collections::BTreeMap;
use std::time::Duration;

/// A cluster object found by label selector, independent of its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_uids: Vec<String>,
    pub deleting: bool,
}

impl ResourceRef {
    fn from_dynamic(obj: &DynamicObject, ar: &ApiResource) -> Self {
        Self {
            api_version: ar.api_version.clone(),
            kind: ar.kind.clone(),
            name: obj.name_any(),
            uid: obj.metadata.uid.clone(),
            labels: obj.labels().clone(),
            annotations: obj.annotations().clone(),
            owner_uids: obj
                .owner_references()
                .iter()
                .map(|o| o.uid.clone())
                .collect(),
            deleting: obj.metadata.deletion_timestamp.is_some(),
        }
    }
}

#[async_trait::async_trait]
pub trait KubernetesClient: Send + Sync {
    /// Namespace of the current kubeconfig context.
    fn current_namespace(&self) -> &str;

    fn server_url(&self) -> String;

    async fn server_version(&self) -> Result<String>;

    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Phase of a namespace, `None` when it does not exist.
    async fn namespace_phase(&self, name: &str) -> Result<Option<String>>;

    async fn create_namespace(&self, name: &str) -> Result<()>;

    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn apply_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()>;

    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<()>;

    /// Server-side apply of any manifest, resolving its kind through discovery.
    async fn apply_manifest(
        &self,
        namespace: &str,
        manifest: &serde_json::Value,
    ) -> Result<ResourceRef>;

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>>;

    /// Every namespaced, listable resource matching the selector.
    async fn list_resources(&self, namespace: &str, selector: &str) -> Result<Vec<ResourceRef>>;

    /// Objects of one kind, or nothing when the kind is not served by the cluster.
    async fn list_kind(
        &self,
        namespace: &str,
        api_version: &str,
        kind: &str,
    ) -> Result<Vec<serde_json::Value>>;

    async fn delete_resource(&self, namespace: &str, resource: &ResourceRef) -> Result<()>;

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        follow: bool,
    ) -> Result<LineStream>;

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        show_output: bool,
    ) -> Result<ExecOutput>;
}

pub struct KubeClient {
    client: Client,
    namespace: String,
    server_url: String,
}

impl KubeClient {
    /// Client for the current kubeconfig context. `timeout` bounds connection setup.
    pub async fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut config = Config::infer().await.map_err(|e| {
            AstraError::NoConnection(format!("unable to load the kubeconfig: {}", e))
        })?;
        if timeout.is_some() {
            config.connect_timeout = timeout;
        }
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        let namespace = if config.default_namespace.is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            config.default_namespace.clone()
        };
        let server_url = config.cluster_url.to_string();
        let client = Client::try_from(config).map_err(|e| {
            AstraError::NoConnection(format!("failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self {
            client,
            namespace,
            server_url,
        })
    }

    async fn resolve_kind(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<(ApiResource, ApiCapabilities)> {
        let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
        let gvk = kube::core::GroupVersionKind::gvk(group, version, kind);
        let resolved = kube::discovery::pinned_kind(&self.client, &gvk).await?;
        Ok(resolved)
    }

    fn dynamic_api(
        &self,
        namespace: &str,
        ar: &ApiResource,
        caps: &ApiCapabilities,
    ) -> Api<DynamicObject> {
        match caps.scope {
            Scope::Namespaced => Api::namespaced_with(self.client.clone(), namespace, ar),
            Scope::Cluster => Api::all_with(self.client.clone(), ar),
        }
    }
}

fn exit_code(status: Option<Status>) -> Option<i32> {
    let status = status?;
    if status.status.as_deref() == Some("Success") {
        return Some(0);
    }
    status
        .details
        .and_then(|d| d.causes)
        .unwrap_or_default()
        .into_iter()
        .find(|c| c.reason.as_deref() == Some("ExitCode"))
        .and_then(|c| c.message)
        .and_then(|m| m.parse().ok())
        .or(Some(1))
}

#[async_trait::async_trait]
impl KubernetesClient for KubeClient {
    fn current_namespace(&self) -> &str {
        &self.namespace
    }

    fn server_url(&self) -> String {
        self.server_url.clone()
    }

    async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api.list(&ListParams::default()).await?;
        Ok(namespaces.items.iter().map(|n| n.name_any()).collect())
    }

    async fn namespace_phase(&self, name: &str) -> Result<Option<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(name).await {
            Ok(ns) => Ok(Some(
                ns.status
                    .and_then(|s| s.phase)
                    .unwrap_or_else(|| "Active".to_string()),
            )),
            Err(e) if is_kube_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &namespace).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                Err(AstraError::already_exists("Namespace", name, ""))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_kube_not_found(&e) => Err(AstraError::not_found("Namespace", name, "")),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let name = deployment
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| AstraError::config_error("Deployment name is required"))?;

        match api.get(name).await {
            Ok(_) => {
                let patch_params = PatchParams::apply(FIELD_MANAGER).force();
                let patch = serde_json::to_value(deployment)?;
                api.patch(name, &patch_params, &Patch::Apply(patch)).await?;
            }
            Err(e) if is_kube_not_found(&e) => {
                api.create(&PostParams::default(), deployment).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let name = service
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| AstraError::config_error("Service name is required"))?;

        match api.get(name).await {
            Ok(existing) => {
                let mut service = service.clone();
                if let (Some(existing_spec), Some(new_spec)) = (&existing.spec, &mut service.spec)
                {
                    new_spec.cluster_ip = existing_spec.cluster_ip.clone();
                    new_spec.cluster_ips = existing_spec.cluster_ips.clone();
                }
                let patch_params = PatchParams::apply(FIELD_MANAGER).force();
                let patch = serde_json::to_value(&service)?;
                api.patch(name, &patch_params, &Patch::Apply(patch)).await?;
            }
            Err(e) if is_kube_not_found(&e) => {
                api.create(&PostParams::default(), service).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn apply_manifest(
        &self,
        namespace: &str,
        manifest: &serde_json::Value,
    ) -> Result<ResourceRef> {
        let api_version = manifest
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AstraError::devfile_error("manifest has no apiVersion"))?;
        let kind = manifest
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AstraError::devfile_error("manifest has no kind"))?;
        let name = manifest
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AstraError::devfile_error(format!("{} has no metadata.name", kind)))?;

        let (ar, caps) = self.resolve_kind(api_version, kind).await?;
        let api = self.dynamic_api(namespace, &ar, &caps);
        let patch_params = PatchParams::apply(FIELD_MANAGER).force();
        let applied = api
            .patch(name, &patch_params, &Patch::Apply(manifest))
            .await?;
        tracing::debug!("applied {}/{} in {}", kind, name, namespace);
        Ok(ResourceRef::from_dynamic(&applied, &ar))
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(selector);
        let pods = api.list(&lp).await?;
        Ok(pods.items)
    }

    async fn list_resources(&self, namespace: &str, selector: &str) -> Result<Vec<ResourceRef>> {
        let discovery = Discovery::new(self.client.clone()).run().await?;
        let lp = ListParams::default().labels(selector);
        let mut found = Vec::new();

        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if caps.scope != Scope::Namespaced || !caps.supports_operation(verbs::LIST) {
                    continue;
                }
                if ar.kind == "Event" {
                    continue;
                }
                let api: Api<DynamicObject> =
                    Api::namespaced_with(self.client.clone(), namespace, &ar);
                match api.list(&lp).await {
                    Ok(list) => found.extend(
                        list.items
                            .iter()
                            .map(|obj| ResourceRef::from_dynamic(obj, &ar)),
                    ),
                    Err(e) => tracing::debug!("skipping {}: {}", ar.kind, e),
                }
            }
        }
        Ok(found)
    }

    async fn list_kind(
        &self,
        namespace: &str,
        api_version: &str,
        kind: &str,
    ) -> Result<Vec<serde_json::Value>> {
        let (ar, caps) = match self.resolve_kind(api_version, kind).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("{} is not served by the cluster: {}", kind, e);
                return Ok(Vec::new());
            }
        };
        let api = self.dynamic_api(namespace, &ar, &caps);
        let list = api.list(&ListParams::default()).await?;
        list.items
            .into_iter()
            .map(|obj| serde_json::to_value(obj).map_err(AstraError::from))
            .collect()
    }

    async fn delete_resource(&self, namespace: &str, resource: &ResourceRef) -> Result<()> {
        let (ar, caps) = self
            .resolve_kind(&resource.api_version, &resource.kind)
            .await?;
        let api = self.dynamic_api(namespace, &ar, &caps);
        match api.delete(&resource.name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) if is_kube_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        follow: bool,
    ) -> Result<LineStream> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = LogParams {
            container: Some(container.to_string()),
            follow,
            ..Default::default()
        };
        let pod = pod.to_string();

        // The reader borrows the api handle, so it is read on a task that owns both.
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(64);
        tokio::spawn(async move {
            let mut lines = match api.log_stream(&pod, &lp).await {
                Ok(reader) => Box::pin(reader.lines()),
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };
            while let Some(line) = lines.next().await {
                if tx.send(line.map_err(AstraError::from)).await.is_err() {
                    break;
                }
            }
        });
        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        show_output: bool,
    ) -> Result<ExecOutput> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(true);
        let mut attached = api.exec(pod, command.to_vec(), &params).await?;

        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let status = attached.take_status();
        let (stdout, stderr) = tokio::join!(
            drain(stdout, show_output, false),
            drain(stderr, show_output, true)
        );
        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| AstraError::KubeError(format!("exec in {} failed: {}", pod, e)))?;

        Ok(ExecOutput {
            stdout: stdout?,
            stderr: stderr?,
            exit_code: exit_code(status),
        })
    }
}
