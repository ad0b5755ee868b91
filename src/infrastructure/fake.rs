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

//! In-memory backends for tests and for client set overrides.

use crate::domain::api::DevfileStack;
use crate::domain::preference::Registry;
use crate::infrastructure::container::{ExecOutput, LineStream};
use crate::infrastructure::registry::{RegistryClient, StackFilter};
use crate::infrastructure::kubernetes::{KubernetesClient, ResourceRef};
use crate::infrastructure::podman::{PodSummary, PodmanClient, PodmanVersion};
use crate::shared::error::{AstraError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// True when `labels` carries every `key=value` pair of `selector`.
pub fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .filter(|s| !s.is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => labels.contains_key(pair),
        })
}

fn lines(output: &[String]) -> LineStream {
    let items: Vec<Result<String>> = output.iter().cloned().map(Ok).collect();
    Box::pin(futures::stream::iter(items))
}

#[derive(Default)]
struct KubeState {
    namespaces: BTreeMap<String, String>,
    resources: Vec<ResourceRef>,
    pods: Vec<Pod>,
    deployments: Vec<Deployment>,
    services: Vec<Service>,
    manifests: Vec<serde_json::Value>,
    deleted: Vec<ResourceRef>,
    commands: Vec<(String, String, Vec<String>)>,
    logs: BTreeMap<String, Vec<String>>,
    kinds: BTreeMap<String, Vec<serde_json::Value>>,
}

/// A cluster kept in memory.
pub struct FakeKube {
    namespace: String,
    state: Mutex<KubeState>,
}

impl Default for FakeKube {
    fn default() -> Self {
        Self::new("default")
    }
}

impl FakeKube {
    pub fn new(namespace: &str) -> Self {
        let mut state = KubeState::default();
        state
            .namespaces
            .insert(namespace.to_string(), "Active".to_string());
        Self {
            namespace: namespace.to_string(),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, KubeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_resources(&self, resources: Vec<ResourceRef>) {
        self.lock().resources.extend(resources);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.lock().pods.push(pod);
    }

    pub fn add_kind(&self, kind: &str, items: Vec<serde_json::Value>) {
        self.lock().kinds.insert(kind.to_string(), items);
    }

    pub fn set_logs(&self, pod: &str, container: &str, output: Vec<String>) {
        self.lock()
            .logs
            .insert(format!("{}/{}", pod, container), output);
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.lock().deployments.clone()
    }

    pub fn services(&self) -> Vec<Service> {
        self.lock().services.clone()
    }

    pub fn manifests(&self) -> Vec<serde_json::Value> {
        self.lock().manifests.clone()
    }

    pub fn deleted(&self) -> Vec<ResourceRef> {
        self.lock().deleted.clone()
    }

    /// `(pod, container, command)` of every exec.
    pub fn commands(&self) -> Vec<(String, String, Vec<String>)> {
        self.lock().commands.clone()
    }
}

#[async_trait::async_trait]
impl KubernetesClient for FakeKube {
    fn current_namespace(&self) -> &str {
        &self.namespace
    }

    fn server_url(&self) -> String {
        "https://127.0.0.1:6443".to_string()
    }

    async fn server_version(&self) -> Result<String> {
        Ok("v1.30.0".to_string())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.lock().namespaces.keys().cloned().collect())
    }

    async fn namespace_phase(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock().namespaces.get(name).cloned())
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.namespaces.contains_key(name) {
            return Err(AstraError::already_exists("namespace", name, ""));
        }
        state
            .namespaces
            .insert(name.to_string(), "Active".to_string());
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.lock()
            .namespaces
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AstraError::not_found("namespace", name, ""))
    }

    async fn apply_deployment(&self, _namespace: &str, deployment: &Deployment) -> Result<()> {
        self.lock().deployments.push(deployment.clone());
        Ok(())
    }

    async fn apply_service(&self, _namespace: &str, service: &Service) -> Result<()> {
        self.lock().services.push(service.clone());
        Ok(())
    }

    async fn apply_manifest(
        &self,
        _namespace: &str,
        manifest: &serde_json::Value,
    ) -> Result<ResourceRef> {
        let str_at = |pointer: &str| {
            manifest
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let labels = manifest
            .pointer("/metadata/labels")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let resource = ResourceRef {
            api_version: str_at("/apiVersion"),
            kind: str_at("/kind"),
            name: str_at("/metadata/name"),
            labels,
            ..Default::default()
        };
        let mut state = self.lock();
        state.manifests.push(manifest.clone());
        state.resources.push(resource.clone());
        Ok(resource)
    }

    async fn list_pods(&self, _namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        Ok(self
            .lock()
            .pods
            .iter()
            .filter(|p| {
                p.metadata
                    .labels
                    .as_ref()
                    .map(|l| selector_matches(selector, l))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_resources(&self, _namespace: &str, selector: &str) -> Result<Vec<ResourceRef>> {
        Ok(self
            .lock()
            .resources
            .iter()
            .filter(|r| selector_matches(selector, &r.labels))
            .cloned()
            .collect())
    }

    async fn list_kind(
        &self,
        _namespace: &str,
        _api_version: &str,
        kind: &str,
    ) -> Result<Vec<serde_json::Value>> {
        Ok(self.lock().kinds.get(kind).cloned().unwrap_or_default())
    }

    async fn delete_resource(&self, _namespace: &str, resource: &ResourceRef) -> Result<()> {
        let mut state = self.lock();
        state
            .resources
            .retain(|r| !(r.kind == resource.kind && r.name == resource.name));
        state.deleted.push(resource.clone());
        Ok(())
    }

    async fn pod_logs(
        &self,
        _namespace: &str,
        pod: &str,
        container: &str,
        _follow: bool,
    ) -> Result<LineStream> {
        let state = self.lock();
        let output = state
            .logs
            .get(&format!("{}/{}", pod, container))
            .cloned()
            .unwrap_or_default();
        Ok(lines(&output))
    }

    async fn exec(
        &self,
        _namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        _show_output: bool,
    ) -> Result<ExecOutput> {
        self.lock()
            .commands
            .push((pod.to_string(), container.to_string(), command.to_vec()));
        Ok(ExecOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct PodmanState {
    pods: Vec<PodSummary>,
    played: Vec<Pod>,
    volumes: Vec<String>,
    removed_pods: Vec<String>,
    removed_volumes: Vec<String>,
    commands: Vec<(String, Vec<String>)>,
    logs: BTreeMap<String, Vec<String>>,
}

/// A podman kept in memory. Played pods show up as running.
#[derive(Default)]
pub struct FakePodman {
    state: Mutex<PodmanState>,
}

impl FakePodman {
    fn lock(&self) -> std::sync::MutexGuard<'_, PodmanState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_pod(&self, pod: PodSummary) {
        self.lock().pods.push(pod);
    }

    pub fn add_volume(&self, name: &str) {
        self.lock().volumes.push(name.to_string());
    }

    pub fn set_logs(&self, container: &str, output: Vec<String>) {
        self.lock().logs.insert(container.to_string(), output);
    }

    pub fn played(&self) -> Vec<Pod> {
        self.lock().played.clone()
    }

    pub fn removed_pods(&self) -> Vec<String> {
        self.lock().removed_pods.clone()
    }

    pub fn removed_volumes(&self) -> Vec<String> {
        self.lock().removed_volumes.clone()
    }

    /// `(container, command)` of every exec.
    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.lock().commands.clone()
    }
}

#[async_trait::async_trait]
impl PodmanClient for FakePodman {
    async fn version(&self) -> Result<PodmanVersion> {
        Ok(PodmanVersion {
            client: "4.9.0".to_string(),
            server: None,
        })
    }

    async fn play_kube(&self, pod: &Pod) -> Result<()> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let containers = pod
            .spec
            .as_ref()
            .map(|s| {
                s.containers
                    .iter()
                    .map(|c| crate::infrastructure::podman::PodContainer {
                        names: format!("{}-{}", name, c.name),
                        status: "running".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let mut state = self.lock();
        state.pods.retain(|p| p.name != name);
        state.pods.push(PodSummary {
            name,
            status: "Running".to_string(),
            labels: pod.metadata.labels.clone().unwrap_or_default(),
            containers,
        });
        state.played.push(pod.clone());
        Ok(())
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<PodSummary>> {
        Ok(self
            .lock()
            .pods
            .iter()
            .filter(|p| selector_matches(selector, &p.labels))
            .cloned()
            .collect())
    }

    async fn remove_pod(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.pods.retain(|p| p.name != name);
        state.removed_pods.push(name.to_string());
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<String>> {
        Ok(self.lock().volumes.clone())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.volumes.retain(|v| v != name);
        state.removed_volumes.push(name.to_string());
        Ok(())
    }

    async fn exec(
        &self,
        container: &str,
        command: &[String],
        _show_output: bool,
    ) -> Result<ExecOutput> {
        self.lock()
            .commands
            .push((container.to_string(), command.to_vec()));
        Ok(ExecOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }

    async fn logs(&self, container: &str, _follow: bool) -> Result<LineStream> {
        let output = self.lock().logs.get(container).cloned().unwrap_or_default();
        Ok(lines(&output))
    }
}

/// One registry serving fixed stacks and devfiles.
pub struct FakeRegistry {
    registry: Registry,
    stacks: Vec<DevfileStack>,
    devfiles: BTreeMap<String, String>,
    files: BTreeMap<String, String>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            registry: Registry::new("DefaultDevfileRegistry", "https://registry.example.com", false),
            stacks: Vec::new(),
            devfiles: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }
}

impl FakeRegistry {
    /// Serve `devfile` as the content of `stack`.
    pub fn with_stack(mut self, mut stack: DevfileStack, devfile: &str) -> Self {
        stack.registry.name = self.registry.name.clone();
        stack.registry.url = self.registry.url.clone();
        self.devfiles.insert(stack.name.clone(), devfile.to_string());
        self.stacks.push(stack);
        self
    }

    pub fn with_file(mut self, url: &str, content: &str) -> Self {
        self.files.insert(url.to_string(), content.to_string());
        self
    }
}

#[async_trait::async_trait]
impl RegistryClient for FakeRegistry {
    async fn registries(&self, name: Option<&str>) -> Result<Vec<Registry>> {
        match name {
            Some(name) if name != self.registry.name => Err(AstraError::RegistryMissing {
                name: name.to_string(),
            }),
            _ => Ok(vec![self.registry.clone()]),
        }
    }

    async fn list_stacks(&self, filter: &StackFilter) -> Result<Vec<DevfileStack>> {
        self.registries(filter.registry.as_deref()).await?;
        Ok(self
            .stacks
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn download_devfile(
        &self,
        _registry: &Registry,
        stack: &str,
        _version: Option<&str>,
    ) -> Result<String> {
        self.devfiles
            .get(stack)
            .cloned()
            .ok_or_else(|| AstraError::RegistryError(format!("stack {} not found", stack)))
    }

    async fn download_file(&self, url: &str) -> Result<String> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| AstraError::RegistryError(format!("GET {} failed with status 404", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matches() {
        let mut labels = BTreeMap::new();
        labels.insert("a".to_string(), "1".to_string());
        labels.insert("b".to_string(), "2".to_string());
        assert!(selector_matches("a=1,b=2", &labels));
        assert!(selector_matches("", &labels));
        assert!(!selector_matches("a=1,c=3", &labels));
    }
}
