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

use super::index::{to_stacks, IndexEntry};
use crate::domain::api::DevfileStack;
use crate::domain::preference::{PreferenceClient, Registry};
use crate::infrastructure::constants::REGISTRY_INDEX_PATH;
use crate::infrastructure::filesystem::Filesystem;
use crate::infrastructure::kubernetes::KubernetesClient;
use crate::shared::error::{AstraError, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const REGISTRY_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REGISTRY_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const CLUSTER_REGISTRY_API_VERSION: &str = "registry.devfile.io/v1alpha1";
const NAMESPACE_REGISTRY_KIND: &str = "DevfileRegistriesList";
const CLUSTER_REGISTRY_KIND: &str = "ClusterDevfileRegistriesList";

/// Which stacks `list_stacks` returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFilter {
    /// Only this registry.
    pub registry: Option<String>,
    /// Only the stack with this exact name.
    pub devfile: Option<String>,
    /// Substring of the name or description, case-insensitive.
    pub filter: Option<String>,
}

impl StackFilter {
    pub fn matches(&self, stack: &DevfileStack) -> bool {
        if let Some(name) = &self.devfile {
            if &stack.name != name {
                return false;
            }
        }
        match &self.filter {
            Some(filter) if !filter.is_empty() => {
                let needle = filter.to_lowercase();
                stack.name.to_lowercase().contains(&needle)
                    || stack.description.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

#[async_trait::async_trait]
pub trait RegistryClient: Send + Sync {
    /// Registries in lookup order, cluster-defined ones first. `name` narrows to one.
    async fn registries(&self, name: Option<&str>) -> Result<Vec<Registry>>;

    async fn list_stacks(&self, filter: &StackFilter) -> Result<Vec<DevfileStack>>;

    /// Devfile content of `stack` at `version` (`latest` when `None`).
    async fn download_devfile(
        &self,
        registry: &Registry,
        stack: &str,
        version: Option<&str>,
    ) -> Result<String>;

    /// Plain GET of a file, used for devfiles and manifests given by URL.
    async fn download_file(&self, url: &str) -> Result<String>;
}

pub struct RegistryHttpClient {
    http: Client,
    preferences: Arc<dyn PreferenceClient>,
    fs: Arc<dyn Filesystem>,
    kube: Option<Arc<dyn KubernetesClient>>,
    cache_dir: PathBuf,
}

impl RegistryHttpClient {
    pub fn new(
        preferences: Arc<dyn PreferenceClient>,
        fs: Arc<dyn Filesystem>,
        kube: Option<Arc<dyn KubernetesClient>>,
    ) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(REGISTRY_CONNECT_TIMEOUT)
            .timeout(REGISTRY_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AstraError::RegistryError(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            preferences,
            fs,
            kube,
            cache_dir: std::env::temp_dir().join("astra-registry-cache"),
        })
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self.http.get(url).send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AstraError::RegistryError(format!(
                "GET {} failed with status {}",
                url, status
            )));
        }
        response.text().await.map_err(map_http_error)
    }

    fn cache_file(&self, registry: &Registry) -> PathBuf {
        let key: String = registry
            .url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.cache_dir.join(format!("{}.json", key))
    }

    fn cached_index(&self, registry: &Registry) -> Option<String> {
        let path = self.cache_file(registry);
        let modified = self.fs.modified(&path).ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age > self.preferences.registry_cache_time() {
            return None;
        }
        self.fs.read_to_string(&path).ok()
    }

    async fn index(&self, registry: &Registry) -> Result<Vec<IndexEntry>> {
        let content = match self.cached_index(registry) {
            Some(content) => content,
            None => {
                let url = format!("{}{}", registry.url.trim_end_matches('/'), REGISTRY_INDEX_PATH);
                let content = self.get_text(&url).await?;
                if let Err(e) = self.fs.write(&self.cache_file(registry), &content) {
                    tracing::debug!("unable to cache the index of {}: {}", registry.name, e);
                }
                content
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            AstraError::RegistryError(format!(
                "unable to parse the index of registry {}: {}",
                registry.name, e
            ))
        })
    }

    async fn cluster_registries(&self) -> Vec<Registry> {
        let Some(kube) = &self.kube else {
            return Vec::new();
        };
        let namespace = kube.current_namespace().to_string();
        let mut found = Vec::new();
        for kind in [NAMESPACE_REGISTRY_KIND, CLUSTER_REGISTRY_KIND] {
            match kube
                .list_kind(&namespace, CLUSTER_REGISTRY_API_VERSION, kind)
                .await
            {
                Ok(items) => found.extend(items.iter().flat_map(registries_from_list)),
                Err(e) => tracing::debug!("unable to list {}: {}", kind, e),
            }
        }
        found
    }
}

/// Entries of `spec.devfileRegistries` in a registry list resource.
fn registries_from_list(item: &serde_json::Value) -> Vec<Registry> {
    item.pointer("/spec/devfileRegistries")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name")?.as_str()?;
                    let url = entry.get("url")?.as_str()?;
                    Some(Registry::new(name, url, false))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn map_http_error(error: reqwest::Error) -> AstraError {
    if error.is_timeout() {
        AstraError::RegistryError(format!("request timeout: {}", error))
    } else if error.is_connect() {
        AstraError::RegistryError(format!("connection error: {}", error))
    } else {
        AstraError::RegistryError(error.to_string())
    }
}

#[async_trait::async_trait]
impl RegistryClient for RegistryHttpClient {
    async fn registries(&self, name: Option<&str>) -> Result<Vec<Registry>> {
        let mut registries = self.cluster_registries().await;
        registries.extend(self.preferences.registry_list());
        if let Some(name) = name {
            registries.retain(|r| r.name == name);
            if registries.is_empty() {
                return Err(AstraError::RegistryMissing {
                    name: name.to_string(),
                });
            }
        }
        Ok(registries)
    }

    async fn list_stacks(&self, filter: &StackFilter) -> Result<Vec<DevfileStack>> {
        let registries = self.registries(filter.registry.as_deref()).await?;
        let lookups = registries.iter().map(|registry| async move {
            (registry, self.index(registry).await)
        });

        let mut stacks = Vec::new();
        for (registry, result) in futures::future::join_all(lookups).await {
            match result {
                Ok(entries) => stacks.extend(
                    to_stacks(registry, entries)
                        .into_iter()
                        .filter(|s| filter.matches(s)),
                ),
                Err(e) => tracing::warn!("Registry {} is not accessible: {}", registry.name, e),
            }
        }
        Ok(stacks)
    }

    async fn download_devfile(
        &self,
        registry: &Registry,
        stack: &str,
        version: Option<&str>,
    ) -> Result<String> {
        let version = version.filter(|v| !v.is_empty()).unwrap_or("latest");
        let url = format!(
            "{}/devfiles/{}/{}",
            registry.url.trim_end_matches('/'),
            stack,
            version
        );
        self.get_text(&url).await
    }

    async fn download_file(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stack(name: &str, description: &str) -> DevfileStack {
        DevfileStack {
            name: name.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stack_filter() {
        let filter = StackFilter {
            filter: Some("SPRING".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&stack("java-springboot", "")));
        assert!(filter.matches(&stack("java-maven", "uses Spring Boot")));
        assert!(!filter.matches(&stack("nodejs", "Node.js")));

        let exact = StackFilter {
            devfile: Some("nodejs".to_string()),
            ..Default::default()
        };
        assert!(exact.matches(&stack("nodejs", "")));
        assert!(!exact.matches(&stack("nodejs-angular", "")));
    }

    #[test]
    fn test_registries_from_list() {
        let item = json!({
            "spec": {"devfileRegistries": [
                {"name": "internal", "url": "https://registry.internal"},
                {"url": "https://missing-name"}
            ]}
        });
        let registries = registries_from_list(&item);
        assert_eq!(registries, vec![Registry::new("internal", "https://registry.internal", false)]);
    }

    #[tokio::test]
    async fn test_cluster_registries_first_and_cached_index() {
        use crate::domain::preference::PreferenceInfo;
        use crate::infrastructure::fake::FakeKube;
        use crate::infrastructure::filesystem::DefaultFs;

        let dir = tempfile::tempdir().unwrap();
        let preferences = PreferenceInfo::new(dir.path().join("preference.yaml")).unwrap();
        let kube = FakeKube::default();
        kube.add_kind(
            NAMESPACE_REGISTRY_KIND,
            vec![json!({
                "spec": {"devfileRegistries": [
                    {"name": "internal", "url": "https://registry.internal"}
                ]}
            })],
        );
        let client = RegistryHttpClient::new(
            Arc::new(preferences),
            Arc::new(DefaultFs),
            Some(Arc::new(kube)),
        )
        .unwrap()
        .with_cache_dir(dir.path().join("cache"));

        let registries = client.registries(None).await.unwrap();
        assert_eq!(registries[0].name, "internal");
        assert!(registries.len() > 1);

        std::fs::create_dir_all(dir.path().join("cache")).unwrap();
        std::fs::write(
            client.cache_file(&registries[0]),
            r#"[{"name": "go", "description": "Go runtime", "versions": [{"version": "1.0.0"}]}]"#,
        )
        .unwrap();
        let stacks = client
            .list_stacks(&StackFilter {
                registry: Some("internal".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].name, "go");
        assert_eq!(stacks[0].registry.name, "internal");

        let err = client.registries(Some("unknown")).await.unwrap_err();
        assert!(matches!(err, AstraError::RegistryMissing { .. }));
    }
}
