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

//! `astra deploy` and `astra build-images`.

use crate::domain::devfile::model::KubernetesComponent;
use crate::domain::devfile::{CommandGroupKind, CommandType, ComponentType, DevfileObj};
use crate::domain::labels::{get_labels, project_type_annotation, RunningMode};
use crate::infrastructure::constants::MANIFEST_DOWNLOAD_TIMEOUT_SECS;
use crate::infrastructure::filesystem::Filesystem;
use crate::infrastructure::image::ImageBackend;
use crate::infrastructure::kubernetes::{KubernetesClient, ResourceRef};
use crate::shared::error::{AstraError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Where the deploy command puts its resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub component: String,
    pub app: String,
    pub namespace: String,
    pub project_type: Option<String>,
}

#[async_trait::async_trait]
pub trait DeployClient: Send + Sync {
    /// Run the default deploy command. Returns the applied resources.
    async fn deploy(&self, devfile: &DevfileObj, target: &DeployTarget) -> Result<Vec<ResourceRef>>;
}

pub struct Deployer {
    kube: Arc<dyn KubernetesClient>,
    fs: Arc<dyn Filesystem>,
    images: Option<Arc<dyn ImageBackend>>,
    push_images: bool,
}

impl Deployer {
    pub fn new(kube: Arc<dyn KubernetesClient>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            kube,
            fs,
            images: None,
            push_images: true,
        }
    }

    /// Backend for `image` components, pushing them when `push` is set.
    pub fn with_images(mut self, images: Option<Arc<dyn ImageBackend>>, push: bool) -> Self {
        self.images = images;
        self.push_images = push;
        self
    }

    async fn read_uri(&self, uri: &str, context_dir: &Path) -> Result<String> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(MANIFEST_DOWNLOAD_TIMEOUT_SECS))
                .build()?;
            let response = http.get(uri).send().await?;
            if !response.status().is_success() {
                return Err(AstraError::devfile_error(format!(
                    "unable to download {}: status {}",
                    uri,
                    response.status()
                )));
            }
            return Ok(response.text().await?);
        }
        self.fs.read_to_string(&context_dir.join(uri))
    }

    /// The manifests of a `kubernetes` component, inline or from its uri.
    pub async fn manifests(
        &self,
        component: &KubernetesComponent,
        context_dir: &Path,
    ) -> Result<Vec<Value>> {
        let content = match (&component.inlined, &component.uri) {
            (Some(inlined), _) => inlined.clone(),
            (None, Some(uri)) => self.read_uri(uri, context_dir).await?,
            (None, None) => {
                return Err(AstraError::devfile_error(
                    "kubernetes component has neither inlined nor uri",
                ))
            }
        };
        parse_manifests(&content)
    }
}

/// Every non-empty document of a multi-document YAML stream.
pub fn parse_manifests(content: &str) -> Result<Vec<Value>> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            manifests.push(value);
        }
    }
    Ok(manifests)
}

/// Add the deploy labels to the manifest, and to its pod template when it has one.
pub fn label_manifest(manifest: &mut Value, target: &DeployTarget) {
    let labels = get_labels(&target.component, &target.app, Some(RunningMode::Deploy), false);
    insert_strings(manifest, &["metadata", "labels"], &labels);
    if let Some(project_type) = &target.project_type {
        insert_strings(
            manifest,
            &["metadata", "annotations"],
            &project_type_annotation(project_type),
        );
    }
    if manifest.pointer("/spec/template").is_some() {
        insert_strings(manifest, &["spec", "template", "metadata", "labels"], &labels);
    }
}

/// Insert `entries` in the object at `path`, creating the missing objects.
fn insert_strings(manifest: &mut Value, path: &[&str], entries: &BTreeMap<String, String>) {
    let mut current = manifest;
    for key in path {
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    if let Value::Object(map) = current {
        for (k, v) in entries {
            map.insert(k.clone(), Value::String(v.clone()));
        }
    }
}

#[async_trait::async_trait]
impl DeployClient for Deployer {
    async fn deploy(&self, devfile: &DevfileObj, target: &DeployTarget) -> Result<Vec<ResourceRef>> {
        let data = &devfile.data;
        let command = data
            .default_command(CommandGroupKind::Deploy)?
            .ok_or_else(|| AstraError::devfile_error("no default deploy command found in devfile"))?;

        let mut applied = Vec::new();
        for leaf in data.flatten_command(command)? {
            let apply = match leaf.command_type() {
                CommandType::Apply => match &leaf.apply {
                    Some(apply) => &apply.component,
                    None => continue,
                },
                CommandType::Exec => {
                    return Err(AstraError::UnsupportedCommand { id: leaf.id.clone() })
                }
                _ => continue,
            };
            let component = data.component(apply).ok_or_else(|| {
                AstraError::devfile_error(format!(
                    "command {:?} applies unknown component {:?}",
                    leaf.id, apply
                ))
            })?;

            match component.component_type() {
                ComponentType::Image => {
                    let images = self.images.as_ref().ok_or_else(|| {
                        AstraError::validation("podman or docker is required to build images")
                    })?;
                    if let Some(image) = &component.image {
                        build_image(images.as_ref(), image, devfile.context_dir(), self.push_images)
                            .await?;
                    }
                }
                ComponentType::Kubernetes | ComponentType::Openshift => {
                    let Some(manifest_source) = component.manifest() else {
                        continue;
                    };
                    for mut manifest in self.manifests(manifest_source, devfile.context_dir()).await? {
                        label_manifest(&mut manifest, target);
                        let resource = self.kube.apply_manifest(&target.namespace, &manifest).await?;
                        tracing::info!("Deployed {} {}", resource.kind, resource.name);
                        applied.push(resource);
                    }
                }
                other => {
                    return Err(AstraError::devfile_error(format!(
                        "component {:?} of type {:?} cannot be applied",
                        component.name, other
                    )))
                }
            }
        }
        Ok(applied)
    }
}

async fn build_image(
    backend: &dyn ImageBackend,
    image: &crate::domain::devfile::model::ImageComponent,
    context_dir: &Path,
    push: bool,
) -> Result<()> {
    tracing::info!("Building image {}", image.image_name);
    backend.build(image, context_dir).await?;
    if push {
        tracing::info!("Pushing image {}", image.image_name);
        backend.push(&image.image_name).await?;
    }
    Ok(())
}

/// Build every `image` component of the devfile.
pub async fn build_images(backend: &dyn ImageBackend, devfile: &DevfileObj, push: bool) -> Result<()> {
    let images: Vec<_> = devfile
        .data
        .components_of(ComponentType::Image)
        .filter_map(|c| c.image.as_ref())
        .collect();
    if images.is_empty() {
        return Err(AstraError::devfile_error("no component with type \"Image\" found in Devfile"));
    }
    for image in images {
        build_image(backend, image, devfile.context_dir(), push).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::devfile::model::ImageComponent;
    use crate::domain::labels::ASTRA_MODE_LABEL;
    use crate::infrastructure::fake::FakeKube;
    use crate::infrastructure::filesystem::DefaultFs;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Images {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ImageBackend for Images {
        async fn build(&self, image: &ImageComponent, _context_dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(format!("build {}", image.image_name));
            Ok(())
        }

        async fn push(&self, image_name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("push {}", image_name));
            Ok(())
        }
    }

    const DEVFILE: &str = r#"schemaVersion: 2.2.0
metadata:
  name: api
components:
- name: runtime
  container:
    image: node
- name: prod-image
  image:
    imageName: quay.io/me/api:latest
    dockerfile:
      uri: Dockerfile
- name: prod
  kubernetes:
    uri: deploy.yaml
commands:
- id: build-image
  apply:
    component: prod-image
- id: deploy-k8s
  apply:
    component: prod
- id: deploy
  composite:
    commands: [build-image, deploy-k8s]
    group:
      kind: deploy
      isDefault: true
"#;

    const MANIFESTS: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
spec:
  template:
    spec:
      containers:
      - name: api
        image: quay.io/me/api:latest
---
apiVersion: v1
kind: Service
metadata:
  name: api
  labels:
    tier: web
"#;

    fn target() -> DeployTarget {
        DeployTarget {
            component: "api".to_string(),
            app: "app".to_string(),
            namespace: "default".to_string(),
            project_type: Some("nodejs".to_string()),
        }
    }

    #[tokio::test]
    async fn test_deploy_builds_and_applies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devfile.yaml"), DEVFILE).unwrap();
        std::fs::write(dir.path().join("deploy.yaml"), MANIFESTS).unwrap();
        let devfile = DevfileObj::load(&dir.path().join("devfile.yaml"), &HashMap::new()).unwrap();

        let kube = Arc::new(FakeKube::default());
        let images = Arc::new(Images::default());
        let deployer = Deployer::new(kube.clone(), Arc::new(DefaultFs))
            .with_images(Some(images.clone()), true);

        let applied = deployer.deploy(&devfile, &target()).await.unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(
            *images.calls.lock().unwrap(),
            vec![
                "build quay.io/me/api:latest".to_string(),
                "push quay.io/me/api:latest".to_string()
            ]
        );

        let manifests = kube.manifests();
        assert_eq!(manifests[0]["metadata"]["labels"][ASTRA_MODE_LABEL], "Deploy");
        assert_eq!(
            manifests[0]["spec"]["template"]["metadata"]["labels"]["app.kubernetes.io/instance"],
            "api"
        );
        assert_eq!(manifests[1]["metadata"]["labels"]["tier"], "web");
        assert!(manifests[1].pointer("/spec/template").is_none());
    }

    #[tokio::test]
    async fn test_build_images_without_push() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devfile.yaml"), DEVFILE).unwrap();
        let devfile = DevfileObj::load(&dir.path().join("devfile.yaml"), &HashMap::new()).unwrap();
        let images = Images::default();
        build_images(&images, &devfile, false).await.unwrap();
        assert_eq!(images.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_manifests_skips_empty_documents() {
        let manifests = parse_manifests("---\n\n---\nkind: ConfigMap\n").unwrap();
        assert_eq!(manifests.len(), 1);
    }
}
