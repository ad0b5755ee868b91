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

use super::containers::{build_containers, mounted_volumes, mounts_sources, PROJECTS_VOLUME_NAME};
use super::resource_name;
use crate::domain::devfile::DevfileData;
use crate::domain::labels::{
    get_labels, project_type_annotation, RunningMode, KUBERNETES_MANAGED_BY_VERSION_LABEL,
};
use crate::shared::error::Result;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, PodSpec, PodTemplateSpec, Volume};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

/// Dev-mode Deployment running the devfile containers.
pub struct DeploymentBuilder {
    component: String,
    app: String,
    namespace: String,
    project_type: Option<String>,
}

impl DeploymentBuilder {
    pub fn new(component: String, app: String, namespace: String) -> Self {
        Self {
            component,
            app,
            namespace,
            project_type: None,
        }
    }

    pub fn with_project_type(mut self, project_type: Option<String>) -> Self {
        self.project_type = project_type;
        self
    }

    pub fn build(&self, devfile: &DevfileData) -> Result<Deployment> {
        let labels = get_labels(&self.component, &self.app, Some(RunningMode::Dev), true);
        let annotations = self.project_type.as_deref().map(project_type_annotation);
        let mut selector = labels.clone();
        selector.remove(KUBERNETES_MANAGED_BY_VERSION_LABEL);

        let mut volumes: Vec<Volume> = mounted_volumes(devfile)
            .into_iter()
            .map(empty_dir)
            .collect();
        if mounts_sources(devfile) {
            volumes.push(empty_dir(PROJECTS_VOLUME_NAME.to_string()));
        }

        let metadata = ObjectMeta {
            name: Some(resource_name(&self.component, &self.app)),
            namespace: Some(self.namespace.clone()),
            labels: Some(labels.clone()),
            annotations: annotations.clone(),
            ..Default::default()
        };

        Ok(Deployment {
            metadata,
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(selector),
                    ..Default::default()
                },
                strategy: Some(DeploymentStrategy {
                    type_: Some("Recreate".to_string()),
                    ..Default::default()
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations,
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: build_containers(devfile)?,
                        volumes: (!volumes.is_empty()).then_some(volumes),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn empty_dir(name: String) -> Volume {
    Volume {
        name,
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::ASTRA_MODE_LABEL;

    #[test]
    fn test_build_dev_deployment() {
        let data: DevfileData = serde_yaml::from_str(
            "schemaVersion: 2.2.0\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        let deployment = DeploymentBuilder::new("api".into(), "app".into(), "dev".into())
            .with_project_type(Some("Node.js".into()))
            .build(&data)
            .unwrap();

        assert_eq!(deployment.metadata.name.as_deref(), Some("api-app"));
        let labels = deployment.metadata.labels.unwrap();
        assert_eq!(labels[ASTRA_MODE_LABEL], "Dev");

        let spec = deployment.spec.unwrap();
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.containers[0].name, "runtime");
        assert_eq!(pod.volumes.unwrap()[0].name, PROJECTS_VOLUME_NAME);
    }
}
