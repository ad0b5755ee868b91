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

//! Turns devfile container components into pod containers.

use crate::domain::devfile::{Component, ComponentType, DevfileData};
use crate::shared::error::{AstraError, Result};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, ResourceRequirements, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

pub const PROJECTS_VOLUME_NAME: &str = "astra-projects";
pub const PROJECTS_ROOT: &str = "/projects";

/// Environment injected in every dev container.
pub struct EnvironmentBuilder {
    source_path: String,
    custom_vars: Vec<(String, String)>,
}

impl EnvironmentBuilder {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            custom_vars: Vec::new(),
        }
    }

    pub fn with_custom_vars<'a>(mut self, vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.custom_vars
            .extend(vars.into_iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn build(self) -> Vec<EnvVar> {
        let mut env_vars = vec![
            env_var("PROJECTS_ROOT", PROJECTS_ROOT),
            env_var("PROJECT_SOURCE", &self.source_path),
        ];
        for (name, value) in &self.custom_vars {
            env_vars.retain(|e| &e.name != name);
            env_vars.push(env_var(name, value));
        }
        env_vars
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn resources(component: &Component) -> Option<ResourceRequirements> {
    let container = component.container.as_ref()?;
    let mut limits = BTreeMap::new();
    let mut requests = BTreeMap::new();
    if let Some(v) = &container.memory_limit {
        limits.insert("memory".to_string(), Quantity(v.clone()));
    }
    if let Some(v) = &container.cpu_limit {
        limits.insert("cpu".to_string(), Quantity(v.clone()));
    }
    if let Some(v) = &container.memory_request {
        requests.insert("memory".to_string(), Quantity(v.clone()));
    }
    if let Some(v) = &container.cpu_request {
        requests.insert("cpu".to_string(), Quantity(v.clone()));
    }
    if limits.is_empty() && requests.is_empty() {
        return None;
    }
    Some(ResourceRequirements {
        limits: (!limits.is_empty()).then_some(limits),
        requests: (!requests.is_empty()).then_some(requests),
        ..Default::default()
    })
}

/// One container per devfile container component.
///
/// Containers without an explicit command are kept alive with `tail -f /dev/null`
/// so that build and run commands can be executed in them.
pub fn build_containers(devfile: &DevfileData) -> Result<Vec<Container>> {
    let mut containers = Vec::new();

    for component in devfile.components_of(ComponentType::Container) {
        let Some(spec) = &component.container else {
            continue;
        };
        if spec.image.trim().is_empty() {
            return Err(AstraError::devfile_error(format!(
                "container component {:?} has no image",
                component.name
            )));
        }

        let (command, args) = if spec.command.is_empty() {
            (
                vec!["tail".to_string()],
                vec!["-f".to_string(), "/dev/null".to_string()],
            )
        } else {
            (spec.command.clone(), spec.args.clone())
        };

        let env = EnvironmentBuilder::new(spec.source_path())
            .with_custom_vars(spec.env.iter().map(|e| (e.name.as_str(), e.value.as_str())))
            .build();

        let ports: Vec<ContainerPort> = spec
            .endpoints
            .iter()
            .map(|e| ContainerPort {
                name: Some(e.name.clone()),
                container_port: e.target_port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            })
            .collect();

        let mut mounts = Vec::new();
        if spec.mounts_sources() {
            mounts.push(VolumeMount {
                name: PROJECTS_VOLUME_NAME.to_string(),
                mount_path: spec.source_path().to_string(),
                ..Default::default()
            });
        }
        for mount in &spec.volume_mounts {
            mounts.push(VolumeMount {
                name: mount.name.clone(),
                mount_path: mount
                    .path
                    .clone()
                    .unwrap_or_else(|| format!("/{}", mount.name)),
                ..Default::default()
            });
        }

        containers.push(Container {
            name: component.name.clone(),
            image: Some(spec.image.clone()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(command),
            args: Some(args),
            env: Some(env),
            ports: (!ports.is_empty()).then_some(ports),
            volume_mounts: (!mounts.is_empty()).then_some(mounts),
            resources: resources(component),
            ..Default::default()
        });
    }

    if containers.is_empty() {
        return Err(AstraError::NoContainerComponent);
    }
    Ok(containers)
}

/// Names of the volume components mounted by at least one container.
pub fn mounted_volumes(devfile: &DevfileData) -> Vec<String> {
    let mut names: Vec<String> = devfile
        .components_of(ComponentType::Container)
        .filter_map(|c| c.container.as_ref())
        .flat_map(|c| c.volume_mounts.iter().map(|m| m.name.clone()))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Whether any container mounts the project sources.
pub fn mounts_sources(devfile: &DevfileData) -> bool {
    devfile
        .components_of(ComponentType::Container)
        .filter_map(|c| c.container.as_ref())
        .any(|c| c.mounts_sources())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVFILE: &str = r#"
schemaVersion: 2.2.0
components:
- name: runtime
  container:
    image: node:18
    memoryLimit: 1Gi
    env:
    - name: PROJECT_SOURCE
      value: /src
    - name: DEBUG
      value: "1"
    endpoints:
    - name: http
      targetPort: 3000
    volumeMounts:
    - name: cache
      path: /cache
- name: cache
  volume:
    size: 1Gi
"#;

    #[test]
    fn test_build_containers() {
        let data: DevfileData = serde_yaml::from_str(DEVFILE).unwrap();
        let containers = build_containers(&data).unwrap();
        assert_eq!(containers.len(), 1);

        let c = &containers[0];
        assert_eq!(c.command.as_ref().unwrap(), &vec!["tail".to_string()]);
        assert_eq!(c.ports.as_ref().unwrap()[0].container_port, 3000);

        let env = c.env.as_ref().unwrap();
        let source = env.iter().find(|e| e.name == "PROJECT_SOURCE").unwrap();
        assert_eq!(source.value.as_deref(), Some("/src"));
        assert!(env.iter().any(|e| e.name == "DEBUG"));

        let mounts = c.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].mount_path, "/projects");
        assert_eq!(mounts[1].mount_path, "/cache");

        let limits = c.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits["memory"], Quantity("1Gi".to_string()));

        assert_eq!(mounted_volumes(&data), vec!["cache".to_string()]);
        assert!(mounts_sources(&data));
    }
}
