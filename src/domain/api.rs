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

//! Values returned by the commands and printed with `-o json`.

use crate::domain::devfile::{CommandGroupKind, ComponentType, DevfileData};
use crate::domain::labels::RunningMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Modes a component currently runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningModes {
    pub dev: bool,
    pub deploy: bool,
}

impl RunningModes {
    pub fn add(&mut self, mode: RunningMode) {
        match mode {
            RunningMode::Dev => self.dev = true,
            RunningMode::Deploy => self.deploy = true,
        }
    }

    pub fn merge(&mut self, other: &RunningModes) {
        self.dev |= other.dev;
        self.deploy |= other.deploy;
    }

    pub fn is_empty(&self) -> bool {
        !self.dev && !self.deploy
    }

    pub fn contains(&self, mode: RunningMode) -> bool {
        match mode {
            RunningMode::Dev => self.dev,
            RunningMode::Deploy => self.deploy,
        }
    }
}

impl fmt::Display for RunningModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes = Vec::new();
        if self.dev {
            modes.push("Dev");
        }
        if self.deploy {
            modes.push("Deploy");
        }
        if modes.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&modes.join(", "))
        }
    }
}

/// Merge the modes reported by every platform.
pub fn merge_running_modes(running_on: &BTreeMap<String, RunningModes>) -> RunningModes {
    running_on
        .values()
        .fold(RunningModes::default(), |mut acc, modes| {
            acc.merge(modes);
            acc
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFeatures {
    pub dev: bool,
    pub deploy: bool,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDevfileData {
    pub devfile: DevfileData,
    pub supported_astra_features: SupportedFeatures,
}

impl From<&DevfileData> for ComponentDevfileData {
    fn from(data: &DevfileData) -> Self {
        let has_group = |kind| {
            data.commands
                .iter()
                .any(|c| c.group().map(|g| g.kind) == Some(kind))
        };
        Self {
            devfile: data.clone(),
            supported_astra_features: SupportedFeatures {
                dev: data.components_of(ComponentType::Container).next().is_some(),
                deploy: has_group(CommandGroupKind::Deploy),
                debug: has_group(CommandGroupKind::Debug),
            },
        }
    }
}

/// A port published by a running dev session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedPort {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
    pub container_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port_name: String,
    pub local_address: String,
    pub local_port: u16,
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

/// Full description of one component.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devfile_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devfile_data: Option<ComponentDevfileData>,
    pub dev_forwarded_ports: Vec<ForwardedPort>,
    pub running_in: RunningModes,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub running_on: BTreeMap<String, RunningModes>,
    pub managed_by: String,
}

/// One line of `astra list component`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAbstract {
    pub name: String,
    pub managed_by: String,
    pub managed_by_version: String,
    pub running_in: RunningModes,
    #[serde(rename = "projectType")]
    pub project_type: String,
    pub running_on: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_in_devfile: Option<String>,
    pub components: Vec<ComponentAbstract>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bindings_in_devfile: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<ServiceBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    pub application: BindingReference,
    pub services: Vec<BindingReference>,
    #[serde(default)]
    pub detect_binding_resources: bool,
    #[serde(default)]
    pub bind_as_files: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub naming_strategy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binding_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binding_env_vars: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub name: String,
    pub spec: ServiceBindingSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceBindingStatus>,
}

/// Result of `astra analyze`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub devfile: String,
    pub devfile_registry: String,
    pub devfile_version: String,
    pub application_ports: Vec<i32>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub name: String,
    pub url: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackVersion {
    pub version: String,
    pub is_default: bool,
    pub schema_version: String,
    pub starter_projects: Vec<String>,
}

/// A stack offered by a devfile registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevfileStack {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub registry: RegistrySummary,
    pub language: String,
    pub tags: Vec<String>,
    pub project_type: String,
    pub version: String,
    pub versions: Vec<StackVersion>,
    pub architectures: Vec<String>,
    pub starter_projects: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_modes_display_and_merge() {
        let mut on = BTreeMap::new();
        on.insert(
            "cluster".to_string(),
            RunningModes {
                dev: true,
                deploy: false,
            },
        );
        on.insert(
            "podman".to_string(),
            RunningModes {
                dev: false,
                deploy: true,
            },
        );
        let merged = merge_running_modes(&on);
        assert_eq!(merged.to_string(), "Dev, Deploy");
        assert_eq!(RunningModes::default().to_string(), "None");
    }

    #[test]
    fn test_component_json_shape() {
        let component = Component {
            devfile_path: Some("/tmp/devfile.yaml".to_string()),
            managed_by: "astra".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&component).unwrap();
        assert_eq!(value["devfilePath"], "/tmp/devfile.yaml");
        assert_eq!(value["runningIn"]["dev"], false);
        assert!(value["devForwardedPorts"].as_array().unwrap().is_empty());
        assert!(value.get("runningOn").is_none());
    }

    #[test]
    fn test_supported_features() {
        let data: DevfileData = serde_yaml::from_str(
            r#"
schemaVersion: 2.2.0
components:
- name: runtime
  container:
    image: node
commands:
- id: deploy
  composite:
    commands: []
    group:
      kind: deploy
"#,
        )
        .unwrap();
        let features = ComponentDevfileData::from(&data).supported_astra_features;
        assert!(features.dev);
        assert!(features.deploy);
        assert!(!features.debug);
    }
}
