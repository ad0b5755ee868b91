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

//! Labels and annotations put on every resource astra creates.

use crate::infrastructure::constants::{APP_NAME, APP_VERSION};
use crate::shared::error::{AstraError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KUBERNETES_INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
pub const KUBERNETES_MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const KUBERNETES_MANAGED_BY_VERSION_LABEL: &str = "app.kubernetes.io/managed-by-version";
pub const KUBERNETES_PART_OF_LABEL: &str = "app.kubernetes.io/part-of";
pub const ASTRA_MODE_LABEL: &str = "astra.dev/mode";
pub const ASTRA_PROJECT_TYPE_ANNOTATION: &str = "astra.dev/project-type";
pub const COMPONENT_LABEL: &str = "component";

/// Which command created a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RunningMode {
    Dev,
    Deploy,
}

impl RunningMode {
    pub fn as_label(&self) -> &'static str {
        match self {
            RunningMode::Dev => "Dev",
            RunningMode::Deploy => "Deploy",
        }
    }

    /// Parse the `--running-in` flag value (`dev` or `deploy`).
    pub fn from_flag(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "dev" => Ok(RunningMode::Dev),
            "deploy" => Ok(RunningMode::Deploy),
            _ => Err(AstraError::InvalidMode {
                mode: value.to_string(),
                valid: "dev, deploy".to_string(),
            }),
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "Dev" => Some(RunningMode::Dev),
            "Deploy" => Some(RunningMode::Deploy),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Labels for a resource of `component`. `mode` is `None` for resources shared by both modes.
pub fn get_labels(
    component: &str,
    app: &str,
    mode: Option<RunningMode>,
    is_part_of_component: bool,
) -> BTreeMap<String, String> {
    let mut labels = selector_labels(component, app, mode, is_part_of_component);
    labels.insert(
        KUBERNETES_MANAGED_BY_VERSION_LABEL.to_string(),
        format!("v{}", APP_VERSION),
    );
    labels
}

fn selector_labels(
    component: &str,
    app: &str,
    mode: Option<RunningMode>,
    is_part_of_component: bool,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(KUBERNETES_INSTANCE_LABEL.to_string(), component.to_string());
    labels.insert(KUBERNETES_PART_OF_LABEL.to_string(), app.to_string());
    labels.insert(KUBERNETES_MANAGED_BY_LABEL.to_string(), APP_NAME.to_string());
    if let Some(mode) = mode {
        labels.insert(ASTRA_MODE_LABEL.to_string(), mode.as_label().to_string());
    }
    if is_part_of_component {
        labels.insert(COMPONENT_LABEL.to_string(), component.to_string());
    }
    labels
}

/// Label selector matching the resources of a component.
pub fn get_selector(
    component: &str,
    app: &str,
    mode: Option<RunningMode>,
    is_part_of_component: bool,
) -> String {
    to_selector(&selector_labels(component, app, mode, is_part_of_component))
}

/// Selector for every astra-managed resource.
pub fn managed_selector() -> String {
    format!("{}={}", KUBERNETES_MANAGED_BY_LABEL, APP_NAME)
}

pub fn to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn get_component_name(labels: &BTreeMap<String, String>) -> Option<&str> {
    labels.get(KUBERNETES_INSTANCE_LABEL).map(String::as_str)
}

pub fn get_mode(labels: &BTreeMap<String, String>) -> Option<RunningMode> {
    labels
        .get(ASTRA_MODE_LABEL)
        .and_then(|v| RunningMode::from_label(v))
}

pub fn get_managed_by(labels: &BTreeMap<String, String>) -> Option<&str> {
    labels.get(KUBERNETES_MANAGED_BY_LABEL).map(String::as_str)
}

pub fn get_managed_by_version(labels: &BTreeMap<String, String>) -> Option<&str> {
    labels
        .get(KUBERNETES_MANAGED_BY_VERSION_LABEL)
        .map(String::as_str)
}

pub fn is_managed_by_astra(labels: &BTreeMap<String, String>) -> bool {
    get_managed_by(labels) == Some(APP_NAME)
}

pub fn get_project_type(
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Option<String> {
    annotations
        .get(ASTRA_PROJECT_TYPE_ANNOTATION)
        .or_else(|| labels.get(ASTRA_PROJECT_TYPE_ANNOTATION))
        .cloned()
}

pub fn project_type_annotation(project_type: &str) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    annotations.insert(
        ASTRA_PROJECT_TYPE_ANNOTATION.to_string(),
        project_type.to_string(),
    );
    annotations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_selector() {
        assert_eq!(
            get_selector("nodejs", "app", Some(RunningMode::Dev), false),
            "app.kubernetes.io/instance=nodejs,app.kubernetes.io/managed-by=astra,app.kubernetes.io/part-of=app,astra.dev/mode=Dev"
        );
        assert_eq!(
            get_selector("nodejs", "app", None, true),
            "app.kubernetes.io/instance=nodejs,app.kubernetes.io/managed-by=astra,app.kubernetes.io/part-of=app,component=nodejs"
        );
    }

    #[test]
    fn test_labels_round_trip_mode_and_manager() {
        let labels = get_labels("api", "app", Some(RunningMode::Deploy), true);
        assert_eq!(get_mode(&labels), Some(RunningMode::Deploy));
        assert_eq!(get_component_name(&labels), Some("api"));
        assert!(is_managed_by_astra(&labels));
        assert!(get_managed_by_version(&labels).unwrap().starts_with('v'));
    }

    #[test]
    fn test_running_mode_flag() {
        assert_eq!(RunningMode::from_flag("DEV").unwrap(), RunningMode::Dev);
        let err = RunningMode::from_flag("prod").unwrap_err();
        assert!(matches!(err, AstraError::InvalidMode { .. }));
    }
}
