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

use super::{PLATFORM_CLUSTER, PLATFORM_PODMAN};
use crate::domain::api::{ComponentAbstract, ResourcesList};
use crate::domain::labels::{
    get_component_name, get_managed_by, get_managed_by_version, get_mode, get_project_type,
    managed_selector, RunningMode,
};
use crate::infrastructure::constants::APP_NAME;
use crate::infrastructure::kubernetes::{KubernetesClient, ResourceRef};
use crate::infrastructure::podman::PodmanClient;
use crate::shared::error::Result;
use std::collections::{BTreeMap, HashSet};

/// Components owning astra-managed resources in `namespace`.
///
/// Resources owned by another listed resource (the pods of a Deployment, for
/// instance) do not add a component of their own.
pub async fn list_cluster_components(
    kube: &dyn KubernetesClient,
    namespace: &str,
) -> Result<Vec<ComponentAbstract>> {
    let resources = kube.list_resources(namespace, &managed_selector()).await?;
    let uids: HashSet<&str> = resources.iter().filter_map(|r| r.uid.as_deref()).collect();

    let top_level = resources
        .iter()
        .filter(|r| !r.owner_uids.iter().any(|o| uids.contains(o.as_str())));
    Ok(group_by_component(
        top_level.map(|r| (r.labels.clone(), r.annotations.clone())),
        PLATFORM_CLUSTER,
    ))
}

/// Components of the pods podman runs for astra.
pub async fn list_podman_components(podman: &dyn PodmanClient) -> Result<Vec<ComponentAbstract>> {
    let pods = podman.list_pods(&managed_selector()).await?;
    Ok(group_by_component(
        pods.into_iter().map(|p| (p.labels, BTreeMap::new())),
        PLATFORM_PODMAN,
    ))
}

fn group_by_component(
    items: impl Iterator<Item = (BTreeMap<String, String>, BTreeMap<String, String>)>,
    platform: &str,
) -> Vec<ComponentAbstract> {
    let mut components: BTreeMap<String, ComponentAbstract> = BTreeMap::new();
    for (labels, annotations) in items {
        let Some(name) = get_component_name(&labels) else {
            continue;
        };
        let entry = components
            .entry(name.to_string())
            .or_insert_with(|| ComponentAbstract {
                name: name.to_string(),
                managed_by: get_managed_by(&labels).unwrap_or_default().to_string(),
                managed_by_version: get_managed_by_version(&labels)
                    .unwrap_or_default()
                    .to_string(),
                running_on: platform.to_string(),
                ..Default::default()
            });
        if let Some(mode) = get_mode(&labels) {
            entry.running_in.add(mode);
        }
        if entry.project_type.is_empty() {
            if let Some(project_type) = get_project_type(&labels, &annotations) {
                entry.project_type = project_type;
            }
        }
    }
    components.into_values().collect()
}

/// Everything `astra list component` shows.
///
/// `devfile_component` is added as not running when no platform reports it.
pub async fn list_all_components(
    devfile_component: Option<(&str, &str)>,
    kube: Option<(&dyn KubernetesClient, &str)>,
    podman: Option<&dyn PodmanClient>,
) -> Result<ResourcesList> {
    let mut components = Vec::new();
    if let Some((kube, namespace)) = kube {
        components.extend(list_cluster_components(kube, namespace).await?);
    }
    if let Some(podman) = podman {
        match list_podman_components(podman).await {
            Ok(found) => components.extend(found),
            Err(e) => tracing::warn!("unable to list podman components: {}", e),
        }
    }

    let mut list = ResourcesList::default();
    if let Some((name, project_type)) = devfile_component {
        list.component_in_devfile = Some(name.to_string());
        if !components.iter().any(|c| c.name == name) {
            components.push(ComponentAbstract {
                name: name.to_string(),
                managed_by: APP_NAME.to_string(),
                project_type: project_type.to_string(),
                ..Default::default()
            });
        }
    }
    list.components = components;
    Ok(list)
}

/// Whether `resource` was created in `mode`.
pub(crate) fn created_in(resource: &ResourceRef, mode: Option<RunningMode>) -> bool {
    match mode {
        None => true,
        Some(mode) => get_mode(&resource.labels) == Some(mode),
    }
}
