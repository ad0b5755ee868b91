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

//! Components as they run on the cluster and on podman.

pub mod delete;
pub mod describe;
pub mod list;

pub use delete::{ComponentDeleter, DeleteComponentClient, PodmanResources};
pub use describe::{describe_devfile_component, describe_named_component};
pub use list::{list_all_components, list_cluster_components, list_podman_components};

use crate::domain::api::RunningModes;
use crate::domain::labels::{get_mode, get_selector};
use crate::infrastructure::kubernetes::KubernetesClient;
use crate::infrastructure::podman::PodmanClient;
use crate::shared::error::{AstraError, Result};
use std::collections::BTreeMap;

pub const PLATFORM_CLUSTER: &str = "cluster";
pub const PLATFORM_PODMAN: &str = "podman";

/// Running modes of `component` on each reachable platform.
///
/// Platforms where nothing runs are left out of the map.
pub async fn get_running_on(
    component: &str,
    app: &str,
    kube: Option<(&dyn KubernetesClient, &str)>,
    podman: Option<&dyn PodmanClient>,
) -> Result<BTreeMap<String, RunningModes>> {
    let selector = get_selector(component, app, None, false);
    let mut running_on = BTreeMap::new();

    if let Some((kube, namespace)) = kube {
        let mut modes = RunningModes::default();
        for resource in kube.list_resources(namespace, &selector).await? {
            if let Some(mode) = get_mode(&resource.labels) {
                modes.add(mode);
            }
        }
        if !modes.is_empty() {
            running_on.insert(PLATFORM_CLUSTER.to_string(), modes);
        }
    }

    if let Some(podman) = podman {
        let mut modes = RunningModes::default();
        for pod in podman.list_pods(&selector).await? {
            if let Some(mode) = get_mode(&pod.labels) {
                modes.add(mode);
            }
        }
        if !modes.is_empty() {
            running_on.insert(PLATFORM_PODMAN.to_string(), modes);
        }
    }

    Ok(running_on)
}

/// The backends a read-only command looks at.
#[derive(Clone, Copy, Default)]
pub struct Platforms<'a> {
    /// The client and the namespace to look in.
    pub kube: Option<(&'a dyn KubernetesClient, &'a str)>,
    pub podman: Option<&'a dyn PodmanClient>,
}

impl<'a> Platforms<'a> {
    /// Keep only the backend named by `--platform`.
    ///
    /// Without a platform both are kept and a missing one is only a warning.
    pub fn restrict(self, platform: Option<&str>) -> Result<Self> {
        match platform {
            None | Some("") => {
                if self.kube.is_none() {
                    tracing::warn!("{}", AstraError::NoConnection("no cluster client".to_string()));
                }
                Ok(self)
            }
            Some(PLATFORM_CLUSTER) => match self.kube {
                Some(kube) => Ok(Self {
                    kube: Some(kube),
                    podman: None,
                }),
                None => Err(AstraError::NoConnection("no cluster client".to_string())),
            },
            Some(PLATFORM_PODMAN) => match self.podman {
                Some(podman) => Ok(Self {
                    kube: None,
                    podman: Some(podman),
                }),
                None => Err(AstraError::PodmanNotFound {
                    reason: "podman client not initialized".to_string(),
                }),
            },
            Some(other) => Err(AstraError::validation(format!(
                "{:?} is not a valid platform, valid platforms are: {}, {}",
                other, PLATFORM_CLUSTER, PLATFORM_PODMAN
            ))),
        }
    }

    pub async fn running_on(&self, component: &str, app: &str) -> Result<BTreeMap<String, RunningModes>> {
        get_running_on(component, app, self.kube, self.podman).await
    }
}
