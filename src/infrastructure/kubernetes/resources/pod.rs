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

//! Standalone pod played by `podman kube play`.

use super::containers::{build_containers, mounted_volumes, mounts_sources, PROJECTS_VOLUME_NAME};
use super::resource_name;
use crate::domain::api::ForwardedPort;
use crate::domain::devfile::{ComponentType, DevfileData};
use crate::domain::labels::{get_labels, project_type_annotation, RunningMode};
use crate::shared::error::{AstraError, Result};
use k8s_openapi::api::core::v1::{
    HostPathVolumeSource, PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;

pub const FIRST_LOCAL_PORT: u16 = 20001;
const LOCAL_ADDRESS: &str = "127.0.0.1";

pub struct PodBuilder {
    component: String,
    app: String,
    context_dir: PathBuf,
    project_type: Option<String>,
}

impl PodBuilder {
    pub fn new(component: String, app: String, context_dir: PathBuf) -> Self {
        Self {
            component,
            app,
            context_dir,
            project_type: None,
        }
    }

    pub fn with_project_type(mut self, project_type: Option<String>) -> Self {
        self.project_type = project_type;
        self
    }

    /// Name of a named podman volume backing a devfile volume.
    pub fn volume_claim_name(&self, volume: &str) -> String {
        format!("{}-{}-{}", volume, self.component, self.app)
    }

    /// Build the pod. Public endpoints are published on free local ports, which are returned.
    pub fn build(&self, devfile: &DevfileData) -> Result<(Pod, Vec<ForwardedPort>)> {
        let mut containers = build_containers(devfile)?;
        let mut forwarded = Vec::new();
        let mut next_port = FIRST_LOCAL_PORT;

        for container in containers.iter_mut() {
            let endpoints: Vec<_> = devfile
                .components_of(ComponentType::Container)
                .filter(|c| c.name == container.name)
                .filter_map(|c| c.container.as_ref())
                .flat_map(|c| c.endpoints.iter())
                .filter(|e| !e.is_unexposed())
                .cloned()
                .collect();

            let Some(ports) = container.ports.as_mut() else {
                continue;
            };
            for port in ports.iter_mut() {
                let Some(endpoint) = endpoints
                    .iter()
                    .find(|e| Some(&e.name) == port.name.as_ref())
                else {
                    continue;
                };
                let local_port = find_free_port(next_port)?;
                next_port = local_port.saturating_add(1);
                port.host_port = Some(i32::from(local_port));
                port.host_ip = Some(LOCAL_ADDRESS.to_string());
                forwarded.push(ForwardedPort {
                    platform: "podman".to_string(),
                    container_name: container.name.clone(),
                    port_name: endpoint.name.clone(),
                    local_address: LOCAL_ADDRESS.to_string(),
                    local_port,
                    container_port: endpoint.target_port,
                    protocol: endpoint
                        .protocol
                        .clone()
                        .unwrap_or_else(|| "http".to_string()),
                });
            }
        }

        let mut volumes: Vec<Volume> = mounted_volumes(devfile)
            .into_iter()
            .map(|name| Volume {
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: self.volume_claim_name(&name),
                    ..Default::default()
                }),
                name,
                ..Default::default()
            })
            .collect();
        if mounts_sources(devfile) {
            volumes.push(Volume {
                name: PROJECTS_VOLUME_NAME.to_string(),
                host_path: Some(HostPathVolumeSource {
                    path: self.context_dir.to_string_lossy().into_owned(),
                    type_: Some("Directory".to_string()),
                }),
                ..Default::default()
            });
        }

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(resource_name(&self.component, &self.app)),
                labels: Some(get_labels(
                    &self.component,
                    &self.app,
                    Some(RunningMode::Dev),
                    true,
                )),
                annotations: self.project_type.as_deref().map(project_type_annotation),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers,
                volumes: (!volumes.is_empty()).then_some(volumes),
                ..Default::default()
            }),
            ..Default::default()
        };
        Ok((pod, forwarded))
    }
}

/// First port at or above `start` that can be bound on the loopback interface.
pub fn find_free_port(start: u16) -> Result<u16> {
    (start..=u16::MAX)
        .find(|port| TcpListener::bind((Ipv4Addr::LOCALHOST, *port)).is_ok())
        .ok_or_else(|| AstraError::PodmanError(format!("no free local port above {}", start)))
}
