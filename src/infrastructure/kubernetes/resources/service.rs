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

use super::resource_name;
use crate::domain::devfile::{ComponentType, DevfileData};
use crate::domain::labels::{get_labels, RunningMode, KUBERNETES_MANAGED_BY_VERSION_LABEL};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// ClusterIP service exposing the non-internal endpoints of the dev containers.
pub struct ServiceBuilder {
    component: String,
    app: String,
    namespace: String,
}

impl ServiceBuilder {
    pub fn new(component: String, app: String, namespace: String) -> Self {
        Self {
            component,
            app,
            namespace,
        }
    }

    /// `None` when every container endpoint has `exposure: none`.
    pub fn build(&self, devfile: &DevfileData) -> Option<Service> {
        let mut ports: Vec<ServicePort> = Vec::new();
        for container in devfile
            .components_of(ComponentType::Container)
            .filter_map(|c| c.container.as_ref())
        {
            for endpoint in container.endpoints.iter().filter(|e| !e.is_unexposed()) {
                if ports.iter().any(|p| p.port == endpoint.target_port) {
                    continue;
                }
                ports.push(self.create_service_port(&endpoint.name, endpoint.target_port));
            }
        }
        if ports.is_empty() {
            return None;
        }

        let labels = get_labels(&self.component, &self.app, Some(RunningMode::Dev), true);
        let mut selector = labels.clone();
        selector.remove(KUBERNETES_MANAGED_BY_VERSION_LABEL);

        Some(Service {
            metadata: ObjectMeta {
                name: Some(resource_name(&self.component, &self.app)),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                ports: Some(ports),
                selector: Some(selector),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn create_service_port(&self, name: &str, port: i32) -> ServicePort {
        ServicePort {
            name: Some(format!("{}-{}", name, port)),
            port,
            target_port: Some(IntOrString::Int(port)),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }
    }
}
