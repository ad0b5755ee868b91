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

use super::{Platforms, PLATFORM_CLUSTER, PLATFORM_PODMAN};
use crate::domain::api::{merge_running_modes, Component, ComponentDevfileData, ForwardedPort};
use crate::domain::devfile::DevfileObj;
use crate::domain::state::StateClient;
use crate::infrastructure::constants::APP_NAME;
use crate::shared::error::{AstraError, Result};

/// Describe the component of the local devfile.
///
/// Forwarded ports come from the state file of a running `astra dev`.
pub async fn describe_devfile_component(
    devfile: &DevfileObj,
    component: &str,
    app: &str,
    platform: Option<&str>,
    platforms: Platforms<'_>,
    state: &dyn StateClient,
) -> Result<Component> {
    let platforms = platforms.restrict(platform)?;

    let mut forwarded_ports: Vec<ForwardedPort> = Vec::new();
    if platforms.kube.is_some() {
        forwarded_ports.extend(state.get_forwarded_ports(PLATFORM_CLUSTER)?);
    }
    if platforms.podman.is_some() {
        forwarded_ports.extend(state.get_forwarded_ports(PLATFORM_PODMAN)?);
    }

    let running_on = platforms.running_on(component, app).await?;
    Ok(Component {
        devfile_path: Some(devfile.path.to_string_lossy().into_owned()),
        devfile_data: Some(ComponentDevfileData::from(&devfile.data)),
        dev_forwarded_ports: forwarded_ports,
        running_in: merge_running_modes(&running_on),
        running_on,
        managed_by: APP_NAME.to_string(),
    })
}

/// Describe a component by name from what runs on the platforms.
pub async fn describe_named_component(
    name: &str,
    app: &str,
    platform: Option<&str>,
    platforms: Platforms<'_>,
) -> Result<Component> {
    let platforms = platforms.restrict(platform)?;
    let namespace = platforms.kube.map(|(_, ns)| ns).unwrap_or_default();

    let running_on = platforms.running_on(name, app).await?;
    if running_on.is_empty() {
        return Err(AstraError::not_found("component", name, namespace));
    }
    Ok(Component {
        running_in: merge_running_modes(&running_on),
        running_on,
        managed_by: APP_NAME.to_string(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::{get_labels, RunningMode};
    use crate::domain::state::StateFile;
    use crate::infrastructure::fake::{FakeKube, FakePodman};
    use crate::infrastructure::filesystem::DefaultFs;
    use crate::infrastructure::kubernetes::{KubernetesClient, ResourceRef};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_describe_named_component() {
        let kube = FakeKube::default();
        kube.add_resources(vec![ResourceRef {
            kind: "Deployment".to_string(),
            name: "api-app".to_string(),
            labels: get_labels("api", "app", Some(RunningMode::Deploy), false),
            ..Default::default()
        }]);
        let platforms = Platforms {
            kube: Some((&kube as &dyn KubernetesClient, "default")),
            podman: None,
        };

        let component = describe_named_component("api", "app", None, platforms)
            .await
            .unwrap();
        assert!(component.running_in.deploy);
        assert!(component.running_on.contains_key("cluster"));

        let missing = describe_named_component("web", "app", None, platforms).await;
        assert!(missing.unwrap_err().is_not_found());

        let no_podman = describe_named_component("api", "app", Some("podman"), platforms).await;
        assert!(matches!(no_podman, Err(AstraError::PodmanNotFound { .. })));
    }

    #[tokio::test]
    async fn test_describe_devfile_component_reads_forwarded_ports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devfile.yaml");
        std::fs::write(
            &path,
            "schemaVersion: 2.2.0\nmetadata:\n  name: api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        let devfile = DevfileObj::load(&path, &HashMap::new()).unwrap();

        let state = StateFile::new(dir.path(), Arc::new(DefaultFs));
        state.init("podman").unwrap();
        state
            .set_forwarded_ports(&[ForwardedPort {
                platform: "podman".to_string(),
                container_name: "runtime".to_string(),
                local_address: "127.0.0.1".to_string(),
                local_port: 20001,
                container_port: 3000,
                ..Default::default()
            }])
            .unwrap();

        let podman = FakePodman::default();
        let platforms = Platforms {
            kube: None,
            podman: Some(&podman),
        };
        let component =
            describe_devfile_component(&devfile, "api", "app", None, platforms, &state)
                .await
                .unwrap();
        assert_eq!(component.dev_forwarded_ports.len(), 1);
        assert!(component.running_in.is_empty());
        assert_eq!(component.devfile_data.unwrap().devfile.metadata.name.as_deref(), Some("api"));
    }
}
