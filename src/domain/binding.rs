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

//! Service bindings kept as inline `kubernetes` components of the devfile.
//!
//! Only the `ServiceBinding` resources are written and read here. Injecting the
//! binding into workloads is left to a service binding operator in the cluster.

use crate::domain::api::{BindingReference, ServiceBinding, ServiceBindingSpec, ServiceBindingStatus};
use crate::domain::devfile::{ComponentType, DevfileObj};
use crate::infrastructure::kubernetes::resources::resource_name;
use crate::infrastructure::kubernetes::KubernetesClient;
use crate::shared::error::{AstraError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const BINDING_API_VERSION: &str = "binding.operators.coreos.com/v1alpha1";
pub const BINDING_KIND: &str = "ServiceBinding";

/// Options of `astra add binding`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBindingOptions {
    pub name: String,
    pub service: BindingReference,
    pub bind_as_files: bool,
    pub naming_strategy: String,
}

/// Parse `--service`: `<name>/<Kind>.<version>.<group>` or `<name>/<Kind>` for core v1 kinds.
pub fn parse_service_reference(value: &str) -> Result<BindingReference> {
    let (name, kind_spec) = value.split_once('/').ok_or_else(|| {
        AstraError::validation(format!(
            "invalid service {:?}, expected <name>/<Kind>.<version>.<group>",
            value
        ))
    })?;
    if name.is_empty() || kind_spec.is_empty() {
        return Err(AstraError::validation(format!(
            "invalid service {:?}, name and kind must not be empty",
            value
        )));
    }

    let mut parts = kind_spec.splitn(3, '.');
    let kind = parts.next().unwrap_or_default();
    let api_version = match (parts.next(), parts.next()) {
        (None, _) => "v1".to_string(),
        (Some(version), None) => version.to_string(),
        (Some(version), Some(group)) => format!("{}/{}", group, version),
    };
    Ok(BindingReference {
        api_version,
        kind: kind.to_string(),
        name: name.to_string(),
    })
}

/// Default binding name: `<service>-<component>`.
pub fn default_binding_name(service: &str, component: &str) -> String {
    format!("{}-{}", service, component)
}

/// The ServiceBinding resource bound to the dev Deployment of `component`.
pub fn binding_manifest(component: &str, app: &str, options: &AddBindingOptions) -> Value {
    let (group, version) = split_api_version(&options.service.api_version);
    let mut spec = json!({
        "application": {
            "name": resource_name(component, app),
            "group": "apps",
            "version": "v1",
            "kind": "Deployment",
        },
        "services": [{
            "name": options.service.name,
            "group": group,
            "version": version,
            "kind": options.service.kind,
        }],
        "bindAsFiles": options.bind_as_files,
        "detectBindingResources": true,
    });
    if !options.naming_strategy.is_empty() {
        spec["namingStrategy"] = json!(options.naming_strategy);
    }
    json!({
        "apiVersion": BINDING_API_VERSION,
        "kind": BINDING_KIND,
        "metadata": {"name": options.name},
        "spec": spec,
    })
}

fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

fn join_api_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{}/{}", group, version)
    }
}

/// Read a ServiceBinding resource, inline or from the cluster.
pub fn parse_binding(manifest: &Value) -> Option<ServiceBinding> {
    if manifest.get("kind").and_then(Value::as_str) != Some(BINDING_KIND) {
        return None;
    }
    let name = manifest.pointer("/metadata/name")?.as_str()?.to_string();
    let spec = manifest.get("spec")?;
    let reference = |v: &Value| BindingReference {
        api_version: join_api_version(
            v.get("group").and_then(Value::as_str).unwrap_or_default(),
            v.get("version").and_then(Value::as_str).unwrap_or_default(),
        ),
        kind: v
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: v
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };

    let status = manifest.get("status").map(|status| ServiceBindingStatus {
        binding_files: string_list(status.get("bindingFiles")),
        binding_env_vars: string_list(status.get("bindingEnvVars")),
    });

    Some(ServiceBinding {
        name,
        spec: ServiceBindingSpec {
            application: spec.get("application").map(reference).unwrap_or_default(),
            services: spec
                .get("services")
                .and_then(Value::as_array)
                .map(|s| s.iter().map(reference).collect())
                .unwrap_or_default(),
            detect_binding_resources: spec
                .get("detectBindingResources")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            bind_as_files: spec
                .get("bindAsFiles")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            naming_strategy: spec
                .get("namingStrategy")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        status,
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait::async_trait]
pub trait BindingClient: Send + Sync {
    /// Add the binding as an inline component and write the devfile.
    fn add_binding_to_devfile(
        &self,
        devfile: &mut DevfileObj,
        component: &str,
        app: &str,
        options: &AddBindingOptions,
    ) -> Result<()>;

    /// Remove the binding component and write the devfile.
    fn remove_binding(&self, devfile: &mut DevfileObj, name: &str) -> Result<()>;

    fn bindings_from_devfile(&self, devfile: &DevfileObj) -> Result<Vec<ServiceBinding>>;

    /// Bindings of the namespace. Empty when there is no cluster or no binding API.
    async fn bindings_from_cluster(&self, namespace: &str) -> Result<Vec<ServiceBinding>>;
}

pub struct DevfileBindingClient {
    kube: Option<Arc<dyn KubernetesClient>>,
}

impl DevfileBindingClient {
    pub fn new(kube: Option<Arc<dyn KubernetesClient>>) -> Self {
        Self { kube }
    }
}

#[async_trait::async_trait]
impl BindingClient for DevfileBindingClient {
    fn add_binding_to_devfile(
        &self,
        devfile: &mut DevfileObj,
        component: &str,
        app: &str,
        options: &AddBindingOptions,
    ) -> Result<()> {
        let manifest = binding_manifest(component, app, options);
        let inlined = serde_yaml::to_string(&manifest)?;

        let mut kubernetes = serde_yaml::Mapping::new();
        kubernetes.insert("inlined".into(), inlined.into());
        let mut entry = serde_yaml::Mapping::new();
        entry.insert("name".into(), options.name.as_str().into());
        entry.insert("kubernetes".into(), serde_yaml::Value::Mapping(kubernetes));

        devfile.add_component(serde_yaml::Value::Mapping(entry))?;
        devfile.write()
    }

    fn remove_binding(&self, devfile: &mut DevfileObj, name: &str) -> Result<()> {
        let is_binding = self
            .bindings_from_devfile(devfile)?
            .iter()
            .any(|b| b.name == name);
        if !is_binding {
            return Err(AstraError::validation(format!(
                "unable to find a binding with name {:?} in the devfile",
                name
            )));
        }
        devfile.remove_component(name)?;
        devfile.write()
    }

    fn bindings_from_devfile(&self, devfile: &DevfileObj) -> Result<Vec<ServiceBinding>> {
        let mut bindings = Vec::new();
        for component in devfile.data.components_of(ComponentType::Kubernetes) {
            let Some(inlined) = component.manifest().and_then(|k| k.inlined.as_deref()) else {
                continue;
            };
            for document in serde_yaml::Deserializer::from_str(inlined) {
                let value = Value::deserialize(document)?;
                if let Some(binding) = parse_binding(&value) {
                    bindings.push(binding);
                }
            }
        }
        Ok(bindings)
    }

    async fn bindings_from_cluster(&self, namespace: &str) -> Result<Vec<ServiceBinding>> {
        let Some(kube) = &self.kube else {
            return Ok(Vec::new());
        };
        let items = kube
            .list_kind(namespace, BINDING_API_VERSION, BINDING_KIND)
            .await?;
        Ok(items.iter().filter_map(parse_binding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const DEVFILE: &str = r#"schemaVersion: 2.2.0
metadata:
  name: my-node-app
components:
- name: runtime
  container:
    image: node
"#;

    fn devfile(dir: &tempfile::TempDir) -> DevfileObj {
        let path = dir.path().join("devfile.yaml");
        std::fs::write(&path, DEVFILE).unwrap();
        DevfileObj::load(&path, &HashMap::new()).unwrap()
    }

    #[test]
    fn test_parse_service_reference() {
        let redis = parse_service_reference("redis/Redis.v1beta2.redis.redis.opstreelabs.in").unwrap();
        assert_eq!(redis.api_version, "redis.redis.opstreelabs.in/v1beta2");
        assert_eq!(redis.kind, "Redis");
        assert_eq!(redis.name, "redis");

        let core = parse_service_reference("db/Service").unwrap();
        assert_eq!(core.api_version, "v1");
        assert!(parse_service_reference("no-kind").is_err());
    }

    #[test]
    fn test_add_list_remove_binding() {
        let dir = tempfile::tempdir().unwrap();
        let mut obj = devfile(&dir);
        let client = DevfileBindingClient::new(None);
        let options = AddBindingOptions {
            name: default_binding_name("redis", "my-node-app"),
            service: parse_service_reference("redis/Redis.v1beta2.redis.redis.opstreelabs.in").unwrap(),
            bind_as_files: true,
            naming_strategy: String::new(),
        };

        client
            .add_binding_to_devfile(&mut obj, "my-node-app", "app", &options)
            .unwrap();
        let reloaded = DevfileObj::load(&obj.path, &HashMap::new()).unwrap();
        let bindings = client.bindings_from_devfile(&reloaded).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].name, "redis-my-node-app");
        assert_eq!(bindings[0].spec.application.name, "my-node-app-app");
        assert_eq!(
            bindings[0].spec.services[0].api_version,
            "redis.redis.opstreelabs.in/v1beta2"
        );

        let mut reloaded = reloaded;
        assert!(client.remove_binding(&mut reloaded, "runtime").is_err());
        client.remove_binding(&mut reloaded, "redis-my-node-app").unwrap();
        let after = DevfileObj::load(&obj.path, &HashMap::new()).unwrap();
        assert!(client.bindings_from_devfile(&after).unwrap().is_empty());
    }
}
