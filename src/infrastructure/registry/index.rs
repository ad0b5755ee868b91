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

//! The `/v2index` document served by devfile registries.

use crate::domain::api::{DevfileStack, RegistrySummary, StackVersion};
use crate::domain::preference::Registry;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub versions: Vec<IndexVersion>,
    #[serde(default)]
    pub starter_projects: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexVersion {
    pub version: String,
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub starter_projects: Vec<String>,
}

/// Stacks of one registry, skipping sample entries. Order follows the index.
pub fn to_stacks(registry: &Registry, entries: Vec<IndexEntry>) -> Vec<DevfileStack> {
    let summary = RegistrySummary {
        name: registry.name.clone(),
        url: registry.url.clone(),
        secure: registry.secure,
    };

    entries
        .into_iter()
        .filter(|e| e.kind.is_empty() || e.kind == "stack")
        .map(|entry| {
            let versions: Vec<StackVersion> = entry
                .versions
                .iter()
                .map(|v| StackVersion {
                    version: v.version.clone(),
                    is_default: v.default,
                    schema_version: v.schema_version.clone(),
                    starter_projects: v.starter_projects.clone(),
                })
                .collect();
            let default = versions
                .iter()
                .find(|v| v.is_default)
                .or_else(|| versions.last());
            let version = default.map(|v| v.version.clone()).unwrap_or_default();
            let starter_projects = match default {
                Some(v) if !v.starter_projects.is_empty() => v.starter_projects.clone(),
                _ => entry.starter_projects.clone(),
            };

            DevfileStack {
                name: entry.name,
                display_name: entry.display_name,
                description: entry.description,
                registry: summary.clone(),
                language: entry.language,
                tags: entry.tags,
                project_type: entry.project_type,
                version,
                versions,
                architectures: entry.architectures,
                starter_projects,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"[
      {"name": "nodejs", "displayName": "Node.js Runtime", "description": "Node.js application",
       "type": "stack", "language": "JavaScript", "projectType": "Node.js",
       "versions": [
         {"version": "2.1.1", "schemaVersion": "2.1.0", "starterProjects": ["nodejs-starter"]},
         {"version": "2.2.0", "schemaVersion": "2.2.0", "default": true,
          "starterProjects": ["nodejs-starter", "express"]}
       ]},
      {"name": "nodejs-basic", "type": "sample", "versions": []}
    ]"#;

    #[test]
    fn test_index_to_stacks() {
        let entries: Vec<IndexEntry> = serde_json::from_str(INDEX).unwrap();
        let registry = Registry::new("DefaultDevfileRegistry", "https://registry.devfile.io", false);
        let stacks = to_stacks(&registry, entries);

        assert_eq!(stacks.len(), 1);
        let stack = &stacks[0];
        assert_eq!(stack.version, "2.2.0");
        assert_eq!(stack.versions.len(), 2);
        assert_eq!(stack.starter_projects, vec!["nodejs-starter", "express"]);
        assert_eq!(stack.registry.name, "DefaultDevfileRegistry");
    }
}
