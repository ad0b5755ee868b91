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

//! Relative image names and the `ImageRegistry` preference.

use super::model::DevfileData;

/// True for names such as `my-app` or `my-app:1.0` that carry no registry or path.
pub fn is_relative_image(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// `<registry>/<devfile name>-<image>:<tag>`, the tag defaulting to `latest`.
pub fn absolute_image_name(registry: &str, devfile_name: Option<&str>, image: &str) -> String {
    let (name, tag) = match image.rsplit_once(':') {
        Some((name, tag)) if !tag.is_empty() => (name, tag),
        _ => (image, "latest"),
    };
    let registry = registry.trim_end_matches('/');
    match devfile_name.filter(|n| !n.is_empty()) {
        Some(prefix) => format!("{}/{}-{}:{}", registry, prefix, name, tag),
        None => format!("{}/{}:{}", registry, name, tag),
    }
}

/// Replace `image: <from>` values in a manifest, quoted or not.
fn replace_manifest_image(manifest: &str, from: &str, to: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in manifest.lines() {
        let body = line.trim_start().trim_start_matches("- ").trim_start();
        let replaced = body
            .strip_prefix("image:")
            .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|value| *value == from)
            .map(|_| {
                let indent = &line[..line.len() - body.len()];
                format!("{}image: {}", indent, to)
            });
        out.push(replaced.unwrap_or_else(|| line.to_string()));
    }
    let mut joined = out.join("\n");
    if manifest.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

impl DevfileData {
    /// Prefix relative names of `image` components with `registry`, and point
    /// containers and inlined manifests using those names at the new ones.
    pub fn apply_image_registry(&mut self, registry: &str) {
        if registry.trim().is_empty() {
            return;
        }
        let devfile_name = self.metadata.name.clone();

        let mut renamed = Vec::new();
        for component in &mut self.components {
            if let Some(image) = component.image.as_mut() {
                if is_relative_image(&image.image_name) {
                    let absolute =
                        absolute_image_name(registry, devfile_name.as_deref(), &image.image_name);
                    tracing::debug!("image {} is pushed as {}", image.image_name, absolute);
                    renamed.push((image.image_name.clone(), absolute.clone()));
                    image.image_name = absolute;
                }
            }
        }

        for component in &mut self.components {
            if let Some(container) = component.container.as_mut() {
                if let Some((_, to)) = renamed.iter().find(|(from, _)| *from == container.image) {
                    container.image = to.clone();
                }
            }
            for manifest in [component.kubernetes.as_mut(), component.openshift.as_mut()]
                .into_iter()
                .flatten()
            {
                if let Some(inlined) = manifest.inlined.as_mut() {
                    for (from, to) in &renamed {
                        *inlined = replace_manifest_image(inlined, from, to);
                    }
                }
            }
        }
    }
}
