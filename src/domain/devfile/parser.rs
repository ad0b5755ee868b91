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

use super::model::DevfileData;
use super::validate::DevfileValidator;
use super::variables::{effective_variables, substitute_value};
use crate::infrastructure::constants::DEVFILE_NAMES;
use crate::shared::error::{AstraError, Result};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// A parsed devfile together with the document it came from.
#[derive(Debug, Clone)]
pub struct DevfileObj {
    pub path: PathBuf,
    pub data: DevfileData,
    /// The document before variable substitution. Edits are applied here.
    pub raw: Value,
}

/// First devfile found in `dir`, in lookup order.
pub fn find_devfile(dir: &Path) -> Option<PathBuf> {
    DEVFILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// True when the directory has no entries, ignoring the `.astra` state directory.
pub fn is_dir_empty(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() != crate::infrastructure::constants::STATE_DIR {
            return Ok(false);
        }
    }
    Ok(true)
}

impl DevfileObj {
    /// Parse content without validating it.
    pub fn parse(
        path: impl Into<PathBuf>,
        content: &str,
        overrides: &HashMap<String, String>,
    ) -> Result<Self> {
        let path = path.into();
        let raw: Value = serde_yaml::from_str(content).map_err(|e| {
            AstraError::devfile_error(format!("unable to parse {}: {}", path.display(), e))
        })?;
        let declared: DevfileData = serde_yaml::from_value(raw.clone()).map_err(|e| {
            AstraError::devfile_error(format!("unable to parse {}: {}", path.display(), e))
        })?;

        let variables = effective_variables(&declared.variables, overrides);
        let mut substituted = raw.clone();
        let mut missing = BTreeSet::new();
        substitute_value(&mut substituted, &variables, &mut missing);
        for name in &missing {
            tracing::warn!("Variable {:?} is referenced in the devfile but not defined", name);
        }

        let data: DevfileData = serde_yaml::from_value(substituted).map_err(|e| {
            AstraError::devfile_error(format!("unable to parse {}: {}", path.display(), e))
        })?;

        Ok(Self { path, data, raw })
    }

    /// Read, substitute variables, and validate.
    pub fn load(path: &Path, overrides: &HashMap<String, String>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AstraError::devfile_error(format!("unable to read {}: {}", path.display(), e))
        })?;
        let obj = Self::parse(path, &content, overrides)?;
        DevfileValidator::validate(&obj.data)?;
        Ok(obj)
    }

    /// Locate the devfile in `dir` and load it.
    pub fn load_from_dir(dir: &Path, overrides: &HashMap<String, String>) -> Result<Self> {
        match find_devfile(dir) {
            Some(path) => Self::load(&path, overrides),
            None => Err(AstraError::NoDevfile {
                dir: dir.to_path_buf(),
                empty: is_dir_empty(dir)?,
            }),
        }
    }

    /// Directory that holds the devfile.
    pub fn context_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn set_metadata_name(&mut self, name: &str) -> Result<()> {
        let root = root_mapping(&mut self.raw)?;
        let metadata = root
            .entry(Value::from("metadata"))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let Value::Mapping(metadata) = metadata else {
            return Err(AstraError::devfile_error("metadata is not a mapping"));
        };
        metadata.insert(Value::from("name"), Value::from(name));
        self.data.metadata.name = Some(name.to_string());
        Ok(())
    }

    /// Append a component given as YAML. Fails if the name is taken.
    pub fn add_component(&mut self, component: Value) -> Result<()> {
        let name = component
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AstraError::devfile_error("component has no name"))?
            .to_string();
        if self.data.component(&name).is_some() {
            return Err(AstraError::devfile_error(format!(
                "a component with name {:?} already exists in the devfile",
                name
            )));
        }

        let parsed = serde_yaml::from_value(component.clone())?;
        let root = root_mapping(&mut self.raw)?;
        let components = root
            .entry(Value::from("components"))
            .or_insert_with(|| Value::Sequence(Vec::new()));
        let Value::Sequence(components) = components else {
            return Err(AstraError::devfile_error("components is not a list"));
        };
        components.push(component);
        self.data.components.push(parsed);
        Ok(())
    }

    /// Remove a component by name. Returns false when it was absent.
    pub fn remove_component(&mut self, name: &str) -> Result<bool> {
        let root = root_mapping(&mut self.raw)?;
        let Some(Value::Sequence(components)) = root.get_mut(Value::from("components")) else {
            return Ok(false);
        };
        let before = components.len();
        components.retain(|c| c.get("name").and_then(Value::as_str) != Some(name));
        let removed = components.len() != before;
        self.data.components.retain(|c| c.name != name);
        Ok(removed)
    }

    /// Serialize the raw document back to `self.path`.
    pub fn write(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.raw)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

fn root_mapping(raw: &mut Value) -> Result<&mut Mapping> {
    match raw {
        Value::Mapping(map) => Ok(map),
        _ => Err(AstraError::devfile_error("devfile root is not a mapping")),
    }
}

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("valid name pattern"));
static REPEATED_DASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("valid name pattern"));

/// Lower-case RFC 1123 label: `[a-z0-9-]`, starting with a letter, at most 63 chars.
pub fn sanitize_name(input: &str) -> Result<String> {
    let lowered = input.trim().to_lowercase();
    let replaced = INVALID_NAME_CHARS.replace_all(&lowered, "-");
    let collapsed = REPEATED_DASHES.replace_all(&replaced, "-");
    let mut name: String = collapsed
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '-')
        .chars()
        .take(63)
        .collect();
    while name.ends_with('-') {
        name.pop();
    }
    if name.is_empty() {
        return Err(AstraError::validation(format!(
            "unable to derive a valid component name from {:?}",
            input
        )));
    }
    Ok(name)
}

/// `metadata.name`, else the sanitized directory name.
pub fn gather_name(devfile: Option<&DevfileObj>, dir: &Path) -> Result<String> {
    if let Some(name) = devfile.and_then(|d| d.data.metadata.name.as_deref()) {
        if !name.trim().is_empty() {
            return sanitize_name(name);
        }
    }
    let dir_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("component");
    sanitize_name(dir_name)
}
