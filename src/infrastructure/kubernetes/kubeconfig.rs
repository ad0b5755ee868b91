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

//! Edits of the user's kubeconfig file.
//!
//! The file is handled as a YAML document so that entries astra does not know
//! about are written back untouched.

use crate::infrastructure::constants::DEFAULT_NAMESPACE;
use crate::shared::error::{AstraError, Result};
use directories::BaseDirs;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Credentials used by `astra login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

/// `$KUBECONFIG` (first entry), else `~/.kube/config`.
pub fn kubeconfig_path() -> Result<PathBuf> {
    if let Ok(value) = std::env::var("KUBECONFIG") {
        if let Some(first) = std::env::split_paths(&value).next() {
            if !first.as_os_str().is_empty() {
                return Ok(first);
            }
        }
    }
    let base = BaseDirs::new()
        .ok_or_else(|| AstraError::config_error("unable to determine the home directory"))?;
    Ok(base.home_dir().join(".kube").join("config"))
}

pub struct KubeconfigFile {
    path: PathBuf,
    doc: Value,
}

impl KubeconfigFile {
    /// Load the file, or start an empty config when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let doc = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                empty_config()
            } else {
                serde_yaml::from_str(&content)?
            }
        } else {
            empty_config()
        };
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(&self.doc)?)?;
        Ok(())
    }

    pub fn current_context(&self) -> Option<&str> {
        self.doc
            .get("current-context")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn context_entry(&self, name: &str) -> Option<&Value> {
        find_named(&self.doc, "contexts", name).and_then(|e| e.get("context"))
    }

    /// Server URL of the cluster used by the current context.
    pub fn current_server(&self) -> Option<String> {
        let context = self.context_entry(self.current_context()?)?;
        let cluster = context.get("cluster")?.as_str()?;
        find_named(&self.doc, "clusters", cluster)?
            .get("cluster")?
            .get("server")?
            .as_str()
            .map(str::to_string)
    }

    pub fn current_namespace(&self) -> Option<String> {
        let context = self.context_entry(self.current_context()?)?;
        context
            .get("namespace")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Switch the namespace of the current context.
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        let current = self
            .current_context()
            .ok_or_else(|| AstraError::config_error("no current context is set in the kubeconfig"))?
            .to_string();
        let entry = find_named_mut(&mut self.doc, "contexts", &current)?
            .ok_or_else(|| {
                AstraError::config_error(format!("context {:?} not found in the kubeconfig", current))
            })?;
        let context = mapping_entry(entry, "context")?;
        context.insert(Value::from("namespace"), Value::from(namespace));
        Ok(())
    }

    /// Add or replace cluster, user and context entries for `server`, and make the context current.
    pub fn login(
        &mut self,
        server: &str,
        credentials: &Credentials,
        insecure_skip_tls_verify: bool,
    ) -> Result<String> {
        let cluster_name = cluster_name_from_server(server);
        let user = match credentials {
            Credentials::Token(_) => "astra".to_string(),
            Credentials::Basic { username, .. } => username.clone(),
        };
        let user_name = format!("{}/{}", user, cluster_name);
        let namespace = self
            .current_namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let context_name = format!("{}/{}/{}", namespace, cluster_name, user);

        let mut cluster = Mapping::new();
        cluster.insert(Value::from("server"), Value::from(server));
        if insecure_skip_tls_verify {
            cluster.insert(Value::from("insecure-skip-tls-verify"), Value::from(true));
        }
        upsert_named(&mut self.doc, "clusters", &cluster_name, "cluster", cluster)?;

        let mut auth = Mapping::new();
        match credentials {
            Credentials::Token(token) => {
                auth.insert(Value::from("token"), Value::from(token.as_str()));
            }
            Credentials::Basic { username, password } => {
                auth.insert(Value::from("username"), Value::from(username.as_str()));
                auth.insert(Value::from("password"), Value::from(password.as_str()));
            }
        }
        upsert_named(&mut self.doc, "users", &user_name, "user", auth)?;

        let mut context = Mapping::new();
        context.insert(Value::from("cluster"), Value::from(cluster_name.as_str()));
        context.insert(Value::from("user"), Value::from(user_name.as_str()));
        context.insert(Value::from("namespace"), Value::from(namespace.as_str()));
        upsert_named(&mut self.doc, "contexts", &context_name, "context", context)?;

        root_mapping(&mut self.doc)?.insert(
            Value::from("current-context"),
            Value::from(context_name.as_str()),
        );
        Ok(context_name)
    }

    /// Drop the credentials of the current user. Returns the user name.
    pub fn logout(&mut self) -> Result<String> {
        let current = self
            .current_context()
            .ok_or_else(|| AstraError::config_error("you are not logged in to any cluster"))?
            .to_string();
        let user = self
            .context_entry(&current)
            .and_then(|c| c.get("user"))
            .and_then(Value::as_str)
            .ok_or_else(|| AstraError::config_error("the current context has no user"))?
            .to_string();

        let entry = find_named_mut(&mut self.doc, "users", &user)?.ok_or_else(|| {
            AstraError::config_error(format!("user {:?} not found in the kubeconfig", user))
        })?;
        let auth = mapping_entry(entry, "user")?;
        for key in ["token", "password", "client-key-data", "client-certificate-data"] {
            auth.remove(Value::from(key));
        }
        Ok(user)
    }
}

fn empty_config() -> Value {
    let mut root = Mapping::new();
    root.insert(Value::from("apiVersion"), Value::from("v1"));
    root.insert(Value::from("kind"), Value::from("Config"));
    root.insert(Value::from("clusters"), Value::Sequence(Vec::new()));
    root.insert(Value::from("users"), Value::Sequence(Vec::new()));
    root.insert(Value::from("contexts"), Value::Sequence(Vec::new()));
    root.insert(Value::from("current-context"), Value::from(""));
    Value::Mapping(root)
}

/// `https://api.crc.testing:6443` becomes `api-crc-testing:6443`.
pub fn cluster_name_from_server(server: &str) -> String {
    let trimmed = server
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    trimmed.replace('.', "-")
}

fn root_mapping(doc: &mut Value) -> Result<&mut Mapping> {
    match doc {
        Value::Mapping(map) => Ok(map),
        _ => Err(AstraError::config_error("kubeconfig root is not a mapping")),
    }
}

fn mapping_entry<'a>(entry: &'a mut Value, key: &str) -> Result<&'a mut Mapping> {
    let Value::Mapping(map) = entry else {
        return Err(AstraError::config_error("kubeconfig entry is not a mapping"));
    };
    let value = map
        .entry(Value::from(key))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    match value {
        Value::Mapping(inner) => Ok(inner),
        _ => Err(AstraError::config_error(format!("{} is not a mapping", key))),
    }
}

fn find_named<'a>(doc: &'a Value, list: &str, name: &str) -> Option<&'a Value> {
    doc.get(list)?
        .as_sequence()?
        .iter()
        .find(|e| e.get("name").and_then(Value::as_str) == Some(name))
}

fn find_named_mut<'a>(doc: &'a mut Value, list: &str, name: &str) -> Result<Option<&'a mut Value>> {
    let root = root_mapping(doc)?;
    let Some(Value::Sequence(entries)) = root.get_mut(Value::from(list)) else {
        return Ok(None);
    };
    Ok(entries
        .iter_mut()
        .find(|e| e.get("name").and_then(Value::as_str) == Some(name)))
}

fn upsert_named(doc: &mut Value, list: &str, name: &str, key: &str, body: Mapping) -> Result<()> {
    let mut entry = Mapping::new();
    entry.insert(Value::from("name"), Value::from(name));
    entry.insert(Value::from(key), Value::Mapping(body));

    let root = root_mapping(doc)?;
    let entries = root
        .entry(Value::from(list))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if entries.is_null() {
        *entries = Value::Sequence(Vec::new());
    }
    let Value::Sequence(entries) = entries else {
        return Err(AstraError::config_error(format!("{} is not a list", list)));
    };
    match entries
        .iter_mut()
        .find(|e| e.get("name").and_then(Value::as_str) == Some(name))
    {
        Some(existing) => *existing = Value::Mapping(entry),
        None => entries.push(Value::Mapping(entry)),
    }
    Ok(())
}
