//! What the runner resolved before a command runs

use crate::cli::clientset::Clientset;
use crate::domain::component::Platforms;
use crate::domain::config::EnvConfig;
use crate::domain::devfile::{find_devfile, is_dir_empty, DevfileObj};
use crate::shared::error::AstraError;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct CommandContext {
    pub json: bool,
    /// Value of `--platform`, if given.
    pub platform: Option<String>,
    pub app: String,
    pub namespace: String,
    pub working_dir: PathBuf,
    pub variables: HashMap<String, String>,
    pub devfile: Option<DevfileObj>,
    /// `metadata.name` of the devfile, else the sanitized directory name.
    pub component_name: String,
    pub env: EnvConfig,
    pub clients: Clientset,
}

impl CommandContext {
    pub fn devfile(&self) -> anyhow::Result<&DevfileObj> {
        match &self.devfile {
            Some(devfile) => Ok(devfile),
            None => Err(AstraError::NoDevfile {
                dir: self.working_dir.clone(),
                empty: is_dir_empty(&self.working_dir)?,
            }
            .into()),
        }
    }

    pub fn devfile_path(&self) -> Option<PathBuf> {
        self.devfile
            .as_ref()
            .map(|d| d.path.clone())
            .or_else(|| find_devfile(&self.working_dir))
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// The backends of this invocation, looking in `namespace` on the cluster.
    pub fn platforms<'a>(&'a self, namespace: &'a str) -> Platforms<'a> {
        Platforms {
            kube: self.clients.kube_ref().map(|k| (k, namespace)),
            podman: self.clients.podman_ref(),
        }
    }
}
