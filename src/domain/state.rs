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

//! `.astra/devstate.<pid>.json`: what each running `astra` session exposes.
//!
//! Every process writes its own file. Readers also accept the unnumbered
//! `devstate.json` written by older releases.

use crate::domain::api::ForwardedPort;
use crate::infrastructure::constants::{STATE_DIR, STATE_FILE};
use crate::infrastructure::filesystem::Filesystem;
use crate::shared::error::{AstraError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub pid: u32,
    pub platform: String,
    #[serde(default)]
    pub forwarded_ports: Vec<ForwardedPort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_port: Option<u16>,
}

pub trait StateClient: Send + Sync {
    /// Start a session for `platform` owned by the current process.
    fn init(&self, platform: &str) -> Result<()>;

    fn set_forwarded_ports(&self, ports: &[ForwardedPort]) -> Result<()>;

    /// Ports of the live session running on `platform`, empty when there is none.
    fn get_forwarded_ports(&self, platform: &str) -> Result<Vec<ForwardedPort>>;

    fn set_api_server_port(&self, port: u16) -> Result<()>;

    /// Port of this process's API server, else of any live session's.
    fn get_api_server_port(&self) -> Result<Option<u16>>;

    fn clear_api_server_port(&self) -> Result<()>;

    /// Forget the session of this process. Other sessions are left alone.
    fn save_exit(&self) -> Result<()>;
}

pub struct StateFile {
    dir: PathBuf,
    pid: u32,
    fs: Arc<dyn Filesystem>,
}

impl StateFile {
    pub fn new(working_dir: &Path, fs: Arc<dyn Filesystem>) -> Self {
        Self::with_pid(working_dir, std::process::id(), fs)
    }

    /// State of the session owned by `pid`.
    pub fn with_pid(working_dir: &Path, pid: u32, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            dir: working_dir.join(STATE_DIR),
            pid,
            fs,
        }
    }

    /// File of this process.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("devstate.{}.json", self.pid))
    }

    fn read_file(&self, path: &Path) -> Result<Option<Content>> {
        if !self.fs.exists(path) {
            return Ok(None);
        }
        let content = self.fs.read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn read(&self) -> Result<Option<Content>> {
        self.read_file(&self.path())
    }

    fn write(&self, content: &Content) -> Result<()> {
        self.fs
            .write(&self.path(), &serde_json::to_string_pretty(content)?)
    }

    fn update<F: FnOnce(&mut Content)>(&self, change: F) -> Result<()> {
        let mut content = self.read()?.unwrap_or_else(|| Content {
            pid: self.pid,
            ..Default::default()
        });
        change(&mut content);
        self.write(&content)
    }

    /// Every session recorded in the state directory, in file name order.
    fn sessions(&self) -> Result<Vec<Content>> {
        if !self.fs.exists(&self.dir) {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for path in self.fs.read_dir(&self.dir)? {
            let is_state = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_state_file_name);
            if !is_state {
                continue;
            }
            match self.read_file(&path) {
                Ok(Some(content)) => sessions.push(content),
                Ok(None) => {}
                Err(e) => tracing::debug!("ignoring state file {}: {}", path.display(), e),
            }
        }
        Ok(sessions)
    }

    fn alive(&self, pid: u32) -> bool {
        pid == self.pid || process_alive(pid)
    }
}

/// `devstate.json` or `devstate.<pid>.json`.
fn is_state_file_name(name: &str) -> bool {
    if name == STATE_FILE {
        return true;
    }
    name.strip_prefix("devstate.")
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|pid| !pid.is_empty() && pid.chars().all(|c| c.is_ascii_digit()))
}

/// True when a process with this pid exists.
fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    Path::new("/proc").join(pid.to_string()).exists()
}

impl StateClient for StateFile {
    fn init(&self, platform: &str) -> Result<()> {
        for existing in self.sessions()? {
            if existing.pid != self.pid
                && existing.platform == platform
                && self.alive(existing.pid)
            {
                return Err(AstraError::validation(format!(
                    "a dev session is already running on platform {:?} (pid {})",
                    platform, existing.pid
                )));
            }
        }
        self.write(&Content {
            pid: self.pid,
            platform: platform.to_string(),
            forwarded_ports: Vec::new(),
            api_server_port: None,
        })
    }

    fn set_forwarded_ports(&self, ports: &[ForwardedPort]) -> Result<()> {
        self.update(|content| content.forwarded_ports = ports.to_vec())
    }

    fn get_forwarded_ports(&self, platform: &str) -> Result<Vec<ForwardedPort>> {
        Ok(self
            .sessions()?
            .into_iter()
            .find(|c| c.platform == platform && self.alive(c.pid))
            .map(|c| c.forwarded_ports)
            .unwrap_or_default())
    }

    fn set_api_server_port(&self, port: u16) -> Result<()> {
        self.update(|content| content.api_server_port = Some(port))
    }

    fn get_api_server_port(&self) -> Result<Option<u16>> {
        if let Some(own) = self.read()? {
            return Ok(own.api_server_port);
        }
        Ok(self
            .sessions()?
            .into_iter()
            .filter(|c| self.alive(c.pid))
            .find_map(|c| c.api_server_port))
    }

    fn clear_api_server_port(&self) -> Result<()> {
        if self.read()?.is_none() {
            return Ok(());
        }
        self.update(|content| content.api_server_port = None)
    }

    fn save_exit(&self) -> Result<()> {
        let path = self.path();
        if self.fs.exists(&path) {
            self.fs.remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::filesystem::DefaultFs;

    fn port() -> ForwardedPort {
        ForwardedPort {
            platform: "podman".to_string(),
            container_name: "runtime".to_string(),
            port_name: "http".to_string(),
            local_address: "127.0.0.1".to_string(),
            local_port: 20001,
            container_port: 3000,
            protocol: "http".to_string(),
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path(), Arc::new(DefaultFs));

        state.init("podman").unwrap();
        state.set_forwarded_ports(&[port()]).unwrap();
        state.set_api_server_port(20000).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(state.path()).unwrap()).unwrap();
        assert_eq!(written["platform"], "podman");
        assert_eq!(written["forwardedPorts"][0]["localPort"], 20001);
        assert_eq!(written["apiServerPort"], 20000);
        state.clear_api_server_port().unwrap();
        assert_eq!(state.get_api_server_port().unwrap(), None);

        assert_eq!(state.get_forwarded_ports("podman").unwrap(), vec![port()]);
        assert!(state.get_forwarded_ports("cluster").unwrap().is_empty());

        state.save_exit().unwrap();
        assert!(!state.path().exists());
        assert_eq!(state.get_api_server_port().unwrap(), None);
    }

    #[test]
    fn test_sessions_on_other_platforms_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = StateFile::with_pid(dir.path(), 1, Arc::new(DefaultFs));
        cluster.init("cluster").unwrap();
        let cluster_port = ForwardedPort {
            platform: "cluster".to_string(),
            ..port()
        };
        cluster.set_forwarded_ports(&[cluster_port.clone()]).unwrap();

        let podman = StateFile::new(dir.path(), Arc::new(DefaultFs));
        assert_ne!(podman.path(), cluster.path());
        podman.init("podman").unwrap();
        assert_eq!(
            podman.get_forwarded_ports("cluster").unwrap(),
            vec![cluster_port.clone()]
        );

        podman.save_exit().unwrap();
        assert!(!podman.path().exists());
        assert!(cluster.path().exists());
        assert_eq!(cluster.get_forwarded_ports("cluster").unwrap(), vec![cluster_port]);
    }

    #[test]
    fn test_second_session_on_same_platform_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let first = StateFile::new(dir.path(), Arc::new(DefaultFs));
        first.init("podman").unwrap();

        let second = StateFile::with_pid(dir.path(), std::process::id() + 1, Arc::new(DefaultFs));
        let err = second.init("podman").unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn test_legacy_state_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        std::fs::write(
            dir.path().join(STATE_DIR).join(STATE_FILE),
            format!(
                r#"{{"pid": {}, "platform": "podman", "forwardedPorts": [], "apiServerPort": 20000}}"#,
                std::process::id()
            ),
        )
        .unwrap();

        let other = StateFile::with_pid(dir.path(), 1, Arc::new(DefaultFs));
        assert_eq!(other.get_api_server_port().unwrap(), Some(20000));
        assert!(is_state_file_name("devstate.42.json"));
        assert!(!is_state_file_name("devstate.x.json"));
    }
}
