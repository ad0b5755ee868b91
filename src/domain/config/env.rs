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

//! Process-level configuration read from environment variables.

use crate::infrastructure::constants::*;
use crate::shared::duration::parse_duration;
use crate::shared::error::{AstraError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Source of environment values.
pub trait Lookuper: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsLookuper;

impl Lookuper for OsLookuper {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Reads from a fixed map. Used by tests and by the api-server.
#[derive(Debug, Default, Clone)]
pub struct MapLookuper(pub HashMap<String, String>);

impl MapLookuper {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Lookuper for MapLookuper {
    fn lookup(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub docker_cmd: String,
    pub podman_cmd: String,
    pub podman_cmd_init_timeout: Duration,
    pub telemetry_caller: String,
    pub experimental_mode: bool,
    pub push_images: bool,
    pub global_config: Option<String>,
    pub debug_telemetry_file: Option<String>,
    pub disable_telemetry: Option<bool>,
    pub log_level: Option<String>,
    pub tracking_consent: Option<String>,
    pub container_backend_global_args: Vec<String>,
    pub image_build_args: Vec<String>,
    pub container_run_args: Vec<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            docker_cmd: DEFAULT_DOCKER_CMD.to_string(),
            podman_cmd: DEFAULT_PODMAN_CMD.to_string(),
            podman_cmd_init_timeout: Duration::from_secs(1),
            telemetry_caller: String::new(),
            experimental_mode: false,
            push_images: true,
            global_config: None,
            debug_telemetry_file: None,
            disable_telemetry: None,
            log_level: None,
            tracking_consent: None,
            container_backend_global_args: Vec::new(),
            image_build_args: Vec::new(),
            container_run_args: Vec::new(),
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookuper(&OsLookuper)
    }

    pub fn from_lookuper(lookuper: &dyn Lookuper) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            docker_cmd: lookuper
                .lookup(ENV_DOCKER_CMD)
                .unwrap_or(defaults.docker_cmd),
            podman_cmd: lookuper
                .lookup(ENV_PODMAN_CMD)
                .unwrap_or(defaults.podman_cmd),
            podman_cmd_init_timeout: match lookuper.lookup(ENV_PODMAN_CMD_INIT_TIMEOUT) {
                Some(value) => parse_duration(&value).map_err(|e| {
                    AstraError::config_error(format!("{}: {}", ENV_PODMAN_CMD_INIT_TIMEOUT, e))
                })?,
                None => parse_duration(DEFAULT_PODMAN_CMD_INIT_TIMEOUT)?,
            },
            telemetry_caller: lookuper.lookup(ENV_TELEMETRY_CALLER).unwrap_or_default(),
            experimental_mode: lookup_bool(lookuper, ENV_EXPERIMENTAL_MODE)?.unwrap_or(false),
            push_images: lookup_bool(lookuper, ENV_PUSH_IMAGES)?.unwrap_or(true),
            global_config: lookuper.lookup(ENV_GLOBAL_CONFIG),
            debug_telemetry_file: lookuper.lookup(ENV_DEBUG_TELEMETRY_FILE),
            disable_telemetry: lookup_bool(lookuper, ENV_DISABLE_TELEMETRY)?,
            log_level: lookuper.lookup(ENV_LOG_LEVEL),
            tracking_consent: lookuper.lookup(ENV_TRACKING_CONSENT),
            container_backend_global_args: lookup_list(lookuper, ENV_CONTAINER_BACKEND_GLOBAL_ARGS),
            image_build_args: lookup_list(lookuper, ENV_IMAGE_BUILD_ARGS),
            container_run_args: lookup_list(lookuper, ENV_CONTAINER_RUN_ARGS),
        })
    }

    /// `astra_TRACKING_CONSENT` as a decision: `yes` grants, `no` denies.
    pub fn tracking_consent(&self) -> Result<Option<bool>> {
        match self.tracking_consent.as_deref() {
            None | Some("") => Ok(None),
            Some("yes") => Ok(Some(true)),
            Some("no") => Ok(Some(false)),
            Some(other) => Err(AstraError::config_error(format!(
                "invalid value {:?} for {}, expected \"yes\" or \"no\"",
                other, ENV_TRACKING_CONSENT
            ))),
        }
    }

    /// Reject the deprecated variable and the new one disagreeing.
    pub fn check_telemetry_settings(&self) -> Result<()> {
        if self.disable_telemetry == Some(true) && self.tracking_consent()? == Some(true) {
            return Err(AstraError::config_error(format!(
                "{} and {} cannot be set to true and yes respectively",
                ENV_DISABLE_TELEMETRY, ENV_TRACKING_CONSENT
            )));
        }
        Ok(())
    }

    /// Telemetry is off when either variable says so.
    pub fn telemetry_disabled(&self) -> bool {
        self.disable_telemetry == Some(true) || matches!(self.tracking_consent(), Ok(Some(false)))
    }
}

fn lookup_bool(lookuper: &dyn Lookuper, key: &str) -> Result<Option<bool>> {
    match lookuper.lookup(key) {
        None => Ok(None),
        Some(value) => parse_bool(&value).map(Some).ok_or_else(|| {
            AstraError::config_error(format!("{}: invalid boolean value {:?}", key, value))
        }),
    }
}

fn lookup_list(lookuper: &dyn Lookuper, key: &str) -> Vec<String> {
    lookuper
        .lookup(key)
        .map(|value| {
            value
                .split(';')
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Boolean spellings accepted in the environment and in preference values.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" => Some(true),
        "0" | "f" | "false" | "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_lookup() {
        let config = EnvConfig::from_lookuper(&MapLookuper::default()).unwrap();
        assert_eq!(config.docker_cmd, "docker");
        assert_eq!(config.podman_cmd, "podman");
        assert_eq!(config.podman_cmd_init_timeout, Duration::from_secs(1));
        assert!(config.push_images);
        assert!(!config.experimental_mode);
        assert!(config.global_config.is_none());
        assert!(config.disable_telemetry.is_none());
        assert!(config.image_build_args.is_empty());
    }

    #[test]
    fn test_values_from_lookup() {
        let lookuper = MapLookuper::new([
            ("PODMAN_CMD", "/usr/bin/podman"),
            ("PODMAN_CMD_INIT_TIMEOUT", "10s"),
            ("astra_PUSH_IMAGES", "false"),
            ("astra_IMAGE_BUILD_ARGS", "--no-cache;--pull"),
            ("astra_EXPERIMENTAL_MODE", "true"),
        ]);
        let config = EnvConfig::from_lookuper(&lookuper).unwrap();
        assert_eq!(config.podman_cmd, "/usr/bin/podman");
        assert_eq!(config.podman_cmd_init_timeout, Duration::from_secs(10));
        assert!(!config.push_images);
        assert!(config.experimental_mode);
        assert_eq!(config.image_build_args, vec!["--no-cache", "--pull"]);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let lookuper = MapLookuper::new([("astra_PUSH_IMAGES", "perhaps")]);
        let err = EnvConfig::from_lookuper(&lookuper).unwrap_err();
        assert!(err.to_string().contains("astra_PUSH_IMAGES"));
    }

    #[test]
    fn test_telemetry_conflict() {
        let lookuper = MapLookuper::new([
            ("astra_DISABLE_TELEMETRY", "true"),
            ("astra_TRACKING_CONSENT", "yes"),
        ]);
        let config = EnvConfig::from_lookuper(&lookuper).unwrap();
        assert!(config.check_telemetry_settings().is_err());

        let lookuper = MapLookuper::new([("astra_TRACKING_CONSENT", "no")]);
        let config = EnvConfig::from_lookuper(&lookuper).unwrap();
        assert!(config.check_telemetry_settings().is_ok());
        assert!(config.telemetry_disabled());
    }
}
