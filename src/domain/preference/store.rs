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

use super::settings::*;
use super::PreferenceClient;
use crate::domain::config::{parse_bool, EnvConfig};
use crate::infrastructure::constants::{
    DEFAULT_DEVFILE_REGISTRY_NAME, DEFAULT_DEVFILE_REGISTRY_URL, GLOBAL_CONFIG_DIR,
    GLOBAL_CONFIG_FILE, LEGACY_DEVFILE_REGISTRY_URL,
};
use crate::shared::duration::{format_duration, parse_duration};
use crate::shared::error::{AstraError, Result};
use crate::shared::prompt;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    Add,
    Remove,
}

impl std::fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryOperation::Add => write!(f, "add"),
            RegistryOperation::Remove => write!(f, "remove"),
        }
    }
}

/// Resolve the preference file: `GLOBALastraCONFIG`, then `~/.astra/preference.yaml`.
pub fn preference_file(env: &EnvConfig) -> Result<PathBuf> {
    if let Some(path) = &env.global_config {
        return Ok(PathBuf::from(path));
    }
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| AstraError::config_error("unable to determine the home directory"))?;
    Ok(dirs
        .home_dir()
        .join(GLOBAL_CONFIG_DIR)
        .join(GLOBAL_CONFIG_FILE))
}

/// File-backed preference store.
#[derive(Debug)]
pub struct PreferenceInfo {
    filename: PathBuf,
    preference: RwLock<Preference>,
}

impl PreferenceInfo {
    pub fn from_env(env: &EnvConfig) -> Result<Self> {
        Self::new(preference_file(env)?)
    }

    /// Load the file, or start from defaults when it does not exist.
    pub fn new(filename: impl Into<PathBuf>) -> Result<Self> {
        let filename = filename.into();
        tracing::debug!("The path for preference file is {}", filename.display());

        if !filename.exists() {
            let mut preference = Preference::default();
            preference.settings.registry_list = Some(default_registry_list());
            return Ok(Self {
                filename,
                preference: RwLock::new(preference),
            });
        }

        let content = std::fs::read_to_string(&filename)?;
        let mut preference: Preference = if content.trim().is_empty() {
            Preference::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                AstraError::config_error(format!(
                    "unable to parse preference file {}: {}",
                    filename.display(),
                    e
                ))
            })?
        };

        warn_below_minimum(&preference.settings);

        match preference.settings.registry_list.as_mut() {
            None => preference.settings.registry_list = Some(default_registry_list()),
            Some(list) => {
                if let Some(registry) = list.iter_mut().find(|r| {
                    r.name == DEFAULT_DEVFILE_REGISTRY_NAME && r.url == LEGACY_DEVFILE_REGISTRY_URL
                }) {
                    registry.url = DEFAULT_DEVFILE_REGISTRY_URL.to_string();
                }
            }
        }

        Ok(Self {
            filename,
            preference: RwLock::new(preference),
        })
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn settings(&self) -> AstraSettings {
        self.read().settings.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Preference> {
        self.preference.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut AstraSettings) -> Result<()>,
    {
        let mut guard = self
            .preference
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut updated = guard.clone();
        change(&mut updated.settings)?;
        write_yaml(&self.filename, &updated)?;
        *guard = updated;
        Ok(())
    }
}

fn write_yaml(path: &Path, preference: &Preference) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_yaml::to_string(preference)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn warn_below_minimum(settings: &AstraSettings) {
    let below = |value: Option<Duration>| value.is_some_and(|d| d < MINIMUM_DURATION);
    let mut requires_change = Vec::new();
    if below(settings.timeout) {
        requires_change.push(TIMEOUT_SETTING);
    }
    if below(settings.push_timeout) {
        requires_change.push(PUSH_TIMEOUT_SETTING);
    }
    if below(settings.registry_cache_time) {
        requires_change.push(REGISTRY_CACHE_TIME_SETTING);
    }
    if !requires_change.is_empty() {
        tracing::warn!(
            "Please change the preference value for {}, the value does not comply with the minimum value of {}; e.g. of acceptable formats: 4s, 5m, 1h",
            requires_change.join(", "),
            format_duration(MINIMUM_DURATION)
        );
    }
}

fn parse_bool_setting(parameter: &str, value: &str) -> Result<bool> {
    parse_bool(value).ok_or_else(|| AstraError::NotBoolean {
        name: parameter.to_string(),
        value: value.to_string(),
    })
}

fn parse_duration_setting(parameter: &str, value: &str) -> Result<Duration> {
    let below = || AstraError::DurationBelowMinimum {
        name: parameter.to_string(),
        value: value.to_string(),
        minimum: format_duration(MINIMUM_DURATION),
    };
    let parsed = parse_duration(value).map_err(|_| below())?;
    if parsed < MINIMUM_DURATION {
        return Err(below());
    }
    Ok(parsed)
}

impl PreferenceClient for PreferenceInfo {
    fn set_configuration(&self, parameter: &str, value: &str) -> Result<()> {
        let supported = supported_parameter(parameter).ok_or_else(|| AstraError::UnknownParameter {
            name: parameter.to_string(),
        })?;

        self.update(|settings| {
            match supported.name {
                TIMEOUT_SETTING => settings.timeout = Some(parse_duration_setting(parameter, value)?),
                PUSH_TIMEOUT_SETTING => {
                    settings.push_timeout = Some(parse_duration_setting(parameter, value)?)
                }
                REGISTRY_CACHE_TIME_SETTING => {
                    settings.registry_cache_time = Some(parse_duration_setting(parameter, value)?)
                }
                UPDATE_NOTIFICATION_SETTING => {
                    settings.update_notification = Some(parse_bool_setting(parameter, value)?)
                }
                EPHEMERAL_SETTING => settings.ephemeral = Some(parse_bool_setting(parameter, value)?),
                CONSENT_TELEMETRY_SETTING => {
                    settings.consent_telemetry = Some(parse_bool_setting(parameter, value)?)
                }
                IMAGE_REGISTRY_SETTING => settings.image_registry = Some(value.to_string()),
                _ => {
                    return Err(AstraError::UnknownParameter {
                        name: parameter.to_string(),
                    })
                }
            }
            Ok(())
        })
    }

    fn delete_configuration(&self, parameter: &str) -> Result<()> {
        let supported = supported_parameter(parameter).ok_or_else(|| AstraError::UnknownParameter {
            name: parameter.to_string(),
        })?;

        self.update(|settings| {
            match supported.name {
                TIMEOUT_SETTING => settings.timeout = None,
                PUSH_TIMEOUT_SETTING => settings.push_timeout = None,
                REGISTRY_CACHE_TIME_SETTING => settings.registry_cache_time = None,
                UPDATE_NOTIFICATION_SETTING => settings.update_notification = None,
                EPHEMERAL_SETTING => settings.ephemeral = None,
                CONSENT_TELEMETRY_SETTING => settings.consent_telemetry = None,
                IMAGE_REGISTRY_SETTING => settings.image_registry = None,
                _ => {}
            }
            Ok(())
        })
    }

    fn is_set(&self, parameter: &str) -> bool {
        let Some(supported) = supported_parameter(parameter) else {
            return false;
        };
        let guard = self.read();
        let settings = &guard.settings;
        match supported.name {
            TIMEOUT_SETTING => settings.timeout.is_some(),
            PUSH_TIMEOUT_SETTING => settings.push_timeout.is_some(),
            REGISTRY_CACHE_TIME_SETTING => settings.registry_cache_time.is_some(),
            UPDATE_NOTIFICATION_SETTING => settings.update_notification.is_some(),
            EPHEMERAL_SETTING => settings.ephemeral.is_some(),
            CONSENT_TELEMETRY_SETTING => settings.consent_telemetry.is_some(),
            IMAGE_REGISTRY_SETTING => settings.image_registry.is_some(),
            _ => false,
        }
    }

    fn registry_handler(
        &self,
        operation: RegistryOperation,
        name: &str,
        url: &str,
        force: bool,
        secure: bool,
    ) -> Result<bool> {
        let exists = self.registry_list().iter().any(|r| r.name == name);
        if matches!(operation, RegistryOperation::Remove) && exists && !force {
            let confirmed = prompt::proceed(&format!(
                "Are you sure you want to {} registry {:?}",
                operation, name
            ))?;
            if !confirmed {
                return Ok(false);
            }
        }

        self.update(|settings| {
            let list = settings
                .registry_list
                .get_or_insert_with(default_registry_list);
            let position = list.iter().position(|r| r.name == name);

            match (operation, position) {
                (RegistryOperation::Add, Some(_)) => Err(AstraError::RegistryExists {
                    name: name.to_string(),
                }),
                (RegistryOperation::Add, None) => {
                    list.push(Registry::new(name, url, secure));
                    Ok(())
                }
                (RegistryOperation::Remove, None) => Err(AstraError::RegistryMissing {
                    name: name.to_string(),
                }),
                (RegistryOperation::Remove, Some(index)) => {
                    list.remove(index);
                    Ok(())
                }
            }
        })?;
        Ok(true)
    }

    fn update_notification(&self) -> bool {
        self.read()
            .settings
            .update_notification
            .unwrap_or(DEFAULT_UPDATE_NOTIFICATION)
    }

    fn timeout(&self) -> Duration {
        self.read().settings.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    fn push_timeout(&self) -> Duration {
        self.read()
            .settings
            .push_timeout
            .unwrap_or(DEFAULT_PUSH_TIMEOUT)
    }

    fn registry_cache_time(&self) -> Duration {
        self.read()
            .settings
            .registry_cache_time
            .unwrap_or(DEFAULT_REGISTRY_CACHE_TIME)
    }

    fn ephemeral_source_volume(&self) -> bool {
        self.read().settings.ephemeral.unwrap_or(DEFAULT_EPHEMERAL)
    }

    fn consent_telemetry(&self) -> Option<bool> {
        self.read().settings.consent_telemetry
    }

    fn image_registry(&self) -> String {
        self.read()
            .settings
            .image_registry
            .clone()
            .unwrap_or_default()
    }

    fn registry_list(&self) -> Vec<Registry> {
        let mut list = self.read().settings.registry_list.clone().unwrap_or_default();
        list.reverse();
        list
    }

    fn new_preference_list(&self) -> Vec<PreferenceItem> {
        let settings = self.settings();
        SUPPORTED_PARAMETERS
            .iter()
            .map(|parameter| {
                let (value, default) = match parameter.name {
                    UPDATE_NOTIFICATION_SETTING => (
                        settings.update_notification.map(|v| json!(v)),
                        json!(DEFAULT_UPDATE_NOTIFICATION),
                    ),
                    TIMEOUT_SETTING => (
                        settings.timeout.map(|d| json!(format_duration(d))),
                        json!(format_duration(DEFAULT_TIMEOUT)),
                    ),
                    PUSH_TIMEOUT_SETTING => (
                        settings.push_timeout.map(|d| json!(format_duration(d))),
                        json!(format_duration(DEFAULT_PUSH_TIMEOUT)),
                    ),
                    REGISTRY_CACHE_TIME_SETTING => (
                        settings.registry_cache_time.map(|d| json!(format_duration(d))),
                        json!(format_duration(DEFAULT_REGISTRY_CACHE_TIME)),
                    ),
                    EPHEMERAL_SETTING => (settings.ephemeral.map(|v| json!(v)), json!(DEFAULT_EPHEMERAL)),
                    CONSENT_TELEMETRY_SETTING => (
                        settings.consent_telemetry.map(|v| json!(v)),
                        json!(DEFAULT_CONSENT_TELEMETRY),
                    ),
                    _ => (settings.image_registry.clone().map(|v| json!(v)), json!("")),
                };
                PreferenceItem {
                    name: parameter.name.to_string(),
                    value,
                    default,
                    kind: parameter.kind.as_str().to_string(),
                    description: parameter.description.to_string(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> PreferenceInfo {
        PreferenceInfo::new(dir.path().join("preference.yaml")).unwrap()
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store(&dir);
        assert_eq!(prefs.timeout(), Duration::from_secs(1));
        assert_eq!(prefs.push_timeout(), Duration::from_secs(240));
        assert!(prefs.update_notification());
        assert!(prefs.consent_telemetry().is_none());
        assert_eq!(prefs.registry_list(), default_registry_list());
        assert!(!prefs.is_set("Timeout"));
    }

    #[test]
    fn test_set_and_unset_persist() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store(&dir);
        prefs.set_configuration("TimeOut", "5m").unwrap();
        prefs.set_configuration("ephemeral", "TRUE").unwrap();

        let reloaded = store(&dir);
        assert_eq!(reloaded.timeout(), Duration::from_secs(300));
        assert!(reloaded.ephemeral_source_volume());
        assert!(reloaded.is_set("timeout"));

        reloaded.delete_configuration("TIMEOUT").unwrap();
        let reloaded = store(&dir);
        assert!(!reloaded.is_set("timeout"));
        assert_eq!(reloaded.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store(&dir);
        assert!(matches!(
            prefs.set_configuration("invalid_parameter", "x"),
            Err(AstraError::UnknownParameter { .. })
        ));
        assert!(matches!(
            prefs.set_configuration("UpdateNotification", "invalid_value"),
            Err(AstraError::NotBoolean { .. })
        ));
        assert!(prefs.set_configuration("Timeout", "0s").is_err());
        assert!(prefs.set_configuration("Timeout", "-5s").is_err());
        assert!(prefs.set_configuration("RegistryCacheTime", "a").is_err());
        assert!(prefs.set_configuration("ConsentTelemetry", "123").is_err());
        assert!(!prefs.is_set("Timeout"));
    }

    #[test]
    fn test_failed_write_keeps_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let prefs = PreferenceInfo::new(blocker.join("preference.yaml")).unwrap();

        assert!(prefs.set_configuration("Timeout", "10s").is_err());
        assert!(!prefs.is_set("Timeout"));
        assert!(prefs
            .registry_handler(RegistryOperation::Add, "Staging", "https://staging.example.com", false, false)
            .is_err());
        assert_eq!(prefs.registry_list(), default_registry_list());
    }

    #[test]
    fn test_registry_order_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store(&dir);
        prefs
            .registry_handler(RegistryOperation::Add, "Staging", "https://staging.example.com", false, false)
            .unwrap();
        prefs
            .registry_handler(RegistryOperation::Add, "Private", "https://private.example.com", false, true)
            .unwrap();

        let names: Vec<String> = prefs.registry_list().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Private", "Staging", "DefaultDevfileRegistry"]);

        assert!(matches!(
            prefs.registry_handler(RegistryOperation::Add, "Staging", "https://x", false, false),
            Err(AstraError::RegistryExists { .. })
        ));
        assert!(matches!(
            prefs.registry_handler(RegistryOperation::Remove, "Nope", "", true, false),
            Err(AstraError::RegistryMissing { .. })
        ));

        assert!(prefs
            .registry_handler(RegistryOperation::Remove, "Staging", "", true, false)
            .unwrap());
        let reloaded = store(&dir);
        let names: Vec<String> = reloaded.registry_list().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Private", "DefaultDevfileRegistry"]);
    }

    #[test]
    fn test_legacy_registry_url_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preference.yaml");
        std::fs::write(
            &path,
            "kind: Preference\napiVersion: astra.dev/v1alpha1\nastraSettings:\n  RegistryList:\n  - Name: DefaultDevfileRegistry\n    URL: https://registry.stage.devfile.io\n",
        )
        .unwrap();
        let prefs = PreferenceInfo::new(&path).unwrap();
        assert_eq!(prefs.registry_list()[0].url, "https://registry.devfile.io");
    }

    #[test]
    fn test_preference_list_reports_unset_values() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store(&dir);
        prefs.set_configuration("PushTimeout", "99s").unwrap();
        let items = prefs.new_preference_list();
        assert_eq!(items.len(), 7);
        let push = items.iter().find(|i| i.name == "PushTimeout").unwrap();
        assert_eq!(push.value, Some(json!("1m39s")));
        let timeout = items.iter().find(|i| i.name == "Timeout").unwrap();
        assert!(timeout.value.is_none());
        assert_eq!(timeout.default, json!("1s"));
    }
}
