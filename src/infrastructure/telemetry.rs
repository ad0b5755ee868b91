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

//! Usage data. Each command hands an event to a detached `astra telemetry`
//! process so that uploading never delays the command itself.

use crate::domain::config::EnvConfig;
use crate::domain::preference::PreferenceClient;
use crate::infrastructure::constants::{
    GLOBAL_CONFIG_DIR, TELEMETRY_ENDPOINT, TELEMETRY_TIMEOUT_SECS,
};
use crate::shared::error::{AstraError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

const TELEMETRY_ID_FILE: &str = "telemetryuuid";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryProperties {
    pub duration: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_type: String,
    pub success: bool,
    pub tty: bool,
    pub version: String,
    #[serde(default)]
    pub cmd_properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryData {
    pub event: String,
    pub properties: TelemetryProperties,
}

/// Consent from the environment first, then from the preference file.
pub fn is_telemetry_enabled(env: &EnvConfig, preferences: &dyn PreferenceClient) -> bool {
    if env.disable_telemetry == Some(true) {
        return false;
    }
    match env.tracking_consent() {
        Ok(Some(consent)) => consent,
        _ => preferences.consent_telemetry().unwrap_or(false),
    }
}

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*""#).expect("valid quote pattern"));
static PATHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(/[^\s/:]+)+/?").expect("valid path pattern"));

/// Error text with paths and quoted values replaced, so no user data is sent.
pub fn sanitize_error(message: &str) -> String {
    let without_quotes = QUOTED.replace_all(message, "***");
    PATHS.replace_all(&without_quotes, "***").into_owned()
}

/// Kind of an error as reported in the `errortype` property.
pub fn error_type(error: &anyhow::Error) -> String {
    match error.downcast_ref::<AstraError>() {
        Some(err) => {
            let debug = format!("{:?}", err);
            debug
                .split(|c: char| !c.is_alphanumeric())
                .next()
                .unwrap_or_default()
                .to_string()
        }
        None => "Error".to_string(),
    }
}

/// Start `astra telemetry <json>` in the background and do not wait for it.
pub fn spawn_upload(data: &TelemetryData) {
    let payload = match serde_json::to_string(data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("Failed to marshal telemetry data: {}", e);
            return;
        }
    };
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            tracing::debug!("Failed to locate the astra binary: {}", e);
            return;
        }
    };
    let spawned = std::process::Command::new(exe)
        .arg("telemetry")
        .arg(payload)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        tracing::debug!("Failed to start the telemetry process: {}", e);
    }
}

pub struct TelemetryClient {
    http: reqwest::Client,
    debug_file: Option<PathBuf>,
    endpoint: String,
}

impl TelemetryClient {
    pub fn new(env: &EnvConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TELEMETRY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            debug_file: env.debug_telemetry_file.as_ref().map(PathBuf::from),
            endpoint: TELEMETRY_ENDPOINT.to_string(),
        })
    }

    /// Write the event to the debug file when one is configured, else POST it.
    pub async fn upload(&self, data: &TelemetryData) -> Result<()> {
        if let Some(path) = &self.debug_file {
            tracing::debug!("writing telemetry data to {}", path.display());
            std::fs::write(path, serde_json::to_string_pretty(data)?)?;
            return Ok(());
        }

        let body = serde_json::json!({
            "anonymousId": anonymous_id()?,
            "event": data.event,
            "properties": data.properties,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AstraError::validation(format!(
                "telemetry endpoint answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Stable random identifier kept in `~/.astra/telemetryuuid`.
fn anonymous_id() -> Result<String> {
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| AstraError::config_error("unable to determine the home directory"))?;
    let path = dirs.home_dir().join(GLOBAL_CONFIG_DIR).join(TELEMETRY_ID_FILE);
    if let Ok(existing) = std::fs::read_to_string(&path) {
        if !existing.trim().is_empty() {
            return Ok(existing.trim().to_string());
        }
    }
    let id = format!(
        "{:x}-{:x}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        std::process::id()
    );
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::MapLookuper;
    use crate::domain::preference::PreferenceInfo;

    #[test]
    fn test_sanitize_error_hides_paths_and_values() {
        let sanitized = sanitize_error(r#"unable to read /home/me/app/devfile.yaml: value "secret""#);
        assert!(!sanitized.contains("/home/me"));
        assert!(!sanitized.contains("secret"));
    }

    #[test]
    fn test_error_type_uses_variant_name() {
        let err = anyhow::Error::new(AstraError::NoComponents);
        assert_eq!(error_type(&err), "NoComponents");
        assert_eq!(error_type(&anyhow::anyhow!("boom")), "Error");
    }

    #[test]
    fn test_env_consent_wins_over_preference() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PreferenceInfo::new(dir.path().join("preference.yaml")).unwrap();
        prefs.set_configuration("ConsentTelemetry", "true").unwrap();

        let env = EnvConfig::from_lookuper(&MapLookuper::new([("astra_TRACKING_CONSENT", "no")])).unwrap();
        assert!(!is_telemetry_enabled(&env, &prefs));
        assert!(is_telemetry_enabled(&EnvConfig::default(), &prefs));
    }

    #[tokio::test]
    async fn test_upload_writes_debug_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("telemetry.json");
        let env = EnvConfig {
            debug_telemetry_file: Some(file.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let data = TelemetryData {
            event: "astra version".to_string(),
            properties: TelemetryProperties {
                success: true,
                ..Default::default()
            },
        };
        TelemetryClient::new(&env).unwrap().upload(&data).await.unwrap();

        let written: TelemetryData =
            serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
        assert_eq!(written.event, "astra version");
    }
}
