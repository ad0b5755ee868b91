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

//! Preference file model and the table of user-settable parameters.

use crate::infrastructure::constants::{
    DEFAULT_DEVFILE_REGISTRY_NAME, DEFAULT_DEVFILE_REGISTRY_URL, PREFERENCE_API_VERSION,
    PREFERENCE_KIND,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const UPDATE_NOTIFICATION_SETTING: &str = "UpdateNotification";
pub const TIMEOUT_SETTING: &str = "Timeout";
pub const PUSH_TIMEOUT_SETTING: &str = "PushTimeout";
pub const REGISTRY_CACHE_TIME_SETTING: &str = "RegistryCacheTime";
pub const EPHEMERAL_SETTING: &str = "Ephemeral";
pub const CONSENT_TELEMETRY_SETTING: &str = "ConsentTelemetry";
pub const IMAGE_REGISTRY_SETTING: &str = "ImageRegistry";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(240);
pub const DEFAULT_REGISTRY_CACHE_TIME: Duration = Duration::from_secs(4 * 60);
pub const MINIMUM_DURATION: Duration = Duration::from_secs(1);
pub const DEFAULT_UPDATE_NOTIFICATION: bool = true;
pub const DEFAULT_EPHEMERAL: bool = false;
pub const DEFAULT_CONSENT_TELEMETRY: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Bool,
    Duration,
    String,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Bool => "bool",
            ParameterKind::Duration => "duration",
            ParameterKind::String => "string",
        }
    }
}

/// A parameter that `astra preference set` accepts.
#[derive(Debug, Clone, Copy)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub description: &'static str,
}

/// Sorted by name.
pub const SUPPORTED_PARAMETERS: [Parameter; 7] = [
    Parameter {
        name: CONSENT_TELEMETRY_SETTING,
        kind: ParameterKind::Bool,
        description: "If true, astra will collect telemetry for the user's astra usage (Default: false)\n\t\t    For more information: https://astra.dev/docs/overview/telemetry",
    },
    Parameter {
        name: EPHEMERAL_SETTING,
        kind: ParameterKind::Bool,
        description: "If true, astra will create an emptyDir volume to store source code (Default: false)",
    },
    Parameter {
        name: IMAGE_REGISTRY_SETTING,
        kind: ParameterKind::String,
        description: "Image Registry to which relative image names in Devfile Image Components will be pushed to (Example: quay.io/my-user/)\n\t\t    This will also serve as the base path for replacing matching images in other components like Container and Kubernetes/OpenShift ones.",
    },
    Parameter {
        name: PUSH_TIMEOUT_SETTING,
        kind: ParameterKind::Duration,
        description: "PushTimeout (in Duration) is the maximum time astra will wait for the pod to be running (Default: 4m0s)",
    },
    Parameter {
        name: REGISTRY_CACHE_TIME_SETTING,
        kind: ParameterKind::Duration,
        description: "For how long (in Duration) astra will cache information from the Devfile registry (Default: 4m0s)",
    },
    Parameter {
        name: TIMEOUT_SETTING,
        kind: ParameterKind::Duration,
        description: "Timeout (in Duration) for cluster server connection check (Default: 1s)",
    },
    Parameter {
        name: UPDATE_NOTIFICATION_SETTING,
        kind: ParameterKind::Bool,
        description: "Flag to control if an update notification is shown or not (Default: true)",
    },
];

/// Look a parameter up ignoring case.
pub fn supported_parameter(name: &str) -> Option<&'static Parameter> {
    let lower = name.to_lowercase();
    SUPPORTED_PARAMETERS
        .iter()
        .find(|p| p.name.to_lowercase() == lower)
}

/// `"\nAvailable Global Parameters:\n <name> - <description>\n..."`
pub fn format_supported_parameters() -> String {
    let mut result = String::from("\nAvailable Global Parameters:\n");
    for parameter in SUPPORTED_PARAMETERS.iter() {
        result.push_str(&format!(" {} - {}\n", parameter.name, parameter.description));
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(rename = "Name", alias = "name", default)]
    pub name: String,
    #[serde(rename = "URL", alias = "url", default)]
    pub url: String,
    #[serde(rename = "Secure", alias = "secure", default)]
    pub secure: bool,
}

impl Registry {
    pub fn new(name: impl Into<String>, url: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            secure,
        }
    }
}

pub fn default_registry_list() -> Vec<Registry> {
    vec![Registry::new(
        DEFAULT_DEVFILE_REGISTRY_NAME,
        DEFAULT_DEVFILE_REGISTRY_URL,
        false,
    )]
}

/// Every field is optional so that "unset" stays distinct from "default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AstraSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_notification: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration")]
    pub timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration")]
    pub push_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_list: Option<Vec<Registry>>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration")]
    pub registry_cache_time: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_telemetry: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    #[serde(rename = "astraSettings", default)]
    pub settings: AstraSettings,
}

fn default_kind() -> String {
    PREFERENCE_KIND.to_string()
}

fn default_api_version() -> String {
    PREFERENCE_API_VERSION.to_string()
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            api_version: default_api_version(),
            settings: AstraSettings::default(),
        }
    }
}

/// One row of `astra preference view`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceItem {
    pub name: String,
    pub value: Option<serde_json::Value>,
    pub default: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// Durations are written as text (`4m0s`). Integers are read as nanoseconds,
/// which is how older preference files stored them.
mod opt_duration {
    use crate::shared::duration::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Nanos(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => s.serialize_str(&format_duration(*duration)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Nanos(n)) => Ok(Some(Duration::from_nanos(n))),
            Some(Raw::Text(text)) => parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
