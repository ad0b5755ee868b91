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

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AstraError>;

#[derive(Error, Debug)]
pub enum AstraError {
    #[error("Kubernetes API error: {0}")]
    KubeError(String),

    #[error("Podman error: {0}")]
    PodmanError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Devfile error: {0}")]
    DevfileError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("{resource_type} {name:?} not found in namespace {namespace:?}")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("{resource_type} {name:?} already exists in namespace {namespace:?}")]
    AlreadyExists {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("{}", no_devfile_message(.dir, .empty))]
    NoDevfile { dir: PathBuf, empty: bool },

    #[error("invalid mode {mode:?}, valid modes are {valid}")]
    InvalidMode { mode: String, valid: String },

    #[error("Please ensure you have an active kubernetes context to your cluster.\nConsult your Kubernetes distribution's documentation for more details.\nError: {0}")]
    NoConnection(String),

    #[error("Unauthorized to access the cluster")]
    Unauthorized,

    #[error("unable to access podman. Do you have podman client installed and configured correctly? cause: {reason}")]
    PodmanNotFound { reason: String },

    #[error("no components present")]
    NoComponents,

    #[error("astra requires atleast one component of type 'container' in devfile")]
    NoContainerComponent,

    #[error("command {id:?} must be of type \"exec\" or \"composite\"")]
    UnsupportedCommand { id: String },

    #[error("unknown parameter : {name:?} is not a parameter in astra preference, run `astra preference -h` to see list of available parameters")]
    UnknownParameter { name: String },

    #[error("unable to set {name:?} to {value:?}, value must be a boolean")]
    NotBoolean { name: String, value: String },

    #[error("unable to set {name:?} to {value:?}, value must be a positive duration of at least {minimum}")]
    DurationBelowMinimum {
        name: String,
        value: String,
        minimum: String,
    },

    #[error("registry {name:?} already exists")]
    RegistryExists { name: String },

    #[error("registry {name:?} doesn't exist or it is not managed by astra")]
    RegistryMissing { name: String },

    #[error("flag --{flag} not supported for command {command:?}")]
    FlagNotSupported { flag: String, command: String },

    #[error("interrupted by the user")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

fn no_devfile_message(dir: &std::path::Path, empty: &bool) -> String {
    if *empty {
        format!(
            "The current directory is empty. You can bootstrap new component using the 'astra init' command.\n\
             The directory {} does not contain a devfile.",
            dir.display()
        )
    } else {
        format!(
            "The current directory does not contain a devfile ({}).\n\
             Run 'astra init' to fetch a devfile for the code in this directory.",
            dir.display()
        )
    }
}

impl From<kube::Error> for AstraError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 401 || resp.code == 403 => {
                AstraError::Unauthorized
            }
            _ => AstraError::KubeError(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for AstraError {
    fn from(err: reqwest::Error) -> Self {
        AstraError::RegistryError(err.to_string())
    }
}

impl AstraError {
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn devfile_error(context: impl Into<String>) -> Self {
        Self::DevfileError(context.into())
    }

    pub fn validation(context: impl Into<String>) -> Self {
        Self::ValidationError(context.into())
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn already_exists(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn flag_not_supported(flag: impl Into<String>, command: impl Into<String>) -> Self {
        Self::FlagNotSupported {
            flag: flag.into(),
            command: command.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Returns true when the kube error is an API 404.
pub fn is_kube_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_devfile_messages_differ() {
        let empty = AstraError::NoDevfile {
            dir: PathBuf::from("/tmp/x"),
            empty: true,
        };
        let filled = AstraError::NoDevfile {
            dir: PathBuf::from("/tmp/x"),
            empty: false,
        };
        assert!(empty.to_string().contains("is empty"));
        assert!(filled.to_string().contains("astra init"));
        assert_ne!(empty.to_string(), filled.to_string());
    }

    #[test]
    fn test_preference_errors() {
        let err = AstraError::UnknownParameter {
            name: "foo".to_string(),
        };
        assert!(err.to_string().starts_with("unknown parameter : \"foo\""));

        let err = AstraError::NotBoolean {
            name: "ephemeral".to_string(),
            value: "maybe".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unable to set \"ephemeral\" to \"maybe\", value must be a boolean"
        );
    }
}
