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

//! User preferences persisted across invocations.

pub mod settings;
pub mod store;

use crate::shared::error::Result;
use std::time::Duration;

pub use settings::{
    default_registry_list, format_supported_parameters, supported_parameter, AstraSettings,
    Parameter, ParameterKind, Preference, PreferenceItem, Registry, SUPPORTED_PARAMETERS,
};
pub use store::{preference_file, PreferenceInfo, RegistryOperation};

pub trait PreferenceClient: Send + Sync {
    /// Set a parameter (case-insensitive name) and persist the file.
    fn set_configuration(&self, parameter: &str, value: &str) -> Result<()>;

    /// Unset a parameter and persist the file.
    fn delete_configuration(&self, parameter: &str) -> Result<()>;

    fn is_set(&self, parameter: &str) -> bool;

    /// Add or remove a devfile registry. Returns false when the user declined.
    fn registry_handler(
        &self,
        operation: RegistryOperation,
        name: &str,
        url: &str,
        force: bool,
        secure: bool,
    ) -> Result<bool>;

    fn update_notification(&self) -> bool;

    fn timeout(&self) -> Duration;

    fn push_timeout(&self) -> Duration;

    fn registry_cache_time(&self) -> Duration;

    fn ephemeral_source_volume(&self) -> bool;

    /// `None` until the user answered the consent question.
    fn consent_telemetry(&self) -> Option<bool>;

    fn image_registry(&self) -> String;

    /// Most recently added first.
    fn registry_list(&self) -> Vec<Registry>;

    fn registry_name_exists(&self, name: &str) -> bool {
        self.registry_list().iter().any(|r| r.name == name)
    }

    fn new_preference_list(&self) -> Vec<PreferenceItem>;
}
