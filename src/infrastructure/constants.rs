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

/// Binary name and version
pub const APP_NAME: &str = "astra";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT: &str = match option_env!("ASTRA_GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// Environment variables
pub const ENV_GLOBAL_CONFIG: &str = "GLOBALastraCONFIG";
pub const ENV_EXPERIMENTAL_MODE: &str = "astra_EXPERIMENTAL_MODE";
pub const ENV_DISABLE_TELEMETRY: &str = "astra_DISABLE_TELEMETRY";
pub const ENV_TRACKING_CONSENT: &str = "astra_TRACKING_CONSENT";
pub const ENV_DEBUG_TELEMETRY_FILE: &str = "astra_DEBUG_TELEMETRY_FILE";
pub const ENV_LOG_LEVEL: &str = "astra_LOG_LEVEL";
pub const ENV_TELEMETRY_CALLER: &str = "TELEMETRY_CALLER";
pub const ENV_DOCKER_CMD: &str = "DOCKER_CMD";
pub const ENV_PODMAN_CMD: &str = "PODMAN_CMD";
pub const ENV_PODMAN_CMD_INIT_TIMEOUT: &str = "PODMAN_CMD_INIT_TIMEOUT";
pub const ENV_PUSH_IMAGES: &str = "astra_PUSH_IMAGES";
pub const ENV_CONTAINER_BACKEND_GLOBAL_ARGS: &str = "astra_CONTAINER_BACKEND_GLOBAL_ARGS";
pub const ENV_IMAGE_BUILD_ARGS: &str = "astra_IMAGE_BUILD_ARGS";
pub const ENV_CONTAINER_RUN_ARGS: &str = "astra_CONTAINER_RUN_ARGS";

/// Release notifications
pub const RELEASES_PAGE: &str = "https://github.com/danielpickens/astra/releases";
pub const LATEST_RELEASE_URL: &str = "https://api.github.com/repos/danielpickens/astra/releases/latest";
pub const RELEASE_CHECK_TIMEOUT_SECS: u64 = 5;

/// Environment defaults
pub const DEFAULT_DOCKER_CMD: &str = "docker";
pub const DEFAULT_PODMAN_CMD: &str = "podman";
pub const DEFAULT_PODMAN_CMD_INIT_TIMEOUT: &str = "1s";

/// Preference file location
pub const GLOBAL_CONFIG_DIR: &str = ".astra";
pub const GLOBAL_CONFIG_FILE: &str = "preference.yaml";
pub const PREFERENCE_KIND: &str = "Preference";
pub const PREFERENCE_API_VERSION: &str = "astra.dev/v1alpha1";

/// Devfile registries
pub const DEFAULT_DEVFILE_REGISTRY_NAME: &str = "DefaultDevfileRegistry";
pub const DEFAULT_DEVFILE_REGISTRY_URL: &str = "https://registry.devfile.io";
pub const LEGACY_DEVFILE_REGISTRY_URL: &str = "https://registry.stage.devfile.io";
pub const REGISTRY_INDEX_PATH: &str = "/v2index";

/// Devfile files, in lookup order
pub const DEVFILE_NAMES: [&str; 4] = ["devfile.yaml", ".devfile.yaml", "devfile.yml", ".devfile.yml"];

/// Local state directory inside the component directory
pub const STATE_DIR: &str = ".astra";
pub const STATE_FILE: &str = "devstate.json";

/// Application name used when building labels
pub const DEFAULT_APP_NAME: &str = "app";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Field manager for server-side apply
pub const FIELD_MANAGER: &str = "astra";

/// Telemetry
pub const TELEMETRY_ENDPOINT: &str = "https://api.segment.io/v1/track";
pub const TELEMETRY_TIMEOUT_SECS: u64 = 5;

/// Manifests referenced by URL
pub const MANIFEST_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Dev session
pub const DEV_POD_READY_TIMEOUT_SECS: u64 = 300;
pub const DEV_POD_POLL_INTERVAL_SECS: u64 = 2;
pub const NAMESPACE_WAIT_TIMEOUT_SECS: u64 = 60;
