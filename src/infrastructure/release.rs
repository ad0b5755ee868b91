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

//! Newer release notice, driven by the `UpdateNotification` preference.

use crate::infrastructure::constants::{
    APP_NAME, APP_VERSION, LATEST_RELEASE_URL, RELEASES_PAGE, RELEASE_CHECK_TIMEOUT_SECS,
};
use crate::shared::error::{AstraError, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

async fn latest_release_tag() -> Result<String> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(RELEASE_CHECK_TIMEOUT_SECS))
        .user_agent(format!("{}/{}", APP_NAME, APP_VERSION))
        .build()
        .map_err(|e| AstraError::RegistryError(format!("failed to create HTTP client: {}", e)))?;
    let release: Release = http
        .get(LATEST_RELEASE_URL)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(release.tag_name)
}

fn version_parts(version: &str) -> Option<Vec<u64>> {
    let core = version.trim().trim_start_matches('v');
    let core = core.split(['-', '+']).next()?;
    core.split('.').map(|part| part.parse().ok()).collect()
}

/// `latest` when it is a strictly newer release than `current`.
pub fn newer_release(current: &str, latest: &str) -> Option<String> {
    let (Some(current_parts), Some(latest_parts)) = (version_parts(current), version_parts(latest))
    else {
        return None;
    };
    (latest_parts > current_parts).then(|| latest.to_string())
}

pub fn notice(tag: &str) -> String {
    format!(
        "---\nA newer version of {app} ({tag}) is available,\nvisit {page} to update.\n\
         If you wish to disable this notification, run:\n\
         {app} preference set UpdateNotification false\n---",
        app = APP_NAME,
        tag = tag,
        page = RELEASES_PAGE
    )
}

/// Look for a newer release in the background.
///
/// Failures are only logged: the notice is never worth failing a command.
pub fn spawn_check() -> JoinHandle<Option<String>> {
    tokio::spawn(async {
        match latest_release_tag().await {
            Ok(tag) => newer_release(APP_VERSION, &tag).map(|tag| notice(&tag)),
            Err(e) => {
                tracing::debug!("Error checking if a newer release is available: {}", e);
                None
            }
        }
    })
}
