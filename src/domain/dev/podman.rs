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

use super::{run_dev_commands, DevClient, DevSession, StartOptions};
use crate::domain::api::ForwardedPort;
use crate::domain::component::{DeleteComponentClient, PLATFORM_PODMAN};
use crate::domain::devfile::DevfileObj;
use crate::domain::exec::ExecClient;
use crate::domain::labels::{get_selector, RunningMode};
use crate::domain::state::StateClient;
use crate::infrastructure::constants::{DEV_POD_POLL_INTERVAL_SECS, DEV_POD_READY_TIMEOUT_SECS};
use crate::infrastructure::kubernetes::resources::PodBuilder;
use crate::infrastructure::podman::PodmanClient;
use crate::shared::error::Result;
use crate::shared::retry::poll_until;
use std::sync::Arc;
use std::time::Duration;

/// Dev sessions on podman: one pod played with `podman kube play`.
pub struct PodmanDevClient {
    podman: Arc<dyn PodmanClient>,
    exec: Arc<dyn ExecClient>,
    deleter: Arc<dyn DeleteComponentClient>,
    state: Arc<dyn StateClient>,
}

impl PodmanDevClient {
    pub fn new(
        podman: Arc<dyn PodmanClient>,
        exec: Arc<dyn ExecClient>,
        deleter: Arc<dyn DeleteComponentClient>,
        state: Arc<dyn StateClient>,
    ) -> Self {
        Self {
            podman,
            exec,
            deleter,
            state,
        }
    }
}

#[async_trait::async_trait]
impl DevClient for PodmanDevClient {
    async fn start(
        &self,
        devfile: &DevfileObj,
        session: &DevSession,
        options: &StartOptions,
    ) -> Result<Vec<ForwardedPort>> {
        self.state.init(PLATFORM_PODMAN)?;

        let (pod, ports) = PodBuilder::new(
            session.component.clone(),
            session.app.clone(),
            devfile.context_dir().to_path_buf(),
        )
        .with_project_type(session.project_type.clone())
        .build(&devfile.data)?;
        tracing::info!("Deploying pod {}", pod.metadata.name.as_deref().unwrap_or_default());
        self.podman.play_kube(&pod).await?;

        let selector = get_selector(&session.component, &session.app, Some(RunningMode::Dev), true);
        let podman = self.podman.as_ref();
        let selector = selector.as_str();
        poll_until(
            "dev pod",
            Duration::from_secs(DEV_POD_POLL_INTERVAL_SECS),
            Duration::from_secs(DEV_POD_READY_TIMEOUT_SECS),
            || async move {
                let pods = podman.list_pods(selector).await?;
                Ok(pods.iter().any(|p| p.is_running()))
            },
        )
        .await?;

        run_dev_commands(self.exec.as_ref(), devfile, session, options).await?;
        self.state.set_forwarded_ports(&ports)?;
        Ok(ports)
    }

    async fn cleanup(&self, devfile: &DevfileObj, session: &DevSession) -> Result<()> {
        self.deleter
            .execute_pre_stop_events(&devfile.data, &session.target())
            .await?;
        let resources = self
            .deleter
            .list_podman_resources_to_delete(&session.component, &session.app, Some(RunningMode::Dev))
            .await?;
        self.deleter.delete_podman_resources(&resources).await?;
        self.state.save_exit()
    }

    fn forget(&self) -> Result<()> {
        self.state.save_exit()
    }
}
