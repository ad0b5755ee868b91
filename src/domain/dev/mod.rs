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

//! `astra dev`: start the dev containers and run the build and run commands in them.

pub mod kube;
pub mod podman;

pub use self::kube::KubeDevClient;
pub use self::podman::PodmanDevClient;

use crate::domain::api::ForwardedPort;
use crate::domain::devfile::{CommandGroupKind, DevfileObj};
use crate::domain::exec::{run_devfile_command, ExecClient, ExecTarget};
use crate::shared::error::{AstraError, Result};

/// Which component a dev session runs, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevSession {
    pub component: String,
    pub app: String,
    pub namespace: String,
    pub project_type: Option<String>,
}

impl DevSession {
    pub fn target(&self) -> ExecTarget {
        ExecTarget {
            component: self.component.clone(),
            app: self.app.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub build_command: Option<String>,
    pub run_command: Option<String>,
    /// Start the containers without running any command.
    pub no_commands: bool,
}

#[async_trait::async_trait]
pub trait DevClient: Send + Sync {
    /// Create the dev resources, wait for them and run the commands.
    ///
    /// Returns the ports forwarded to the local host.
    async fn start(
        &self,
        devfile: &DevfileObj,
        session: &DevSession,
        options: &StartOptions,
    ) -> Result<Vec<ForwardedPort>>;

    /// Delete the dev resources and forget the session.
    async fn cleanup(&self, devfile: &DevfileObj, session: &DevSession) -> Result<()>;

    /// Only forget the session, the resources are kept.
    fn forget(&self) -> Result<()>;
}

/// `postStart` events, then the build command, then the run command in the background.
pub(crate) async fn run_dev_commands(
    exec: &dyn ExecClient,
    devfile: &DevfileObj,
    session: &DevSession,
    options: &StartOptions,
) -> Result<()> {
    if options.no_commands {
        return Ok(());
    }
    let data = &devfile.data;
    let target = session.target();

    for id in &data.events.post_start {
        let command = data.command(id).ok_or_else(|| {
            AstraError::devfile_error(format!("postStart event {:?} is not a command", id))
        })?;
        run_devfile_command(exec, data, command, &target, false).await?;
    }

    if let Some(build) = data.resolve_command(CommandGroupKind::Build, options.build_command.as_deref())? {
        tracing::info!("Building your application in container (command: {})", build.id);
        run_devfile_command(exec, data, build, &target, false).await?;
    }

    let run = data
        .resolve_command(CommandGroupKind::Run, options.run_command.as_deref())?
        .ok_or_else(|| {
            AstraError::devfile_error("the command group of kind \"run\" is not found in the devfile")
        })?;
    tracing::info!("Executing the application (command: {})", run.id);
    run_devfile_command(exec, data, run, &target, true).await
}
