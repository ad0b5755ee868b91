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

//! Building and pushing the images of `image` components with podman or docker.

use crate::domain::config::EnvConfig;
use crate::domain::devfile::model::ImageComponent;
use crate::shared::error::{AstraError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[async_trait::async_trait]
pub trait ImageBackend: Send + Sync {
    /// Build `image` with paths resolved against `context_dir`.
    async fn build(&self, image: &ImageComponent, context_dir: &Path) -> Result<()>;

    async fn push(&self, image_name: &str) -> Result<()>;
}

/// A container engine command line, podman preferred over docker.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    cmd: String,
    global_args: Vec<String>,
    build_args: Vec<String>,
}

impl ImageBuilder {
    /// Pick the first of `PODMAN_CMD` and `DOCKER_CMD` found on the `PATH`.
    pub fn from_env(env: &EnvConfig) -> Result<Self> {
        let cmd = [&env.podman_cmd, &env.docker_cmd]
            .into_iter()
            .find(|cmd| find_executable(cmd).is_some())
            .cloned()
            .ok_or_else(|| {
                AstraError::validation(format!(
                    "unable to find {} or {} on the PATH, one of them is required to build images",
                    env.podman_cmd, env.docker_cmd
                ))
            })?;
        tracing::debug!("using {} to build images", cmd);

        Ok(Self {
            cmd,
            global_args: env.container_backend_global_args.clone(),
            build_args: env.image_build_args.clone(),
        })
    }

    /// Arguments of the build invocation, after the engine name.
    pub fn build_arguments(
        &self,
        image: &ImageComponent,
        dockerfile: &Path,
        build_context: &Path,
    ) -> Vec<String> {
        let mut args = self.global_args.clone();
        args.push("build".to_string());
        args.extend(self.build_args.iter().cloned());
        args.extend([
            "-t".to_string(),
            image.image_name.clone(),
            "-f".to_string(),
            dockerfile.to_string_lossy().into_owned(),
        ]);
        if let Some(build_args) = image.dockerfile.as_ref().map(|d| &d.args) {
            for arg in build_args {
                args.push("--build-arg".to_string());
                args.push(arg.clone());
            }
        }
        args.push(build_context.to_string_lossy().into_owned());
        args
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        tracing::debug!("running {} {}", self.cmd, args.join(" "));
        let status = Command::new(&self.cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| AstraError::validation(format!("failed to run {}: {}", self.cmd, e)))?;
        if !status.success() {
            return Err(AstraError::validation(format!(
                "{} {} exited with {}",
                self.cmd,
                args.iter()
                    .find(|a| *a == "build" || *a == "push")
                    .map(String::as_str)
                    .unwrap_or_default(),
                status
            )));
        }
        Ok(())
    }
}

/// Dockerfile and build context of an image component, relative paths resolved.
pub fn resolve_paths(image: &ImageComponent, context_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let dockerfile = image.dockerfile.as_ref().ok_or_else(|| {
        AstraError::devfile_error(format!(
            "image component {:?} has no dockerfile",
            image.image_name
        ))
    })?;
    let uri = dockerfile.uri.as_deref().unwrap_or("Dockerfile");
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Err(AstraError::devfile_error(format!(
            "remote Dockerfile {} must be downloaded before building",
            uri
        )));
    }
    let dockerfile_path = context_dir.join(uri);
    let build_context = context_dir.join(dockerfile.build_context.as_deref().unwrap_or("."));
    Ok((dockerfile_path, build_context))
}

/// Fetch a remote Dockerfile into the temporary directory.
async fn download_dockerfile(uri: &str) -> Result<PathBuf> {
    let response = reqwest::get(uri).await?;
    if !response.status().is_success() {
        return Err(AstraError::devfile_error(format!(
            "unable to download Dockerfile {}: status {}",
            uri,
            response.status()
        )));
    }
    let content = response.text().await?;
    let path = std::env::temp_dir().join(format!("astra-Dockerfile-{}", std::process::id()));
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

fn find_executable(cmd: &str) -> Option<PathBuf> {
    let candidate = Path::new(cmd);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(cmd))
        .find(|p| p.is_file())
}

#[async_trait::async_trait]
impl ImageBackend for ImageBuilder {
    async fn build(&self, image: &ImageComponent, context_dir: &Path) -> Result<()> {
        let remote = image
            .dockerfile
            .as_ref()
            .and_then(|d| d.uri.as_deref())
            .filter(|uri| uri.starts_with("http://") || uri.starts_with("https://"));

        let (dockerfile, build_context) = match remote {
            Some(uri) => {
                let build_context = context_dir.join(
                    image
                        .dockerfile
                        .as_ref()
                        .and_then(|d| d.build_context.as_deref())
                        .unwrap_or("."),
                );
                (download_dockerfile(uri).await?, build_context)
            }
            None => resolve_paths(image, context_dir)?,
        };

        let args = self.build_arguments(image, &dockerfile, &build_context);
        let result = self.run(&args).await;
        if remote.is_some() {
            let _ = tokio::fs::remove_file(&dockerfile).await;
        }
        result
    }

    async fn push(&self, image_name: &str) -> Result<()> {
        let mut args = self.global_args.clone();
        args.extend(["push".to_string(), image_name.to_string()]);
        self.run(&args).await
    }
}
