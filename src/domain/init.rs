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

//! `astra init`: fetch a devfile, name the component and download a starter project.

use crate::domain::alizer::AlizerClient;
use crate::domain::api::DevfileStack;
use crate::domain::devfile::{find_devfile, sanitize_name, DevfileObj, StarterProject};
use crate::domain::preference::PreferenceClient;
use crate::infrastructure::constants::{DEVFILE_NAMES, STATE_DIR};
use crate::infrastructure::filesystem::Filesystem;
use crate::infrastructure::registry::{RegistryClient, StackFilter};
use crate::shared::error::{AstraError, Result};
use crate::shared::prompt;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Flags of `astra init`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitParams {
    pub name: Option<String>,
    pub devfile: Option<String>,
    pub devfile_registry: Option<String>,
    pub devfile_path: Option<String>,
    pub devfile_version: Option<String>,
    pub starter: Option<String>,
    pub architectures: Vec<String>,
}

impl InitParams {
    /// No flag given: the questions are asked.
    pub fn is_interactive(&self) -> bool {
        self.name.is_none()
            && self.devfile.is_none()
            && self.devfile_registry.is_none()
            && self.devfile_path.is_none()
            && self.devfile_version.is_none()
            && self.starter.is_none()
            && self.architectures.is_empty()
    }
}

/// Where the devfile comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevfileLocation {
    Registry {
        stack: String,
        registry: Option<String>,
        version: Option<String>,
    },
    /// A local path or an http(s) URL.
    Path(String),
}

#[async_trait::async_trait]
pub trait InitClient: Send + Sync {
    /// Check the flags of a non-interactive run against the directory.
    async fn validate(&self, params: &InitParams, dir: &Path) -> Result<()>;

    /// The devfile named by the flags, or the one picked by detection and questions.
    async fn select_devfile(&self, params: &InitParams, dir: &Path) -> Result<DevfileLocation>;

    /// Fetch the devfile and write it as `devfile.yaml` in `dir`.
    async fn download_devfile(&self, location: &DevfileLocation, dir: &Path) -> Result<DevfileObj>;

    async fn select_starter_project(
        &self,
        devfile: &DevfileObj,
        params: &InitParams,
        dir: &Path,
    ) -> Result<Option<StarterProject>>;

    async fn download_starter_project(&self, starter: &StarterProject, dir: &Path) -> Result<()>;

    /// Set `metadata.name` from the flag, or from the answer to the question.
    async fn personalize_name(
        &self,
        devfile: &mut DevfileObj,
        params: &InitParams,
        dir: &Path,
    ) -> Result<String>;

    /// The whole flow. A devfile shipped by the starter project is not kept.
    async fn init(&self, params: &InitParams, dir: &Path) -> Result<DevfileObj> {
        if let Some(existing) = find_devfile(dir) {
            return Err(AstraError::validation(format!(
                "a devfile already exists in the current directory: {}",
                existing.display()
            )));
        }
        if !params.is_interactive() {
            self.validate(params, dir).await?;
        }
        let location = self.select_devfile(params, dir).await?;
        let mut devfile = self.download_devfile(&location, dir).await?;
        if let Some(starter) = self.select_starter_project(&devfile, params, dir).await? {
            self.download_starter_project(&starter, dir).await?;
        }
        let name = self.personalize_name(&mut devfile, params, dir).await?;
        devfile.write()?;
        tracing::info!("Your new component {:?} is ready in the current directory", name);
        Ok(devfile)
    }
}

pub struct Initializer {
    alizer: Arc<dyn AlizerClient>,
    fs: Arc<dyn Filesystem>,
    preferences: Arc<dyn PreferenceClient>,
    registry: Arc<dyn RegistryClient>,
}

impl Initializer {
    pub fn new(
        alizer: Arc<dyn AlizerClient>,
        fs: Arc<dyn Filesystem>,
        preferences: Arc<dyn PreferenceClient>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        Self {
            alizer,
            fs,
            preferences,
            registry,
        }
    }

    fn dir_is_empty(&self, dir: &Path) -> Result<bool> {
        Ok(self
            .fs
            .read_dir(dir)?
            .iter()
            .all(|p| p.file_name().and_then(|n| n.to_str()) == Some(STATE_DIR)))
    }

    /// Ask for a stack: a language first, then a project type of that language.
    async fn ask_stack(&self, architectures: &[String]) -> Result<DevfileStack> {
        let stacks: Vec<DevfileStack> = self
            .registry
            .list_stacks(&StackFilter::default())
            .await?
            .into_iter()
            .filter(|s| supports_architectures(s, architectures))
            .collect();
        if stacks.is_empty() {
            return Err(AstraError::RegistryError(
                "no devfile stack found in the configured registries".to_string(),
            ));
        }

        let languages: Vec<String> = stacks
            .iter()
            .map(|s| if s.language.is_empty() { "Other".to_string() } else { s.language.clone() })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let language = &languages[prompt::select("Select language:", &languages)?];

        let candidates: Vec<&DevfileStack> = stacks
            .iter()
            .filter(|s| &s.language == language || (s.language.is_empty() && language == "Other"))
            .collect();
        let labels: Vec<String> = candidates
            .iter()
            .map(|s| format!("{} ({}, registry: {})", s.display_name, s.name, s.registry.name))
            .collect();
        let picked = prompt::select("Select project type:", &labels)?;
        Ok(candidates[picked].clone())
    }
}

/// True when the stack runs on every requested architecture. No architecture listed means all.
pub fn supports_architectures(stack: &DevfileStack, architectures: &[String]) -> bool {
    stack.architectures.is_empty()
        || architectures
            .iter()
            .all(|a| stack.architectures.iter().any(|s| s.eq_ignore_ascii_case(a)))
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[async_trait::async_trait]
impl InitClient for Initializer {
    async fn validate(&self, params: &InitParams, dir: &Path) -> Result<()> {
        let Some(name) = params.name.as_deref() else {
            return Err(AstraError::validation("missing --name parameter"));
        };
        if sanitize_name(name)? != name {
            return Err(AstraError::validation(format!(
                "{:?} is not a valid name, use lower case alphanumeric characters and '-', starting with a letter",
                name
            )));
        }
        match (&params.devfile, &params.devfile_path) {
            (None, None) => {
                return Err(AstraError::validation(
                    "either --devfile or --devfile-path parameter should be specified",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(AstraError::validation(
                    "only one of --devfile or --devfile-path parameter should be specified",
                ))
            }
            _ => {}
        }
        if params.devfile_registry.is_some() && params.devfile.is_none() {
            return Err(AstraError::validation(
                "--devfile-registry can only be used with --devfile",
            ));
        }
        if params.devfile_version.is_some() && params.devfile.is_none() {
            return Err(AstraError::validation(
                "--devfile-version can only be used with --devfile",
            ));
        }
        if let Some(registry) = &params.devfile_registry {
            if !self.preferences.registry_name_exists(registry) {
                self.registry.registries(Some(registry)).await?;
            }
        }
        if params.starter.is_some() && !self.dir_is_empty(dir)? {
            return Err(AstraError::validation(
                "--starter parameter cannot be used when the directory is not empty",
            ));
        }
        Ok(())
    }

    async fn select_devfile(&self, params: &InitParams, dir: &Path) -> Result<DevfileLocation> {
        if let Some(path) = &params.devfile_path {
            return Ok(DevfileLocation::Path(path.clone()));
        }
        if let Some(stack) = &params.devfile {
            if !params.architectures.is_empty() {
                let filter = StackFilter {
                    registry: params.devfile_registry.clone(),
                    devfile: Some(stack.clone()),
                    ..Default::default()
                };
                let found = self.registry.list_stacks(&filter).await?;
                if !found.iter().any(|s| supports_architectures(s, &params.architectures)) {
                    return Err(AstraError::validation(format!(
                        "the devfile {:?} does not support the architectures {}",
                        stack,
                        params.architectures.join(", ")
                    )));
                }
            }
            return Ok(DevfileLocation::Registry {
                stack: stack.clone(),
                registry: params.devfile_registry.clone(),
                version: params.devfile_version.clone(),
            });
        }

        if !self.dir_is_empty(dir)? {
            match self.alizer.detect_framework(dir).await {
                Ok(detected) => {
                    println!("Based on the files in the current directory astra detected");
                    println!("Language: {}", detected.guess.language);
                    println!(
                        "Project type: {}",
                        detected.guess.framework.as_deref().unwrap_or(&detected.stack.name)
                    );
                    println!(
                        "The devfile {:?} from the registry {:?} will be downloaded.",
                        detected.stack.name, detected.stack.registry.name
                    );
                    if prompt::proceed_default_yes("Is this correct?")? {
                        return Ok(DevfileLocation::Registry {
                            stack: detected.stack.name,
                            registry: Some(detected.stack.registry.name),
                            version: None,
                        });
                    }
                }
                Err(e) => tracing::debug!("project detection failed: {}", e),
            }
        }

        let stack = self.ask_stack(&params.architectures).await?;
        Ok(DevfileLocation::Registry {
            stack: stack.name,
            registry: Some(stack.registry.name),
            version: None,
        })
    }

    async fn download_devfile(&self, location: &DevfileLocation, dir: &Path) -> Result<DevfileObj> {
        let content = match location {
            DevfileLocation::Path(path) if is_url(path) => self.registry.download_file(path).await?,
            DevfileLocation::Path(path) => {
                let resolved = if Path::new(path).is_absolute() {
                    PathBuf::from(path)
                } else {
                    dir.join(path)
                };
                self.fs.read_to_string(&resolved)?
            }
            DevfileLocation::Registry {
                stack,
                registry,
                version,
            } => {
                let mut last_error = None;
                let mut found = None;
                for candidate in self.registry.registries(registry.as_deref()).await? {
                    match self
                        .registry
                        .download_devfile(&candidate, stack, version.as_deref())
                        .await
                    {
                        Ok(content) => {
                            found = Some(content);
                            break;
                        }
                        Err(e) => {
                            tracing::debug!("{} not found in {}: {}", stack, candidate.name, e);
                            last_error = Some(e);
                        }
                    }
                }
                found.ok_or_else(|| {
                    AstraError::RegistryError(format!(
                        "unable to find the devfile {:?} in the registries{}",
                        stack,
                        last_error.map(|e| format!(": {}", e)).unwrap_or_default()
                    ))
                })?
            }
        };

        let path = dir.join(DEVFILE_NAMES[0]);
        let devfile = DevfileObj::parse(&path, &content, &HashMap::new())?;
        self.fs.write(&path, &content)?;
        Ok(devfile)
    }

    async fn select_starter_project(
        &self,
        devfile: &DevfileObj,
        params: &InitParams,
        dir: &Path,
    ) -> Result<Option<StarterProject>> {
        let starters = &devfile.data.starter_projects;
        if let Some(name) = &params.starter {
            return starters
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    AstraError::validation(format!(
                        "starter project {:?} not found, available starter projects: {}",
                        name,
                        starters.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
                    ))
                });
        }
        if !params.is_interactive() || starters.is_empty() || !self.dir_is_empty_except_devfile(dir)? {
            return Ok(None);
        }

        let mut labels = vec!["None - do not download a starter project".to_string()];
        labels.extend(starters.iter().map(|s| match &s.description {
            Some(description) => format!("{} - {}", s.name, description),
            None => s.name.clone(),
        }));
        let picked = prompt::select("Which starter project do you want to use?", &labels)?;
        Ok(picked.checked_sub(1).map(|i| starters[i].clone()))
    }

    async fn download_starter_project(&self, starter: &StarterProject, dir: &Path) -> Result<()> {
        let git = starter.git.as_ref().ok_or_else(|| {
            AstraError::devfile_error(format!("starter project {:?} has no git source", starter.name))
        })?;
        let url = git.remote_url().ok_or_else(|| {
            AstraError::devfile_error(format!("starter project {:?} has no remote", starter.name))
        })?;

        let checkout = dir.join(format!(".astra-starter-{}", std::process::id()));
        let mut command = Command::new("git");
        command.args(["clone", "--depth", "1"]);
        if let Some(revision) = git.checkout_from.as_ref().and_then(|c| c.revision.as_deref()) {
            command.args(["--branch", revision]);
        }
        command.arg(url).arg(&checkout);
        tracing::info!("Downloading starter project {:?} from {}", starter.name, url);

        let output = command
            .output()
            .await
            .map_err(|e| AstraError::validation(format!("failed to run git: {}", e)))?;
        if !output.status.success() {
            let _ = std::fs::remove_dir_all(&checkout);
            return Err(AstraError::validation(format!(
                "git clone of {} failed: {}",
                url,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let source = match &starter.sub_dir {
            Some(sub_dir) => checkout.join(sub_dir),
            None => checkout.clone(),
        };
        let moved = move_contents(&source, dir);
        std::fs::remove_dir_all(&checkout)?;
        moved
    }

    async fn personalize_name(
        &self,
        devfile: &mut DevfileObj,
        params: &InitParams,
        dir: &Path,
    ) -> Result<String> {
        let name = match &params.name {
            Some(name) => name.clone(),
            None => {
                let suggested = self
                    .alizer
                    .detect_name(dir)
                    .or_else(|_| sanitize_name(
                        devfile.data.metadata.name.as_deref().unwrap_or("my-component"),
                    ))?;
                let answer = prompt::input("Enter component name:", Some(&suggested))?;
                sanitize_name(&answer)?
            }
        };
        devfile.set_metadata_name(&name)?;
        Ok(name)
    }
}

impl Initializer {
    fn dir_is_empty_except_devfile(&self, dir: &Path) -> Result<bool> {
        Ok(self.fs.read_dir(dir)?.iter().all(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n == STATE_DIR || DEVFILE_NAMES.contains(&n))
                .unwrap_or(false)
        }))
    }
}

/// Move the entries of `from` into `to`, skipping `.git`.
fn move_contents(from: &Path, to: &Path) -> Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let target = to.join(entry.file_name());
        if target.exists() {
            tracing::warn!("{} already exists, keeping the local copy", target.display());
            continue;
        }
        std::fs::rename(entry.path(), target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alizer::Alizer;
    use crate::domain::preference::PreferenceInfo;
    use crate::infrastructure::fake::FakeRegistry;
    use crate::infrastructure::filesystem::DefaultFs;

    const NODE_DEVFILE: &str = r#"schemaVersion: 2.2.0
metadata:
  name: nodejs
  language: JavaScript
components:
- name: runtime
  container:
    image: registry.access.redhat.com/ubi8/nodejs-18
starterProjects:
- name: nodejs-starter
  git:
    remotes:
      origin: https://github.com/devfile-samples/nodejs-starter.git
"#;

    fn initializer(dir: &Path) -> Initializer {
        let fs: Arc<dyn Filesystem> = Arc::new(DefaultFs);
        let registry: Arc<dyn RegistryClient> = Arc::new(
            FakeRegistry::default()
                .with_stack(
                    DevfileStack {
                        name: "nodejs".to_string(),
                        language: "JavaScript".to_string(),
                        architectures: vec!["amd64".to_string()],
                        ..Default::default()
                    },
                    NODE_DEVFILE,
                )
                .with_file("https://example.com/devfile.yaml", NODE_DEVFILE),
        );
        let prefs = Arc::new(PreferenceInfo::new(dir.join("preference.yaml")).unwrap());
        let alizer = Arc::new(Alizer::new(registry.clone(), fs.clone()));
        Initializer::new(alizer, fs, prefs, registry)
    }

    fn params(name: &str) -> InitParams {
        InitParams {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_validate_flags() {
        let home = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = initializer(home.path());

        let no_source = client.validate(&params("api"), dir.path()).await;
        assert!(no_source.unwrap_err().to_string().contains("--devfile"));

        let both = InitParams {
            devfile: Some("nodejs".to_string()),
            devfile_path: Some("devfile.yaml".to_string()),
            ..params("api")
        };
        assert!(client.validate(&both, dir.path()).await.is_err());

        let bad_name = InitParams {
            devfile: Some("nodejs".to_string()),
            ..params("My App")
        };
        assert!(client.validate(&bad_name, dir.path()).await.is_err());

        let unknown_registry = InitParams {
            devfile: Some("nodejs".to_string()),
            devfile_registry: Some("Missing".to_string()),
            ..params("api")
        };
        assert!(matches!(
            client.validate(&unknown_registry, dir.path()).await,
            Err(AstraError::RegistryMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_init_from_registry_sets_name() {
        let home = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = initializer(home.path());
        let params = InitParams {
            devfile: Some("nodejs".to_string()),
            ..params("my-api")
        };

        let devfile = client.init(&params, dir.path()).await.unwrap();
        assert_eq!(devfile.data.metadata.name.as_deref(), Some("my-api"));
        let written = std::fs::read_to_string(dir.path().join("devfile.yaml")).unwrap();
        assert!(written.contains("name: my-api"));

        let again = client.init(&params, dir.path()).await;
        assert!(again.unwrap_err().to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_init_from_url_and_architecture_check() {
        let home = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = initializer(home.path());

        let from_url = InitParams {
            devfile_path: Some("https://example.com/devfile.yaml".to_string()),
            ..params("web")
        };
        client.init(&from_url, dir.path()).await.unwrap();
        assert!(dir.path().join("devfile.yaml").exists());

        let other = tempfile::tempdir().unwrap();
        let arm = InitParams {
            devfile: Some("nodejs".to_string()),
            architectures: vec!["arm64".to_string()],
            ..params("web")
        };
        let err = client.init(&arm, other.path()).await.unwrap_err();
        assert!(err.to_string().contains("architectures"));
    }

    #[tokio::test]
    async fn test_unknown_starter_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = initializer(home.path());
        let location = DevfileLocation::Registry {
            stack: "nodejs".to_string(),
            registry: None,
            version: None,
        };
        let devfile = client.download_devfile(&location, dir.path()).await.unwrap();
        let params = InitParams {
            devfile: Some("nodejs".to_string()),
            starter: Some("go-starter".to_string()),
            ..params("api")
        };
        let err = client
            .select_starter_project(&devfile, &params, dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nodejs-starter"));
    }
}
