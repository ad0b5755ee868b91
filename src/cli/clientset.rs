//! Clients a command needs, built once per invocation

use crate::domain::alizer::{Alizer, AlizerClient};
use crate::domain::binding::{BindingClient, DevfileBindingClient};
use crate::domain::component::{ComponentDeleter, DeleteComponentClient, PLATFORM_PODMAN};
use crate::domain::config::EnvConfig;
use crate::domain::deploy::{DeployClient, Deployer};
use crate::domain::dev::{DevClient, KubeDevClient, PodmanDevClient};
use crate::domain::exec::{ExecClient, KubeExecClient, PodmanExecClient};
use crate::domain::init::{InitClient, Initializer};
use crate::domain::logs::{KubeLogsClient, LogsClient, PodmanLogsClient};
use crate::domain::preference::{PreferenceClient, PreferenceInfo};
use crate::domain::state::{StateClient, StateFile};
use crate::infrastructure::filesystem::{DefaultFs, Filesystem};
use crate::infrastructure::image::{ImageBackend, ImageBuilder};
use crate::infrastructure::kubernetes::{KubeClient, KubernetesClient};
use crate::infrastructure::podman::{PodmanCli, PodmanClient};
use crate::infrastructure::registry::{RegistryClient, RegistryHttpClient};
use crate::shared::error::{AstraError, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependency {
    Alizer,
    Binding,
    DeleteComponent,
    Deploy,
    Dev,
    Exec,
    Filesystem,
    Init,
    Kubernetes,
    /// The cluster client, left empty when no cluster is reachable.
    KubernetesNullable,
    Logs,
    Podman,
    /// The podman client, left empty when podman is not installed.
    PodmanNullable,
    Preference,
    Registry,
    State,
}

const SUB_DEPENDENCIES: &[(Dependency, &[Dependency])] = &[
    (Dependency::Alizer, &[Dependency::Registry]),
    (Dependency::Binding, &[Dependency::KubernetesNullable]),
    (
        Dependency::DeleteComponent,
        &[Dependency::KubernetesNullable, Dependency::PodmanNullable, Dependency::Exec],
    ),
    (Dependency::Deploy, &[Dependency::Kubernetes, Dependency::Filesystem]),
    (
        Dependency::Dev,
        &[
            Dependency::DeleteComponent,
            Dependency::Exec,
            Dependency::Filesystem,
            Dependency::KubernetesNullable,
            Dependency::PodmanNullable,
            Dependency::Preference,
            Dependency::State,
        ],
    ),
    (Dependency::Exec, &[Dependency::KubernetesNullable, Dependency::PodmanNullable]),
    (
        Dependency::Init,
        &[
            Dependency::Alizer,
            Dependency::Filesystem,
            Dependency::Preference,
            Dependency::Registry,
        ],
    ),
    (Dependency::Logs, &[Dependency::KubernetesNullable, Dependency::PodmanNullable]),
    (
        Dependency::Registry,
        &[Dependency::Filesystem, Dependency::Preference, Dependency::KubernetesNullable],
    ),
    (Dependency::State, &[Dependency::Filesystem]),
];

fn sub_dependencies(dependency: Dependency) -> &'static [Dependency] {
    SUB_DEPENDENCIES
        .iter()
        .find(|(d, _)| *d == dependency)
        .map(|(_, subs)| *subs)
        .unwrap_or(&[])
}

/// Requested dependencies and everything they pull in.
pub fn expand(dependencies: &[Dependency]) -> BTreeSet<Dependency> {
    let mut resolved = BTreeSet::new();
    let mut pending: Vec<Dependency> = dependencies.to_vec();
    while let Some(dependency) = pending.pop() {
        if resolved.insert(dependency) {
            pending.extend_from_slice(sub_dependencies(dependency));
        }
    }
    resolved
}

/// The clients of one invocation. Fields a command did not ask for stay empty.
#[derive(Clone, Default)]
pub struct Clientset {
    alizer: Option<Arc<dyn AlizerClient>>,
    binding: Option<Arc<dyn BindingClient>>,
    delete_component: Option<Arc<dyn DeleteComponentClient>>,
    deploy: Option<Arc<dyn DeployClient>>,
    dev: Option<Arc<dyn DevClient>>,
    exec: Option<Arc<dyn ExecClient>>,
    fs: Option<Arc<dyn Filesystem>>,
    init: Option<Arc<dyn InitClient>>,
    kube: Option<Arc<dyn KubernetesClient>>,
    logs: Option<Arc<dyn LogsClient>>,
    podman: Option<Arc<dyn PodmanClient>>,
    preference: Option<Arc<dyn PreferenceClient>>,
    registry: Option<Arc<dyn RegistryClient>>,
    state: Option<Arc<dyn StateClient>>,
}

fn missing(name: &str) -> AstraError {
    AstraError::config_error(format!("the {} client is not available for this command", name))
}

macro_rules! client_accessors {
    ($($field:ident, $with:ident, $trait_:ident);* $(;)?) => {
        impl Clientset {
            $(
                pub fn $with(mut self, client: Arc<dyn $trait_>) -> Self {
                    self.$field = Some(client);
                    self
                }

                pub fn $field(&self) -> Result<Arc<dyn $trait_>> {
                    self.$field.clone().ok_or_else(|| missing(stringify!($field)))
                }
            )*
        }
    };
}

client_accessors! {
    alizer, with_alizer, AlizerClient;
    binding, with_binding, BindingClient;
    delete_component, with_delete_component, DeleteComponentClient;
    deploy, with_deploy, DeployClient;
    dev, with_dev, DevClient;
    exec, with_exec, ExecClient;
    fs, with_fs, Filesystem;
    init, with_init, InitClient;
    kube, with_kube, KubernetesClient;
    logs, with_logs, LogsClient;
    podman, with_podman, PodmanClient;
    preference, with_preference, PreferenceClient;
    registry, with_registry, RegistryClient;
    state, with_state, StateClient;
}

impl Clientset {
    pub fn kube_ref(&self) -> Option<&dyn KubernetesClient> {
        self.kube.as_deref()
    }

    pub fn podman_ref(&self) -> Option<&dyn PodmanClient> {
        self.podman.as_deref()
    }

    /// Build the clients for `dependencies`.
    ///
    /// Clients already set in `overrides` are used as they are.
    pub async fn fetch(
        dependencies: &[Dependency],
        platform: Option<&str>,
        env: &EnvConfig,
        working_dir: &Path,
        overrides: Clientset,
    ) -> Result<Clientset> {
        let deps = expand(dependencies);
        let needs = |d: Dependency| deps.contains(&d);
        let kube_required = needs(Dependency::Kubernetes) && !needs(Dependency::KubernetesNullable);
        let on_podman = platform == Some(PLATFORM_PODMAN);
        let mut set = overrides;

        if needs(Dependency::Filesystem) && set.fs.is_none() {
            set.fs = Some(Arc::new(DefaultFs));
        }
        if needs(Dependency::Preference) && set.preference.is_none() {
            set.preference = Some(Arc::new(PreferenceInfo::from_env(env)?));
        }

        let wants_kube = needs(Dependency::Kubernetes) || needs(Dependency::KubernetesNullable);
        if wants_kube && set.kube.is_none() {
            let timeout = set.preference.as_ref().map(|p| p.timeout());
            match KubeClient::new(timeout).await {
                Ok(client) => set.kube = Some(Arc::new(client)),
                Err(e) if kube_required => return Err(e),
                Err(e) => tracing::debug!("no cluster client: {}", e),
            }
        }

        let wants_podman = needs(Dependency::Podman) || needs(Dependency::PodmanNullable);
        if wants_podman && set.podman.is_none() {
            match PodmanCli::new(env).await {
                Ok(client) => set.podman = Some(Arc::new(client)),
                Err(e) if needs(Dependency::Podman) || on_podman => return Err(e),
                Err(e) => tracing::debug!("no podman client: {}", e),
            }
        }

        if needs(Dependency::Registry) && set.registry.is_none() {
            let client = RegistryHttpClient::new(
                set.preference()?,
                set.fs()?,
                set.kube.clone(),
            )?;
            set.registry = Some(Arc::new(client));
        }
        if needs(Dependency::Alizer) && set.alizer.is_none() {
            set.alizer = Some(Arc::new(Alizer::new(set.registry()?, set.fs()?)));
        }
        if needs(Dependency::State) && set.state.is_none() {
            set.state = Some(Arc::new(StateFile::new(working_dir, set.fs()?)));
        }

        if needs(Dependency::Exec) && set.exec.is_none() {
            set.exec = if on_podman {
                set.podman
                    .clone()
                    .map(|p| Arc::new(PodmanExecClient::new(p)) as Arc<dyn ExecClient>)
            } else {
                set.kube
                    .clone()
                    .map(|k| Arc::new(KubeExecClient::new(k)) as Arc<dyn ExecClient>)
            };
        }
        if needs(Dependency::DeleteComponent) && set.delete_component.is_none() {
            set.delete_component = Some(Arc::new(ComponentDeleter::new(
                set.kube.clone(),
                set.podman.clone(),
                set.exec.clone(),
            )));
        }
        if needs(Dependency::Binding) && set.binding.is_none() {
            set.binding = Some(Arc::new(DevfileBindingClient::new(set.kube.clone())));
        }
        if needs(Dependency::Logs) && set.logs.is_none() {
            set.logs = if on_podman {
                set.podman
                    .clone()
                    .map(|p| Arc::new(PodmanLogsClient::new(p)) as Arc<dyn LogsClient>)
            } else {
                set.kube
                    .clone()
                    .map(|k| Arc::new(KubeLogsClient::new(k)) as Arc<dyn LogsClient>)
            };
        }

        if needs(Dependency::Deploy) && set.deploy.is_none() {
            let images = match ImageBuilder::from_env(env) {
                Ok(builder) => Some(Arc::new(builder) as Arc<dyn ImageBackend>),
                Err(e) => {
                    tracing::debug!("no image builder: {}", e);
                    None
                }
            };
            let deployer =
                Deployer::new(set.kube()?, set.fs()?).with_images(images, env.push_images);
            set.deploy = Some(Arc::new(deployer));
        }

        // Left empty when the platform's backend is unavailable.
        let exec = set.exec.clone();
        if let Some(exec) = exec.filter(|_| needs(Dependency::Dev) && set.dev.is_none()) {
            let deleter = set.delete_component()?;
            let state = set.state()?;
            set.dev = if on_podman {
                set.podman.clone().map(|podman| {
                    Arc::new(PodmanDevClient::new(podman, exec, deleter, state)) as Arc<dyn DevClient>
                })
            } else {
                let prefs = set.preference()?;
                set.kube.clone().map(|kube| {
                    Arc::new(KubeDevClient::new(kube, exec, deleter, state, prefs)) as Arc<dyn DevClient>
                })
            };
        }

        if needs(Dependency::Init) && set.init.is_none() {
            set.init = Some(Arc::new(Initializer::new(
                set.alizer()?,
                set.fs()?,
                set.preference()?,
                set.registry()?,
            )));
        }

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fake::{FakeKube, FakePodman, FakeRegistry};

    #[test]
    fn test_expand_is_transitive() {
        let deps = expand(&[Dependency::Init]);
        for expected in [
            Dependency::Init,
            Dependency::Alizer,
            Dependency::Registry,
            Dependency::Filesystem,
            Dependency::Preference,
            Dependency::KubernetesNullable,
        ] {
            assert!(deps.contains(&expected), "missing {:?}", expected);
        }
        assert!(!deps.contains(&Dependency::Kubernetes));

        let dev = expand(&[Dependency::Dev]);
        assert!(dev.contains(&Dependency::DeleteComponent));
        assert!(dev.contains(&Dependency::Exec));
        assert!(dev.contains(&Dependency::PodmanNullable));
    }

    #[test]
    fn test_expand_without_sub_dependencies() {
        assert_eq!(
            expand(&[Dependency::Filesystem]),
            BTreeSet::from([Dependency::Filesystem])
        );
        assert!(expand(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_uses_overrides_and_platform() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvConfig {
            global_config: Some(dir.path().join("preference.yaml").display().to_string()),
            ..Default::default()
        };
        let overrides = Clientset::default()
            .with_kube(Arc::new(FakeKube::default()))
            .with_podman(Arc::new(FakePodman::default()))
            .with_registry(Arc::new(FakeRegistry::default()));

        let set = Clientset::fetch(
            &[Dependency::Dev, Dependency::Logs, Dependency::Init],
            Some("podman"),
            &env,
            dir.path(),
            overrides,
        )
            .await
            .unwrap();
        assert!(set.dev().is_ok());
        assert!(set.logs().is_ok());
        assert!(set.init().is_ok());
        assert!(set.state().is_ok());
        assert!(set.deploy().is_err());
    }
}
