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

#[cfg(test)]
mod tests {
    use astra::cli::cmd::deploy::DeployCommand;
    use astra::cli::cmd::registry::RegistryCommand;
    use astra::cli::{CliArgs, GlobalArgs};
    use astra::domain::api::DevfileStack;
    use astra::domain::labels::ASTRA_MODE_LABEL;
    use astra::infrastructure::fake::{FakeKube, FakeRegistry};
    use astra::*;
    use clap::Parser;
    use std::path::Path;
    use std::sync::Arc;

    const DEVFILE: &str = r#"
schemaVersion: 2.2.0
metadata:
  name: my-api
  projectType: nodejs
components:
- name: runtime
  container:
    image: node
- name: prod
  kubernetes:
    inlined: |
      apiVersion: v1
      kind: ConfigMap
      metadata:
        name: my-api-config
commands:
- id: deploy
  apply:
    component: prod
    group:
      kind: deploy
      isDefault: true
"#;

    fn test_env() -> EnvConfig {
        EnvConfig {
            tracking_consent: Some("no".to_string()),
            ..Default::default()
        }
    }

    fn overrides(dir: &Path, kube: Arc<FakeKube>) -> Clientset {
        let preferences = PreferenceInfo::new(dir.join("preference.yaml")).unwrap();
        let registry = FakeRegistry::default().with_stack(
            DevfileStack {
                name: "nodejs".to_string(),
                display_name: "Node.js".to_string(),
                description: "Node.js 18 application".to_string(),
                ..Default::default()
            },
            DEVFILE,
        );
        Clientset::default()
            .with_kube(kube)
            .with_preference(Arc::new(preferences))
            .with_registry(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_deploy_through_runner() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("devfile.yaml"), DEVFILE).unwrap();
        let kube = Arc::new(FakeKube::default());

        let mut cmd = DeployCommand::default();
        generic_run_in(
            &mut cmd,
            &GlobalArgs::default(),
            overrides(home.path(), kube.clone()),
            test_env(),
            project.path().to_path_buf(),
        )
        .await
        .unwrap();

        let manifests = kube.manifests();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0]["kind"], "ConfigMap");
        assert_eq!(manifests[0]["metadata"]["labels"][ASTRA_MODE_LABEL], "Deploy");
    }

    #[tokio::test]
    async fn test_deploy_in_empty_directory_fails() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        let mut cmd = DeployCommand::default();
        let err = generic_run_in(
            &mut cmd,
            &GlobalArgs::default(),
            overrides(home.path(), Arc::new(FakeKube::default())),
            test_env(),
            project.path().to_path_buf(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AstraError>(),
            Some(AstraError::NoDevfile { empty: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_flags_are_rejected() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("devfile.yaml"), DEVFILE).unwrap();
        let kube = Arc::new(FakeKube::default());

        let json = GlobalArgs {
            output: Some("json".to_string()),
            ..Default::default()
        };
        let err = generic_run_in(
            &mut DeployCommand::default(),
            &json,
            overrides(home.path(), kube.clone()),
            test_env(),
            project.path().to_path_buf(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AstraError>(),
            Some(AstraError::FlagNotSupported { flag, .. }) if flag == "o"
        ));

        let podman = GlobalArgs {
            platform: Some("podman".to_string()),
            ..Default::default()
        };
        let err = generic_run_in(
            &mut RegistryCommand::default(),
            &podman,
            overrides(home.path(), kube.clone()),
            test_env(),
            project.path().to_path_buf(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("--platform"));
        assert!(kube.manifests().is_empty());
    }

    #[tokio::test]
    async fn test_registry_json_through_runner() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        let globals = GlobalArgs {
            output: Some("json".to_string()),
            ..Default::default()
        };
        let result = generic_run_in(
            &mut RegistryCommand::default(),
            &globals,
            overrides(home.path(), Arc::new(FakeKube::default())),
            test_env(),
            project.path().to_path_buf(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_command_line_maps_to_runnable() {
        let cases = [
            (vec!["astra", "deploy"], "deploy"),
            (vec!["astra", "list", "namespace"], "list namespace"),
            (vec!["astra", "list", "project"], "list namespace"),
            (vec!["astra", "delete", "component", "--name", "api", "-f"], "delete component"),
            (vec!["astra", "preference", "view"], "preference view"),
            (vec!["astra", "add", "binding", "--service", "db/Cluster.v1.postgresql.k8s.enterprisedb.io", "--name", "db"], "add binding"),
        ];
        for (argv, name) in cases {
            let args = CliArgs::try_parse_from(&argv).unwrap();
            let runnable = args.command.unwrap().into_runnable();
            assert_eq!(runnable.name(), name, "{:?}", argv);
        }
    }
}
