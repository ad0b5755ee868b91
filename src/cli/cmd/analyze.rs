//! `astra analyze`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::shared::error::AstraError;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzeCommand {}

#[async_trait::async_trait]
impl Runnable for AnalyzeCommand {
    fn name(&self) -> &'static str {
        "analyze"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Alizer]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if !ctx.json {
            return Err(AstraError::validation(
                "this command can be run with json output only, please use the flag: -o json",
            )
            .into());
        }
        Ok(())
    }

    async fn run(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
        Err(AstraError::validation(
            "this command can be run with json output only, please use the flag: -o json",
        )
        .into())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for AnalyzeCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let result = ctx.clients.alizer()?.analyze(&ctx.working_dir).await?;
        Ok(serde_json::to_value(vec![result])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::alizer::Alizer;
    use crate::domain::api::DevfileStack;
    use crate::domain::config::EnvConfig;
    use crate::infrastructure::fake::FakeRegistry;
    use crate::infrastructure::filesystem::DefaultFs;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context(dir: &std::path::Path, json: bool) -> CommandContext {
        let registry = FakeRegistry::default().with_stack(
            DevfileStack {
                name: "nodejs".to_string(),
                version: "2.1.1".to_string(),
                ..Default::default()
            },
            "",
        );
        CommandContext {
            json,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile: None,
            component_name: "app".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default().with_alizer(Arc::new(Alizer::new(
                Arc::new(registry),
                Arc::new(DefaultFs),
            ))),
        }
    }

    #[test]
    fn test_requires_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnalyzeCommand::default()
            .validate(&context(dir.path(), false))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "this command can be run with json output only, please use the flag: -o json"
        );
    }

    #[tokio::test]
    async fn test_detects_node_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "shop-api", "dependencies": {"express": "^4.18.0"}}"#,
        )
        .unwrap();
        let ctx = context(dir.path(), true);
        let value = AnalyzeCommand::default().run_for_json_output(&ctx).await.unwrap();
        assert_eq!(value[0]["devfile"], "nodejs");
        assert_eq!(value[0]["devfileRegistry"], "DefaultDevfileRegistry");
        assert_eq!(value[0]["name"], "shop-api");
    }
}
