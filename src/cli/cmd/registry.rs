//! `astra registry`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::display::TableRenderer;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::cli::ui;
use crate::domain::api::DevfileStack;
use crate::infrastructure::registry::StackFilter;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct RegistryCommand {
    /// Only the stack with this name
    #[arg(long)]
    pub devfile: Option<String>,

    /// Only the stacks of this registry
    #[arg(long = "devfile-registry")]
    pub devfile_registry: Option<String>,

    /// Only stacks whose name or description contains this term
    #[arg(long)]
    pub filter: Option<String>,

    /// Show every version, starter project and architecture
    #[arg(long)]
    pub details: bool,
}

impl RegistryCommand {
    fn stack_filter(&self) -> StackFilter {
        StackFilter {
            registry: self.devfile_registry.clone(),
            devfile: self.devfile.clone(),
            filter: self.filter.clone(),
        }
    }

    async fn stacks(&self, ctx: &CommandContext) -> anyhow::Result<Vec<DevfileStack>> {
        Ok(ctx.clients.registry()?.list_stacks(&self.stack_filter()).await?)
    }
}

#[async_trait::async_trait]
impl Runnable for RegistryCommand {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Registry]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let stacks = self.stacks(ctx).await?;
        if stacks.is_empty() {
            ui::warning("There are no Devfiles matching the search");
            return Ok(());
        }
        ui::plain(TableRenderer::new().render_stacks(&stacks, self.details));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for RegistryCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(self.stacks(ctx).await?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::infrastructure::fake::FakeRegistry;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn stack(name: &str, description: &str) -> DevfileStack {
        DevfileStack {
            name: name.to_string(),
            display_name: name.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    fn context() -> CommandContext {
        let registry = FakeRegistry::default()
            .with_stack(stack("nodejs", "Node.js 18 application"), "")
            .with_stack(stack("go", "Go 1.21 module"), "");
        CommandContext {
            json: true,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: std::env::temp_dir(),
            variables: HashMap::new(),
            devfile: None,
            component_name: "app".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default().with_registry(Arc::new(registry)),
        }
    }

    #[tokio::test]
    async fn test_filter_matches_description() {
        let ctx = context();
        let mut cmd = RegistryCommand {
            filter: Some("node".to_string()),
            ..Default::default()
        };
        let value = cmd.run_for_json_output(&ctx).await.unwrap();
        let stacks = value.as_array().unwrap();
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0]["name"], "nodejs");
        assert_eq!(stacks[0]["registry"]["name"], "DefaultDevfileRegistry");
    }

    #[tokio::test]
    async fn test_unknown_registry_fails() {
        let ctx = context();
        let mut cmd = RegistryCommand {
            devfile_registry: Some("Other".to_string()),
            ..Default::default()
        };
        assert!(cmd.run_for_json_output(&ctx).await.is_err());
    }
}
