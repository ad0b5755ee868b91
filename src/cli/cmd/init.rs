//! `astra init`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::cli::ui;
use crate::domain::api::{Component, ComponentDevfileData};
use crate::domain::devfile::DevfileObj;
use crate::domain::init::InitParams;
use crate::infrastructure::constants::APP_NAME;
use crate::shared::error::AstraError;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct InitCommand {
    /// Name of the component to create
    #[arg(long)]
    pub name: Option<String>,

    /// Name of the devfile stack in a devfile registry
    #[arg(long)]
    pub devfile: Option<String>,

    /// Name of the devfile registry to take the stack from
    #[arg(long = "devfile-registry")]
    pub devfile_registry: Option<String>,

    /// Path or URL of a devfile
    #[arg(long = "devfile-path")]
    pub devfile_path: Option<String>,

    /// Version of the devfile stack
    #[arg(long = "devfile-version")]
    pub devfile_version: Option<String>,

    /// Name of the starter project
    #[arg(long)]
    pub starter: Option<String>,

    /// Architecture supported by the stack, can be repeated
    #[arg(long = "architecture")]
    pub architectures: Vec<String>,
}

impl InitCommand {
    fn params(&self) -> InitParams {
        InitParams {
            name: self.name.clone(),
            devfile: self.devfile.clone(),
            devfile_registry: self.devfile_registry.clone(),
            devfile_path: self.devfile_path.clone(),
            devfile_version: self.devfile_version.clone(),
            starter: self.starter.clone(),
            architectures: self.architectures.clone(),
        }
    }

    async fn init(&self, ctx: &CommandContext) -> anyhow::Result<DevfileObj> {
        let devfile = ctx
            .clients
            .init()?
            .init(&self.params(), &ctx.working_dir)
            .await?;
        Ok(devfile)
    }
}

#[async_trait::async_trait]
impl Runnable for InitCommand {
    fn name(&self) -> &'static str {
        "init"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Init]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if ctx.json && self.params().is_interactive() {
            return Err(AstraError::validation(
                "parameters are expected to select a devfile when the output is json",
            )
            .into());
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        ui::title("Initializing a new component");
        let devfile = self.init(ctx).await?;
        let name = devfile.data.metadata.name.clone().unwrap_or_default();
        ui::success(format!(
            "Your new component '{}' is ready in the current directory.",
            name
        ));
        ui::plain("To start editing your component, use 'astra dev' and open this folder in your favorite IDE.");
        ui::plain("Changes will be directly reflected on the cluster.");
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for InitCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let devfile = self.init(ctx).await?;
        let component = Component {
            devfile_path: Some(devfile.path.to_string_lossy().into_owned()),
            devfile_data: Some(ComponentDevfileData::from(&devfile.data)),
            managed_by: APP_NAME.to_string(),
            ..Default::default()
        };
        Ok(serde_json::to_value(component)?)
    }
}
