//! `astra add binding` and `astra remove binding`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::domain::binding::{default_binding_name, parse_service_reference, AddBindingOptions};
use crate::shared::error::AstraError;
use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct AddCommand {
    #[command(subcommand)]
    pub subcommand: AddSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AddSubcommand {
    /// Bind a service to the devfile component
    Binding(AddBindingCommand),
}

impl AddCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            AddSubcommand::Binding(cmd) => Box::new(cmd),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddBindingCommand {
    /// Name of the binding, `<service>-<component>` by default
    #[arg(long)]
    pub name: Option<String>,

    /// Service to bind, as `<name>/<Kind>.<version>.<group>`
    #[arg(long)]
    pub service: String,

    /// Mount the binding information as files instead of environment variables
    #[arg(long = "bind-as-files", default_value_t = true, action = clap::ArgAction::Set)]
    pub bind_as_files: bool,

    /// Naming strategy of the binding: none, lowercase, uppercase or a template
    #[arg(long = "naming-strategy", default_value = "")]
    pub naming_strategy: String,
}

impl AddBindingCommand {
    fn options(&self, component: &str) -> anyhow::Result<AddBindingOptions> {
        let service = parse_service_reference(&self.service)?;
        let name = match &self.name {
            Some(name) => name.clone(),
            None => default_binding_name(&service.name, component),
        };
        Ok(AddBindingOptions {
            name,
            service,
            bind_as_files: self.bind_as_files,
            naming_strategy: self.naming_strategy.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Runnable for AddBindingCommand {
    fn name(&self) -> &'static str {
        "add binding"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Binding]
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let options = self.options(&ctx.component_name)?;
        if ctx.devfile()?.data.component(&options.name).is_some() {
            return Err(AstraError::already_exists("component", &options.name, "devfile").into());
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let options = self.options(&ctx.component_name)?;
        let mut devfile = ctx.devfile()?.clone();
        ctx.clients.binding()?.add_binding_to_devfile(
            &mut devfile,
            &ctx.component_name,
            &ctx.app,
            &options,
        )?;
        ui::success(format!(
            "Successfully added the binding {:?} to the devfile",
            options.name
        ));
        ui::plain("Run `astra dev` to create it on the cluster");
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RemoveCommand {
    #[command(subcommand)]
    pub subcommand: RemoveSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoveSubcommand {
    /// Remove a binding from the devfile
    Binding(RemoveBindingCommand),
}

impl RemoveCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            RemoveSubcommand::Binding(cmd) => Box::new(cmd),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RemoveBindingCommand {
    /// Name of the binding to remove
    #[arg(long)]
    pub name: String,
}

#[async_trait::async_trait]
impl Runnable for RemoveBindingCommand {
    fn name(&self) -> &'static str {
        "remove binding"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Binding]
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let mut devfile = ctx.devfile()?.clone();
        ctx.clients.binding()?.remove_binding(&mut devfile, &self.name)?;
        ui::success(format!(
            "Successfully removed the binding {:?} from the devfile",
            self.name
        ));
        ui::plain("Run `astra dev` to remove it from the cluster");
        Ok(())
    }
}
