// CLI command definitions

use super::cmd::{
    analyze::AnalyzeCommand,
    api_server::ApiServerCommand,
    binding::{AddCommand, RemoveCommand},
    build_images::BuildImagesCommand,
    completion::CompletionCommand,
    delete::DeleteCommand,
    deploy::DeployCommand,
    describe::DescribeCommand,
    dev::DevCommand,
    init::InitCommand,
    list::ListCommand,
    login::{LoginCommand, LogoutCommand},
    logs::LogsCommand,
    namespace::{CreateCommand, SetCommand},
    preference::PreferenceCommand,
    registry::RegistryCommand,
    run::RunCommand,
    telemetry::TelemetryCommand,
    version::VersionCommand,
};
use super::runner::Runnable;
use super::GlobalArgs;
use clap::Parser;

pub const SHORT_DESCRIPTION: &str = "astra is a CLI tool for fast iterative application development deployed immediately to your kubernetes cluster";

pub const LONG_DESCRIPTION: &str = "astra is a CLI tool for fast iterative application development deployed immediately to your kubernetes cluster.\n\
It describes an application with a devfile and runs it on a Kubernetes cluster or on Podman, \
first in development mode and then as a deployment.";

#[derive(Parser, Debug)]
#[command(
    name = "astra",
    version,
    about = SHORT_DESCRIPTION,
    long_about = LONG_DESCRIPTION,
    disable_help_subcommand = true
)]
pub struct CliArgs {
    #[command(flatten)]
    pub globals: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Init bootstraps a new project
    Init(InitCommand),

    /// Deploy components
    Deploy(DeployCommand),

    /// Deploy component to development cluster
    Dev(DevCommand),

    /// Run a specific command in the Dev mode
    Run(RunCommand),

    /// Build images
    BuildImages(BuildImagesCommand),

    /// List all components in the current namespace
    List(ListCommand),

    /// Describe resource
    Describe(DescribeCommand),

    /// Delete resources
    Delete(DeleteCommand),

    /// Add resources to devfile
    Add(AddCommand),

    /// Remove resources from devfile
    Remove(RemoveCommand),

    /// Perform set operation
    Set(SetCommand),

    /// Perform create operation
    Create(CreateCommand),

    /// Show logs of all containers of the component
    Logs(LogsCommand),

    /// Login to cluster
    Login(LoginCommand),

    /// Log out of the current cluster
    Logout(LogoutCommand),

    /// List devfile stacks from the devfile registries
    Registry(RegistryCommand),

    /// Modifies astra specific configuration settings
    Preference(PreferenceCommand),

    /// Print the client version information
    Version(VersionCommand),

    /// Add astra completion support to your development environment
    Completion(CompletionCommand),

    /// Collect and upload usage data
    #[command(hide = true)]
    Telemetry(TelemetryCommand),

    /// Detect devfile to use based on files present in current directory
    Analyze(AnalyzeCommand),

    /// Start the API server
    #[command(hide = true)]
    ApiServer(ApiServerCommand),
}

impl Commands {
    /// The command that runs, subcommands resolved.
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self {
            Commands::Init(cmd) => Box::new(cmd),
            Commands::Deploy(cmd) => Box::new(cmd),
            Commands::Dev(cmd) => Box::new(cmd),
            Commands::Run(cmd) => Box::new(cmd),
            Commands::BuildImages(cmd) => Box::new(cmd),
            Commands::List(cmd) => cmd.into_runnable(),
            Commands::Describe(cmd) => cmd.into_runnable(),
            Commands::Delete(cmd) => cmd.into_runnable(),
            Commands::Add(cmd) => cmd.into_runnable(),
            Commands::Remove(cmd) => cmd.into_runnable(),
            Commands::Set(cmd) => cmd.into_runnable(),
            Commands::Create(cmd) => cmd.into_runnable(),
            Commands::Logs(cmd) => Box::new(cmd),
            Commands::Login(cmd) => Box::new(cmd),
            Commands::Logout(cmd) => Box::new(cmd),
            Commands::Registry(cmd) => Box::new(cmd),
            Commands::Preference(cmd) => cmd.into_runnable(),
            Commands::Version(cmd) => Box::new(cmd),
            Commands::Completion(cmd) => Box::new(cmd),
            Commands::Telemetry(cmd) => Box::new(cmd),
            Commands::Analyze(cmd) => Box::new(cmd),
            Commands::ApiServer(cmd) => Box::new(cmd),
        }
    }
}
