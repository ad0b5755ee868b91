//! Command line interface

pub mod clientset;
pub mod cmd;
pub mod commands;
pub mod context;
pub mod display;
pub mod help;
pub mod runner;
pub mod ui;

pub use clientset::{Clientset, Dependency};
pub use commands::{CliArgs, Commands};
pub use context::CommandContext;
pub use runner::{generic_run, generic_run_in, Runnable};

use std::path::PathBuf;

/// Flags accepted by every command. The runner rejects them on commands that
/// do not support them.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Output format, only "json" is supported
    #[arg(short = 'o', long = "output", global = true)]
    pub output: Option<String>,

    /// Platform to run the command on: cluster or podman
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Variable to override in the devfile (KEY=VALUE), can be repeated
    #[arg(long = "var", global = true)]
    pub vars: Vec<String>,

    /// File containing KEY=VALUE lines to override devfile variables
    #[arg(long = "var-file", global = true)]
    pub var_file: Option<PathBuf>,

    /// Log verbosity, 0 to 9
    #[arg(short = 'v', long = "v", global = true, hide = true)]
    pub verbosity: Option<u8>,
}

impl GlobalArgs {
    pub fn is_json(&self) -> bool {
        self.output.as_deref() == Some("json")
    }
}

/// Dispatch the parsed command line.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let Some(command) = args.command else {
        println!("{}", help::intro());
        return Ok(());
    };
    let mut runnable = command.into_runnable();
    generic_run(runnable.as_mut(), &args.globals, Clientset::default()).await
}
