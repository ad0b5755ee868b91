//! Grouped root help

use super::commands::{CliArgs, LONG_DESCRIPTION};
use clap::{Command, CommandFactory};

/// Command groups of the root help, in display order.
pub const COMMAND_GROUPS: &[(&str, &[&str])] = &[
    (
        "Main Commands",
        &["build-images", "deploy", "dev", "init", "logs", "registry", "run"],
    ),
    (
        "Management Commands",
        &["add", "create", "delete", "describe", "list", "remove", "set"],
    ),
    ("OpenShift Commands", &["login", "logout"]),
    ("Utility Commands", &["analyze", "completion", "preference", "version"]),
];

/// What bare `astra` prints.
pub fn intro() -> String {
    format!(
        "{}\n\nTo see a full list of commands, run 'astra --help'",
        LONG_DESCRIPTION
    )
}

/// The clap command with the grouped root help installed.
pub fn build_command() -> Command {
    let cmd = CliArgs::command();
    let help = root_help(&cmd);
    cmd.override_help(help)
}

fn describe(cmd: &Command) -> String {
    let about = cmd.get_about().map(|a| a.to_string()).unwrap_or_default();
    let mut subcommands: Vec<&str> = cmd
        .get_subcommands()
        .filter(|s| !s.is_hide_set())
        .map(|s| s.get_name())
        .collect();
    if subcommands.is_empty() {
        return about;
    }
    subcommands.sort_unstable();
    format!("{} ({})", about, subcommands.join(", "))
}

pub fn root_help(cmd: &Command) -> String {
    let width = COMMAND_GROUPS
        .iter()
        .flat_map(|(_, names)| names.iter())
        .map(|name| name.len())
        .max()
        .unwrap_or(0);

    let mut out = format!("{}\n\nUsage:\n  astra [flags]\n  astra [command]\n", LONG_DESCRIPTION);
    for (group, names) in COMMAND_GROUPS {
        out.push_str(&format!("\n{}:\n", group));
        for name in names.iter() {
            if let Some(sub) = cmd.find_subcommand(name) {
                out.push_str(&format!("  {:<width$}  {}\n", name, describe(sub), width = width));
            }
        }
    }

    out.push_str("\nFlags:\n");
    out.push_str("  -h, --help                help for astra\n");
    out.push_str("  -o, --output <OUTPUT>     output format, only \"json\" is supported\n");
    out.push_str("      --platform <PLATFORM> platform to run the command on: cluster or podman\n");
    out.push_str("      --var <KEY=VALUE>     variable to override in the devfile\n");
    out.push_str("      --var-file <FILE>     file containing variables to override in the devfile\n");
    out.push_str("  -V, --version             print the version\n");
    out.push_str("\nUse \"astra [command] --help\" for more information about a command.\n");
    out
}
