//! `astra completion`

use crate::cli::context::CommandContext;
use crate::cli::help::build_command;
use crate::cli::runner::Runnable;
use crate::infrastructure::constants::APP_NAME;
use clap::{Args, ValueEnum};
use clap_complete::Shell;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompletionCommand {
    /// Shell to generate the completion script for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

impl CompletionCommand {
    fn generate(&self, out: &mut dyn std::io::Write) {
        let mut cmd = build_command();
        clap_complete::generate(Shell::from(self.shell), &mut cmd, APP_NAME, out);
    }
}

#[async_trait::async_trait]
impl Runnable for CompletionCommand {
    fn name(&self) -> &'static str {
        "completion"
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
        self.generate(&mut std::io::stdout());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_mentions_subcommands() {
        let mut out = Vec::new();
        CompletionCommand {
            shell: CompletionShell::Bash,
        }
        .generate(&mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("astra"));
        assert!(script.contains("preference"));
    }

    #[test]
    fn test_zsh_script_is_generated() {
        let mut out = Vec::new();
        CompletionCommand {
            shell: CompletionShell::Zsh,
        }
        .generate(&mut out);
        assert!(String::from_utf8(out).unwrap().contains("#compdef astra"));
    }
}
