//! `astra login` and `astra logout`

use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::infrastructure::kubernetes::kubeconfig::{kubeconfig_path, Credentials, KubeconfigFile};
use crate::shared::error::AstraError;
use crate::shared::prompt;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug, Clone, Default)]
pub struct LoginCommand {
    /// URL of the API server, the current one by default
    pub server: Option<String>,

    /// Bearer token
    #[arg(long)]
    pub token: Option<String>,

    #[arg(short, long)]
    pub username: Option<String>,

    #[arg(short, long)]
    pub password: Option<String>,

    /// Do not verify the server certificate
    #[arg(long = "insecure-skip-tls-verify")]
    pub insecure_skip_tls_verify: bool,
}

/// A value given on the command line, else asked for.
fn value_or_ask(value: &Option<String>, question: &str, secret: bool) -> anyhow::Result<String> {
    if let Some(value) = value {
        return Ok(value.clone());
    }
    if !prompt::is_interactive() {
        return Err(AstraError::validation(format!("{} is required", question)).into());
    }
    Ok(if secret {
        prompt::password(question)?
    } else {
        prompt::input(question, None)?
    })
}

impl LoginCommand {
    fn credentials(&self) -> anyhow::Result<Credentials> {
        if let Some(token) = &self.token {
            if self.username.is_some() || self.password.is_some() {
                return Err(AstraError::validation(
                    "--token cannot be used with --username or --password",
                )
                .into());
            }
            return Ok(Credentials::Token(token.clone()));
        }
        let username = value_or_ask(&self.username, "Username", false)?;
        let password = value_or_ask(&self.password, "Password", true)?;
        Ok(Credentials::Basic { username, password })
    }

    fn login(&self, kubeconfig: &Path) -> anyhow::Result<String> {
        let mut file = KubeconfigFile::load(kubeconfig)?;
        let server = match (&self.server, file.current_server()) {
            (Some(server), _) => server.clone(),
            (None, Some(current)) => current,
            (None, None) => value_or_ask(&None, "Server URL", false)?,
        };
        let context = file.login(&server, &self.credentials()?, self.insecure_skip_tls_verify)?;
        file.save()?;
        Ok(context)
    }
}

#[async_trait::async_trait]
impl Runnable for LoginCommand {
    fn name(&self) -> &'static str {
        "login"
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
        let context = self.login(&kubeconfig_path()?)?;
        ui::success(format!("Logged in, using context {:?}", context));
        Ok(())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct LogoutCommand {}

#[async_trait::async_trait]
impl Runnable for LogoutCommand {
    fn name(&self) -> &'static str {
        "logout"
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
        let mut file = KubeconfigFile::load(&kubeconfig_path()?)?;
        let user = file.logout()?;
        file.save()?;
        ui::success(format!("Logged {:?} out", user));
        Ok(())
    }
}
