//! `astra preference`

use crate::cli::clientset::Dependency;
use crate::cli::context::CommandContext;
use crate::cli::display::TableRenderer;
use crate::cli::runner::{JsonOutputter, Runnable};
use crate::cli::ui;
use crate::domain::preference::{format_supported_parameters, supported_parameter, RegistryOperation};
use crate::shared::error::AstraError;
use crate::shared::prompt;
use clap::{Args, Subcommand};
use serde_json::json;

#[derive(Args, Debug, Clone)]
pub struct PreferenceCommand {
    #[command(subcommand)]
    pub subcommand: PreferenceSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PreferenceSubcommand {
    /// View the current preferences and registries
    View(ViewCommand),

    /// Set a preference
    Set(SetPreferenceCommand),

    /// Unset a preference
    Unset(UnsetPreferenceCommand),

    /// Add a value to a list preference
    #[command(subcommand)]
    Add(AddSubcommand),

    /// Remove a value from a list preference
    #[command(subcommand)]
    Remove(RemoveSubcommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum AddSubcommand {
    /// Add a devfile registry
    Registry(AddRegistryCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoveSubcommand {
    /// Remove a devfile registry
    Registry(RemoveRegistryCommand),
}

impl PreferenceCommand {
    pub fn into_runnable(self) -> Box<dyn Runnable> {
        match self.subcommand {
            PreferenceSubcommand::View(cmd) => Box::new(cmd),
            PreferenceSubcommand::Set(cmd) => Box::new(cmd),
            PreferenceSubcommand::Unset(cmd) => Box::new(cmd),
            PreferenceSubcommand::Add(AddSubcommand::Registry(cmd)) => Box::new(cmd),
            PreferenceSubcommand::Remove(RemoveSubcommand::Registry(cmd)) => Box::new(cmd),
        }
    }
}

/// Ask `question` unless forced.
fn confirm_unless_forced(force: bool, question: &str) -> anyhow::Result<bool> {
    if force {
        return Ok(true);
    }
    if !prompt::is_interactive() {
        return Err(AstraError::validation(format!("{} Use --force to skip this question", question)).into());
    }
    Ok(prompt::proceed(question)?)
}

fn check_parameter(parameter: &str) -> anyhow::Result<String> {
    let parameter = parameter.to_lowercase();
    if supported_parameter(&parameter).is_none() {
        return Err(AstraError::validation(format!(
            "{:?} is not a valid preference, the supported parameters are:\n{}",
            parameter,
            format_supported_parameters()
        ))
        .into());
    }
    Ok(parameter)
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewCommand {}

#[async_trait::async_trait]
impl Runnable for ViewCommand {
    fn name(&self) -> &'static str {
        "preference view"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Preference]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let preferences = ctx.clients.preference()?;
        let renderer = TableRenderer::new();
        ui::title("Preference parameters");
        ui::plain(renderer.render_preferences(&preferences.new_preference_list()));
        ui::plain("");
        ui::title("Devfile registries");
        ui::plain(renderer.render_registries(&preferences.registry_list()));
        Ok(())
    }

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl JsonOutputter for ViewCommand {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
        let preferences = ctx.clients.preference()?;
        Ok(json!({
            "preferences": preferences.new_preference_list(),
            "registries": preferences.registry_list(),
        }))
    }
}

#[derive(Args, Debug, Clone)]
pub struct SetPreferenceCommand {
    /// Name of the preference
    pub parameter: String,

    /// New value
    pub value: String,

    /// Overwrite a value already set without asking
    #[arg(short, long)]
    pub force: bool,
}

#[async_trait::async_trait]
impl Runnable for SetPreferenceCommand {
    fn name(&self) -> &'static str {
        "preference set"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Preference]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        check_parameter(&self.parameter)?;
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let parameter = check_parameter(&self.parameter)?;
        let preferences = ctx.clients.preference()?;
        if preferences.is_set(&parameter) {
            let question = format!("{} is already set. Do you want to override it in the config?", parameter);
            if !confirm_unless_forced(self.force, &question)? {
                ui::info("Aborted by the user");
                return Ok(());
            }
        }
        preferences.set_configuration(&parameter, &self.value)?;
        ui::success(format!("Value of {:?} preference was set to {:?}", parameter, self.value));
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct UnsetPreferenceCommand {
    /// Name of the preference
    pub parameter: String,

    /// Unset without asking
    #[arg(short, long)]
    pub force: bool,
}

#[async_trait::async_trait]
impl Runnable for UnsetPreferenceCommand {
    fn name(&self) -> &'static str {
        "preference unset"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Preference]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        check_parameter(&self.parameter)?;
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let parameter = check_parameter(&self.parameter)?;
        let preferences = ctx.clients.preference()?;
        if !preferences.is_set(&parameter) {
            ui::info(format!("Value of {:?} is already unset", parameter));
            return Ok(());
        }
        let question = format!("Do you want to unset {} in the preference?", parameter);
        if !confirm_unless_forced(self.force, &question)? {
            ui::info("Aborted by the user");
            return Ok(());
        }
        preferences.delete_configuration(&parameter)?;
        ui::success(format!("Value of {:?} preference was removed from preferences", parameter));
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddRegistryCommand {
    /// Name of the registry
    pub name: String,

    /// URL of the registry
    pub url: String,

    /// Token to access a secure registry
    #[arg(long)]
    pub token: Option<String>,
}

impl AddRegistryCommand {
    fn check_url(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| AstraError::validation(format!("invalid registry URL {:?}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AstraError::validation(format!(
                "registry URL {:?} must use http or https",
                self.url
            ))
            .into());
        }
        if url.host_str() == Some("github.com") || url.host_str() == Some("raw.githubusercontent.com") {
            return Err(AstraError::validation(
                "GitHub based registries are not supported, use an OCI-based devfile registry",
            )
            .into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Runnable for AddRegistryCommand {
    fn name(&self) -> &'static str {
        "preference add registry"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Preference]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        self.check_url()
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let secure = self.token.is_some();
        if secure {
            ui::warning("Registry tokens are not stored, the registry is only marked as secure");
        }
        ctx.clients.preference()?.registry_handler(
            RegistryOperation::Add,
            &self.name,
            &self.url,
            false,
            secure,
        )?;
        ui::success(format!("New registry successfully added: {}", self.name));
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RemoveRegistryCommand {
    /// Name of the registry
    pub name: String,

    /// Remove without asking
    #[arg(short, long)]
    pub force: bool,
}

#[async_trait::async_trait]
impl Runnable for RemoveRegistryCommand {
    fn name(&self) -> &'static str {
        "preference remove registry"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Preference]
    }

    fn use_devfile(&self) -> bool {
        false
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let preferences = ctx.clients.preference()?;
        if !preferences.registry_name_exists(&self.name) {
            return Err(AstraError::RegistryMissing {
                name: self.name.clone(),
            }
            .into());
        }
        if !self.force && !prompt::is_interactive() {
            return Err(AstraError::validation(format!(
                "refusing to remove registry {:?} without confirmation, use --force",
                self.name
            ))
            .into());
        }
        if preferences.registry_handler(RegistryOperation::Remove, &self.name, "", self.force, false)? {
            ui::success(format!("Successfully deleted registry {:?}", self.name));
        } else {
            ui::info("Aborted by the user");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::domain::preference::{PreferenceClient, PreferenceInfo};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context(dir: &tempfile::TempDir) -> (CommandContext, Arc<PreferenceInfo>) {
        let preferences = Arc::new(PreferenceInfo::new(dir.path().join("preference.yaml")).unwrap());
        let ctx = CommandContext {
            json: true,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.path().to_path_buf(),
            variables: HashMap::new(),
            devfile: None,
            component_name: "app".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default().with_preference(preferences.clone()),
        };
        (ctx, preferences)
    }

    #[tokio::test]
    async fn test_set_lowercases_and_view_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, preferences) = context(&dir);

        let mut set = SetPreferenceCommand {
            parameter: "Timeout".to_string(),
            value: "30s".to_string(),
            force: true,
        };
        set.validate(&ctx).unwrap();
        set.run(&ctx).await.unwrap();
        assert!(preferences.is_set("timeout"));

        let value = ViewCommand::default().run_for_json_output(&ctx).await.unwrap();
        let timeout = value["preferences"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"].as_str().map(str::to_lowercase).as_deref() == Some("timeout"))
            .unwrap()
            .clone();
        assert!(!timeout["value"].is_null());
        assert!(!value["registries"].as_array().unwrap().is_empty());

        let mut unset = UnsetPreferenceCommand {
            parameter: "TIMEOUT".to_string(),
            force: true,
        };
        unset.run(&ctx).await.unwrap();
        assert!(!preferences.is_set("timeout"));
    }

    #[test]
    fn test_unknown_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(&dir);
        let set = SetPreferenceCommand {
            parameter: "colour".to_string(),
            value: "blue".to_string(),
            force: true,
        };
        let err = set.validate(&ctx).unwrap_err();
        assert!(err.to_string().contains("not a valid preference"));
    }

    #[tokio::test]
    async fn test_add_and_remove_registry() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, preferences) = context(&dir);

        let mut add = AddRegistryCommand {
            name: "Staging".to_string(),
            url: "https://registry.staging.example.com".to_string(),
            token: Some("secret".to_string()),
        };
        add.validate(&ctx).unwrap();
        add.run(&ctx).await.unwrap();
        let added = preferences
            .registry_list()
            .into_iter()
            .find(|r| r.name == "Staging")
            .unwrap();
        assert!(added.secure);
        assert!(add.run(&ctx).await.is_err());

        let mut remove = RemoveRegistryCommand {
            name: "Staging".to_string(),
            force: true,
        };
        remove.run(&ctx).await.unwrap();
        assert!(!preferences.registry_name_exists("Staging"));
        assert!(remove.run(&ctx).await.is_err());
    }

    #[test]
    fn test_registry_url_checks() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(&dir);
        for url in ["ftp://registry.example.com", "https://github.com/org/registry", "not a url"] {
            let add = AddRegistryCommand {
                name: "Bad".to_string(),
                url: url.to_string(),
                token: None,
            };
            assert!(add.validate(&ctx).is_err(), "{} should be rejected", url);
        }
    }
}
