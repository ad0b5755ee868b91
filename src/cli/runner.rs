//! The lifecycle every command goes through

use crate::cli::clientset::{Clientset, Dependency};
use crate::cli::context::CommandContext;
use crate::cli::{ui, GlobalArgs};
use crate::domain::component::{PLATFORM_CLUSTER, PLATFORM_PODMAN};
use crate::domain::config::{merge_variables, EnvConfig};
use crate::domain::devfile::{find_devfile, gather_name, is_dir_empty, DevfileObj};
use crate::domain::init::InitParams;
use crate::domain::preference::settings::CONSENT_TELEMETRY_SETTING;
use crate::domain::preference::{PreferenceClient, PreferenceInfo};
use crate::infrastructure::constants::{
    APP_VERSION, DEFAULT_APP_NAME, DEFAULT_NAMESPACE, ENV_DISABLE_TELEMETRY, ENV_TRACKING_CONSENT,
    GIT_COMMIT,
};
use crate::infrastructure::release;
use crate::infrastructure::telemetry::{
    error_type, is_telemetry_enabled, sanitize_error, spawn_upload, TelemetryData,
    TelemetryProperties,
};
use crate::shared::error::{AstraError, Result};
use crate::shared::prompt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[async_trait::async_trait]
pub trait Runnable: Send {
    /// Full command path, such as `list component`.
    fn name(&self) -> &'static str;

    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Accepts `--platform`.
    fn supports_platform(&self) -> bool {
        false
    }

    /// Accepts `--var` and `--var-file`.
    fn supports_variables(&self) -> bool {
        false
    }

    /// Load the devfile of the working directory before `complete`.
    fn use_devfile(&self) -> bool {
        true
    }

    /// With `false`, a missing devfile leaves `CommandContext::devfile` empty.
    fn require_devfile(&self) -> bool {
        true
    }

    async fn complete(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()>;

    fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
        None
    }

    fn signal_handler(&mut self) -> Option<&mut dyn SignalHandler> {
        None
    }

    fn cleanuper(&mut self) -> Option<&mut dyn Cleanuper> {
        None
    }

    fn pre_initer(&self) -> Option<&dyn PreIniter> {
        None
    }
}

#[async_trait::async_trait]
pub trait JsonOutputter: Send {
    async fn run_for_json_output(&mut self, ctx: &CommandContext) -> anyhow::Result<serde_json::Value>;
}

#[async_trait::async_trait]
pub trait SignalHandler: Send {
    /// Called after the run was stopped by `signal`.
    async fn handle_signal(&mut self, ctx: &CommandContext, signal: &str) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait Cleanuper: Send {
    async fn cleanup(&mut self, ctx: &CommandContext, error: Option<&anyhow::Error>) -> anyhow::Result<()>;
}

/// Commands that offer to run `astra init` when the directory has no devfile.
pub trait PreIniter: Send + Sync {
    fn pre_init_message(&self) -> String;
}

/// Run `runnable` in the current directory.
pub async fn generic_run(
    runnable: &mut dyn Runnable,
    globals: &GlobalArgs,
    overrides: Clientset,
) -> anyhow::Result<()> {
    let env = EnvConfig::from_env()?;
    let working_dir = std::env::current_dir()?;
    generic_run_in(runnable, globals, overrides, env, working_dir).await
}

pub async fn generic_run_in(
    runnable: &mut dyn Runnable,
    globals: &GlobalArgs,
    overrides: Clientset,
    env: EnvConfig,
    working_dir: PathBuf,
) -> anyhow::Result<()> {
    let started = Instant::now();
    ui::set_quiet(globals.is_json());

    env.check_telemetry_settings()?;
    if env.disable_telemetry.is_some() {
        tracing::warn!(
            "{} is deprecated, use {} instead",
            ENV_DISABLE_TELEMETRY,
            ENV_TRACKING_CONSENT
        );
    }

    let preferences: Arc<dyn PreferenceClient> = match overrides.preference() {
        Ok(preferences) => preferences,
        Err(_) => Arc::new(PreferenceInfo::from_env(&env)?),
    };
    persist_tracking_consent(&env, preferences.as_ref())?;
    if !globals.is_json() {
        ask_consent(runnable.name(), &env, preferences.as_ref())?;
    }

    let update_check = (preferences.update_notification()
        && !globals.is_json()
        && prompt::is_interactive())
    .then(release::spawn_check);

    // The command shares this client, so a consent it changes is seen below.
    let overrides = overrides.with_preference(preferences.clone());
    let result = run_lifecycle(runnable, globals, overrides, env.clone(), working_dir).await;

    if let Some(check) = update_check {
        if check.is_finished() {
            if let Ok(Some(notice)) = check.await {
                ui::info(notice);
            }
        } else {
            tracing::debug!("Could not get the latest release information in time");
            check.abort();
        }
    }

    if should_send_telemetry(runnable.name(), &env, preferences.as_ref()) {
        send_telemetry(runnable.name(), globals, started, &result);
    }
    result
}

async fn run_lifecycle(
    runnable: &mut dyn Runnable,
    globals: &GlobalArgs,
    overrides: Clientset,
    env: EnvConfig,
    working_dir: PathBuf,
) -> anyhow::Result<()> {
    check_flags(runnable, globals)?;

    let clients = Clientset::fetch(
        &runnable.dependencies(),
        globals.platform.as_deref(),
        &env,
        &working_dir,
        overrides,
    )
    .await?;

    if env.experimental_mode {
        ui::warning("Experimental mode is enabled, use at your own risk");
    }

    let variables = merge_variables(globals.var_file.as_deref(), &globals.vars)?;

    let mut devfile = None;
    if runnable.use_devfile() {
        if let Some(pre_initer) = runnable.pre_initer() {
            if find_devfile(&working_dir).is_none() {
                if is_dir_empty(&working_dir)? {
                    return Err(AstraError::NoDevfile {
                        dir: working_dir,
                        empty: true,
                    }
                    .into());
                }
                ui::info(pre_initer.pre_init_message());
                clients
                    .init()?
                    .init(&InitParams::default(), &working_dir)
                    .await?;
            }
        }

        devfile = match DevfileObj::load_from_dir(&working_dir, &variables) {
            Ok(devfile) => Some(devfile),
            Err(AstraError::NoDevfile { .. }) if !runnable.require_devfile() => None,
            Err(e) => return Err(e.into()),
        };
        if let (Some(devfile), Ok(preferences)) = (devfile.as_mut(), clients.preference()) {
            devfile.data.apply_image_registry(&preferences.image_registry());
        }
    }

    let component_name = match &devfile {
        Some(devfile) => gather_name(Some(devfile), &working_dir)?,
        None => gather_name(None, &working_dir).unwrap_or_default(),
    };
    let namespace = clients
        .kube_ref()
        .map(|k| k.current_namespace().to_string())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let ctx = CommandContext {
        json: globals.is_json(),
        platform: globals.platform.clone(),
        app: DEFAULT_APP_NAME.to_string(),
        namespace,
        working_dir,
        variables,
        devfile,
        component_name,
        env,
        clients,
    };

    runnable.complete(&ctx).await?;
    runnable.validate(&ctx)?;
    let result = run_with_signals(runnable, &ctx).await;

    if let Some(cleanuper) = runnable.cleanuper() {
        if let Err(e) = cleanuper.cleanup(&ctx, result.as_ref().err()).await {
            tracing::warn!("cleanup failed: {:#}", e);
        }
    }
    result
}

fn check_flags(runnable: &mut dyn Runnable, globals: &GlobalArgs) -> Result<()> {
    let name = runnable.name();
    if let Some(output) = &globals.output {
        if runnable.json_outputter().is_none() {
            return Err(AstraError::flag_not_supported("o", name));
        }
        if output != "json" {
            return Err(AstraError::validation(format!(
                "{:?} is not a valid output format, only \"json\" is supported",
                output
            )));
        }
    }

    if let Some(platform) = &globals.platform {
        if !runnable.supports_platform() {
            return Err(AstraError::flag_not_supported("platform", name));
        }
        if platform != PLATFORM_CLUSTER && platform != PLATFORM_PODMAN {
            return Err(AstraError::validation(format!(
                "{:?} is not a valid platform, valid platforms are: {}, {}",
                platform, PLATFORM_CLUSTER, PLATFORM_PODMAN
            )));
        }
    }

    if !runnable.supports_variables() {
        if !globals.vars.is_empty() {
            return Err(AstraError::flag_not_supported("var", name));
        }
        if globals.var_file.is_some() {
            return Err(AstraError::flag_not_supported("var-file", name));
        }
    }
    Ok(())
}

enum Outcome {
    Finished(anyhow::Result<()>),
    Signaled(&'static str),
}

async fn run_with_signals(runnable: &mut dyn Runnable, ctx: &CommandContext) -> anyhow::Result<()> {
    let outcome = {
        let run = execute(runnable, ctx);
        tokio::select! {
            result = run => Outcome::Finished(result),
            signal = wait_for_signal() => Outcome::Signaled(signal),
        }
    };

    match outcome {
        Outcome::Finished(result) => result,
        Outcome::Signaled(signal) => {
            tracing::debug!("received {}", signal);
            if let Some(handler) = runnable.signal_handler() {
                if let Err(e) = handler.handle_signal(ctx, signal).await {
                    ui::error(format!("{:#}", e));
                }
            }
            Err(AstraError::Interrupted.into())
        }
    }
}

async fn execute(runnable: &mut dyn Runnable, ctx: &CommandContext) -> anyhow::Result<()> {
    if ctx.json {
        if let Some(outputter) = runnable.json_outputter() {
            let value = outputter.run_for_json_output(ctx).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
    }
    runnable.run(ctx).await
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::hangup(), "SIGHUP"),
        (SignalKind::quit(), "SIGQUIT"),
    ];
    let mut streams = Vec::new();
    for (kind, name) in kinds {
        match signal(kind) {
            Ok(stream) => streams.push((stream, name)),
            Err(e) => tracing::debug!("unable to watch {}: {}", name, e),
        }
    }
    if streams.is_empty() {
        return std::future::pending().await;
    }

    let waits = streams
        .iter_mut()
        .map(|(stream, name)| {
            Box::pin(async move {
                stream.recv().await;
                *name
            })
        });
    let (name, _, _) = futures::future::select_all(waits).await;
    name
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

/// `TRACKING_CONSENT=yes` is remembered as `ConsentTelemetry=true`.
fn persist_tracking_consent(env: &EnvConfig, preferences: &dyn PreferenceClient) -> Result<()> {
    if env.tracking_consent()? == Some(true) && preferences.consent_telemetry() != Some(true) {
        preferences.set_configuration(CONSENT_TELEMETRY_SETTING, "true")?;
    }
    Ok(())
}

fn should_send_telemetry(command: &str, env: &EnvConfig, preferences: &dyn PreferenceClient) -> bool {
    command != "telemetry" && is_telemetry_enabled(env, preferences)
}

fn ask_consent(command: &str, env: &EnvConfig, preferences: &dyn PreferenceClient) -> Result<()> {
    if !prompt::is_interactive()
        || command.starts_with("preference")
        || command == "telemetry"
        || preferences.is_set(CONSENT_TELEMETRY_SETTING)
        || env.telemetry_disabled()
        || env.tracking_consent()?.is_some()
    {
        return Ok(());
    }
    let consent = prompt::proceed(
        "Help astra improve by allowing it to collect usage data. \
         You can change this later with `astra preference set ConsentTelemetry`",
    )?;
    preferences.set_configuration(CONSENT_TELEMETRY_SETTING, &consent.to_string())
}

fn send_telemetry(
    command: &str,
    globals: &GlobalArgs,
    started: Instant,
    result: &anyhow::Result<()>,
) {
    let mut properties = TelemetryProperties {
        duration: started.elapsed().as_millis() as u64,
        success: result.is_ok(),
        tty: prompt::is_interactive(),
        version: format!("astra v{} ({})", APP_VERSION, GIT_COMMIT),
        ..Default::default()
    };
    if let Err(e) = result {
        properties.error = sanitize_error(&format!("{:#}", e));
        properties.error_type = error_type(e);
    }
    if let Some(platform) = &globals.platform {
        properties
            .cmd_properties
            .insert("platform".to_string(), serde_json::json!(platform));
    }
    properties
        .cmd_properties
        .insert("output".to_string(), serde_json::json!(globals.is_json()));

    spawn_upload(&TelemetryData {
        event: command.to_string(),
        properties,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preference::settings::IMAGE_REGISTRY_SETTING;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        steps: Arc<Mutex<Vec<String>>>,
        devfile: bool,
        json: bool,
    }

    #[async_trait::async_trait]
    impl Runnable for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn use_devfile(&self) -> bool {
            self.devfile
        }

        async fn complete(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
            self.steps
                .lock()
                .unwrap()
                .push(format!("complete {}", ctx.namespace));
            Ok(())
        }

        fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
            self.steps.lock().unwrap().push("validate".to_string());
            Ok(())
        }

        async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
            self.steps
                .lock()
                .unwrap()
                .push(format!("run {}", ctx.component_name));
            Ok(())
        }

        fn json_outputter(&mut self) -> Option<&mut dyn JsonOutputter> {
            if self.json {
                Some(self)
            } else {
                None
            }
        }
    }

    #[async_trait::async_trait]
    impl JsonOutputter for Recorder {
        async fn run_for_json_output(&mut self, _ctx: &CommandContext) -> anyhow::Result<serde_json::Value> {
            self.steps.lock().unwrap().push("json".to_string());
            Ok(serde_json::json!({}))
        }
    }

    fn env(dir: &tempfile::TempDir) -> EnvConfig {
        EnvConfig {
            global_config: Some(dir.path().join("preference.yaml").display().to_string()),
            tracking_consent: Some("no".to_string()),
            ..Default::default()
        }
    }

    fn write_devfile(dir: &std::path::Path) {
        std::fs::write(
            dir.join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_order() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_devfile(project.path());

        let mut recorder = Recorder {
            devfile: true,
            ..Default::default()
        };
        let steps = recorder.steps.clone();
        generic_run_in(
            &mut recorder,
            &GlobalArgs::default(),
            Clientset::default(),
            env(&home),
            project.path().to_path_buf(),
        )
        .await
        .unwrap();

        assert_eq!(
            *steps.lock().unwrap(),
            vec!["complete default", "validate", "run my-api"]
        );
    }

    #[tokio::test]
    async fn test_json_output_uses_outputter() {
        let home = tempfile::tempdir().unwrap();
        let mut recorder = Recorder {
            json: true,
            ..Default::default()
        };
        let steps = recorder.steps.clone();
        let globals = GlobalArgs {
            output: Some("json".to_string()),
            ..Default::default()
        };
        generic_run_in(
            &mut recorder,
            &globals,
            Clientset::default(),
            env(&home),
            home.path().to_path_buf(),
        )
        .await
        .unwrap();
        ui::set_quiet(false);

        assert_eq!(steps.lock().unwrap().last().map(String::as_str), Some("json"));
    }

    #[tokio::test]
    async fn test_unsupported_flags_are_rejected() {
        let home = tempfile::tempdir().unwrap();
        let cases = [
            GlobalArgs {
                output: Some("json".to_string()),
                ..Default::default()
            },
            GlobalArgs {
                platform: Some("podman".to_string()),
                ..Default::default()
            },
            GlobalArgs {
                vars: vec!["A=B".to_string()],
                ..Default::default()
            },
        ];
        for globals in cases {
            let mut recorder = Recorder::default();
            let err = generic_run_in(
                &mut recorder,
                &globals,
                Clientset::default(),
                env(&home),
                home.path().to_path_buf(),
            )
            .await
            .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<AstraError>(),
                Some(AstraError::FlagNotSupported { .. })
            ));
        }
        ui::set_quiet(false);
    }

    struct ConsentWithdrawer {
        shared: Arc<dyn PreferenceClient>,
        images: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Runnable for ConsentWithdrawer {
        fn name(&self) -> &'static str {
            "preference set"
        }

        async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
            let preferences = ctx.clients.preference()?;
            assert!(Arc::ptr_eq(&preferences, &self.shared));
            preferences.set_configuration(CONSENT_TELEMETRY_SETTING, "false")?;
            if let Some(devfile) = &ctx.devfile {
                for component in &devfile.data.components {
                    if let Some(image) = &component.image {
                        self.images.push(image.image_name.clone());
                    }
                    if let Some(container) = &component.container {
                        self.images.push(container.image.clone());
                    }
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_command_changes_are_seen_after_run() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: shop\ncomponents:\n\
             - name: build\n  image:\n    imageName: api\n\
             - name: runtime\n  container:\n    image: api\n",
        )
        .unwrap();

        let env = EnvConfig {
            tracking_consent: None,
            ..env(&home)
        };
        let preferences = PreferenceInfo::from_env(&env).unwrap();
        preferences.set_configuration(CONSENT_TELEMETRY_SETTING, "true").unwrap();
        preferences.set_configuration(IMAGE_REGISTRY_SETTING, "quay.io/me").unwrap();
        let shared: Arc<dyn PreferenceClient> = Arc::new(preferences);

        let mut command = ConsentWithdrawer {
            shared: shared.clone(),
            images: Vec::new(),
        };
        generic_run_in(
            &mut command,
            &GlobalArgs::default(),
            Clientset::default().with_preference(shared.clone()),
            env.clone(),
            project.path().to_path_buf(),
        )
        .await
        .unwrap();

        assert!(!should_send_telemetry("preference set", &env, shared.as_ref()));
        assert_eq!(
            command.images,
            vec!["quay.io/me/shop-api:latest", "quay.io/me/shop-api:latest"]
        );
    }

    #[test]
    fn test_tracking_consent_is_persisted() {
        let home = tempfile::tempdir().unwrap();
        let env = EnvConfig {
            tracking_consent: Some("yes".to_string()),
            ..env(&home)
        };
        let preferences = PreferenceInfo::from_env(&env).unwrap();
        persist_tracking_consent(&env, &preferences).unwrap();
        assert_eq!(preferences.consent_telemetry(), Some(true));

        let reloaded = PreferenceInfo::from_env(&env).unwrap();
        assert_eq!(reloaded.consent_telemetry(), Some(true));

        let declined = EnvConfig {
            tracking_consent: Some("no".to_string()),
            global_config: Some(home.path().join("other.yaml").display().to_string()),
            ..Default::default()
        };
        let untouched = PreferenceInfo::from_env(&declined).unwrap();
        persist_tracking_consent(&declined, &untouched).unwrap();
        assert_eq!(untouched.consent_telemetry(), None);
    }

    #[tokio::test]
    async fn test_missing_devfile() {
        let home = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        let mut recorder = Recorder {
            devfile: true,
            ..Default::default()
        };
        let err = generic_run_in(
            &mut recorder,
            &GlobalArgs::default(),
            Clientset::default(),
            env(&home),
            empty.path().to_path_buf(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AstraError>(),
            Some(AstraError::NoDevfile { empty: true, .. })
        ));
        assert!(recorder.steps.lock().unwrap().is_empty());
    }
}
