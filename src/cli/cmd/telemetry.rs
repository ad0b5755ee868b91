//! `astra telemetry`, started in the background by the other commands

use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::infrastructure::telemetry::{TelemetryClient, TelemetryData};
use crate::shared::error::AstraError;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct TelemetryCommand {
    /// Event to send, as JSON
    pub data: String,
}

impl TelemetryCommand {
    fn event(&self) -> anyhow::Result<TelemetryData> {
        serde_json::from_str(&self.data).map_err(|e| {
            AstraError::validation(format!("invalid telemetry data: {}", e)).into()
        })
    }
}

#[async_trait::async_trait]
impl Runnable for TelemetryCommand {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn use_devfile(&self) -> bool {
        false
    }

    fn validate(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        self.event()?;
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let data = self.event()?;
        TelemetryClient::new(&ctx.env)?.upload(&data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_event_written_to_debug_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("telemetry.json");
        let ctx = CommandContext {
            json: false,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.path().to_path_buf(),
            variables: HashMap::new(),
            devfile: None,
            component_name: "app".to_string(),
            env: EnvConfig {
                debug_telemetry_file: Some(file.to_string_lossy().into_owned()),
                ..Default::default()
            },
            clients: Clientset::default(),
        };
        let mut cmd = TelemetryCommand {
            data: r#"{"event":"astra list","properties":{"duration":12,"success":true,"tty":false,"version":"v0.3.0"}}"#
                .to_string(),
        };
        cmd.validate(&ctx).unwrap();
        cmd.run(&ctx).await.unwrap();

        let written: TelemetryData =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(written.event, "astra list");
        assert_eq!(written.properties.duration, 12);
    }

    #[test]
    fn test_invalid_payload() {
        let cmd = TelemetryCommand {
            data: "{not json".to_string(),
        };
        assert!(cmd.event().is_err());
    }
}
