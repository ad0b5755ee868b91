//! `astra build-images`

use crate::cli::context::CommandContext;
use crate::cli::runner::Runnable;
use crate::cli::ui;
use crate::domain::deploy::build_images;
use crate::domain::devfile::ComponentType;
use crate::infrastructure::image::ImageBuilder;
use crate::shared::error::AstraError;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct BuildImagesCommand {
    /// Push the images to their registries after building them
    #[arg(long)]
    pub push: bool,
}

#[async_trait::async_trait]
impl Runnable for BuildImagesCommand {
    fn name(&self) -> &'static str {
        "build-images"
    }

    fn supports_variables(&self) -> bool {
        true
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if ctx
            .devfile()?
            .data
            .components_of(ComponentType::Image)
            .next()
            .is_none()
        {
            return Err(
                AstraError::devfile_error("no component with type \"Image\" found in Devfile").into(),
            );
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let builder = ImageBuilder::from_env(&ctx.env)?;
        ui::title("Building images");
        build_images(&builder, ctx.devfile()?, self.push).await?;
        if self.push {
            ui::success("Images built and pushed");
        } else {
            ui::success("Images built");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::clientset::Clientset;
    use crate::domain::config::EnvConfig;
    use crate::domain::devfile::DevfileObj;
    use std::collections::HashMap;

    #[test]
    fn test_devfile_without_images_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        let ctx = CommandContext {
            json: false,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.path().to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir.path(), &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig::default(),
            clients: Clientset::default(),
        };
        let err = BuildImagesCommand::default().validate(&ctx).unwrap_err();
        assert!(err.to_string().contains("no component with type \"Image\""));
    }
}
