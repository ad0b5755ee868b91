//! `astra api-server`, a local HTTP API over the component of the working directory

use crate::cli::clientset::{Clientset, Dependency};
use crate::cli::context::CommandContext;
use crate::cli::runner::{Cleanuper, Runnable};
use crate::cli::ui;
use crate::domain::component::{describe_devfile_component, Platforms};
use crate::domain::config::EnvConfig;
use crate::domain::devfile::DevfileObj;
use crate::infrastructure::telemetry::is_telemetry_enabled;
use crate::shared::error::AstraError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const DEFAULT_API_SERVER_PORT: u16 = 20000;

#[derive(Args, Debug, Clone)]
pub struct ApiServerCommand {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_API_SERVER_PORT, conflicts_with = "random_ports")]
    pub port: u16,

    /// Listen on a port chosen by the system
    #[arg(long = "random-ports")]
    pub random_ports: bool,
}

#[derive(Clone)]
struct ApiState {
    component: String,
    app: String,
    namespace: String,
    platform: Option<String>,
    working_dir: PathBuf,
    devfile: Option<DevfileObj>,
    env: EnvConfig,
    clients: Clientset,
    shutdown: Arc<Notify>,
}

impl ApiState {
    fn from_context(ctx: &CommandContext, shutdown: Arc<Notify>) -> Self {
        Self {
            component: ctx.component_name.clone(),
            app: ctx.app.clone(),
            namespace: ctx.namespace.clone(),
            platform: ctx.platform.clone(),
            working_dir: ctx.working_dir.clone(),
            devfile: ctx.devfile.clone(),
            env: ctx.env.clone(),
            clients: ctx.clients.clone(),
            shutdown,
        }
    }
}

struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<AstraError>() {
            Some(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            Some(AstraError::NoDevfile { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "message": format!("{:#}", self.0) }))).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/instance", get(get_instance).delete(delete_instance))
        .route("/api/v1/component", get(get_component))
        .route("/api/v1/devfile", get(get_devfile))
        .route("/api/v1/telemetry", get(get_telemetry))
        .with_state(state)
}

async fn get_instance(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "pid": std::process::id(),
        "componentDirectory": state.working_dir.to_string_lossy(),
    }))
}

async fn delete_instance(State(state): State<ApiState>) -> Json<Value> {
    tracing::info!("shutdown requested through the API");
    state.shutdown.notify_one();
    Json(json!({ "message": "astra is shutting down" }))
}

fn devfile_of(state: &ApiState) -> Result<&DevfileObj, AstraError> {
    state.devfile.as_ref().ok_or_else(|| AstraError::NoDevfile {
        dir: state.working_dir.clone(),
        empty: false,
    })
}

async fn get_component(State(state): State<ApiState>) -> ApiResult {
    let devfile = devfile_of(&state)?;
    let platforms = Platforms {
        kube: state.clients.kube_ref().map(|k| (k, state.namespace.as_str())),
        podman: state.clients.podman_ref(),
    };
    let state_client = state.clients.state()?;
    let component = describe_devfile_component(
        devfile,
        &state.component,
        &state.app,
        state.platform.as_deref(),
        platforms,
        state_client.as_ref(),
    )
    .await?;
    Ok(Json(serde_json::to_value(component)?))
}

async fn get_devfile(State(state): State<ApiState>) -> ApiResult {
    let devfile = devfile_of(&state)?;
    Ok(Json(json!({
        "path": devfile.path.to_string_lossy(),
        "content": serde_yaml::to_string(&devfile.raw)?,
    })))
}

async fn get_telemetry(State(state): State<ApiState>) -> ApiResult {
    let enabled = match state.clients.preference() {
        Ok(preferences) => is_telemetry_enabled(&state.env, preferences.as_ref()),
        Err(_) => false,
    };
    Ok(Json(json!({ "enabled": enabled })))
}

impl ApiServerCommand {
    fn address(&self) -> SocketAddr {
        let port = if self.random_ports { 0 } else { self.port };
        SocketAddr::from(([127, 0, 0, 1], port))
    }
}

#[async_trait::async_trait]
impl Runnable for ApiServerCommand {
    fn name(&self) -> &'static str {
        "api-server"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::State,
            Dependency::KubernetesNullable,
            Dependency::PodmanNullable,
            Dependency::Preference,
        ]
    }

    fn supports_platform(&self) -> bool {
        true
    }

    fn require_devfile(&self) -> bool {
        false
    }

    fn validate(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if !ctx.env.experimental_mode {
            return Err(AstraError::validation(
                "api-server is an experimental command, set astra_EXPERIMENTAL_MODE=true to use it",
            )
            .into());
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.address()).await.map_err(|e| {
            AstraError::validation(format!("unable to listen on {}: {}", self.address(), e))
        })?;
        let port = listener.local_addr()?.port();
        ctx.clients.state()?.set_api_server_port(port)?;

        let shutdown = Arc::new(Notify::new());
        let app = router(ApiState::from_context(ctx, shutdown.clone()));

        ui::success(format!("API Server started at http://localhost:{}/api/v1", port));
        tracing::info!("api server listening on {}", port);

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await
            .map_err(|e| AstraError::validation(format!("API server failed: {}", e)))?;
        ui::info("API Server stopped");
        Ok(())
    }

    fn cleanuper(&mut self) -> Option<&mut dyn Cleanuper> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl Cleanuper for ApiServerCommand {
    async fn cleanup(&mut self, ctx: &CommandContext, _error: Option<&anyhow::Error>) -> anyhow::Result<()> {
        ctx.clients.state()?.clear_api_server_port()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::{StateClient, StateFile};
    use crate::infrastructure::fake::FakeKube;
    use crate::infrastructure::filesystem::DefaultFs;
    use std::collections::HashMap;

    fn context(dir: &std::path::Path, experimental: bool) -> (CommandContext, Arc<StateFile>) {
        std::fs::write(
            dir.join("devfile.yaml"),
            "schemaVersion: 2.2.0\nmetadata:\n  name: my-api\ncomponents:\n- name: runtime\n  container:\n    image: node\n",
        )
        .unwrap();
        let state = Arc::new(StateFile::new(dir, Arc::new(DefaultFs)));
        let ctx = CommandContext {
            json: false,
            platform: None,
            app: "app".to_string(),
            namespace: "default".to_string(),
            working_dir: dir.to_path_buf(),
            variables: HashMap::new(),
            devfile: Some(DevfileObj::load_from_dir(dir, &HashMap::new()).unwrap()),
            component_name: "my-api".to_string(),
            env: EnvConfig {
                experimental_mode: experimental,
                ..Default::default()
            },
            clients: Clientset::default()
                .with_kube(Arc::new(FakeKube::default()))
                .with_state(state.clone()),
        };
        (ctx, state)
    }

    #[test]
    fn test_requires_experimental_mode() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path(), false);
        let cmd = ApiServerCommand {
            port: DEFAULT_API_SERVER_PORT,
            random_ports: false,
        };
        assert!(cmd.validate(&ctx).is_err());
    }

    #[tokio::test]
    async fn test_routes_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path(), true);
        let shutdown = Arc::new(Notify::new());
        let app = router(ApiState::from_context(&ctx, shutdown.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api/v1", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await
        });

        let http = reqwest::Client::new();
        let instance: Value = http
            .get(format!("{}/instance", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(instance["pid"], std::process::id());

        let component: Value = http
            .get(format!("{}/component", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(component["devfileData"]["devfile"]["metadata"]["name"], "my-api");

        let devfile: Value = http
            .get(format!("{}/devfile", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(devfile["content"].as_str().unwrap().contains("my-api"));

        let telemetry: Value = http
            .get(format!("{}/telemetry", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(telemetry["enabled"], false);

        let response = http.delete(format!("{}/instance", base)).send().await.unwrap();
        assert!(response.status().is_success());
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_clears_port() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, state) = context(dir.path(), true);
        state.init("cluster").unwrap();
        state.set_api_server_port(20001).unwrap();

        let mut cmd = ApiServerCommand {
            port: DEFAULT_API_SERVER_PORT,
            random_ports: false,
        };
        cmd.cleanup(&ctx, None).await.unwrap();
        assert_eq!(state.get_api_server_port().unwrap(), None);
    }
}
