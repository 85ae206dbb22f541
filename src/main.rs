use anyhow::Context;
use app_mount::config::{ServerConfig, DEFAULT_CONFIG_PATH};
use app_mount::mount::{self, BuildContext, MountOptions, EMBEDDED_HOST_MARKER};
use app_mount::DevServer;
use axum::{routing::get, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Dev server starting");

    let config_path = std::env::var("APP_MOUNT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = ServerConfig::load(&PathBuf::from(&config_path))?;

    // 환경 변수는 여기서만 읽습니다. coordinator는 환경에 접근하지 않습니다.
    let embedded = mount::marker_active(std::env::var(EMBEDDED_HOST_MARKER).ok().as_deref());

    let mut ctx = BuildContext::new(MountOptions {
        configuration: cfg.configuration_value(),
    })
    .suppress_mounting(embedded);
    if let Some(root) = cfg.project_root.clone() {
        ctx = ctx.with_project(Arc::new(root));
    }

    let server = DevServer::new();
    let handler = mount::build(ctx, &server);

    let base = Router::new().route("/health", get(|| async { "ok" }));
    let router = server
        .ready(base)
        .await
        .context("Failed to mount app modules")?
        .layer(handler);
    tracing::info!("Mounted {} app module(s)", server.mounts().len());

    let listener = tokio::net::TcpListener::bind(&cfg.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen))?;
    tracing::info!("Listening on http://{}", cfg.listen);

    axum::serve(listener, router).await?;

    tracing::info!("Dev server shutting down");
    Ok(())
}
