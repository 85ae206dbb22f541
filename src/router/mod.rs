//! 모듈별 router 구성
//!
//! factory는 빈 router를 만들고, 전달받은 router 위에 모듈 하나의 요청 처리를
//! 설치합니다. 그 router 밖은 건드리지 않으므로 모듈끼리 서로의 요청을 보지
//! 않습니다.

use anyhow::Context;
use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::EffectiveConfig;
use crate::discovery::manifest::{ModuleManifest, MODULE_MANIFEST_FILE};

/// coordinator가 소유하는 옵션 키. 명시적 값이 우선합니다.
const RESERVED_OPTION_KEYS: [&str; 2] = ["cwd", "basePath"];

/// 모듈 하나를 설정할 때 factory가 받는 값
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareOptions {
    pub cwd: PathBuf,
    pub base_path: PathBuf,
    pub serve_from_namespace: bool,
    pub debug: bool,
    /// 예약 키를 제외한 모듈별 옵션
    pub options: Map<String, Value>,
}

impl MiddlewareOptions {
    pub fn new(
        cwd: PathBuf,
        base_path: PathBuf,
        config: &EffectiveConfig,
        module_options: Option<&Map<String, Value>>,
    ) -> Self {
        let mut options = Map::new();
        for (key, value) in module_options.into_iter().flatten() {
            if RESERVED_OPTION_KEYS.contains(&key.as_str()) {
                tracing::warn!(
                    "Ignoring module option '{}' for {}: it is set by the mount coordinator",
                    key,
                    base_path.display()
                );
                continue;
            }
            options.insert(key.clone(), value.clone());
        }

        let serve_from_namespace = options
            .get("serveFromNamespace")
            .and_then(Value::as_bool)
            .unwrap_or(config.serve_from_namespace);

        Self {
            cwd,
            base_path,
            serve_from_namespace,
            debug: config.debug,
            options,
        }
    }

    /// `{cwd, basePath, ...options}`를 하나의 object로
    pub fn to_value(&self) -> Value {
        let mut merged = self.options.clone();
        merged.insert("cwd".to_string(), json!(self.cwd.to_string_lossy()));
        merged.insert("basePath".to_string(), json!(self.base_path.to_string_lossy()));
        Value::Object(merged)
    }
}

#[async_trait]
pub trait RouterFactory: Send + Sync {
    /// 아직 어디에도 붙지 않은 빈 routing scope
    fn create_router(&self) -> Router {
        Router::new()
    }

    /// `router`에 모듈의 요청 처리를 설치하고 서빙 가능한 상태로 반환합니다.
    async fn apply_middleware(&self, router: Router, options: MiddlewareOptions) -> anyhow::Result<Router>;
}

/// 모듈의 webapp 디렉토리를 정적 파일로 서빙합니다.
///
/// namespace 서빙이 켜져 있고 manifest에 `namespace`가 있으면
/// `/resources/<namespace 경로>` 아래에, 아니면 router 루트에 노출합니다.
/// `GET /module.json`은 마운트된 모듈 정보를 반환합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAppRouterFactory;

#[async_trait]
impl RouterFactory for StaticAppRouterFactory {
    async fn apply_middleware(&self, router: Router, options: MiddlewareOptions) -> anyhow::Result<Router> {
        let manifest_path = options.base_path.join(MODULE_MANIFEST_FILE);
        let content = tokio::fs::read_to_string(&manifest_path)
            .await
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let manifest = ModuleManifest::parse(&manifest_path, &content)?;

        let webapp = options.base_path.join(manifest.webapp_dir());
        if !webapp.is_dir() {
            tracing::warn!("Web app directory {} does not exist", webapp.display());
        }

        let namespace_path = manifest
            .namespace_path()
            .filter(|_| options.serve_from_namespace);
        let resource_root = match &namespace_path {
            Some(ns) => format!("/resources/{ns}"),
            None => "/".to_string(),
        };

        let info = json!({
            "id": manifest.module.id,
            "namespace": manifest.module.namespace,
            "webapp": webapp.to_string_lossy(),
            "resourceRoot": resource_root,
            "options": options.to_value(),
        });

        let router = router.route(
            "/module.json",
            get(move || {
                let info = info.clone();
                async move { Json(info) }
            }),
        );

        let files = ServeDir::new(&webapp);
        let router = match namespace_path {
            Some(_) => router.nest_service(&resource_root, files),
            None => router.fallback_service(files),
        };

        if options.debug {
            tracing::info!("Serving {} at {}", webapp.display(), resource_root);
            return Ok(router.layer(TraceLayer::new_for_http()));
        }
        Ok(router)
    }
}
