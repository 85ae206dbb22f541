//! 마운트 coordinator
//!
//! 유효 설정을 계산하고, embedded host 가드를 확인한 뒤 호스트 hook을
//! 등록합니다. hook은 app 모듈을 탐색해 모듈마다 router 하나를 탐색 순서대로
//! 마운트합니다. 호스트에 돌려주는 미들웨어는 항상 pass-through이며, router는
//! hook을 통해 전달됩니다.

pub mod error;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower::Layer;

use crate::config::{self, ConfigOverrides, EffectiveConfig};
use crate::discovery::{DiscoveredModule, FsModuleSource, ModuleSource, ModuleStream};
use crate::host::{mount_hook, HookRegistry, Registrar};
use crate::router::{MiddlewareOptions, RouterFactory, StaticAppRouterFactory};
use error::{DiscoveryError, MountError};

/// 마운트 hook 등록 이름
pub const HOOK_NAME: &str = "app-mount";

/// dev server가 이 extension을 직접 호출하는 호스트 서버에 내장되어 실행될 때
/// 설정되는 환경 변수
pub const EMBEDDED_HOST_MARKER: &str = "cds-plugin-ui5";

/// [`EMBEDDED_HOST_MARKER`]의 원시 값을 해석합니다.
pub fn marker_active(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// 현재 프로젝트의 루트 디렉토리를 제공합니다.
pub trait ProjectRootResolver: Send + Sync {
    fn root_path(&self) -> Option<PathBuf>;
}

impl ProjectRootResolver for PathBuf {
    fn root_path(&self) -> Option<PathBuf> {
        Some(self.clone())
    }
}

/// 호스트가 extension에 넘기는 옵션
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    /// 이미 파싱된 사용자 설정 (형태 무관)
    pub configuration: Option<Value>,
}

/// 호스트 hook registry 외에 `build`가 필요로 하는 값
#[derive(Clone)]
pub struct BuildContext {
    pub options: MountOptions,
    pub project: Option<Arc<dyn ProjectRootResolver>>,
    /// 호스트 서버에 내장되어 실행될 때 호출자가 설정합니다.
    pub suppress_mounting: bool,
    pub source: Arc<dyn ModuleSource>,
    pub factory: Arc<dyn RouterFactory>,
}

impl BuildContext {
    pub fn new(options: MountOptions) -> Self {
        Self {
            options,
            project: None,
            suppress_mounting: false,
            source: Arc::new(FsModuleSource),
            factory: Arc::new(StaticAppRouterFactory),
        }
    }

    pub fn with_project(mut self, project: Arc<dyn ProjectRootResolver>) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ModuleSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn RouterFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn suppress_mounting(mut self, suppress: bool) -> Self {
        self.suppress_mounting = suppress;
        self
    }
}

/// pass-through 미들웨어. tower layer로 쓰면 inner service를 그대로 돌려주고,
/// `handle`은 다음 handler로 넘깁니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiddlewareHandler;

impl MiddlewareHandler {
    pub async fn handle(&self, request: Request, next: Next) -> Response {
        next.run(request).await
    }
}

impl<S> Layer<S> for MiddlewareHandler {
    type Service = S;

    fn layer(&self, inner: S) -> Self::Service {
        inner
    }
}

/// 호스트가 미들웨어 체인을 구성할 때 호출하는 진입점.
///
/// 즉시 반환합니다. 마운트가 억제되지 않았다면 호스트 준비 후 발견된 모듈을
/// 마운트하는 hook을 등록하며, 그 에러는 호스트의 hook 실행기로 전달됩니다.
pub fn build(ctx: BuildContext, hooks: &dyn HookRegistry) -> MiddlewareHandler {
    let cwd = resolve_project_root(ctx.project.as_deref());
    let config = config::resolve(
        &EffectiveConfig::default(),
        ctx.options
            .configuration
            .as_ref()
            .map(ConfigOverrides::from_value),
    );

    if ctx.suppress_mounting {
        tracing::info!("Skip mounting app modules as the dev server has been started embedded in a host server!");
    } else {
        let BuildContext { source, factory, .. } = ctx;
        hooks.hook(
            HOOK_NAME,
            mount_hook(move |registrar| mount_modules(cwd, config, source, factory, registrar)),
        );
    }

    MiddlewareHandler
}

fn resolve_project_root(project: Option<&dyn ProjectRootResolver>) -> PathBuf {
    project
        .and_then(|p| p.root_path())
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 탐색 순서대로 모듈을 하나씩 마운트합니다. 첫 실패에서 멈추며, 이미 등록된
/// router는 유지됩니다.
async fn mount_modules(
    cwd: PathBuf,
    config: EffectiveConfig,
    source: Arc<dyn ModuleSource>,
    factory: Arc<dyn RouterFactory>,
    registrar: Registrar,
) -> Result<(), MountError> {
    let mut modules = {
        let (cwd, config) = (cwd.clone(), config.clone());
        tokio::task::spawn_blocking(move || source.discover(&cwd, &config))
            .await
            .map_err(MountError::DiscoveryTask)??
    };
    let mut mounted: HashMap<String, String> = HashMap::new();

    loop {
        let (next, rest) = next_module(modules).await?;
        modules = rest;
        let Some(module) = next else {
            break;
        };
        let DiscoveredModule {
            module_id,
            mount_path,
            module_path,
        } = module?;

        let options = match config.module_options(&module_id) {
            None => None,
            Some(Value::Object(options)) => Some(options),
            Some(_) => return Err(MountError::InvalidModuleOptions { module_id }),
        };

        if let Some(first) = mounted.get(&mount_path) {
            return Err(MountError::MountPathCollision {
                mount_path,
                first: first.clone(),
                second: module_id,
            });
        }

        let options_suffix = options
            .map(|options| format!(" using options={}", Value::Object(options.clone())))
            .unwrap_or_default();
        tracing::info!(
            "Mounting {} to app {} (id={}){}",
            mount_path,
            module_path.display(),
            module_id,
            options_suffix
        );

        let router = factory.create_router();
        let router = factory
            .apply_middleware(
                router,
                MiddlewareOptions::new(cwd.clone(), module_path, &config, options),
            )
            .await
            .map_err(|source| MountError::RouterSetup {
                module_id: module_id.clone(),
                source,
            })?;

        registrar.use_router(&mount_path, router);
        mounted.insert(mount_path, module_id);
    }

    Ok(())
}

/// 블로킹 스레드풀에서 스트림을 한 단계 진행합니다. 파일시스템 소스는 단계마다
/// manifest를 읽습니다.
async fn next_module(
    mut modules: ModuleStream,
) -> Result<(Option<Result<DiscoveredModule, DiscoveryError>>, ModuleStream), MountError> {
    tokio::task::spawn_blocking(move || {
        let next = modules.next();
        (next, modules)
    })
    .await
    .map_err(MountError::DiscoveryTask)
}
