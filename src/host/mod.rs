//! 호스트 측 등록 hook
//!
//! extension은 서버 구성 중에 hook을 등록합니다. 서버가 router 등록을 받을
//! 준비가 되면 hook이 순서대로 실행되고, 등록된 router는 모두 호스트 router에
//! nest됩니다.

use axum::Router;
use futures_util::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use crate::mount::error::{HostError, MountError};

/// 호스트가 router 등록을 받을 수 있을 때 실행되는 콜백
pub type MountHook = Box<dyn FnOnce(Registrar) -> BoxFuture<'static, Result<(), MountError>> + Send>;

/// async 콜백을 [`MountHook`]으로 boxing합니다.
pub fn mount_hook<F, Fut>(callback: F) -> MountHook
where
    F: FnOnce(Registrar) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), MountError>> + Send + 'static,
{
    Box::new(move |registrar: Registrar| callback(registrar).boxed())
}

/// extension이 hook을 등록하는 곳
pub trait HookRegistry {
    fn hook(&self, name: &'static str, callback: MountHook);
}

/// 경로에 등록된 router
pub struct Mount {
    pub path: String,
    pub router: Router,
}

/// hook에 전달되며 `use(path, router)` 등록을 순서대로 기록합니다.
#[derive(Clone, Default)]
pub struct Registrar {
    mounts: Arc<Mutex<Vec<Mount>>>,
}

impl Registrar {
    pub fn use_router(&self, path: &str, router: Router) {
        let mut mounts = self.mounts.lock().unwrap_or_else(|e| e.into_inner());
        mounts.push(Mount {
            path: path.to_string(),
            router,
        });
    }

    pub fn paths(&self) -> Vec<String> {
        let mounts = self.mounts.lock().unwrap_or_else(|e| e.into_inner());
        mounts.iter().map(|m| m.path.clone()).collect()
    }
}

/// 최소 개발 서버 호스트
#[derive(Default)]
pub struct DevServer {
    hooks: Mutex<Vec<(&'static str, MountHook)>>,
    registrar: Registrar,
}

impl HookRegistry for DevServer {
    fn hook(&self, name: &'static str, callback: MountHook) {
        tracing::debug!("Hook '{}' registered", name);
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name, callback));
    }
}

impl DevServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_hooks(&self) -> usize {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 등록 순서대로의 마운트 경로 목록
    pub fn mounts(&self) -> Vec<String> {
        self.registrar.paths()
    }

    /// 대기 중인 hook을 등록 순서대로 실행하고, 등록된 router를 모두 `base`에
    /// nest합니다.
    ///
    /// hook이 실패하면 시작이 중단됩니다. 실패 전에 등록된 router는 마운트
    /// 테이블에 남습니다.
    pub async fn ready(&self, base: Router) -> Result<Router, HostError> {
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap_or_else(|e| e.into_inner()));
        for (name, hook) in hooks {
            tracing::debug!("Running hook '{}'", name);
            hook(self.registrar.clone())
                .await
                .map_err(|source| HostError::Hook { name, source })?;
        }
        self.compose(base)
    }

    /// 같은 경로는 먼저 등록된 router가 이기고, 이후 등록은 가려집니다.
    ///
    /// axum이 nest를 거부하는 router(wildcard 경로, `base`나 앞선 마운트가 이미
    /// 서빙하는 route)는 [`HostError::MountRejected`]로 시작을 실패시킵니다.
    fn compose(&self, base: Router) -> Result<Router, HostError> {
        let mounts = self.registrar.mounts.lock().unwrap_or_else(|e| e.into_inner());
        let mut nested = HashSet::new();
        let mut router = base;
        for mount in mounts.iter() {
            if !nested.insert(mount.path.as_str()) {
                tracing::warn!("Router at {} is shadowed by an earlier registration", mount.path);
                continue;
            }
            router = if mount.path == "/" {
                router.fallback_service(mount.router.clone())
            } else {
                nest_checked(router, &mount.path, mount.router.clone())?
            };
        }
        Ok(router)
    }
}

fn nest_checked(router: Router, path: &str, nested: Router) -> Result<Router, HostError> {
    let rejected = |reason: String| HostError::MountRejected {
        path: path.to_string(),
        reason,
    };
    if !path.starts_with('/') {
        return Err(rejected("path must start with '/'".to_string()));
    }
    if path.contains('*') {
        return Err(rejected("path must not contain wildcards".to_string()));
    }
    // axum은 route 충돌을 router 구성 중 panic으로 알립니다.
    std::panic::catch_unwind(AssertUnwindSafe(move || router.nest(path, nested)))
        .map_err(|payload| rejected(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "route conflict".to_string())
}
