//! 탐색 / 마운트 / 호스트 시작 에러 타입. 모든 variant가 기계 판독용 코드를
//! 가지므로 호스트의 시작 실패 보고에서 종류별로 분기할 수 있습니다.

use std::path::PathBuf;

/// 프로젝트 루트 아래 app 모듈 나열 중 발생하는 에러
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed project metadata in {}", path.display())]
    ProjectMetadata {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Malformed module manifest in {}", path.display())]
    ModuleManifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid module pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Module id '{module_id}' is declared by both {} and {}", first.display(), second.display())]
    DuplicateModuleId {
        module_id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl DiscoveryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "DISCOVERY_IO",
            Self::ProjectMetadata { .. } => "PROJECT_METADATA",
            Self::ModuleManifest { .. } => "MODULE_MANIFEST",
            Self::Pattern { .. } => "MODULE_PATTERN",
            Self::DuplicateModuleId { .. } => "DUPLICATE_MODULE_ID",
        }
    }
}

/// 마운트 hook 내부 에러. 이미 등록된 router는 롤백하지 않습니다.
#[derive(thiserror::Error, Debug)]
pub enum MountError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Options for module '{module_id}' must be a table")]
    InvalidModuleOptions { module_id: String },

    #[error("Failed to set up router for module '{module_id}'")]
    RouterSetup {
        module_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Mount path '{mount_path}' is used by both '{first}' and '{second}'")]
    MountPathCollision {
        mount_path: String,
        first: String,
        second: String,
    },

    #[error("Discovery task did not complete")]
    DiscoveryTask(#[source] tokio::task::JoinError),
}

impl MountError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Discovery(e) => e.error_code(),
            Self::InvalidModuleOptions { .. } => "INVALID_MODULE_OPTIONS",
            Self::RouterSetup { .. } => "ROUTER_SETUP",
            Self::MountPathCollision { .. } => "MOUNT_PATH_COLLISION",
            Self::DiscoveryTask(_) => "DISCOVERY_TASK",
        }
    }
}

/// 호스트 시작 실패: 등록된 hook 실패 또는 router 조립 거부
#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("Hook '{name}' failed")]
    Hook {
        name: &'static str,
        #[source]
        source: MountError,
    },

    #[error("Router at '{path}' cannot be mounted: {reason}")]
    MountRejected { path: String, reason: String },
}

impl HostError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Hook { source, .. } => source.error_code(),
            Self::MountRejected { .. } => "MOUNT_REJECTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_codes_pass_through_mount_error() {
        let err = MountError::from(DiscoveryError::DuplicateModuleId {
            module_id: "app".to_string(),
            first: PathBuf::from("/proj/a"),
            second: PathBuf::from("/proj/b"),
        });
        assert_eq!(err.error_code(), "DUPLICATE_MODULE_ID");
        assert!(err.to_string().contains("'app'"));
    }

    #[test]
    fn test_host_error_reports_hook_name() {
        let err = HostError::Hook {
            name: "app-mount",
            source: MountError::MountPathCollision {
                mount_path: "/a".to_string(),
                first: "one".to_string(),
                second: "two".to_string(),
            },
        };
        assert_eq!(err.error_code(), "MOUNT_PATH_COLLISION");
        assert_eq!(err.to_string(), "Hook 'app-mount' failed");
    }

    #[test]
    fn test_chain_lists_each_cause_once() {
        let err = anyhow::Error::new(HostError::Hook {
            name: "app-mount",
            source: MountError::RouterSetup {
                module_id: "app".to_string(),
                source: anyhow::anyhow!("cannot read manifest"),
            },
        });
        let chain = format!("{err:#}");
        assert_eq!(
            chain,
            "Hook 'app-mount' failed: Failed to set up router for module 'app': cannot read manifest"
        );
        assert_eq!(chain.matches("cannot read manifest").count(), 1);
    }
}
