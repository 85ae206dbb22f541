//! `project.toml` / `module.toml` 파싱

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mount::error::DiscoveryError;

pub const PROJECT_METADATA_FILE: &str = "project.toml";
pub const MODULE_MANIFEST_FILE: &str = "module.toml";
pub const DEFAULT_WEBAPP_DIR: &str = "webapp";

/// 프로젝트 메타데이터: app 모듈 위치
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub project: ProjectSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// 프로젝트 루트 기준 glob 패턴
    pub modules: Vec<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            modules: vec!["app/*".to_string()],
        }
    }
}

impl ProjectMetadata {
    /// `<root>/project.toml`을 읽습니다. 파일이 없으면 기본값을 사용합니다.
    pub fn load(root: &Path) -> Result<Self, DiscoveryError> {
        let path = root.join(PROJECT_METADATA_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| DiscoveryError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| DiscoveryError::ProjectMetadata { path, source })
    }
}

/// 모듈의 `module.toml` 내용
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub module: ModuleSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSection {
    pub id: Option<String>,
    pub mount_path: Option<String>,
    pub namespace: Option<String>,
    pub webapp: Option<String>,
}

impl ModuleManifest {
    pub fn parse(path: &Path, content: &str) -> Result<Self, DiscoveryError> {
        toml::from_str(content).map_err(|source| DiscoveryError::ModuleManifest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(module_dir: &Path) -> Result<Self, DiscoveryError> {
        let path = module_dir.join(MODULE_MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|source| DiscoveryError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&path, &content)
    }

    pub fn webapp_dir(&self) -> &str {
        self.module
            .webapp
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .unwrap_or(DEFAULT_WEBAPP_DIR)
    }

    /// `sample.app` → `sample/app`
    pub fn namespace_path(&self) -> Option<String> {
        self.module
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(|ns| ns.replace('.', "/"))
    }
}

/// 마운트 경로를 앞쪽 슬래시 하나, 뒤쪽 슬래시 없음 형태로 정규화합니다.
pub fn normalize_mount_path(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.trim().is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path("app"), "/app");
        assert_eq!(normalize_mount_path("/app/"), "/app");
        assert_eq!(normalize_mount_path("//a//b/"), "/a/b");
        assert_eq!(normalize_mount_path(""), "/");
        assert_eq!(normalize_mount_path("/"), "/");
    }

    #[test]
    fn test_manifest_without_module_section() {
        let manifest = ModuleManifest::parse(Path::new("module.toml"), "").unwrap();
        assert!(manifest.module.id.is_none());
        assert_eq!(manifest.webapp_dir(), "webapp");
        assert_eq!(manifest.namespace_path(), None);
    }

    #[test]
    fn test_manifest_fields() {
        let manifest = ModuleManifest::parse(
            Path::new("module.toml"),
            r#"
[module]
id = "sample.app"
mount_path = "/sample"
namespace = "sample.app"
webapp = "dist"
"#,
        )
        .unwrap();
        assert_eq!(manifest.module.id.as_deref(), Some("sample.app"));
        assert_eq!(manifest.module.mount_path.as_deref(), Some("/sample"));
        assert_eq!(manifest.namespace_path().as_deref(), Some("sample/app"));
        assert_eq!(manifest.webapp_dir(), "dist");
    }

    #[test]
    fn test_malformed_manifest_reports_path() {
        let err = ModuleManifest::parse(Path::new("/proj/app/a/module.toml"), "[module").unwrap_err();
        assert_eq!(err.error_code(), "MODULE_MANIFEST");
        assert!(err.to_string().contains("/proj/app/a/module.toml"));
    }

    #[test]
    fn test_project_metadata_defaults_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let meta = ProjectMetadata::load(tmp.path()).unwrap();
        assert_eq!(meta.project.modules, vec!["app/*"]);
    }

    #[test]
    fn test_project_metadata_custom_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(PROJECT_METADATA_FILE),
            "[project]\nmodules = [\"apps/*\", \"libs/ui\"]\n",
        )
        .unwrap();
        let meta = ProjectMetadata::load(tmp.path()).unwrap();
        assert_eq!(meta.project.modules, vec!["apps/*", "libs/ui"]);
    }
}
