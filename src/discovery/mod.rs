//! App 모듈 탐색
//!
//! `project.toml`에 선언된 glob 패턴을 따라 프로젝트 루트에서 `module.toml`을
//! 가진 디렉토리를 찾습니다. manifest는 반환된 시퀀스를 진행할 때 하나씩
//! 파싱합니다.

pub mod manifest;

use std::collections::{HashMap, HashSet};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use crate::config::EffectiveConfig;
use crate::mount::error::DiscoveryError;
use manifest::{normalize_mount_path, ModuleManifest, ProjectMetadata, MODULE_MANIFEST_FILE};

/// 프로젝트 루트 아래에서 발견된 app 모듈 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    pub module_id: String,
    pub mount_path: String,
    pub module_path: PathBuf,
}

/// 발견된 모듈의 일회용 순차 시퀀스
pub type ModuleStream = Box<dyn Iterator<Item = Result<DiscoveredModule, DiscoveryError>> + Send>;

/// 프로젝트의 app 모듈을 나열할 수 있는 소스
pub trait ModuleSource: Send + Sync {
    /// 여기서 반환되는 에러는 모듈을 하나도 내보내기 전에 발생합니다.
    /// 스트림 안의 에러는 스트림을 종료시킵니다.
    fn discover(&self, cwd: &Path, config: &EffectiveConfig) -> Result<ModuleStream, DiscoveryError>;
}

/// 로컬 파일시스템에서 모듈을 탐색합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModuleSource;

impl ModuleSource for FsModuleSource {
    fn discover(&self, cwd: &Path, config: &EffectiveConfig) -> Result<ModuleStream, DiscoveryError> {
        let root = absolute(cwd);
        let project = ProjectMetadata::load(&root)?;
        let candidates = collect_candidates(&root, &project.project.modules)?;

        if config.debug {
            tracing::info!(
                "Found {} module candidate(s) under {}",
                candidates.len(),
                root.display()
            );
        } else {
            tracing::debug!(
                "Found {} module candidate(s) under {}",
                candidates.len(),
                root.display()
            );
        }

        Ok(Box::new(DiscoveredModules::new(candidates, config.clone())))
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// 패턴 순서가 우선이고, 패턴 안에서는 경로 순서입니다. 여러 패턴에 걸린
/// 디렉토리는 처음 위치에만 남깁니다.
fn collect_candidates(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for pattern in patterns {
        let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern.trim_start_matches('/'));
        let paths = glob::glob(&full).map_err(|source| DiscoveryError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let mut matched: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping unreadable path while scanning '{}': {}", pattern, e);
                    None
                }
            })
            .filter(|path| path.is_dir() && path.join(MODULE_MANIFEST_FILE).is_file())
            .collect();
        matched.sort();

        for path in matched {
            if seen.insert(path.clone()) {
                candidates.push(path);
            }
        }
    }

    Ok(candidates)
}

/// 후보 디렉토리를 지연 순회하는 iterator. 첫 에러 이후로는 계속 None을 반환합니다.
pub struct DiscoveredModules {
    candidates: std::vec::IntoIter<PathBuf>,
    config: EffectiveConfig,
    seen_ids: HashMap<String, PathBuf>,
    failed: bool,
}

impl DiscoveredModules {
    fn new(candidates: Vec<PathBuf>, config: EffectiveConfig) -> Self {
        Self {
            candidates: candidates.into_iter(),
            config,
            seen_ids: HashMap::new(),
            failed: false,
        }
    }

    fn load(&mut self, dir: PathBuf) -> Result<DiscoveredModule, DiscoveryError> {
        let manifest = ModuleManifest::load(&dir)?;

        let module_id = manifest
            .module
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| {
                dir.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        if let Some(first) = self.seen_ids.get(&module_id) {
            return Err(DiscoveryError::DuplicateModuleId {
                module_id,
                first: first.clone(),
                second: dir,
            });
        }
        self.seen_ids.insert(module_id.clone(), dir.clone());

        let configured = self
            .config
            .module_options(&module_id)
            .and_then(|options| options.get("mountPath"))
            .and_then(|path| path.as_str());
        let mount_path = normalize_mount_path(
            configured
                .or(manifest.module.mount_path.as_deref())
                .unwrap_or(&module_id),
        );

        if self.config.debug {
            tracing::info!("Discovered module {} at {} -> {}", module_id, dir.display(), mount_path);
        } else {
            tracing::debug!("Discovered module {} at {} -> {}", module_id, dir.display(), mount_path);
        }

        Ok(DiscoveredModule {
            module_id,
            mount_path,
            module_path: dir,
        })
    }
}

impl Iterator for DiscoveredModules {
    type Item = Result<DiscoveredModule, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let dir = self.candidates.next()?;
        let result = self.load(dir);
        self.failed = result.is_err();
        Some(result)
    }
}

impl FusedIterator for DiscoveredModules {}
