//! 미들웨어 유효 설정(effective configuration)과 dev server 설정 파일.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 모듈별 옵션. raw JSON 그대로 보관하고, 발견된 모듈이 실제로 사용할 때만
/// 형태를 검사합니다.
pub type ModuleOptions = Value;

/// 마운트 사이클 하나가 사용하는 설정. `build` 호출마다 한 번 계산되며
/// 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub debug: bool,
    pub serve_from_namespace: bool,
    pub modules: HashMap<String, ModuleOptions>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            debug: false,
            serve_from_namespace: true,
            modules: HashMap::new(),
        }
    }
}

impl EffectiveConfig {
    pub fn module_options(&self, module_id: &str) -> Option<&ModuleOptions> {
        self.modules.get(module_id)
    }
}

/// 호출자가 넘긴 부분 설정. `Some` 필드는 기본값을 통째로 대체합니다
/// (`modules` 포함).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub debug: Option<bool>,
    pub serve_from_namespace: Option<bool>,
    pub modules: Option<HashMap<String, ModuleOptions>>,
}

impl ConfigOverrides {
    /// 임의 형태의 값에서 override를 읽습니다.
    ///
    /// 실패하지 않습니다. object가 아니면 빈 override가 되고, 타입이 맞지 않는
    /// 키는 경고 후 무시합니다.
    pub fn from_value(value: &Value) -> Self {
        let mut overrides = Self::default();
        let Some(object) = value.as_object() else {
            if !value.is_null() {
                tracing::warn!("Ignoring middleware configuration that is not a table: {}", value);
            }
            return overrides;
        };

        for (key, entry) in object {
            match key.as_str() {
                "debug" => match entry.as_bool() {
                    Some(flag) => overrides.debug = Some(flag),
                    None => warn_wrong_type(key, "a boolean", entry),
                },
                "serveFromNamespace" | "serve_from_namespace" => match entry.as_bool() {
                    Some(flag) => overrides.serve_from_namespace = Some(flag),
                    None => warn_wrong_type(key, "a boolean", entry),
                },
                "modules" => match entry.as_object() {
                    Some(modules) => {
                        overrides.modules = Some(
                            modules
                                .iter()
                                .map(|(id, options)| (id.clone(), options.clone()))
                                .collect(),
                        );
                    }
                    None => warn_wrong_type(key, "a table", entry),
                },
                other => tracing::debug!("Ignoring unknown configuration key '{}'", other),
            }
        }

        overrides
    }
}

fn warn_wrong_type(key: &str, expected: &str, found: &Value) {
    tracing::warn!(
        "Ignoring configuration key '{}': expected {}, found {}",
        key,
        expected,
        found
    );
}

/// `defaults` 위에 `overrides`를 얕게(shallow) 병합합니다.
pub fn resolve(defaults: &EffectiveConfig, overrides: Option<ConfigOverrides>) -> EffectiveConfig {
    let Some(overrides) = overrides else {
        return defaults.clone();
    };
    EffectiveConfig {
        debug: overrides.debug.unwrap_or(defaults.debug),
        serve_from_namespace: overrides
            .serve_from_namespace
            .unwrap_or(defaults.serve_from_namespace),
        modules: overrides
            .modules
            .unwrap_or_else(|| defaults.modules.clone()),
    }
}

/// dev server 설정 파일 기본 위치 (작업 디렉토리 기준)
pub const DEFAULT_CONFIG_PATH: &str = "app-mount.toml";

/// `app-mount.toml`에서 읽는 dev server 설정
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub project_root: Option<PathBuf>,
    /// 미들웨어의 `options.configuration`으로 그대로 전달됩니다.
    pub configuration: Option<toml::Table>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            project_root: None,
            configuration: None,
        }
    }
}

impl ServerConfig {
    /// `path`의 파일을 읽습니다. 파일이 없으면 기본값을 사용합니다.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn configuration_value(&self) -> Option<Value> {
        self.configuration
            .as_ref()
            .and_then(|table| serde_json::to_value(table).ok())
    }
}
