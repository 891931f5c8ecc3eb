//! 适配层配置。
//!
//! 配置可以直接构造，也可以从 TOML 片段加载：
//!
//! ```toml
//! version = "1.0"
//! cleanup_close_timeout_ms = 2000
//! connection_id = "ws-edge-01"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 发布给调用方的默认协议版本。
pub const DEFAULT_VERSION: &str = "1.0";

const DEFAULT_CLEANUP_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 配置加载或校验失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse websocket adapter config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid websocket adapter config: {reason}")]
    Invalid { reason: &'static str },
}

/// 适配层配置。
///
/// # 教案式说明
/// - **意图 (Why)**：把发布的版本号、清理阶段的关闭时限与连接标识集中在一处，
///   宿主可从配置文件统一下发；
/// - **契约 (What)**：
///   - `version`：发布到能力环境中的版本字符串，默认 `"1.0"`；
///   - `cleanup_close_timeout`：清理时完成关闭握手的最长等待，超时后改为中止；
///   - `connection_id`：日志中的连接标识，缺省时由适配层自动生成；
/// - **风险 (Trade-offs)**：时限过短会让本可优雅完成的握手退化为中止，但不会造成挂起。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    pub version: String,
    #[serde(rename = "cleanup_close_timeout_ms", with = "duration_ms")]
    pub cleanup_close_timeout: Duration,
    pub connection_id: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_owned(),
            cleanup_close_timeout: DEFAULT_CLEANUP_CLOSE_TIMEOUT,
            connection_id: None,
        }
    }
}

impl AdapterConfig {
    /// 从 TOML 文本加载并校验配置；缺省字段取默认值。
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_cleanup_close_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_close_timeout = timeout;
        self
    }

    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// 校验配置的自洽性。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "version must not be empty",
            });
        }
        if self.cleanup_close_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                reason: "cleanup_close_timeout_ms must be greater than zero",
            });
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AdapterConfig::from_toml_str("").unwrap();
        assert_eq!(config, AdapterConfig::default());
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn fields_are_loaded_from_toml() {
        let config = AdapterConfig::from_toml_str(
            r#"
            version = "1.1"
            cleanup_close_timeout_ms = 250
            connection_id = "edge-7"
            "#,
        )
        .unwrap();
        assert_eq!(config.version, "1.1");
        assert_eq!(config.cleanup_close_timeout, Duration::from_millis(250));
        assert_eq!(config.connection_id.as_deref(), Some("edge-7"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AdapterConfig::from_toml_str("cleanup_close_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AdapterConfig::from_toml_str("verison = \"1.0\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn serialized_form_reloads_identically() {
        let config = AdapterConfig::default()
            .with_version("2.0")
            .with_cleanup_close_timeout(Duration::from_millis(1500))
            .with_connection_id("c-1");
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("cleanup_close_timeout_ms = 1500"));
        assert_eq!(AdapterConfig::from_toml_str(&text).unwrap(), config);
    }
}
