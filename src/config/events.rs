/// 事件配置

use serde::{Deserialize, Serialize};
use super::{ConfigError, ConfigResult};

/// 事件配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// 事件名是否必须带前缀
    pub require_prefix: bool,

    /// 事件名前缀
    pub prefix: String,
}

crate::impl_default!(EventConfig {
    require_prefix: true,
    prefix: "on".to_string(),
});

impl EventConfig {
    /// 实际生效的前缀；不要求前缀时为 `None`
    pub fn effective_prefix(&self) -> Option<String> {
        self.require_prefix.then(|| self.prefix.clone())
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.require_prefix && self.prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "Event prefix is required but empty".to_string(),
            ));
        }
        if !self.prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::ValidationError(format!(
                "Invalid event prefix: {}",
                self.prefix
            )));
        }
        Ok(())
    }
}
