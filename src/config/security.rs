/// 安全区配置

use serde::{Deserialize, Serialize};
use super::{ConfigError, ConfigResult};
use crate::scripting::zone::SecurityZone;

/// 安全区配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// 新建脚本对象的默认安全区
    pub default_zone: SecurityZone,
}

crate::impl_default!(SecurityConfig {
    default_zone: SecurityZone::PUBLIC,
});

impl SecurityConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_zone < SecurityZone::PUBLIC {
            return Err(ConfigError::ValidationError(format!(
                "Invalid default zone: {}",
                self.default_zone
            )));
        }
        Ok(())
    }
}
