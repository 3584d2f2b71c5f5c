/// 值封送配置

use serde::{Deserialize, Serialize};
use super::ConfigResult;

/// 值封送配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarshalConfig {
    /// 严格模式：无法表示的值类型返回错误，而不是静默转换为 void
    pub strict_types: bool,
}

crate::impl_default!(MarshalConfig { strict_types: false });

impl MarshalConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}
