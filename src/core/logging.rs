//! 日志初始化
//!
//! 安装全局 `tracing` 订阅者。`RUST_LOG` 存在时优先生效，否则使用配置中的
//! 日志级别。重复初始化不会报错：宿主可能在同一进程中加载多个插件实例。

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 根据配置安装全局订阅者
///
/// 返回本次调用是否真正安装了订阅者。
///
/// # 示例
///
/// ```rust,no_run
/// use script_bridge::config::LoggingConfig;
/// use script_bridge::core::logging::init_logging;
///
/// init_logging(&LoggingConfig::default());
/// ```
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    if config.log_to_file {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file_path)
        {
            Ok(file) => {
                return tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
                    .is_ok();
            }
            Err(err) => {
                eprintln!(
                    "Failed to open log file {}: {}, logging to console",
                    config.log_file_path, err
                );
            }
        }
    }

    if !config.log_to_console {
        return false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
