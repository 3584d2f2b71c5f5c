//! 核心模块
//!
//! 包含桥接层的基础设施：
//! - `error` - 错误类型定义
//! - `lifecycle` - 插件实例与全局初始化
//! - `logging` - 日志初始化
//! - `scheduler` - 主线程任务投递
//! - `thread_guard` - 主线程亲和性断言

pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod scheduler;
pub mod thread_guard;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{BridgeError, BridgeResult, ConversionError, ErrorKind};

// 重新导出主要类型
pub use lifecycle::{active_instance_count, PluginFactory, PluginInstance};
pub use logging::init_logging;
pub use scheduler::{MainThreadHandle, MainThreadQueue, Task, TaskScheduler};
pub use thread_guard::ThreadAffinity;
