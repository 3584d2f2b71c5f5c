//! 插件生命周期
//!
//! 进程内所有插件实例共享一个活动计数：第一个实例创建时执行全局初始化，
//! 最后一个实例销毁时执行全局反初始化。计数变化与这两个回调都在
//! `TRANSITION` 锁内完成，因此并发创建/销毁实例时它们不会交错；计数本身
//! 另有一把锁，回调里可以读取 `active_instance_count()`。

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bindings::protocol::BrowserHost;
use crate::config::{LogLevel, LoggingConfig};
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::logging::init_logging;
use crate::scripting::object::ScriptObjectRef;

static TRANSITION: Mutex<()> = parking_lot::const_mutex(());
static ACTIVE_INSTANCES: Mutex<usize> = parking_lot::const_mutex(0);
static PLATFORM: Mutex<Option<Platform>> = parking_lot::const_mutex(None);

/// 宿主平台信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub browser: String,
}

/// 记录宿主平台，由入口点在创建实例前调用
pub fn set_platform(os: &str, browser: &str) {
    *PLATFORM.lock() = Some(Platform {
        os: os.to_string(),
        browser: browser.to_string(),
    });
}

pub fn platform() -> Option<Platform> {
    PLATFORM.lock().clone()
}

/// 当前存活的插件实例数
pub fn active_instance_count() -> usize {
    *ACTIVE_INSTANCES.lock()
}

/// 插件工厂
///
/// 每个插件提供一个工厂：名称、全局初始化钩子，以及根脚本对象的构造。
///
/// 全局钩子运行期间持有实例切换锁：钩子内可以调用 `active_instance_count()`，
/// 但不能创建或销毁 `PluginInstance`，否则会死锁。
pub trait PluginFactory: Send + Sync {
    fn plugin_name(&self) -> String;

    fn plugin_description(&self) -> String {
        String::new()
    }

    /// 第一个实例创建时安装日志订阅者所用的级别
    fn log_level(&self) -> LogLevel {
        LogLevel::Info
    }

    /// 第一个实例创建时调用一次
    fn global_plugin_initialize(&self) {}

    /// 最后一个实例销毁时调用一次
    fn global_plugin_deinitialize(&self) {}

    /// 构造暴露给页面的根脚本对象
    fn create_root_api(&self, host: Option<&Arc<dyn BrowserHost>>) -> BridgeResult<ScriptObjectRef>;
}

/// 单个插件实例
pub struct PluginInstance {
    factory: Arc<dyn PluginFactory>,
    host: RwLock<Option<Arc<dyn BrowserHost>>>,
    root: Mutex<Option<ScriptObjectRef>>,
    shut_down: AtomicBool,
}

impl PluginInstance {
    pub fn new(factory: Arc<dyn PluginFactory>) -> Self {
        {
            let _transition = TRANSITION.lock();
            let first = {
                let mut active = ACTIVE_INSTANCES.lock();
                *active += 1;
                *active == 1
            };
            if first {
                init_logging(&LoggingConfig {
                    level: factory.log_level(),
                    ..LoggingConfig::default()
                });
                tracing::info!(target: "bridge::lifecycle", plugin = %factory.plugin_name(), "global plugin initialize");
                factory.global_plugin_initialize();
            }
        }
        Self {
            factory,
            host: RwLock::new(None),
            root: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn factory(&self) -> &Arc<dyn PluginFactory> {
        &self.factory
    }

    pub fn set_host(&self, host: Arc<dyn BrowserHost>) {
        *self.host.write() = Some(host);
    }

    pub fn host(&self) -> Option<Arc<dyn BrowserHost>> {
        self.host.read().clone()
    }

    /// 根脚本对象，第一次访问时创建
    pub fn root_api(&self) -> BridgeResult<ScriptObjectRef> {
        if self.is_shut_down() {
            return Err(BridgeError::Invalidated);
        }
        let mut root = self.root.lock();
        if let Some(api) = root.as_ref() {
            return Ok(Arc::clone(api));
        }
        let host = self.host();
        let api = self.factory.create_root_api(host.as_ref())?;
        *root = Some(Arc::clone(&api));
        Ok(api)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// 使根对象失效并关闭宿主；可重复调用
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let root = self.root.lock().take();
        if let Some(root) = root {
            root.invalidate();
        }
        let host = self.host.write().take();
        if let Some(host) = host {
            host.shutdown();
        }
        tracing::debug!(target: "bridge::lifecycle", plugin = %self.factory.plugin_name(), "plugin instance shut down");
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        self.shutdown();
        let _transition = TRANSITION.lock();
        let last = {
            let mut active = ACTIVE_INSTANCES.lock();
            *active = active.saturating_sub(1);
            *active == 0
        };
        if last {
            tracing::info!(target: "bridge::lifecycle", plugin = %self.factory.plugin_name(), "global plugin deinitialize");
            self.factory.global_plugin_deinitialize();
        }
    }
}
