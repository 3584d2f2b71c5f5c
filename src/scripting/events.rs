//! 事件路由
//!
//! 把原生端触发的命名事件分发给三类监听者：
//!
//! 1. 函数监听者（按注册顺序）
//! 2. 默认槽（`obj.onload = fn`，每个事件至多一个）
//! 3. 接口对象（调用其与事件同名的方法，按注册顺序）
//!
//! `fire` 可在任意线程调用：它对监听者做快照，向主线程调度器投递一个分发
//! 任务后立即返回。单个监听者失败（返回错误或 panic）只记录日志，不影响
//! 后续监听者。

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::core::error::{BridgeError, BridgeResult};
use crate::core::scheduler::TaskScheduler;
use crate::scripting::object::{same_object, ScriptObjectRef};
use crate::value::Value;

#[derive(Default, Clone)]
struct Listeners {
    functions: Vec<ScriptObjectRef>,
    default_slot: Option<ScriptObjectRef>,
}

#[derive(Default)]
struct RouterState {
    events: BTreeSet<String>,
    listeners: BTreeMap<String, Listeners>,
    interfaces: Vec<ScriptObjectRef>,
}

/// 一次分发的监听者快照
struct Delivery {
    name: String,
    args: Vec<Value>,
    listeners: Listeners,
    interfaces: Vec<ScriptObjectRef>,
}

impl Delivery {
    fn is_empty(&self) -> bool {
        self.listeners.functions.is_empty()
            && self.listeners.default_slot.is_none()
            && self.interfaces.is_empty()
    }

    fn run(self) -> usize {
        let mut delivered = 0;
        for function in &self.listeners.functions {
            delivered += deliver_one(&self.name, "function", function, |f| {
                f.invoke_default(&self.args)
            });
        }
        if let Some(slot) = &self.listeners.default_slot {
            delivered += deliver_one(&self.name, "default", slot, |f| f.invoke_default(&self.args));
        }
        for iface in &self.interfaces {
            if !iface.has_method(&self.name) {
                continue;
            }
            delivered += deliver_one(&self.name, "interface", iface, |i| {
                i.invoke(&self.name, &self.args)
            });
        }
        delivered
    }
}

fn deliver_one<F>(event: &str, kind: &'static str, listener: &ScriptObjectRef, call: F) -> usize
where
    F: FnOnce(&ScriptObjectRef) -> BridgeResult<Value>,
{
    if !listener.is_valid() {
        tracing::debug!(target: "bridge::events", event, kind, "skipping invalidated listener");
        return 0;
    }
    match catch_unwind(AssertUnwindSafe(|| call(listener))) {
        Ok(Ok(_)) => 1,
        Ok(Err(err)) => {
            tracing::warn!(target: "bridge::events", event, kind, error = %err, "event listener failed");
            0
        }
        Err(_) => {
            tracing::warn!(target: "bridge::events", event, kind, "event listener panicked");
            0
        }
    }
}

/// 事件路由器
pub struct EventRouter {
    prefix: Option<String>,
    state: Mutex<RouterState>,
    scheduler: RwLock<Option<Arc<dyn TaskScheduler>>>,
}

impl EventRouter {
    /// # 参数
    ///
    /// * `prefix` - 事件名必须带的前缀，`None` 表示不检查
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            state: Mutex::new(RouterState::default()),
            scheduler: RwLock::new(None),
        }
    }

    pub fn set_scheduler(&self, scheduler: Arc<dyn TaskScheduler>) {
        *self.scheduler.write() = Some(scheduler);
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.read().is_some()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn check_name(&self, name: &str) -> BridgeResult<()> {
        match &self.prefix {
            Some(prefix) if !name.starts_with(prefix.as_str()) || name.len() == prefix.len() => {
                Err(BridgeError::InvalidEventName(name.to_string()))
            }
            _ if name.is_empty() => Err(BridgeError::InvalidEventName(name.to_string())),
            _ => Ok(()),
        }
    }

    /// 把不带前缀的 DOM 事件类型（`load`）转换为事件名（`onload`）
    pub fn event_name_for_type(&self, event_type: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, event_type),
            None => event_type.to_string(),
        }
    }

    /// 注册事件；重复注册是幂等的
    pub fn register_event(&self, name: &str) -> BridgeResult<()> {
        self.check_name(name)?;
        self.state.lock().events.insert(name.to_string());
        Ok(())
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.state.lock().events.contains(name)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.state.lock().events.iter().cloned().collect()
    }

    /// 添加函数监听者；同一函数重复添加只保留一次
    pub fn add_listener(&self, name: &str, listener: ScriptObjectRef) -> BridgeResult<()> {
        self.check_name(name)?;
        let mut state = self.state.lock();
        let entry = state.listeners.entry(name.to_string()).or_default();
        if !entry.functions.iter().any(|f| same_object(f, &listener)) {
            entry.functions.push(listener);
        }
        Ok(())
    }

    pub fn remove_listener(&self, name: &str, listener: &ScriptObjectRef) -> BridgeResult<()> {
        self.check_name(name)?;
        if let Some(entry) = self.state.lock().listeners.get_mut(name) {
            entry.functions.retain(|f| !same_object(f, listener));
        }
        Ok(())
    }

    pub fn add_interface(&self, listener: ScriptObjectRef) {
        let mut state = self.state.lock();
        if !state.interfaces.iter().any(|i| same_object(i, &listener)) {
            state.interfaces.push(listener);
        }
    }

    pub fn remove_interface(&self, listener: &ScriptObjectRef) {
        self.state
            .lock()
            .interfaces
            .retain(|i| !same_object(i, listener));
    }

    pub fn default_listener(&self, name: &str) -> Option<ScriptObjectRef> {
        self.state
            .lock()
            .listeners
            .get(name)
            .and_then(|l| l.default_slot.clone())
    }

    /// 设置或清除默认槽
    pub fn set_default_listener(
        &self,
        name: &str,
        listener: Option<ScriptObjectRef>,
    ) -> BridgeResult<()> {
        self.check_name(name)?;
        self.state
            .lock()
            .listeners
            .entry(name.to_string())
            .or_default()
            .default_slot = listener;
        Ok(())
    }

    pub fn listener_count(&self, name: &str) -> usize {
        let state = self.state.lock();
        let own = state
            .listeners
            .get(name)
            .map(|l| l.functions.len() + usize::from(l.default_slot.is_some()))
            .unwrap_or(0);
        own + state.interfaces.len()
    }

    /// 触发事件
    ///
    /// 投递成功即返回，不等待脚本执行。没有调度器或调度器拒绝任务时返回
    /// `HostUnavailable`。
    pub fn fire(&self, name: &str, args: Vec<Value>) -> BridgeResult<()> {
        let scheduler = self
            .scheduler
            .read()
            .clone()
            .ok_or(BridgeError::HostUnavailable("main thread scheduler"))?;

        let delivery = {
            let state = self.state.lock();
            Delivery {
                name: name.to_string(),
                args,
                listeners: state.listeners.get(name).cloned().unwrap_or_default(),
                interfaces: state.interfaces.clone(),
            }
        };
        if delivery.is_empty() {
            tracing::trace!(target: "bridge::events", event = name, "no listeners");
            return Ok(());
        }

        let event = delivery.name.clone();
        let accepted = scheduler.schedule(Box::new(move || {
            let delivered = delivery.run();
            tracing::trace!(target: "bridge::events", event = %event, delivered, "event delivered");
        }));
        if accepted {
            Ok(())
        } else {
            tracing::warn!(target: "bridge::events", event = name, "main thread scheduler rejected event");
            Err(BridgeError::HostUnavailable("main thread scheduler"))
        }
    }

    /// 清除全部监听者（对象失效时调用）
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.listeners.clear();
        state.interfaces.clear();
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(Some("on".to_string()))
    }
}
