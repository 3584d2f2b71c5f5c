//! 自动分发的原生脚本对象
//!
//! `ScriptApiBuilder` 是对象的构造阶段：成员在这里注册，对象尚未共享，也就
//! 不可能被宿主看到。`build()` 之后得到 `Arc<ScriptApi>`（存活阶段）；
//! `invalidate()` 进入终止阶段，之后所有查找都报告成员不存在。
//!
//! 每个成员注册时捕获当时的安全区，查找时与对象当前的有效安全区比较。
//!
//! # 示例
//!
//! ```rust
//! use script_bridge::scripting::{ScriptApi, ScriptObject, SecurityZone};
//! use script_bridge::value::Value;
//!
//! let api = ScriptApi::builder("Calculator")
//!     .method("add", |a: i32, b: i32| a + b)
//!     .with_zone(SecurityZone::PRIVATE, |b| b.attribute("secret", 42, true))
//!     .event("onresult")
//!     .build()
//!     .unwrap();
//!
//! assert!(api.has_method("add"));
//! assert!(!api.has_property("secret"));
//! assert!(api.invoke("add", &[Value::I32(1), Value::I32(2)]).is_ok());
//! ```

use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::config::BridgeConfig;
use crate::core::error::{BridgeError, BridgeResult, ConversionError};
use crate::core::scheduler::TaskScheduler;
use crate::scripting::events::EventRouter;
use crate::scripting::method::{self, MethodFn, NativeMethod};
use crate::scripting::object::{ScriptObject, ScriptObjectRef};
use crate::scripting::proxy::{ProxyRegistry, ScriptProxy};
use crate::scripting::zone::{SecurityZone, ZoneStack};
use crate::value::Value;

const BUILTIN_METHODS: &[&str] = &[
    "toString",
    "addEventListener",
    "removeEventListener",
    "attachEvent",
    "detachEvent",
];
const BUILTIN_PROPERTIES: &[&str] = &["valid"];

/// 带安全区的成员
struct Member<T> {
    zone: SecurityZone,
    entry: T,
}

enum Property {
    Accessor {
        getter: MethodFn,
        setter: Option<MethodFn>,
    },
    Attribute {
        value: Value,
        read_only: bool,
    },
}

type IndexLen = Arc<dyn Fn() -> u32 + Send + Sync>;
type IndexGet = Arc<dyn Fn(u32) -> BridgeResult<Value> + Send + Sync>;
type IndexSet = Arc<dyn Fn(u32, Value) -> BridgeResult<()> + Send + Sync>;

struct IndexedProperty {
    zone: SecurityZone,
    len: IndexLen,
    get: IndexGet,
    set: Option<IndexSet>,
}

enum PropertyRead {
    Getter(MethodFn),
    Stored(Value),
}

enum Lookup<T> {
    Found(T),
    Hidden(SecurityZone),
    Missing,
}

/// 把 panic 负载转换为消息
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native code panicked".to_string()
    }
}

/// 在分发边界执行原生代码，panic 转换为 `Exception`
pub(crate) fn guarded<T>(member: &str, call: impl FnOnce() -> BridgeResult<T>) -> BridgeResult<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(target: "bridge::dispatch", member, %message, "native member panicked");
            Err(BridgeError::Exception(message))
        }
    }
}

/// 构造阶段
pub struct ScriptApiBuilder {
    type_name: String,
    methods: BTreeMap<String, Member<MethodFn>>,
    properties: BTreeMap<String, Member<Property>>,
    indexed: Option<IndexedProperty>,
    default_method: Option<MethodFn>,
    events: Vec<String>,
    event_zones: BTreeMap<String, SecurityZone>,
    zones: Vec<SecurityZone>,
    default_zone: SecurityZone,
    event_prefix: Option<String>,
    builtins: bool,
    scheduler: Option<Arc<dyn TaskScheduler>>,
}

impl ScriptApiBuilder {
    fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            methods: BTreeMap::new(),
            properties: BTreeMap::new(),
            indexed: None,
            default_method: None,
            events: Vec::new(),
            event_zones: BTreeMap::new(),
            zones: Vec::new(),
            default_zone: SecurityZone::PUBLIC,
            event_prefix: Some("on".to_string()),
            builtins: true,
            scheduler: None,
        }
    }

    /// 当前注册安全区
    fn current_zone(&self) -> SecurityZone {
        self.zones.last().copied().unwrap_or(self.default_zone)
    }

    /// 应用配置中的默认安全区与事件前缀
    pub fn configure(mut self, config: &BridgeConfig) -> Self {
        self.default_zone = config.security.default_zone;
        self.event_prefix = config.events.effective_prefix();
        self
    }

    pub fn default_zone(mut self, zone: SecurityZone) -> Self {
        self.default_zone = zone;
        self
    }

    pub fn event_prefix(mut self, prefix: Option<&str>) -> Self {
        self.event_prefix = prefix.map(str::to_string);
        self
    }

    /// 禁用内建成员（`toString`、`valid`、事件监听方法）
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// 在指定安全区下注册一组成员
    pub fn with_zone(mut self, zone: SecurityZone, register: impl FnOnce(Self) -> Self) -> Self {
        self.zones.push(zone);
        let mut this = register(self);
        this.zones.pop();
        this
    }

    pub fn method<Args: 'static, M: NativeMethod<Args>>(mut self, name: &str, method: M) -> Self {
        let zone = self.current_zone();
        self.methods.insert(
            name.to_string(),
            Member {
                zone,
                entry: method::erase(name, method),
            },
        );
        self
    }

    pub fn raw_method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        let zone = self.current_zone();
        self.methods.insert(
            name.to_string(),
            Member {
                zone,
                entry: method::raw(method),
            },
        );
        self
    }

    /// 把对象当作函数调用时执行的方法
    pub fn default_method<Args: 'static, M: NativeMethod<Args>>(mut self, method: M) -> Self {
        self.default_method = Some(method::erase("<default>", method));
        self
    }

    /// 只读属性
    pub fn property<G: NativeMethod<()>>(mut self, name: &str, getter: G) -> Self {
        let zone = self.current_zone();
        self.properties.insert(
            name.to_string(),
            Member {
                zone,
                entry: Property::Accessor {
                    getter: method::erase(name, getter),
                    setter: None,
                },
            },
        );
        self
    }

    /// 读写属性
    pub fn property_rw<G, S, T>(mut self, name: &str, getter: G, setter: S) -> Self
    where
        G: NativeMethod<()>,
        S: NativeMethod<(T,)>,
        T: 'static,
    {
        let zone = self.current_zone();
        self.properties.insert(
            name.to_string(),
            Member {
                zone,
                entry: Property::Accessor {
                    getter: method::erase(name, getter),
                    setter: Some(method::erase(name, setter)),
                },
            },
        );
        self
    }

    /// 存储型属性
    pub fn attribute(mut self, name: &str, value: impl Into<Value>, read_only: bool) -> Self {
        let zone = self.current_zone();
        self.properties.insert(
            name.to_string(),
            Member {
                zone,
                entry: Property::Attribute {
                    value: value.into(),
                    read_only,
                },
            },
        );
        self
    }

    /// 索引属性族
    pub fn indexed<L, G>(mut self, len: L, get: G) -> Self
    where
        L: Fn() -> u32 + Send + Sync + 'static,
        G: Fn(u32) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        self.indexed = Some(IndexedProperty {
            zone: self.current_zone(),
            len: Arc::new(len),
            get: Arc::new(get),
            set: None,
        });
        self
    }

    /// 为已注册的索引属性族添加写入
    pub fn indexed_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(u32, Value) -> BridgeResult<()> + Send + Sync + 'static,
    {
        if let Some(indexed) = self.indexed.as_mut() {
            indexed.set = Some(Arc::new(set));
        }
        self
    }

    pub fn event(mut self, name: &str) -> Self {
        let zone = self.current_zone();
        if !self.events.iter().any(|e| e == name) {
            self.events.push(name.to_string());
        }
        self.event_zones.insert(name.to_string(), zone);
        self
    }

    /// 进入存活阶段
    ///
    /// 事件名不符合命名约定时失败。
    pub fn build(self) -> BridgeResult<Arc<ScriptApi>> {
        let events = EventRouter::new(self.event_prefix.clone());
        for name in &self.events {
            events.register_event(name)?;
        }
        if let Some(scheduler) = self.scheduler {
            events.set_scheduler(scheduler);
        }

        tracing::debug!(
            target: "bridge::dispatch",
            type_name = %self.type_name,
            methods = self.methods.len(),
            properties = self.properties.len(),
            events = self.events.len(),
            "script object built"
        );

        Ok(Arc::new(ScriptApi {
            type_name: self.type_name,
            methods: RwLock::new(self.methods),
            properties: RwLock::new(self.properties),
            indexed: self.indexed,
            default_method: self.default_method,
            event_zones: RwLock::new(self.event_zones),
            events,
            zones: ZoneStack::new(self.default_zone),
            proxies: ProxyRegistry::new(),
            valid: AtomicBool::new(true),
            builtins: self.builtins,
        }))
    }
}

/// 存活的原生脚本对象
pub struct ScriptApi {
    type_name: String,
    methods: RwLock<BTreeMap<String, Member<MethodFn>>>,
    properties: RwLock<BTreeMap<String, Member<Property>>>,
    indexed: Option<IndexedProperty>,
    default_method: Option<MethodFn>,
    event_zones: RwLock<BTreeMap<String, SecurityZone>>,
    events: EventRouter,
    zones: ZoneStack,
    proxies: ProxyRegistry,
    valid: AtomicBool,
    builtins: bool,
}

impl ScriptApi {
    pub fn builder(type_name: &str) -> ScriptApiBuilder {
        ScriptApiBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn events(&self) -> &EventRouter {
        &self.events
    }

    pub fn set_scheduler(&self, scheduler: Arc<dyn TaskScheduler>) {
        self.events.set_scheduler(scheduler);
    }

    /// 触发事件，可在任意线程调用
    ///
    /// 失效后的对象没有监听者，触发是空操作。
    pub fn fire_event(&self, name: &str, args: Vec<Value>) -> BridgeResult<()> {
        if !self.is_valid() {
            return Ok(());
        }
        self.events.fire(name, args)
    }

    /// 在存活阶段追加存储型属性，使用当前有效安全区
    pub fn register_attribute(&self, name: &str, value: impl Into<Value>, read_only: bool) {
        let zone = self.zones.zone();
        self.properties.write().insert(
            name.to_string(),
            Member {
                zone,
                entry: Property::Attribute {
                    value: value.into(),
                    read_only,
                },
            },
        );
    }

    /// 原生端更新存储型属性，不受只读限制
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) -> BridgeResult<()> {
        match self.properties.write().get_mut(name) {
            Some(Member {
                entry: Property::Attribute { value: slot, .. },
                ..
            }) => {
                *slot = value.into();
                Ok(())
            }
            _ => Err(BridgeError::NoSuchProperty(name.to_string())),
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.live_count()
    }

    /// 当前有效安全区；须在取得成员表的锁之前读取
    fn active_zone(&self) -> SecurityZone {
        self.zones.zone()
    }

    fn lookup_method(&self, name: &str, active: SecurityZone) -> Lookup<MethodFn> {
        match self.methods.read().get(name) {
            Some(m) if m.zone.permits(active) => Lookup::Found(Arc::clone(&m.entry)),
            Some(m) => Lookup::Hidden(m.zone),
            None => Lookup::Missing,
        }
    }

    fn lookup_event(&self, name: &str, active: SecurityZone) -> Lookup<()> {
        match self.event_zones.read().get(name) {
            Some(zone) if zone.permits(active) => Lookup::Found(()),
            Some(zone) => Lookup::Hidden(*zone),
            None => Lookup::Missing,
        }
    }

    fn is_builtin_method(&self, name: &str) -> bool {
        self.builtins && BUILTIN_METHODS.contains(&name)
    }

    fn is_builtin_property(&self, name: &str) -> bool {
        self.builtins && BUILTIN_PROPERTIES.contains(&name)
    }

    fn access_denied(member: &str, required: SecurityZone, active: SecurityZone) -> BridgeError {
        BridgeError::AccessDenied {
            member: member.to_string(),
            required,
            active,
        }
    }

    fn indexed_visible(&self, active: SecurityZone) -> Option<&IndexedProperty> {
        self.indexed.as_ref().filter(|i| i.zone.permits(active))
    }

    fn invoke_builtin(&self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        let listener_args = |member: &str| -> BridgeResult<(String, ScriptObjectRef)> {
            if args.len() < 2 {
                return Err(BridgeError::arity(member, 2, args.len()));
            }
            let event: String = args[0]
                .convert()
                .map_err(|err| BridgeError::bad_argument(member, 0, err))?;
            let listener: ScriptObjectRef = args[1]
                .convert()
                .map_err(|err| BridgeError::bad_argument(member, 1, err))?;
            Ok((event, listener))
        };

        match name {
            "toString" => Ok(Value::String(format!("[object {}]", self.type_name))),
            "addEventListener" => {
                let (event_type, listener) = listener_args(name)?;
                let event = self.events.event_name_for_type(&event_type);
                self.register_event_method(&event, listener)?;
                Ok(Value::Void)
            }
            "removeEventListener" => {
                let (event_type, listener) = listener_args(name)?;
                let event = self.events.event_name_for_type(&event_type);
                self.unregister_event_method(&event, &listener)?;
                Ok(Value::Void)
            }
            "attachEvent" => {
                let (event, listener) = listener_args(name)?;
                self.register_event_method(&event, listener)?;
                Ok(Value::Bool(true))
            }
            "detachEvent" => {
                let (event, listener) = listener_args(name)?;
                self.unregister_event_method(&event, &listener)?;
                Ok(Value::Void)
            }
            _ => Err(BridgeError::NoSuchMethod(name.to_string())),
        }
    }
}

impl ScriptObject for ScriptApi {
    fn member_names(&self) -> Vec<String> {
        if !self.is_valid() {
            return Vec::new();
        }
        let active = self.active_zone();
        let mut names: Vec<String> = self
            .methods
            .read()
            .iter()
            .filter(|(_, m)| m.zone.permits(active))
            .map(|(name, _)| name.clone())
            .collect();
        names.extend(
            self.properties
                .read()
                .iter()
                .filter(|(_, m)| m.zone.permits(active))
                .map(|(name, _)| name.clone()),
        );
        names.extend(
            self.event_zones
                .read()
                .iter()
                .filter(|(_, zone)| zone.permits(active))
                .map(|(name, _)| name.clone()),
        );
        if self.builtins {
            names.extend(
                BUILTIN_METHODS
                    .iter()
                    .chain(BUILTIN_PROPERTIES)
                    .map(|s| s.to_string()),
            );
        }
        names.sort();
        names.dedup();
        names
    }

    fn has_method(&self, name: &str) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self.lookup_method(name, self.active_zone()) {
            Lookup::Found(_) => true,
            Lookup::Hidden(_) => false,
            Lookup::Missing => self.is_builtin_method(name),
        }
    }

    fn has_property(&self, name: &str) -> bool {
        if !self.is_valid() {
            return false;
        }
        let active = self.active_zone();
        let property = self.properties.read().get(name).map(|m| m.zone);
        match property {
            Some(zone) => zone.permits(active),
            None => {
                matches!(self.lookup_event(name, active), Lookup::Found(_))
                    || self.is_builtin_property(name)
            }
        }
    }

    fn has_property_index(&self, index: u32) -> bool {
        self.is_valid()
            && self
                .indexed_visible(self.active_zone())
                .map(|i| index < (i.len)())
                .unwrap_or(false)
    }

    fn has_event(&self, name: &str) -> bool {
        self.is_valid() && matches!(self.lookup_event(name, self.active_zone()), Lookup::Found(_))
    }

    fn get_property(&self, name: &str) -> BridgeResult<Value> {
        if !self.is_valid() {
            return Err(BridgeError::NoSuchProperty(name.to_string()));
        }
        let active = self.active_zone();
        let property = {
            let properties = self.properties.read();
            properties.get(name).map(|m| {
                let read = match &m.entry {
                    Property::Accessor { getter, .. } => PropertyRead::Getter(Arc::clone(getter)),
                    Property::Attribute { value, .. } => PropertyRead::Stored(value.clone()),
                };
                (m.zone, read)
            })
        };
        match property {
            Some((zone, _)) if !zone.permits(active) => Err(Self::access_denied(name, zone, active)),
            Some((_, PropertyRead::Getter(getter))) => guarded(name, || getter(&[])),
            Some((_, PropertyRead::Stored(value))) => Ok(value),
            None => match self.lookup_event(name, active) {
                Lookup::Found(()) => Ok(self
                    .events
                    .default_listener(name)
                    .map(Value::Object)
                    .unwrap_or(Value::Null)),
                Lookup::Hidden(zone) => Err(Self::access_denied(name, zone, active)),
                Lookup::Missing if self.is_builtin_property(name) => Ok(Value::Bool(true)),
                Lookup::Missing => Err(BridgeError::NoSuchProperty(name.to_string())),
            },
        }
    }

    fn set_property(&self, name: &str, value: Value) -> BridgeResult<()> {
        if !self.is_valid() {
            return Err(BridgeError::NoSuchProperty(name.to_string()));
        }
        let active = self.active_zone();
        let setter = {
            let mut properties = self.properties.write();
            match properties.get_mut(name) {
                Some(m) if !m.zone.permits(active) => {
                    return Err(Self::access_denied(name, m.zone, active))
                }
                Some(Member {
                    entry: Property::Accessor { setter, .. },
                    ..
                }) => match setter {
                    Some(setter) => Some(Arc::clone(setter)),
                    None => return Err(BridgeError::ReadOnly(name.to_string())),
                },
                Some(Member {
                    entry: Property::Attribute { read_only: true, .. },
                    ..
                }) => return Err(BridgeError::ReadOnly(name.to_string())),
                Some(Member {
                    entry: Property::Attribute { value: slot, .. },
                    ..
                }) => {
                    *slot = value;
                    return Ok(());
                }
                None => None,
            }
        };
        if let Some(setter) = setter {
            return guarded(name, || setter(std::slice::from_ref(&value)).map(|_| ()));
        }

        match self.lookup_event(name, active) {
            Lookup::Found(()) => match value {
                Value::Void | Value::Null => self.events.set_default_listener(name, None),
                other => {
                    let listener = other.as_object().ok_or_else(|| {
                        BridgeError::Conversion(ConversionError::Incompatible {
                            from: other.type_name(),
                            to: "function",
                        })
                    })?;
                    self.events.set_default_listener(name, Some(listener))
                }
            },
            Lookup::Hidden(zone) => Err(Self::access_denied(name, zone, active)),
            Lookup::Missing if self.is_builtin_property(name) => {
                Err(BridgeError::ReadOnly(name.to_string()))
            }
            Lookup::Missing => Err(BridgeError::NoSuchProperty(name.to_string())),
        }
    }

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        if !self.is_valid() {
            return Err(BridgeError::NoSuchProperty(name.to_string()));
        }
        let active = self.active_zone();
        let mut properties = self.properties.write();
        let removable = match properties.get(name) {
            Some(m) if !m.zone.permits(active) => return Err(Self::access_denied(name, m.zone, active)),
            Some(m) => matches!(m.entry, Property::Attribute { read_only: false, .. }),
            None => return Err(BridgeError::NoSuchProperty(name.to_string())),
        };
        if !removable {
            return Err(BridgeError::ReadOnly(name.to_string()));
        }
        properties.remove(name);
        Ok(())
    }

    fn get_property_index(&self, index: u32) -> BridgeResult<Value> {
        if !self.is_valid() {
            return Err(BridgeError::NoSuchProperty(index.to_string()));
        }
        let active = self.active_zone();
        match &self.indexed {
            Some(i) if !i.zone.permits(active) => {
                Err(Self::access_denied(&index.to_string(), i.zone, active))
            }
            Some(i) if index < (i.len)() => guarded(&index.to_string(), || (i.get)(index)),
            _ => Err(BridgeError::NoSuchProperty(index.to_string())),
        }
    }

    fn set_property_index(&self, index: u32, value: Value) -> BridgeResult<()> {
        if !self.is_valid() {
            return Err(BridgeError::NoSuchProperty(index.to_string()));
        }
        let active = self.active_zone();
        match &self.indexed {
            Some(i) if !i.zone.permits(active) => {
                Err(Self::access_denied(&index.to_string(), i.zone, active))
            }
            Some(IndexedProperty { set: Some(set), .. }) => {
                guarded(&index.to_string(), || set(index, value))
            }
            Some(_) => Err(BridgeError::ReadOnly(index.to_string())),
            None => Err(BridgeError::NoSuchProperty(index.to_string())),
        }
    }

    fn invoke(&self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        if !self.is_valid() {
            return Err(BridgeError::NoSuchMethod(name.to_string()));
        }
        let active = self.active_zone();
        match self.lookup_method(name, active) {
            Lookup::Found(method) => guarded(name, || method(args)),
            Lookup::Hidden(zone) => Err(Self::access_denied(name, zone, active)),
            Lookup::Missing if self.is_builtin_method(name) => {
                guarded(name, || self.invoke_builtin(name, args))
            }
            Lookup::Missing => Err(BridgeError::NoSuchMethod(name.to_string())),
        }
    }

    fn invoke_default(&self, args: &[Value]) -> BridgeResult<Value> {
        match &self.default_method {
            Some(method) if self.is_valid() => guarded("<default>", || method(args)),
            _ => Err(BridgeError::NoSuchMethod("<default>".to_string())),
        }
    }

    fn register_event(&self, name: &str) -> BridgeResult<()> {
        self.events.register_event(name)?;
        let zone = self.active_zone();
        self.event_zones.write().insert(name.to_string(), zone);
        Ok(())
    }

    fn register_event_method(&self, name: &str, listener: ScriptObjectRef) -> BridgeResult<()> {
        self.events.add_listener(name, listener)
    }

    fn unregister_event_method(&self, name: &str, listener: &ScriptObjectRef) -> BridgeResult<()> {
        self.events.remove_listener(name, listener)
    }

    fn register_event_interface(&self, listener: ScriptObjectRef) -> BridgeResult<()> {
        self.events.add_interface(listener);
        Ok(())
    }

    fn unregister_event_interface(&self, listener: &ScriptObjectRef) -> BridgeResult<()> {
        self.events.remove_interface(listener);
        Ok(())
    }

    fn default_event_method(&self, name: &str) -> Option<ScriptObjectRef> {
        self.events.default_listener(name)
    }

    fn set_default_event_method(
        &self,
        name: &str,
        listener: Option<ScriptObjectRef>,
    ) -> BridgeResult<()> {
        self.events.set_default_listener(name, listener)
    }

    fn push_zone(&self, zone: SecurityZone) {
        self.zones.push_zone(zone);
    }

    fn pop_zone(&self) {
        self.zones.pop_zone();
    }

    fn zone(&self) -> SecurityZone {
        self.zones.zone()
    }

    fn default_zone(&self) -> SecurityZone {
        self.zones.default_zone()
    }

    fn set_default_zone(&self, zone: SecurityZone) {
        self.zones.set_default_zone(zone);
    }

    fn register_proxy(&self, proxy: Weak<dyn ScriptProxy>) {
        if self.is_valid() {
            self.proxies.register(proxy);
        } else if let Some(proxy) = proxy.upgrade() {
            proxy.detach();
        }
    }

    fn unregister_proxy(&self, proxy: &dyn ScriptProxy) {
        self.proxies.unregister(proxy);
    }

    fn invalidate(&self) {
        if self.valid.swap(false, Ordering::SeqCst) {
            let detached = self.proxies.invalidate_all();
            self.events.clear();
            tracing::debug!(
                target: "bridge::dispatch",
                type_name = %self.type_name,
                detached,
                "script object invalidated"
            );
        }
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptApi {
    fn drop(&mut self) {
        self.invalidate();
    }
}
