//! 脚本对象能力接口
//!
//! 每个脚本可见的原生对象都实现 `ScriptObject`；宿主对象适配器同样实现它，
//! 因此原生调用脚本与脚本调用原生使用同一套契约。

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::bindings::protocol::HostHandle;
use crate::core::error::{BridgeError, BridgeResult};
use crate::scripting::proxy::ScriptProxy;
use crate::scripting::zone::SecurityZone;
use crate::value::Value;

pub type ScriptObjectRef = Arc<dyn ScriptObject>;
pub type WeakScriptObjectRef = Weak<dyn ScriptObject>;

/// 脚本对象能力集
///
/// 只有成员查找、属性读写与调用是必须实现的；事件、安全区和代理簿记都带有
/// 默认实现，适用于没有这些能力的对象（例如宿主对象适配器）。
pub trait ScriptObject: Send + Sync {
    /// 当前安全区下可见的成员名
    fn member_names(&self) -> Vec<String>;

    fn member_count(&self) -> usize {
        self.member_names().len()
    }

    fn has_method(&self, name: &str) -> bool;

    fn has_property(&self, name: &str) -> bool;

    fn has_property_index(&self, _index: u32) -> bool {
        false
    }

    fn has_event(&self, _name: &str) -> bool {
        false
    }

    fn get_property(&self, name: &str) -> BridgeResult<Value>;

    fn set_property(&self, name: &str, value: Value) -> BridgeResult<()>;

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        Err(BridgeError::NoSuchProperty(name.to_string()))
    }

    fn get_property_index(&self, index: u32) -> BridgeResult<Value> {
        Err(BridgeError::NoSuchProperty(index.to_string()))
    }

    fn set_property_index(&self, index: u32, _value: Value) -> BridgeResult<()> {
        Err(BridgeError::NoSuchProperty(index.to_string()))
    }

    fn invoke(&self, name: &str, args: &[Value]) -> BridgeResult<Value>;

    /// 把对象当作函数调用
    fn invoke_default(&self, _args: &[Value]) -> BridgeResult<Value> {
        Err(BridgeError::NoSuchMethod("<default>".to_string()))
    }

    fn register_event(&self, _name: &str) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("events"))
    }

    fn register_event_method(&self, _name: &str, _listener: ScriptObjectRef) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("events"))
    }

    fn unregister_event_method(&self, _name: &str, _listener: &ScriptObjectRef) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("events"))
    }

    fn register_event_interface(&self, _listener: ScriptObjectRef) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("events"))
    }

    fn unregister_event_interface(&self, _listener: &ScriptObjectRef) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("events"))
    }

    fn default_event_method(&self, _name: &str) -> Option<ScriptObjectRef> {
        None
    }

    fn set_default_event_method(
        &self,
        _name: &str,
        _listener: Option<ScriptObjectRef>,
    ) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("events"))
    }

    fn push_zone(&self, _zone: SecurityZone) {}

    fn pop_zone(&self) {}

    fn zone(&self) -> SecurityZone {
        self.default_zone()
    }

    fn default_zone(&self) -> SecurityZone {
        SecurityZone::PUBLIC
    }

    fn set_default_zone(&self, _zone: SecurityZone) {}

    /// 宿主包装器创建时登记自身
    fn register_proxy(&self, _proxy: Weak<dyn ScriptProxy>) {}

    /// 宿主包装器被宿主回收时注销自身
    fn unregister_proxy(&self, _proxy: &dyn ScriptProxy) {}

    fn invalidate(&self) {}

    fn is_valid(&self) -> bool {
        true
    }

    /// 仅宿主对象适配器返回 `Some`
    fn host_handle(&self) -> Option<HostHandle> {
        None
    }
}

/// 两个对象引用是否指向同一个对象（忽略虚表指针）
pub fn same_object(a: &ScriptObjectRef, b: &ScriptObjectRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// 对象的身份地址
pub fn object_address(obj: &ScriptObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// 在作用域内压入安全区的守卫
///
/// 无论作用域正常退出还是展开，离开时恰好弹出一次。
///
/// # 示例
///
/// ```rust,ignore
/// {
///     let _lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);
///     api.get_property("secret")?;
/// }
/// ```
#[must_use = "the zone is popped as soon as the lock is dropped"]
pub struct ScopedZoneLock<'a, T: ScriptObject + ?Sized> {
    target: &'a T,
}

impl<'a, T: ScriptObject + ?Sized> ScopedZoneLock<'a, T> {
    pub fn new(target: &'a T, zone: SecurityZone) -> Self {
        target.push_zone(zone);
        Self { target }
    }
}

impl<T: ScriptObject + ?Sized> Drop for ScopedZoneLock<'_, T> {
    fn drop(&mut self) {
        self.target.pop_zone();
    }
}

/// 宿主数组/对象的回读
pub trait ScriptObjectExt {
    /// 通过 `length` 与索引属性读出数组元素
    fn array_values(&self) -> BridgeResult<Vec<Value>>;

    /// 通过成员枚举读出对象的可读属性
    fn object_values(&self) -> BridgeResult<BTreeMap<String, Value>>;
}

impl<T: ScriptObject + ?Sized> ScriptObjectExt for T {
    fn array_values(&self) -> BridgeResult<Vec<Value>> {
        let length: u32 = self.get_property("length")?.convert()?;
        (0..length).map(|i| self.get_property_index(i)).collect()
    }

    fn object_values(&self) -> BridgeResult<BTreeMap<String, Value>> {
        // COM 不区分方法与属性，只按属性是否可读筛选
        self.member_names()
            .into_iter()
            .filter(|name| self.has_property(name))
            .map(|name| {
                let value = self.get_property(&name)?;
                Ok((name, value))
            })
            .collect()
    }
}
