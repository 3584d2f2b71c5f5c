//! Plugin dispatch wrapper
//!
//! `ComJavascriptObject` exposes a native `ScriptObject` as `IDispatch`.
//! Member names get DISPIDs on first lookup and keep them for the wrapper's
//! lifetime. When the COM reference count returns to zero, or the wrapper is
//! dropped without ever being referenced, it finalizes: it unregisters from
//! the native object and leaves the host's wrapper cache.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use super::host::ComBrowserHost;
use super::types::{ComError, ComResult, ComVariant, DispId, Dispatch, DispatchFlags, HResult};
use crate::bindings::marshal::VariantMarshaler;
use crate::bindings::protocol::BrowserHost;
use crate::core::error::BridgeError;
use crate::scripting::object::{object_address, ScriptObjectRef, WeakScriptObjectRef};
use crate::scripting::proxy::ScriptProxy;
use crate::value::Value;

enum NativeRef {
    Strong(ScriptObjectRef),
    Weak(WeakScriptObjectRef),
}

#[derive(Default)]
struct DispIdTable {
    by_name: HashMap<String, DispId>,
    names: Vec<String>,
}

impl DispIdTable {
    fn id_for(&mut self, name: &str) -> DispId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        self.names.push(name.to_string());
        let id = DispId(self.names.len() as i32);
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn name_of(&self, id: DispId) -> Option<&str> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.names.get(index).map(String::as_str)
    }
}

pub struct ComJavascriptObject {
    host: Weak<ComBrowserHost>,
    target: Mutex<Option<NativeRef>>,
    target_address: usize,
    weak: bool,
    refs: AtomicU32,
    detached: AtomicBool,
    finalized: AtomicBool,
    dispids: Mutex<DispIdTable>,
}

impl ComJavascriptObject {
    pub(crate) fn new(host: Weak<ComBrowserHost>, target: &ScriptObjectRef, weak: bool) -> Arc<Self> {
        let native = if weak {
            NativeRef::Weak(Arc::downgrade(target))
        } else {
            NativeRef::Strong(Arc::clone(target))
        };
        let wrapper = Arc::new(ComJavascriptObject {
            host,
            target: Mutex::new(Some(native)),
            target_address: object_address(target),
            weak,
            refs: AtomicU32::new(0),
            detached: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            dispids: Mutex::new(DispIdTable::default()),
        });
        let proxy = Arc::downgrade(&wrapper) as Weak<dyn ScriptProxy>;
        target.register_proxy(proxy);
        wrapper
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::SeqCst)
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> Option<ScriptObjectRef> {
        if self.detached.load(Ordering::SeqCst) {
            return None;
        }
        match self.target.lock().as_ref()? {
            NativeRef::Strong(target) => Some(Arc::clone(target)),
            NativeRef::Weak(target) => target.upgrade(),
        }
    }

    pub fn native_value(&self) -> Value {
        if self.detached.load(Ordering::SeqCst) {
            return Value::Null;
        }
        match self.target.lock().as_ref() {
            Some(NativeRef::Strong(target)) => Value::Object(Arc::clone(target)),
            Some(NativeRef::Weak(target)) => Value::WeakObject(target.clone()),
            None => Value::Null,
        }
    }

    pub(crate) fn detach_from_target(&self) {
        self.detached.store(true, Ordering::SeqCst);
        let released = self.target.lock().take();
        drop(released);
    }

    fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = self.target.lock().take();
        self.detached.store(true, Ordering::SeqCst);
        let target = match &released {
            Some(NativeRef::Strong(target)) => Some(Arc::clone(target)),
            Some(NativeRef::Weak(target)) => target.upgrade(),
            None => None,
        };
        if let Some(target) = target {
            target.unregister_proxy(self);
        }
        if let Some(host) = self.host.upgrade() {
            host.forget_wrapper((self.target_address, self.weak), self as *const Self);
        }
        drop(released);
    }

    fn resolve(&self) -> ComResult<(Arc<ComBrowserHost>, ScriptObjectRef)> {
        let host = self
            .host
            .upgrade()
            .ok_or_else(|| ComError::new(HResult::E_UNEXPECTED, "browser host is gone"))?;
        host.affinity().assert_main_thread("IDispatch::Invoke");
        let target = self
            .target()
            .ok_or_else(|| ComError::from_bridge(&BridgeError::Invalidated))?;
        Ok((host, target))
    }

    fn dispatch_member(
        &self,
        target: &ScriptObjectRef,
        name: &str,
        flags: DispatchFlags,
        args: &[Value],
    ) -> Result<Value, BridgeError> {
        if flags.is_put() {
            let value = args.last().cloned().unwrap_or_default();
            let stored = match name.parse::<u32>() {
                Ok(index) if !target.has_property(name) => target.set_property_index(index, value),
                _ => target.set_property(name, value),
            };
            return stored.map(|_| Value::Void);
        }
        if flags.contains(DispatchFlags::METHOD) && target.has_method(name) {
            return target.invoke(name, args);
        }
        if flags.contains(DispatchFlags::PROPERTYGET) {
            return match name.parse::<u32>() {
                Ok(index) if !target.has_property(name) => target.get_property_index(index),
                _ => target.get_property(name),
            };
        }
        Err(BridgeError::NoSuchMethod(name.to_string()))
    }
}

impl Dispatch for ComJavascriptObject {
    fn add_ref(&self) -> u32 {
        self.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn release(&self) -> u32 {
        let previous = self
            .refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        let remaining = previous.saturating_sub(1);
        if previous == 1 {
            self.finalize();
        }
        remaining
    }

    fn get_dispid(&self, name: &str) -> ComResult<DispId> {
        let (_, target) = self.resolve()?;
        let known = target.has_method(name)
            || target.has_property(name)
            || target.has_event(name)
            || name
                .parse::<u32>()
                .map(|i| target.has_property_index(i))
                .unwrap_or(false);
        if !known {
            return Err(ComError::new(
                HResult::DISP_E_UNKNOWNNAME,
                format!("Unknown name: {}", name),
            ));
        }
        Ok(self.dispids.lock().id_for(name))
    }

    fn invoke(&self, id: DispId, flags: DispatchFlags, args: &[ComVariant]) -> ComResult<ComVariant> {
        let (host, target) = self.resolve()?;
        let args = host
            .to_native_values(args)
            .map_err(|err| ComError::from_bridge(&err))?;

        let result = if id == DispId::VALUE {
            if flags.is_put() {
                Err(BridgeError::NoSuchProperty("<default>".to_string()))
            } else {
                target.invoke_default(&args)
            }
        } else {
            let name = self
                .dispids
                .lock()
                .name_of(id)
                .map(str::to_string)
                .ok_or_else(|| ComError::new(HResult::DISP_E_MEMBERNOTFOUND, "Unknown DISPID"))?;
            self.dispatch_member(&target, &name, flags, &args)
        };

        match result.and_then(|value| host.to_host_value(&value)) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!(target: "bridge::com", error = %err, "script call failed");
                Err(ComError::from_bridge(&err))
            }
        }
    }

    fn member_names(&self) -> ComResult<Vec<String>> {
        let (_, target) = self.resolve()?;
        Ok(target.member_names())
    }

    fn delete_member(&self, name: &str) -> ComResult<()> {
        let (_, target) = self.resolve()?;
        target
            .remove_property(name)
            .map_err(|err| ComError::from_bridge(&err))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ScriptProxy for ComJavascriptObject {
    fn detach(&self) {
        self.detach_from_target();
    }

    fn is_detached(&self) -> bool {
        !self.is_attached()
    }
}

impl Drop for ComJavascriptObject {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispid_table_is_stable() {
        let mut table = DispIdTable::default();
        let a = table.id_for("alpha");
        let b = table.id_for("beta");
        assert_eq!(table.id_for("alpha"), a);
        assert_ne!(a, b);
        assert_ne!(a, DispId::VALUE);
        assert_eq!(table.name_of(b), Some("beta"));
        assert_eq!(table.name_of(DispId::UNKNOWN), None);
    }
}
