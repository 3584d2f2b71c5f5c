//! Plugin object wrapper
//!
//! `NpJavascriptObject` is the browser-visible face of a native
//! `ScriptObject`. The browser owns it through `NPN_CreateObject`; the wrapped
//! object keeps only a weak proxy entry, so invalidating the native object
//! detaches every wrapper without waiting for the browser to collect them.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use super::funcs::NpClass;
use super::host::NpapiBrowserHost;
use super::types::{IdentifierValue, NpIdentifier, NpObject, NpVariant};
use crate::bindings::marshal::VariantMarshaler;
use crate::bindings::protocol::BrowserHost;
use crate::core::error::{BridgeError, BridgeResult};
use crate::scripting::object::{object_address, ScriptObjectRef, WeakScriptObjectRef};
use crate::scripting::proxy::ScriptProxy;
use crate::value::Value;

enum NativeRef {
    Strong(ScriptObjectRef),
    Weak(WeakScriptObjectRef),
}

pub struct NpJavascriptObject {
    host: Weak<NpapiBrowserHost>,
    target: Mutex<Option<NativeRef>>,
    target_address: usize,
    weak: bool,
    handle: OnceLock<NpObject>,
    detached: AtomicBool,
    self_ref: Weak<NpJavascriptObject>,
}

impl NpJavascriptObject {
    pub(crate) fn new(host: Weak<NpapiBrowserHost>, target: &ScriptObjectRef, weak: bool) -> Arc<Self> {
        let native = if weak {
            NativeRef::Weak(Arc::downgrade(target))
        } else {
            NativeRef::Strong(Arc::clone(target))
        };
        Arc::new_cyclic(|self_ref| NpJavascriptObject {
            host,
            target: Mutex::new(Some(native)),
            target_address: object_address(target),
            weak,
            handle: OnceLock::new(),
            detached: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Records the browser handle and registers with the wrapped object
    pub(crate) fn attach(&self, handle: NpObject) {
        let _ = self.handle.set(handle);
        if let Some(target) = self.target() {
            let proxy: Weak<dyn ScriptProxy> = self.self_ref.clone();
            target.register_proxy(proxy);
        }
    }

    pub fn handle(&self) -> Option<NpObject> {
        self.handle.get().copied()
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::SeqCst)
    }

    /// The wrapped object, or `None` once detached or collected
    pub fn target(&self) -> Option<ScriptObjectRef> {
        if self.detached.load(Ordering::SeqCst) {
            return None;
        }
        match self.target.lock().as_ref()? {
            NativeRef::Strong(target) => Some(Arc::clone(target)),
            NativeRef::Weak(target) => target.upgrade(),
        }
    }

    /// What this wrapper stands for when it comes back from the browser
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

    fn member(&self, host: &NpapiBrowserHost, id: NpIdentifier) -> BridgeResult<IdentifierValue> {
        host.identifier_value(id)
    }

    /// Runs a browser callback against the wrapped object; failures become a
    /// script exception on this object.
    fn dispatch<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&NpapiBrowserHost, &ScriptObjectRef) -> BridgeResult<T>,
    ) -> Option<T> {
        let host = self.host.upgrade()?;
        host.affinity().assert_main_thread(operation);
        let result = match self.target() {
            Some(target) => call(&host, &target),
            None => Err(BridgeError::Invalidated),
        };
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(target: "bridge::npapi", operation, error = %err, "script call failed");
                if let Some(handle) = self.handle() {
                    host.set_exception(handle, &err.to_string());
                }
                None
            }
        }
    }

    /// Membership tests never raise; a detached wrapper has no members
    fn query(
        &self,
        operation: &'static str,
        test: impl FnOnce(&NpapiBrowserHost, &ScriptObjectRef) -> BridgeResult<bool>,
    ) -> bool {
        let Some(host) = self.host.upgrade() else {
            return false;
        };
        host.affinity().assert_main_thread(operation);
        match self.target() {
            Some(target) => test(&host, &target).unwrap_or(false),
            None => false,
        }
    }
}

impl NpClass for NpJavascriptObject {
    fn invalidate(&self) {
        self.detach_from_target();
    }

    fn deallocate(&self) {
        let released = self.target.lock().take();
        let target = match released {
            Some(NativeRef::Strong(target)) => Some(target),
            Some(NativeRef::Weak(target)) => target.upgrade(),
            None => None,
        };
        if let Some(target) = target {
            target.unregister_proxy(self);
        }
        self.detached.store(true, Ordering::SeqCst);
        if let (Some(host), Some(handle)) = (self.host.upgrade(), self.handle()) {
            host.forget_wrapper(handle, (self.target_address, self.weak));
        }
    }

    fn has_method(&self, name: NpIdentifier) -> bool {
        self.query("NPClass::hasMethod", |host, target| {
            Ok(match self.member(host, name)? {
                IdentifierValue::Name(name) => target.has_method(&name),
                IdentifierValue::Index(_) => false,
            })
        })
    }

    fn invoke(&self, name: NpIdentifier, args: &[NpVariant]) -> Option<NpVariant> {
        self.dispatch("NPClass::invoke", |host, target| {
            let method = match self.member(host, name)? {
                IdentifierValue::Name(name) => name,
                IdentifierValue::Index(i) => return Err(BridgeError::NoSuchMethod(i.to_string())),
            };
            let args = host.to_native_values(args)?;
            let result = target.invoke(&method, &args)?;
            host.to_host_value(&result)
        })
    }

    fn invoke_default(&self, args: &[NpVariant]) -> Option<NpVariant> {
        self.dispatch("NPClass::invokeDefault", |host, target| {
            let args = host.to_native_values(args)?;
            let result = target.invoke_default(&args)?;
            host.to_host_value(&result)
        })
    }

    fn has_property(&self, name: NpIdentifier) -> bool {
        self.query("NPClass::hasProperty", |host, target| {
            Ok(match self.member(host, name)? {
                IdentifierValue::Name(name) => target.has_property(&name),
                IdentifierValue::Index(i) => i >= 0 && target.has_property_index(i as u32),
            })
        })
    }

    fn get_property(&self, name: NpIdentifier) -> Option<NpVariant> {
        self.dispatch("NPClass::getProperty", |host, target| {
            let value = match self.member(host, name)? {
                IdentifierValue::Name(name) => target.get_property(&name)?,
                IdentifierValue::Index(i) if i >= 0 => target.get_property_index(i as u32)?,
                IdentifierValue::Index(i) => return Err(BridgeError::NoSuchProperty(i.to_string())),
            };
            host.to_host_value(&value)
        })
    }

    fn set_property(&self, name: NpIdentifier, value: &NpVariant) -> bool {
        self.dispatch("NPClass::setProperty", |host, target| {
            let value = host.to_native_value(value)?;
            match self.member(host, name)? {
                IdentifierValue::Name(name) => target.set_property(&name, value),
                IdentifierValue::Index(i) if i >= 0 => target.set_property_index(i as u32, value),
                IdentifierValue::Index(i) => Err(BridgeError::NoSuchProperty(i.to_string())),
            }
        })
        .is_some()
    }

    fn remove_property(&self, name: NpIdentifier) -> bool {
        self.dispatch("NPClass::removeProperty", |host, target| {
            match self.member(host, name)? {
                IdentifierValue::Name(name) => target.remove_property(&name),
                IdentifierValue::Index(i) => Err(BridgeError::NoSuchProperty(i.to_string())),
            }
        })
        .is_some()
    }

    fn enumerate(&self) -> Option<Vec<NpIdentifier>> {
        self.dispatch("NPClass::enumerate", |host, target| {
            target
                .member_names()
                .iter()
                .map(|name| host.identifier(name))
                .collect()
        })
    }
}

impl ScriptProxy for NpJavascriptObject {
    fn detach(&self) {
        self.detach_from_target();
    }

    fn is_detached(&self) -> bool {
        !self.is_attached()
    }
}
