//! COM browser host
//!
//! `ComBrowserHost` is the COM counterpart of the NPAPI host: it reaches the
//! page through a `ComSite`, caches one adapter per `IDispatch` identity and
//! one wrapper per native object. Interface pointers inside a `ComVariant`
//! are borrowed; a receiver that keeps one calls `add_ref`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::dispatch_api::ComDispatchApi;
use super::js_object::ComJavascriptObject;
use super::marshal;
use super::types::{dispatch_identity, ComError, ComResult, ComVariant, DispatchRef, HResult};
use crate::bindings::marshal::VariantMarshaler;
use crate::bindings::protocol::{BrowserHost, ComIdentity, HostAbi, Task};
use crate::config::MarshalConfig;
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::thread_guard::ThreadAffinity;
use crate::platform::dom::{DomElement, DomWindow};
use crate::platform::stream::{BrowserStream, StreamOptions};
use crate::scripting::object::{object_address, ScriptObjectRef};
use crate::value::Value;

type WrapperKey = (usize, bool);

/// The ActiveX control's view of its container
///
/// Every entry has a degraded default, so a minimal container only supplies
/// what it actually offers.
pub trait ComSite: Send + Sync {
    /// `IHTMLWindow2` of the hosting page
    fn window(&self) -> Option<DispatchRef> {
        None
    }

    /// The `<object>` element hosting the control
    fn element(&self) -> Option<DispatchRef> {
        None
    }

    /// `IHTMLWindow2::execScript`
    fn exec_script(&self, _script: &str) -> ComResult<()> {
        Err(ComError::new(HResult::E_NOTIMPL, "execScript not supported"))
    }

    /// Posts `task` to the container's UI thread
    fn post_async_call(&self, _task: Task) -> bool {
        false
    }

    fn user_agent(&self) -> Option<String> {
        None
    }
}

pub struct ComBrowserHost {
    site: Arc<dyn ComSite>,
    affinity: ThreadAffinity,
    strict_types: bool,
    shut_down: AtomicBool,
    self_ref: Weak<ComBrowserHost>,
    adapters: Mutex<HashMap<ComIdentity, Weak<ComDispatchApi>>>,
    wrappers: Mutex<HashMap<WrapperKey, Weak<ComJavascriptObject>>>,
    window: Mutex<Option<Arc<ComDispatchApi>>>,
    element: Mutex<Option<Arc<ComDispatchApi>>>,
}

impl ComBrowserHost {
    /// Creates the host on the container's UI thread
    pub fn new(site: Arc<dyn ComSite>, config: &MarshalConfig) -> Arc<Self> {
        let host = Arc::new_cyclic(|self_ref| ComBrowserHost {
            site,
            affinity: ThreadAffinity::current(),
            strict_types: config.strict_types,
            shut_down: AtomicBool::new(false),
            self_ref: self_ref.clone(),
            adapters: Mutex::new(HashMap::new()),
            wrappers: Mutex::new(HashMap::new()),
            window: Mutex::new(None),
            element: Mutex::new(None),
        });
        let window = host.site.window().map(|w| host.object_api(&w));
        let element = host.site.element().map(|e| host.object_api(&e));
        if window.is_none() {
            tracing::debug!(target: "bridge::com", "container did not provide a window");
        }
        *host.window.lock() = window;
        *host.element.lock() = element;
        host
    }

    pub fn strict_types(&self) -> bool {
        self.strict_types
    }

    pub fn user_agent(&self) -> BridgeResult<String> {
        self.site
            .user_agent()
            .ok_or(BridgeError::NotAvailable("user agent"))
    }

    pub fn is_safari(&self) -> bool {
        self.user_agent()
            .map(|agent| agent.contains("Safari"))
            .unwrap_or(false)
    }

    /// Adapter for an interface pointer; one adapter per identity while alive
    pub fn object_api(&self, dispatch: &DispatchRef) -> Arc<ComDispatchApi> {
        self.affinity.assert_main_thread("object_api");
        let identity = dispatch_identity(dispatch);
        let mut adapters = self.adapters.lock();
        if let Some(existing) = adapters.get(&identity).and_then(Weak::upgrade) {
            return existing;
        }
        let adapter = Arc::new(ComDispatchApi::new(self.self_ref.clone(), Arc::clone(dispatch)));
        adapters.insert(identity, Arc::downgrade(&adapter));
        adapter
    }

    pub(crate) fn forget_adapter(&self, identity: ComIdentity) {
        let mut adapters = self.adapters.lock();
        if adapters
            .get(&identity)
            .map(|weak| weak.strong_count() == 0)
            .unwrap_or(false)
        {
            adapters.remove(&identity);
        }
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Interface pointer behind a live adapter
    pub fn dispatch_for(&self, identity: ComIdentity) -> Option<DispatchRef> {
        self.adapters
            .lock()
            .get(&identity)
            .and_then(Weak::upgrade)
            .map(|adapter| Arc::clone(adapter.dispatch()))
    }

    pub fn wrapper_count(&self) -> usize {
        self.wrappers
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// `IDispatch` wrapping a native object, reused while it is attached
    pub fn wrap_native(&self, target: &ScriptObjectRef, weak: bool) -> BridgeResult<DispatchRef> {
        self.affinity.assert_main_thread("wrap_native");
        if self.is_shut_down() {
            return Err(BridgeError::HostUnavailable("browser host"));
        }
        let key = (object_address(target), weak);
        let existing = self.wrappers.lock().get(&key).and_then(Weak::upgrade);
        if let Some(existing) = existing {
            if existing.is_attached() {
                return Ok(existing as DispatchRef);
            }
        }
        let wrapper = ComJavascriptObject::new(self.self_ref.clone(), target, weak);
        self.wrappers.lock().insert(key, Arc::downgrade(&wrapper));
        tracing::trace!(target: "bridge::com", weak, "created plugin dispatch wrapper");
        Ok(wrapper as DispatchRef)
    }

    /// The dispatch handed to the container as the control's scriptable object
    pub fn scriptable_dispatch(&self, root: &ScriptObjectRef) -> BridgeResult<DispatchRef> {
        self.wrap_native(root, false)
    }

    pub(crate) fn forget_wrapper(&self, key: WrapperKey, wrapper: *const ComJavascriptObject) {
        let mut wrappers = self.wrappers.lock();
        if wrappers
            .get(&key)
            .map(|weak| weak.strong_count() == 0 || std::ptr::eq(weak.as_ptr(), wrapper))
            .unwrap_or(false)
        {
            wrappers.remove(&key);
        }
    }

    /// The container has no stream primitive the bridge can drive
    pub fn create_stream(
        &self,
        _url: &str,
        _listener: ScriptObjectRef,
        _options: StreamOptions,
    ) -> BridgeResult<Arc<BrowserStream>> {
        Err(BridgeError::HostUnavailable("streams"))
    }

    fn window_object(&self) -> BridgeResult<Arc<ComDispatchApi>> {
        self.window
            .lock()
            .clone()
            .ok_or(BridgeError::NotAvailable("window"))
    }
}

impl VariantMarshaler for ComBrowserHost {
    type HostValue = ComVariant;

    fn to_host_value(&self, value: &Value) -> BridgeResult<ComVariant> {
        self.affinity.assert_main_thread("to_host_value");
        match marshal::builder_for(value.kind()) {
            Some(build) => build(self, value),
            None => crate::bindings::marshal::unsupported(self.strict_types, value, ComVariant::Empty),
        }
    }

    fn to_native_value(&self, value: &ComVariant) -> BridgeResult<Value> {
        self.affinity.assert_main_thread("to_native_value");
        Ok(match value {
            ComVariant::Empty => Value::Void,
            ComVariant::Null => Value::Null,
            ComVariant::Bool(v) => Value::Bool(*v),
            ComVariant::I1(v) => Value::I8(*v),
            ComVariant::UI1(v) => Value::U8(*v),
            ComVariant::I2(v) => Value::I16(*v),
            ComVariant::UI2(v) => Value::U16(*v),
            ComVariant::I4(v) => Value::I32(*v),
            ComVariant::UI4(v) => Value::U32(*v),
            ComVariant::I8(v) => Value::I64(*v),
            ComVariant::UI8(v) => Value::U64(*v),
            ComVariant::R4(v) => Value::F32(*v),
            ComVariant::R8(v) => Value::F64(*v),
            ComVariant::Bstr(s) => Value::WString(s.as_wide().to_vec()),
            ComVariant::Dispatch(dispatch) => {
                match dispatch.as_any().downcast_ref::<ComJavascriptObject>() {
                    Some(wrapper) => wrapper.native_value(),
                    None => Value::HostObject(self.object_api(dispatch)),
                }
            }
        })
    }
}

impl BrowserHost for ComBrowserHost {
    fn abi(&self) -> HostAbi {
        HostAbi::Com
    }

    fn affinity(&self) -> &ThreadAffinity {
        &self.affinity
    }

    fn schedule_on_main_thread(&self, task: Task) -> bool {
        if self.is_shut_down() {
            return false;
        }
        self.site.post_async_call(task)
    }

    fn evaluate_script(&self, script: &str) -> BridgeResult<()> {
        self.affinity.assert_main_thread("execScript");
        if self.is_shut_down() {
            return Err(BridgeError::HostUnavailable("browser host"));
        }
        self.site.exec_script(script).map_err(|err| match err.hresult {
            HResult::E_NOTIMPL => BridgeError::HostUnavailable("execScript"),
            _ => BridgeError::Exception(format!("Error executing JavaScript code: {}", err)),
        })
    }

    fn dom_window(&self) -> BridgeResult<DomWindow> {
        let window: ScriptObjectRef = self.window_object()?;
        Ok(DomWindow::new(window))
    }

    fn dom_element(&self) -> BridgeResult<DomElement> {
        let element: ScriptObjectRef = self
            .element
            .lock()
            .clone()
            .ok_or(BridgeError::NotAvailable("plugin element"))?;
        Ok(DomElement::new(element))
    }

    fn shutdown(&self) {
        let window = self.window.lock().take();
        let element = self.element.lock().take();
        drop(window);
        drop(element);

        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let wrappers: Vec<_> = self
            .wrappers
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for wrapper in &wrappers {
            wrapper.detach_from_target();
        }
        tracing::info!(target: "bridge::com", detached = wrappers.len(), "browser host shut down");
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
