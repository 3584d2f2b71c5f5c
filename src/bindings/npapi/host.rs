//! NPAPI browser host
//!
//! Owns the browser function table for one plugin instance and everything
//! keyed by browser handles: the adapter cache for browser objects, the map of
//! plugin-created wrappers, and the pending stream requests. Every call that
//! touches a browser handle asserts the browser main thread first.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::funcs::{NpClass, NpnFuncs};
use super::js_object::NpJavascriptObject;
use super::marshal;
use super::object_api::NpObjectApi;
use super::types::{IdentifierValue, NpIdentifier, NpObject, NpString, NpVariant, Npp, NpnVariable};
use crate::bindings::marshal::VariantMarshaler;
use crate::bindings::protocol::{BrowserHost, HostAbi, HostScheduler, Task};
use crate::config::MarshalConfig;
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::thread_guard::ThreadAffinity;
use crate::platform::dom::{DomElement, DomWindow};
use crate::platform::stream::{BrowserStream, StreamOptions};
use crate::scripting::object::{object_address, ScriptObjectRef};
use crate::value::Value;

/// Key of a wrapper in the reuse cache: native object address and weak flag
type WrapperKey = (usize, bool);

pub struct NpapiBrowserHost {
    npp: Npp,
    funcs: NpnFuncs,
    affinity: ThreadAffinity,
    strict_types: bool,
    shut_down: AtomicBool,
    self_ref: Weak<NpapiBrowserHost>,
    adapters: Mutex<HashMap<NpObject, Weak<NpObjectApi>>>,
    wrappers: Mutex<HashMap<NpObject, Weak<NpJavascriptObject>>>,
    wrapper_cache: Mutex<HashMap<WrapperKey, NpObject>>,
    window: Mutex<Option<Arc<NpObjectApi>>>,
    element: Mutex<Option<Arc<NpObjectApi>>>,
    streams: Mutex<HashMap<usize, Arc<BrowserStream>>>,
    next_stream: AtomicUsize,
}

impl NpapiBrowserHost {
    /// Creates the host on the browser main thread and fetches the window
    /// and plugin element objects.
    pub fn new(npp: Npp, funcs: NpnFuncs, config: &MarshalConfig) -> Arc<Self> {
        let missing = funcs.missing_entries();
        if !missing.is_empty() {
            tracing::debug!(target: "bridge::npapi", ?missing, "browser left function table entries empty");
        }
        let host = Arc::new_cyclic(|self_ref| NpapiBrowserHost {
            npp,
            funcs,
            affinity: ThreadAffinity::current(),
            strict_types: config.strict_types,
            shut_down: AtomicBool::new(false),
            self_ref: self_ref.clone(),
            adapters: Mutex::new(HashMap::new()),
            wrappers: Mutex::new(HashMap::new()),
            wrapper_cache: Mutex::new(HashMap::new()),
            window: Mutex::new(None),
            element: Mutex::new(None),
            streams: Mutex::new(HashMap::new()),
            next_stream: AtomicUsize::new(1),
        });
        *host.window.lock() = host.fetch_object(NpnVariable::WindowNpObject);
        *host.element.lock() = host.fetch_object(NpnVariable::PluginElementNpObject);
        host
    }

    fn fetch_object(&self, variable: NpnVariable) -> Option<Arc<NpObjectApi>> {
        let get_value = self.funcs.get_value.as_ref()?;
        match get_value(self.npp, variable) {
            Ok(handle) => {
                let adapter = self.object_api(handle);
                // NPN_GetValue hands out a reference the adapter does not own
                self.release(handle);
                Some(adapter)
            }
            Err(err) => {
                tracing::debug!(target: "bridge::npapi", ?variable, error = %err, "NPN_GetValue failed");
                None
            }
        }
    }

    pub fn npp(&self) -> Npp {
        self.npp
    }

    pub(crate) fn funcs(&self) -> &NpnFuncs {
        &self.funcs
    }

    pub fn strict_types(&self) -> bool {
        self.strict_types
    }

    pub fn retain(&self, object: NpObject) {
        if self.is_shut_down() {
            return;
        }
        self.affinity.assert_main_thread("NPN_RetainObject");
        if let Some(retain) = &self.funcs.retain_object {
            retain(object);
        }
    }

    pub fn release(&self, object: NpObject) {
        if self.is_shut_down() {
            return;
        }
        self.affinity.assert_main_thread("NPN_ReleaseObject");
        if let Some(release) = &self.funcs.release_object {
            release(object);
        }
    }

    pub fn release_variant(&self, variant: &NpVariant) {
        if self.is_shut_down() {
            return;
        }
        self.affinity.assert_main_thread("NPN_ReleaseVariantValue");
        if let Some(release) = &self.funcs.release_variant_value {
            release(variant);
        }
    }

    pub fn identifier(&self, name: &str) -> BridgeResult<NpIdentifier> {
        self.affinity.assert_main_thread("NPN_GetStringIdentifier");
        let intern = self
            .funcs
            .get_string_identifier
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_GetStringIdentifier"))?;
        Ok(intern(name))
    }

    pub fn int_identifier(&self, index: i32) -> BridgeResult<NpIdentifier> {
        self.affinity.assert_main_thread("NPN_GetIntIdentifier");
        let intern = self
            .funcs
            .get_int_identifier
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_GetIntIdentifier"))?;
        Ok(intern(index))
    }

    /// Decodes an identifier into a member name or an index
    pub fn identifier_value(&self, id: NpIdentifier) -> BridgeResult<IdentifierValue> {
        self.affinity.assert_main_thread("NPN_IdentifierIsString");
        let is_string = self
            .funcs
            .identifier_is_string
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_IdentifierIsString"))?;
        if is_string(id) {
            let utf8 = self
                .funcs
                .utf8_from_identifier
                .as_ref()
                .ok_or(BridgeError::HostUnavailable("NPN_UTF8FromIdentifier"))?;
            utf8(id)
                .map(IdentifierValue::Name)
                .ok_or(BridgeError::HostUnavailable("NPN_UTF8FromIdentifier"))
        } else {
            let int = self
                .funcs
                .int_from_identifier
                .as_ref()
                .ok_or(BridgeError::HostUnavailable("NPN_IntFromIdentifier"))?;
            Ok(IdentifierValue::Index(int(id)))
        }
    }

    pub fn set_exception(&self, object: NpObject, message: &str) {
        self.affinity.assert_main_thread("NPN_SetException");
        if let Some(set_exception) = &self.funcs.set_exception {
            set_exception(object, message);
        }
    }

    pub fn set_status(&self, message: &str) {
        self.affinity.assert_main_thread("NPN_Status");
        if let Some(status) = &self.funcs.status {
            status(self.npp, message);
        }
    }

    pub fn user_agent(&self) -> BridgeResult<String> {
        let user_agent = self
            .funcs
            .user_agent
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_UserAgent"))?;
        user_agent(self.npp).ok_or(BridgeError::NotAvailable("user agent"))
    }

    pub fn is_safari(&self) -> bool {
        self.user_agent()
            .map(|agent| agent.contains("Safari"))
            .unwrap_or(false)
    }

    /// Adapter for a browser object; the same handle always yields the same
    /// adapter while it is alive. A new adapter retains the handle.
    pub fn object_api(&self, object: NpObject) -> Arc<NpObjectApi> {
        self.affinity.assert_main_thread("object_api");
        let mut adapters = self.adapters.lock();
        if let Some(existing) = adapters.get(&object).and_then(Weak::upgrade) {
            return existing;
        }
        self.retain(object);
        let adapter = Arc::new(NpObjectApi::new(self.self_ref.clone(), object));
        adapters.insert(object, Arc::downgrade(&adapter));
        adapter
    }

    pub(crate) fn forget_adapter(&self, object: NpObject) {
        let mut adapters = self.adapters.lock();
        if adapters
            .get(&object)
            .map(|weak| weak.strong_count() == 0)
            .unwrap_or(false)
        {
            adapters.remove(&object);
        }
    }

    /// Number of live browser object adapters
    pub fn adapter_count(&self) -> usize {
        self.adapters
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// The plugin wrapper behind `object`, if the handle is one of ours
    pub fn wrapper_for(&self, object: NpObject) -> Option<Arc<NpJavascriptObject>> {
        self.wrappers.lock().get(&object).and_then(Weak::upgrade)
    }

    pub fn wrapper_count(&self) -> usize {
        self.wrappers
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Browser object wrapping a native object
    ///
    /// The returned handle carries one reference owned by the caller.
    pub fn wrap_native(&self, target: &ScriptObjectRef, weak: bool) -> BridgeResult<NpObject> {
        self.affinity.assert_main_thread("NPN_CreateObject");
        let key = (object_address(target), weak);
        let cached = self.wrapper_cache.lock().get(&key).copied();
        if let Some(handle) = cached {
            if let Some(wrapper) = self.wrapper_for(handle) {
                if wrapper.is_attached() {
                    self.retain(handle);
                    return Ok(handle);
                }
            }
        }

        let create = self
            .funcs
            .create_object
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_CreateObject"))?;
        let wrapper = NpJavascriptObject::new(self.self_ref.clone(), target, weak);
        let handle = create(self.npp, wrapper.clone() as Arc<dyn NpClass>)
            .ok_or_else(|| BridgeError::Exception("NPN_CreateObject failed".to_string()))?;
        wrapper.attach(handle);

        self.wrappers.lock().insert(handle, Arc::downgrade(&wrapper));
        self.wrapper_cache.lock().insert(key, handle);
        tracing::trace!(target: "bridge::npapi", ?handle, weak, "created plugin object wrapper");
        Ok(handle)
    }

    /// The object handed to the browser as the plugin element's scriptable
    /// object (`NPPVpluginScriptableNPObject`)
    pub fn scriptable_object(&self, root: &ScriptObjectRef) -> BridgeResult<NpObject> {
        self.wrap_native(root, false)
    }

    pub(crate) fn forget_wrapper(&self, handle: NpObject, key: WrapperKey) {
        self.wrappers.lock().remove(&handle);
        let mut cache = self.wrapper_cache.lock();
        if cache.get(&key) == Some(&handle) {
            cache.remove(&key);
        }
    }

    /// Marshals call arguments; on failure the ones already built are released
    pub(crate) fn to_host_args(&self, args: &[Value]) -> BridgeResult<Vec<NpVariant>> {
        let mut built = Vec::with_capacity(args.len());
        for arg in args {
            match self.to_host_value(arg) {
                Ok(variant) => built.push(variant),
                Err(err) => {
                    self.release_args(&built);
                    return Err(err);
                }
            }
        }
        Ok(built)
    }

    pub(crate) fn release_args(&self, args: &[NpVariant]) {
        for arg in args {
            self.release_variant(arg);
        }
    }

    /// Converts a call result and releases the browser's reference to it
    pub(crate) fn take_result(&self, result: NpVariant) -> BridgeResult<Value> {
        let value = self.to_native_value(&result);
        self.release_variant(&result);
        value
    }

    /// Requests `url` from the browser and announces the stream to `listener`
    /// once the browser accepted the request.
    ///
    /// The listener is attached before `NPN_GetURLNotify`, so it cannot miss
    /// the `onstreamcreated` notification.
    pub fn create_stream(
        &self,
        url: &str,
        listener: ScriptObjectRef,
        options: StreamOptions,
    ) -> BridgeResult<Arc<BrowserStream>> {
        self.affinity.assert_main_thread("create_stream");
        if self.is_shut_down() {
            return Err(BridgeError::HostUnavailable("browser host"));
        }
        let get_url_notify = self
            .funcs
            .get_url_notify
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_GetURLNotify"))?;
        let me: Arc<dyn BrowserHost> = self
            .self_ref
            .upgrade()
            .ok_or(BridgeError::HostUnavailable("browser host"))?;

        let stream = BrowserStream::new(url, options, Arc::new(HostScheduler::new(&me)));
        stream.attach_listener(listener)?;
        let notify_data = self.next_stream.fetch_add(1, Ordering::Relaxed);
        self.streams.lock().insert(notify_data, Arc::clone(&stream));

        match get_url_notify(self.npp, url, None, notify_data) {
            Ok(()) => {
                stream.mark_created()?;
                Ok(stream)
            }
            Err(err) => {
                self.streams.lock().remove(&notify_data);
                tracing::warn!(target: "bridge::npapi", url, error = %err, "NPN_GetURLNotify failed");
                Err(err.into())
            }
        }
    }

    /// Stream registered under a `NPN_GetURLNotify` notify value
    pub fn stream_for_notify(&self, notify_data: usize) -> Option<Arc<BrowserStream>> {
        self.streams.lock().get(&notify_data).cloned()
    }

    /// Forgets a stream once the browser delivered `NPP_URLNotify`
    pub fn finish_stream(&self, notify_data: usize) -> Option<Arc<BrowserStream>> {
        self.streams.lock().remove(&notify_data)
    }

    fn window_object(&self) -> BridgeResult<Arc<NpObjectApi>> {
        self.window
            .lock()
            .clone()
            .ok_or(BridgeError::NotAvailable("window"))
    }
}

impl VariantMarshaler for NpapiBrowserHost {
    type HostValue = NpVariant;

    fn to_host_value(&self, value: &Value) -> BridgeResult<NpVariant> {
        self.affinity.assert_main_thread("to_host_value");
        match marshal::builder_for(value.kind()) {
            Some(build) => build(self, value),
            None => crate::bindings::marshal::unsupported(self.strict_types, value, NpVariant::Void),
        }
    }

    fn to_native_value(&self, value: &NpVariant) -> BridgeResult<Value> {
        self.affinity.assert_main_thread("to_native_value");
        Ok(match value {
            NpVariant::Void => Value::Void,
            NpVariant::Null => Value::Null,
            NpVariant::Bool(b) => Value::Bool(*b),
            NpVariant::Int32(i) => Value::I32(*i),
            NpVariant::Double(d) => Value::F64(*d),
            NpVariant::String(s) => Value::String(s.to_string_lossy()),
            NpVariant::Object(handle) => match self.wrapper_for(*handle) {
                Some(wrapper) => wrapper.native_value(),
                None => Value::HostObject(self.object_api(*handle)),
            },
        })
    }
}

impl BrowserHost for NpapiBrowserHost {
    fn abi(&self) -> HostAbi {
        HostAbi::Npapi
    }

    fn affinity(&self) -> &ThreadAffinity {
        &self.affinity
    }

    fn schedule_on_main_thread(&self, task: Task) -> bool {
        if self.is_shut_down() {
            return false;
        }
        match &self.funcs.plugin_thread_async_call {
            Some(async_call) => {
                async_call(self.npp, task);
                true
            }
            None => false,
        }
    }

    fn evaluate_script(&self, script: &str) -> BridgeResult<()> {
        self.affinity.assert_main_thread("NPN_Evaluate");
        let window = self.window_object()?;
        let evaluate = self
            .funcs
            .evaluate
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_Evaluate"))?;
        match evaluate(self.npp, window.object(), &NpString::new(script)) {
            Some(result) => {
                // NPN_Evaluate can return a value but execScript cannot; drop it
                self.release_variant(&result);
                Ok(())
            }
            None => Err(BridgeError::Exception(
                "Error executing JavaScript code".to_string(),
            )),
        }
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
        self.streams.lock().clear();
        tracing::info!(target: "bridge::npapi", detached = wrappers.len(), "browser host shut down");
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
