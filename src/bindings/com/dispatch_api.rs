//! `IDispatch` adapter
//!
//! `ComDispatchApi` presents a container-owned `IDispatch` through the
//! `ScriptObject` contract. It holds one `add_ref` from creation until drop.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::host::ComBrowserHost;
use super::types::{dispatch_identity, DispId, DispatchFlags, DispatchRef, HResult};
use crate::bindings::marshal::VariantMarshaler;
use crate::bindings::protocol::{BrowserHost, HostHandle};
use crate::core::error::{BridgeError, BridgeResult};
use crate::scripting::object::ScriptObject;
use crate::value::Value;

pub struct ComDispatchApi {
    host: Weak<ComBrowserHost>,
    dispatch: DispatchRef,
    dispids: Mutex<HashMap<String, DispId>>,
}

impl ComDispatchApi {
    pub(crate) fn new(host: Weak<ComBrowserHost>, dispatch: DispatchRef) -> Self {
        dispatch.add_ref();
        Self {
            host,
            dispatch,
            dispids: Mutex::new(HashMap::new()),
        }
    }

    pub fn dispatch(&self) -> &DispatchRef {
        &self.dispatch
    }

    fn host(&self, operation: &str) -> BridgeResult<Arc<ComBrowserHost>> {
        let host = self
            .host
            .upgrade()
            .ok_or(BridgeError::HostUnavailable("browser host"))?;
        host.affinity().assert_main_thread(operation);
        if host.is_shut_down() {
            return Err(BridgeError::HostUnavailable("browser host"));
        }
        Ok(host)
    }

    /// Callers must go through `host()` first; the lookup touches the dispatch.
    fn dispid(&self, name: &str) -> Option<DispId> {
        if let Some(id) = self.dispids.lock().get(name).copied() {
            return Some(id);
        }
        let id = self.dispatch.get_dispid(name).ok()?;
        self.dispids.lock().insert(name.to_string(), id);
        Some(id)
    }

    fn call(
        &self,
        host: &ComBrowserHost,
        id: DispId,
        flags: DispatchFlags,
        args: &[Value],
    ) -> BridgeResult<Value> {
        let host_args = host.to_host_values(args)?;
        let result = self.dispatch.invoke(id, flags, &host_args)?;
        host.to_native_value(&result)
    }

    fn property_get(&self, name: &str) -> BridgeResult<Value> {
        let host = self.host("IDispatch::Invoke(get)")?;
        let id = self
            .dispid(name)
            .ok_or_else(|| BridgeError::NoSuchProperty(name.to_string()))?;
        self.call(&host, id, DispatchFlags::PROPERTYGET, &[])
            .map_err(|err| not_found_as_property(err, name))
    }

    fn property_put(&self, name: &str, value: Value) -> BridgeResult<()> {
        let host = self.host("IDispatch::Invoke(put)")?;
        let id = self
            .dispid(name)
            .ok_or_else(|| BridgeError::NoSuchProperty(name.to_string()))?;
        self.call(&host, id, DispatchFlags::PROPERTYPUT, &[value])
            .map(|_| ())
            .map_err(|err| not_found_as_property(err, name))
    }
}

fn not_found_as_property(err: BridgeError, name: &str) -> BridgeError {
    match err {
        BridgeError::NoSuchMethod(_) => BridgeError::NoSuchProperty(name.to_string()),
        other => other,
    }
}

impl ScriptObject for ComDispatchApi {
    fn member_names(&self) -> Vec<String> {
        if self.host("IDispatchEx::GetNextDispID").is_err() {
            return Vec::new();
        }
        self.dispatch.member_names().unwrap_or_default()
    }

    fn has_method(&self, name: &str) -> bool {
        self.host("IDispatch::GetIDsOfNames").is_ok() && self.dispid(name).is_some()
    }

    fn has_property(&self, name: &str) -> bool {
        self.host("IDispatch::GetIDsOfNames").is_ok() && self.dispid(name).is_some()
    }

    fn has_property_index(&self, index: u32) -> bool {
        self.has_property(&index.to_string())
    }

    fn get_property(&self, name: &str) -> BridgeResult<Value> {
        self.property_get(name)
    }

    fn set_property(&self, name: &str, value: Value) -> BridgeResult<()> {
        self.property_put(name, value)
    }

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        self.host("IDispatchEx::DeleteMemberByName")?;
        self.dispids.lock().remove(name);
        self.dispatch.delete_member(name).map_err(|err| match err.hresult {
            HResult::E_NOTIMPL => BridgeError::NotAvailable("member deletion"),
            _ => BridgeError::NoSuchProperty(name.to_string()),
        })
    }

    fn get_property_index(&self, index: u32) -> BridgeResult<Value> {
        self.property_get(&index.to_string())
    }

    fn set_property_index(&self, index: u32, value: Value) -> BridgeResult<()> {
        self.property_put(&index.to_string(), value)
    }

    fn invoke(&self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        let host = self.host("IDispatch::Invoke")?;
        let id = self
            .dispid(name)
            .ok_or_else(|| BridgeError::NoSuchMethod(name.to_string()))?;
        self.call(&host, id, DispatchFlags::METHOD, args)
    }

    fn invoke_default(&self, args: &[Value]) -> BridgeResult<Value> {
        let host = self.host("IDispatch::Invoke")?;
        self.call(&host, DispId::VALUE, DispatchFlags::METHOD, args)
    }

    fn is_valid(&self) -> bool {
        self.host
            .upgrade()
            .map(|host| !host.is_shut_down())
            .unwrap_or(false)
    }

    fn host_handle(&self) -> Option<HostHandle> {
        Some(HostHandle::Com(dispatch_identity(&self.dispatch)))
    }
}

impl Drop for ComDispatchApi {
    fn drop(&mut self) {
        let Some(host) = self.host.upgrade() else {
            return;
        };
        host.forget_adapter(dispatch_identity(&self.dispatch));
        if host.is_shut_down() {
            return;
        }
        if host.affinity().is_current() {
            self.dispatch.release();
            return;
        }

        let dispatch = Arc::clone(&self.dispatch);
        let posted = host.schedule_on_main_thread(Box::new(move || {
            dispatch.release();
        }));
        if !posted {
            tracing::warn!(target: "bridge::com", "could not post release to the main thread");
        }
    }
}

impl std::fmt::Debug for ComDispatchApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComDispatchApi")
            .field("identity", &dispatch_identity(&self.dispatch))
            .finish()
    }
}
