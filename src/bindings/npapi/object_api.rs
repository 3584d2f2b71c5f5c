//! Browser object adapter
//!
//! `NpObjectApi` presents a browser-owned `NPObject` through the
//! `ScriptObject` contract. It holds one browser reference for its whole
//! lifetime and releases it exactly once when dropped: directly on the main
//! thread, otherwise through the host's async call queue.

use std::sync::{Arc, Weak};

use super::host::NpapiBrowserHost;
use super::types::{IdentifierValue, NpObject};
use crate::bindings::protocol::{BrowserHost, HostHandle};
use crate::core::error::{BridgeError, BridgeResult};
use crate::scripting::object::ScriptObject;
use crate::value::Value;

pub struct NpObjectApi {
    host: Weak<NpapiBrowserHost>,
    object: NpObject,
}

impl NpObjectApi {
    pub(crate) fn new(host: Weak<NpapiBrowserHost>, object: NpObject) -> Self {
        Self { host, object }
    }

    pub fn object(&self) -> NpObject {
        self.object
    }

    fn host(&self, operation: &str) -> BridgeResult<Arc<NpapiBrowserHost>> {
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

    fn member_test(&self, operation: &'static str, name: &str, index: bool) -> bool {
        let Ok(host) = self.host(operation) else {
            return false;
        };
        let funcs = host.funcs();
        let test = match operation {
            "NPN_HasMethod" => funcs.has_method.as_ref(),
            _ => funcs.has_property.as_ref(),
        };
        let id = if index {
            name.parse().ok().and_then(|i| host.int_identifier(i).ok())
        } else {
            host.identifier(name).ok()
        };
        match (test, id) {
            (Some(test), Some(id)) => test(host.npp(), self.object, id),
            _ => false,
        }
    }

    fn read(&self, host: &NpapiBrowserHost, id: super::types::NpIdentifier, name: &str) -> BridgeResult<Value> {
        let get = host
            .funcs()
            .get_property
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_GetProperty"))?;
        match get(host.npp(), self.object, id) {
            Some(result) => host.take_result(result),
            None => Err(BridgeError::NoSuchProperty(name.to_string())),
        }
    }

    fn write(&self, host: &NpapiBrowserHost, id: super::types::NpIdentifier, name: &str, value: &Value) -> BridgeResult<()> {
        let set = host
            .funcs()
            .set_property
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_SetProperty"))?;
        let args = host.to_host_args(std::slice::from_ref(value))?;
        let ok = set(host.npp(), self.object, id, &args[0]);
        host.release_args(&args);
        if ok {
            Ok(())
        } else {
            Err(BridgeError::Exception(format!("Failed to set property {}", name)))
        }
    }
}

/// NPAPI integer identifiers are `int32_t`; larger indices name no property
fn index_identifier(index: u32) -> BridgeResult<i32> {
    i32::try_from(index).map_err(|_| BridgeError::NoSuchProperty(index.to_string()))
}

impl ScriptObject for NpObjectApi {
    fn member_names(&self) -> Vec<String> {
        let Ok(host) = self.host("NPN_Enumerate") else {
            return Vec::new();
        };
        let Some(enumerate) = host.funcs().enumerate.as_ref() else {
            return Vec::new();
        };
        enumerate(host.npp(), self.object)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| match host.identifier_value(id) {
                Ok(IdentifierValue::Name(name)) => Some(name),
                Ok(IdentifierValue::Index(i)) => Some(i.to_string()),
                Err(_) => None,
            })
            .collect()
    }

    fn has_method(&self, name: &str) -> bool {
        self.member_test("NPN_HasMethod", name, false)
    }

    fn has_property(&self, name: &str) -> bool {
        self.member_test("NPN_HasProperty", name, false)
    }

    fn has_property_index(&self, index: u32) -> bool {
        self.member_test("NPN_HasProperty", &index.to_string(), true)
    }

    fn get_property(&self, name: &str) -> BridgeResult<Value> {
        let host = self.host("NPN_GetProperty")?;
        let id = host.identifier(name)?;
        self.read(&host, id, name)
    }

    fn set_property(&self, name: &str, value: Value) -> BridgeResult<()> {
        let host = self.host("NPN_SetProperty")?;
        let id = host.identifier(name)?;
        self.write(&host, id, name, &value)
    }

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        let host = self.host("NPN_RemoveProperty")?;
        let id = host.identifier(name)?;
        let remove = host
            .funcs()
            .remove_property
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_RemoveProperty"))?;
        if remove(host.npp(), self.object, id) {
            Ok(())
        } else {
            Err(BridgeError::NoSuchProperty(name.to_string()))
        }
    }

    fn get_property_index(&self, index: u32) -> BridgeResult<Value> {
        let host = self.host("NPN_GetProperty")?;
        let id = host.int_identifier(index_identifier(index)?)?;
        self.read(&host, id, &index.to_string())
    }

    fn set_property_index(&self, index: u32, value: Value) -> BridgeResult<()> {
        let host = self.host("NPN_SetProperty")?;
        let id = host.int_identifier(index_identifier(index)?)?;
        self.write(&host, id, &index.to_string(), &value)
    }

    fn invoke(&self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        let host = self.host("NPN_Invoke")?;
        let id = host.identifier(name)?;
        let invoke = host
            .funcs()
            .invoke
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_Invoke"))?;
        let host_args = host.to_host_args(args)?;
        let result = invoke(host.npp(), self.object, id, &host_args);
        host.release_args(&host_args);
        match result {
            Some(result) => host.take_result(result),
            None => Err(BridgeError::Exception(format!("Error calling method {}", name))),
        }
    }

    fn invoke_default(&self, args: &[Value]) -> BridgeResult<Value> {
        let host = self.host("NPN_InvokeDefault")?;
        let invoke = host
            .funcs()
            .invoke_default
            .as_ref()
            .ok_or(BridgeError::HostUnavailable("NPN_InvokeDefault"))?;
        let host_args = host.to_host_args(args)?;
        let result = invoke(host.npp(), self.object, &host_args);
        host.release_args(&host_args);
        match result {
            Some(result) => host.take_result(result),
            None => Err(BridgeError::Exception(
                "Error calling default method".to_string(),
            )),
        }
    }

    fn is_valid(&self) -> bool {
        self.host
            .upgrade()
            .map(|host| !host.is_shut_down())
            .unwrap_or(false)
    }

    fn host_handle(&self) -> Option<HostHandle> {
        Some(HostHandle::Npapi(self.object))
    }
}

impl Drop for NpObjectApi {
    fn drop(&mut self) {
        let Some(host) = self.host.upgrade() else {
            return;
        };
        host.forget_adapter(self.object);
        if host.is_shut_down() {
            return;
        }
        if host.affinity().is_current() {
            host.release(self.object);
            return;
        }

        let object = self.object;
        let weak_host = Arc::downgrade(&host);
        let posted = host.schedule_on_main_thread(Box::new(move || {
            if let Some(host) = weak_host.upgrade() {
                host.release(object);
            }
        }));
        if !posted {
            tracing::warn!(target: "bridge::npapi", ?object, "could not post release to the main thread");
        }
    }
}
