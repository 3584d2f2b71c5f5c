//! Variant marshaling shared by both ABIs
//!
//! Each ABI selects its converter for a value through an exhaustive `match`
//! over `ValueKind`; the table is fixed at compile time and needs no locking.
//! `ValueKind::Opaque` has no converter: by default it becomes the host's
//! void value (logged at debug level), or `UnsupportedType` in strict mode.

use std::collections::BTreeMap;

use crate::core::error::{BridgeError, BridgeResult};
use crate::platform::dom::DomWindow;
use crate::scripting::object::ScriptObjectRef;
use crate::value::{Value, ValueKind};

/// Every kind with a host representation
pub const SUPPORTED_KINDS: &[ValueKind] = &[
    ValueKind::Void,
    ValueKind::Null,
    ValueKind::Bool,
    ValueKind::I8,
    ValueKind::U8,
    ValueKind::I16,
    ValueKind::U16,
    ValueKind::I32,
    ValueKind::U32,
    ValueKind::I64,
    ValueKind::U64,
    ValueKind::F32,
    ValueKind::F64,
    ValueKind::String,
    ValueKind::WString,
    ValueKind::List,
    ValueKind::Map,
    ValueKind::Object,
    ValueKind::WeakObject,
    ValueKind::HostObject,
];

impl ValueKind {
    pub fn is_supported(self) -> bool {
        !matches!(self, ValueKind::Opaque)
    }
}

/// Value ⇄ host value conversion for one ABI
///
/// Both directions must run on the host main thread.
pub trait VariantMarshaler {
    type HostValue;

    fn to_host_value(&self, value: &Value) -> BridgeResult<Self::HostValue>;

    fn to_native_value(&self, value: &Self::HostValue) -> BridgeResult<Value>;

    /// Converts a whole argument list, stopping at the first failure
    fn to_host_values(&self, values: &[Value]) -> BridgeResult<Vec<Self::HostValue>> {
        values.iter().map(|v| self.to_host_value(v)).collect()
    }

    fn to_native_values(&self, values: &[Self::HostValue]) -> BridgeResult<Vec<Value>> {
        values.iter().map(|v| self.to_native_value(v)).collect()
    }
}

/// Outcome for a value with no converter
pub(crate) fn unsupported<H>(strict: bool, value: &Value, void: H) -> BridgeResult<H> {
    if strict {
        tracing::warn!(target: "bridge::marshal", type_name = value.type_name(), "unsupported value type");
        Err(BridgeError::UnsupportedType(value.type_name()))
    } else {
        tracing::debug!(target: "bridge::marshal", type_name = value.type_name(), "dropping unsupported value type");
        Ok(void)
    }
}

/// Builds a host array through the window's `Array()` constructor
pub(crate) fn build_host_list(window: &DomWindow, items: &[Value]) -> BridgeResult<ScriptObjectRef> {
    let array = window.create_array()?;
    for item in items {
        array.invoke("push", std::slice::from_ref(item))?;
    }
    Ok(array)
}

/// Builds a host object through the window's `Object()` constructor
pub(crate) fn build_host_map(
    window: &DomWindow,
    entries: &BTreeMap<String, Value>,
) -> BridgeResult<ScriptObjectRef> {
    let object = window.create_object()?;
    for (key, value) in entries {
        object.set_property(key, value.clone())?;
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_kinds_exclude_opaque() {
        assert_eq!(SUPPORTED_KINDS.len(), 20);
        assert!(SUPPORTED_KINDS.iter().all(|k| k.is_supported()));
        assert!(!ValueKind::Opaque.is_supported());
    }

    #[test]
    fn test_unsupported_policy() {
        let value = Value::opaque(std::time::Instant::now());
        assert_eq!(unsupported(false, &value, 0u8).unwrap(), 0);
        assert!(matches!(
            unsupported(true, &value, 0u8),
            Err(BridgeError::UnsupportedType(_))
        ));
    }
}
