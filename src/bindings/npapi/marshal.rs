//! Value → NPVariant converters
//!
//! Numbers that fit in 32 bits go out as `Int32`; wider integers and floats
//! go out as `Double`. Narrow and wide strings both become UTF-8 `NPString`s.
//! Every object variant produced here carries one reference owned by the
//! receiver.

use super::host::NpapiBrowserHost;
use super::types::{NpString, NpVariant};
use crate::bindings::marshal::{build_host_list, build_host_map};
use crate::bindings::protocol::{BrowserHost, HostHandle};
use crate::core::error::BridgeResult;
use crate::scripting::object::ScriptObjectRef;
use crate::value::{Value, ValueKind};

pub(crate) type Builder = fn(&NpapiBrowserHost, &Value) -> BridgeResult<NpVariant>;

/// Converter for a value kind; `None` for kinds NPAPI cannot carry
pub(crate) fn builder_for(kind: ValueKind) -> Option<Builder> {
    let build: Builder = match kind {
        ValueKind::Void => |_, _| Ok(NpVariant::Void),
        ValueKind::Null => |_, _| Ok(NpVariant::Null),
        ValueKind::Bool => bool_variant,
        ValueKind::I8 | ValueKind::U8 | ValueKind::I16 | ValueKind::U16 | ValueKind::I32 => {
            int32_variant
        }
        ValueKind::U32 | ValueKind::I64 | ValueKind::U64 | ValueKind::F32 | ValueKind::F64 => {
            double_variant
        }
        ValueKind::String | ValueKind::WString => string_variant,
        ValueKind::List => list_variant,
        ValueKind::Map => map_variant,
        ValueKind::Object | ValueKind::HostObject => object_variant,
        ValueKind::WeakObject => weak_variant,
        ValueKind::Opaque => return None,
    };
    Some(build)
}

fn bool_variant(_: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    Ok(NpVariant::Bool(matches!(value, Value::Bool(true))))
}

fn int32_variant(_: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    let v = match value {
        Value::I8(v) => *v as i32,
        Value::U8(v) => *v as i32,
        Value::I16(v) => *v as i32,
        Value::U16(v) => *v as i32,
        Value::I32(v) => *v,
        _ => 0,
    };
    Ok(NpVariant::Int32(v))
}

fn double_variant(_: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    Ok(NpVariant::Double(value.as_f64().unwrap_or_default()))
}

fn string_variant(_: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    let s = value.as_string().unwrap_or_default();
    Ok(NpVariant::String(NpString::new(&s)))
}

fn list_variant(host: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    let Value::List(items) = value else {
        return Ok(NpVariant::Null);
    };
    let array = build_host_list(&host.dom_window()?, items)?;
    Ok(owned_handle(host, &array))
}

fn map_variant(host: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    let Value::Map(entries) = value else {
        return Ok(NpVariant::Null);
    };
    let object = build_host_map(&host.dom_window()?, entries)?;
    Ok(owned_handle(host, &object))
}

fn object_variant(host: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    match value {
        Value::Object(object) | Value::HostObject(object) => native_or_host(host, object, false),
        _ => Ok(NpVariant::Null),
    }
}

fn weak_variant(host: &NpapiBrowserHost, value: &Value) -> BridgeResult<NpVariant> {
    match value.as_object() {
        Some(object) => native_or_host(host, &object, true),
        None => Ok(NpVariant::Null),
    }
}

/// Browser objects pass through with an extra reference; anything else is
/// wrapped in a plugin object.
fn native_or_host(
    host: &NpapiBrowserHost,
    object: &ScriptObjectRef,
    weak: bool,
) -> BridgeResult<NpVariant> {
    if let Some(HostHandle::Npapi(_)) = object.host_handle() {
        return Ok(owned_handle(host, object));
    }
    Ok(NpVariant::Object(host.wrap_native(object, weak)?))
}

fn owned_handle(host: &NpapiBrowserHost, object: &ScriptObjectRef) -> NpVariant {
    match object.host_handle() {
        Some(HostHandle::Npapi(handle)) => {
            host.retain(handle);
            NpVariant::Object(handle)
        }
        _ => NpVariant::Null,
    }
}
