//! Value → VARIANT converters
//!
//! Every integer width keeps its own VARIANT type; strings of either width
//! become `BSTR`s.

use super::host::ComBrowserHost;
use super::types::{Bstr, ComVariant};
use crate::bindings::marshal::{build_host_list, build_host_map};
use crate::bindings::protocol::{BrowserHost, HostHandle};
use crate::core::error::BridgeResult;
use crate::scripting::object::ScriptObjectRef;
use crate::value::{Value, ValueKind};

pub(crate) type Builder = fn(&ComBrowserHost, &Value) -> BridgeResult<ComVariant>;

pub(crate) fn builder_for(kind: ValueKind) -> Option<Builder> {
    let build: Builder = match kind {
        ValueKind::Void => |_, _| Ok(ComVariant::Empty),
        ValueKind::Null => |_, _| Ok(ComVariant::Null),
        ValueKind::Bool
        | ValueKind::I8
        | ValueKind::U8
        | ValueKind::I16
        | ValueKind::U16
        | ValueKind::I32
        | ValueKind::U32
        | ValueKind::I64
        | ValueKind::U64
        | ValueKind::F32
        | ValueKind::F64 => scalar_variant,
        ValueKind::String | ValueKind::WString => string_variant,
        ValueKind::List => list_variant,
        ValueKind::Map => map_variant,
        ValueKind::Object | ValueKind::HostObject => object_variant,
        ValueKind::WeakObject => weak_variant,
        ValueKind::Opaque => return None,
    };
    Some(build)
}

fn scalar_variant(_: &ComBrowserHost, value: &Value) -> BridgeResult<ComVariant> {
    Ok(match value {
        Value::Bool(v) => ComVariant::Bool(*v),
        Value::I8(v) => ComVariant::I1(*v),
        Value::U8(v) => ComVariant::UI1(*v),
        Value::I16(v) => ComVariant::I2(*v),
        Value::U16(v) => ComVariant::UI2(*v),
        Value::I32(v) => ComVariant::I4(*v),
        Value::U32(v) => ComVariant::UI4(*v),
        Value::I64(v) => ComVariant::I8(*v),
        Value::U64(v) => ComVariant::UI8(*v),
        Value::F32(v) => ComVariant::R4(*v),
        Value::F64(v) => ComVariant::R8(*v),
        _ => ComVariant::Empty,
    })
}

fn string_variant(_: &ComBrowserHost, value: &Value) -> BridgeResult<ComVariant> {
    Ok(match value {
        Value::WString(units) => ComVariant::Bstr(Bstr::from_wide(units.clone())),
        other => ComVariant::Bstr(Bstr::new(&other.as_string().unwrap_or_default())),
    })
}

fn list_variant(host: &ComBrowserHost, value: &Value) -> BridgeResult<ComVariant> {
    let Value::List(items) = value else {
        return Ok(ComVariant::Null);
    };
    let array = build_host_list(&host.dom_window()?, items)?;
    Ok(host_dispatch(host, &array))
}

fn map_variant(host: &ComBrowserHost, value: &Value) -> BridgeResult<ComVariant> {
    let Value::Map(entries) = value else {
        return Ok(ComVariant::Null);
    };
    let object = build_host_map(&host.dom_window()?, entries)?;
    Ok(host_dispatch(host, &object))
}

fn object_variant(host: &ComBrowserHost, value: &Value) -> BridgeResult<ComVariant> {
    match value {
        Value::Object(object) | Value::HostObject(object) => native_or_host(host, object, false),
        _ => Ok(ComVariant::Null),
    }
}

fn weak_variant(host: &ComBrowserHost, value: &Value) -> BridgeResult<ComVariant> {
    match value.as_object() {
        Some(object) => native_or_host(host, &object, true),
        None => Ok(ComVariant::Null),
    }
}

fn native_or_host(host: &ComBrowserHost, object: &ScriptObjectRef, weak: bool) -> BridgeResult<ComVariant> {
    if let Some(HostHandle::Com(_)) = object.host_handle() {
        return Ok(host_dispatch(host, object));
    }
    Ok(ComVariant::Dispatch(host.wrap_native(object, weak)?))
}

fn host_dispatch(host: &ComBrowserHost, object: &ScriptObjectRef) -> ComVariant {
    match object.host_handle() {
        Some(HostHandle::Com(identity)) => host
            .dispatch_for(identity)
            .map(ComVariant::Dispatch)
            .unwrap_or(ComVariant::Null),
        _ => ComVariant::Null,
    }
}
