//! 类型导向的值转换
//!
//! `FromValue` 把脚本传入的 `Value` 强制转换为原生参数类型，数值收窄做范围
//! 检查；`IntoScriptResult` 把原生返回值装回 `Value`。

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Value;
use crate::core::error::{BridgeError, BridgeResult, ConversionError};
use crate::scripting::object::{ScriptObjectExt, ScriptObjectRef};

/// 从 `Value` 强制转换
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// 原生返回值转换为脚本结果
pub trait IntoScriptResult {
    fn into_script_result(self) -> BridgeResult<Value>;
}

fn incompatible(value: &Value, to: &'static str) -> ConversionError {
    ConversionError::Incompatible {
        from: value.type_name(),
        to,
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let target = stringify!($ty);
                    let wide = match value {
                        Value::Bool(b) => *b as i128,
                        Value::String(_) | Value::WString(_) => {
                            let text = value.as_string().unwrap_or_default();
                            let trimmed = text.trim();
                            match trimmed.parse::<i128>() {
                                Ok(v) => v,
                                Err(_) => trimmed
                                    .parse::<f64>()
                                    .ok()
                                    .and_then(|f| Value::F64(f).as_i128())
                                    .ok_or_else(|| ConversionError::Parse {
                                        input: text.clone(),
                                        target,
                                    })?,
                            }
                        }
                        other if other.is_numeric() => {
                            other.as_i128().ok_or_else(|| ConversionError::Overflow {
                                value: other.as_f64().map(|f| f.to_string()).unwrap_or_default(),
                                target,
                            })?
                        }
                        other => return Err(incompatible(other, target)),
                    };
                    <$ty>::try_from(wide).map_err(|_| ConversionError::Overflow {
                        value: wide.to_string(),
                        target,
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i8, u8, i16, u16, i32, u32, i64, u64, usize, isize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(_) | Value::WString(_) => {
                let text = value.as_string().unwrap_or_default();
                text.trim().parse::<f64>().map_err(|_| ConversionError::Parse {
                    input: text,
                    target: "f64",
                })
            }
            other => other.as_f64().ok_or_else(|| incompatible(other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if let Value::F32(v) = value {
            return Ok(*v);
        }
        let wide = f64::from_value(value).map_err(|err| match err {
            ConversionError::Incompatible { from, .. } => ConversionError::Incompatible { from, to: "f32" },
            ConversionError::Parse { input, .. } => ConversionError::Parse { input, target: "f32" },
            other => other,
        })?;
        if wide.is_finite() && wide.abs() > f32::MAX as f64 {
            return Err(ConversionError::Overflow {
                value: wide.to_string(),
                target: "f32",
            });
        }
        Ok(wide as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(_) | Value::WString(_) => {
                let text = value.as_string().unwrap_or_default();
                match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(true),
                    "false" | "0" | "" => Ok(false),
                    _ => Err(ConversionError::Parse {
                        input: text,
                        target: "bool",
                    }),
                }
            }
            other => other
                .as_f64()
                .map(|f| f != 0.0)
                .ok_or_else(|| incompatible(other, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::WString(w) => Ok(String::from_utf16_lossy(w)),
            Value::Bool(b) => Ok(b.to_string()),
            Value::I8(v) => Ok(v.to_string()),
            Value::U8(v) => Ok(v.to_string()),
            Value::I16(v) => Ok(v.to_string()),
            Value::U16(v) => Ok(v.to_string()),
            Value::I32(v) => Ok(v.to_string()),
            Value::U32(v) => Ok(v.to_string()),
            Value::I64(v) => Ok(v.to_string()),
            Value::U64(v) => Ok(v.to_string()),
            Value::F32(v) => Ok(v.to_string()),
            Value::F64(v) => Ok(v.to_string()),
            other => Err(incompatible(other, "string")),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromValue for ScriptObjectRef {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Object(obj) | Value::HostObject(obj) => Ok(Arc::clone(obj)),
            Value::WeakObject(weak) => weak.upgrade().ok_or(ConversionError::Expired),
            other => Err(incompatible(other, "object")),
        }
    }
}

/// null 与 void 转换为 `None`，缺省的尾部参数同样如此
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Void | Value::Null => Ok(None),
            Value::WeakObject(weak) if weak.strong_count() == 0 => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            Value::HostObject(host) => host
                .array_values()
                .map_err(|_| incompatible(value, "list"))?
                .iter()
                .map(T::from_value)
                .collect(),
            other => Err(incompatible(other, "list")),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let convert = |entries: &BTreeMap<String, Value>| {
            entries
                .iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k.clone(), v)))
                .collect()
        };
        match value {
            Value::Map(entries) => convert(entries),
            Value::HostObject(host) => {
                let entries = host
                    .object_values()
                    .map_err(|_| incompatible(value, "map"))?;
                convert(&entries)
            }
            other => Err(incompatible(other, "map")),
        }
    }
}

macro_rules! impl_into_script_result {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoScriptResult for $ty {
                fn into_script_result(self) -> BridgeResult<Value> {
                    Ok(Value::from(self))
                }
            }
        )*
    };
}

impl_into_script_result!(
    (),
    bool,
    i8,
    u8,
    i16,
    u16,
    i32,
    u32,
    i64,
    u64,
    f32,
    f64,
    String,
    &str,
    ScriptObjectRef,
);

impl IntoScriptResult for Value {
    fn into_script_result(self) -> BridgeResult<Value> {
        Ok(self)
    }
}

impl IntoScriptResult for usize {
    fn into_script_result(self) -> BridgeResult<Value> {
        Ok(Value::U64(self as u64))
    }
}

impl<T: IntoScriptResult> IntoScriptResult for Option<T> {
    fn into_script_result(self) -> BridgeResult<Value> {
        match self {
            Some(v) => v.into_script_result(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: IntoScriptResult> IntoScriptResult for Vec<T> {
    fn into_script_result(self) -> BridgeResult<Value> {
        self.into_iter()
            .map(IntoScriptResult::into_script_result)
            .collect::<BridgeResult<Vec<_>>>()
            .map(Value::List)
    }
}

impl<T: IntoScriptResult> IntoScriptResult for BTreeMap<String, T> {
    fn into_script_result(self) -> BridgeResult<Value> {
        self.into_iter()
            .map(|(k, v)| v.into_script_result().map(|v| (k, v)))
            .collect::<BridgeResult<BTreeMap<_, _>>>()
            .map(Value::Map)
    }
}

impl<T: IntoScriptResult> IntoScriptResult for Result<T, BridgeError> {
    fn into_script_result(self) -> BridgeResult<Value> {
        self.and_then(IntoScriptResult::into_script_result)
    }
}
