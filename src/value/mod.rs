//! 桥接值类型
//!
//! `Value` 是跨越桥接边界传递数据的标记联合体：原始类型、字符串、对象引用、
//! 以及递归的列表/映射容器。任意时刻只有一个变体处于活动状态。
//!
//! ## 对象引用
//!
//! - `Object`：强引用，延长原生对象生命周期
//! - `WeakObject`：弱引用，引用对象销毁后解析为 null
//! - `HostObject`：宿主对象适配器（`host_handle()` 为 `Some`）
//!
//! `Opaque` 承载任意其他原生类型，永远不可编组。

pub mod convert;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::impl_value_from;
use crate::scripting::object::{same_object, ScriptObjectExt, ScriptObjectRef, WeakScriptObjectRef};

pub use convert::{FromValue, IntoScriptResult};

/// 值的类别
///
/// 编组器按类别选择构造器；`Opaque` 没有构造器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void,
    Null,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    WString,
    List,
    Map,
    Object,
    WeakObject,
    HostObject,
    Opaque,
}

/// 无法编组的原生值
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

/// 桥接值
#[derive(Clone, Default)]
pub enum Value {
    /// undefined，同时作为"空"哨兵
    #[default]
    Void,
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    /// UTF-16 宽字符串
    WString(Vec<u16>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(ScriptObjectRef),
    WeakObject(WeakScriptObjectRef),
    HostObject(ScriptObjectRef),
    Opaque(OpaqueValue),
}

/// 数值的统一比较形式
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::U8(_) => ValueKind::U8,
            Value::I16(_) => ValueKind::I16,
            Value::U16(_) => ValueKind::U16,
            Value::I32(_) => ValueKind::I32,
            Value::U32(_) => ValueKind::U32,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::String(_) => ValueKind::String,
            Value::WString(_) => ValueKind::WString,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Object(_) => ValueKind::Object,
            Value::WeakObject(_) => ValueKind::WeakObject,
            Value::HostObject(_) => ValueKind::HostObject,
            Value::Opaque(_) => ValueKind::Opaque,
        }
    }

    /// 用于诊断信息的类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::U8(_) => "u8",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::WString(_) => "wstring",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::WeakObject(_) => "weak object",
            Value::HostObject(_) => "host object",
            Value::Opaque(o) => o.type_name(),
        }
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(OpaqueValue::new(value))
    }

    pub fn wide(s: &str) -> Self {
        Value::WString(s.encode_utf16().collect())
    }

    pub fn weak(object: &ScriptObjectRef) -> Self {
        Value::WeakObject(Arc::downgrade(object))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// void 与 null 都视为空
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Void | Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        self.number().is_some()
    }

    /// 解析对象引用；失效的弱引用返回 `None`
    pub fn as_object(&self) -> Option<ScriptObjectRef> {
        match self {
            Value::Object(obj) | Value::HostObject(obj) => Some(Arc::clone(obj)),
            Value::WeakObject(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// 字符串内容（宽字符串解码）
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::WString(w) => Some(String::from_utf16_lossy(w)),
            _ => None,
        }
    }

    /// 将失效的弱引用折叠为 null
    pub fn resolve_weak(self) -> Value {
        match self {
            Value::WeakObject(ref weak) if weak.strong_count() == 0 => Value::Null,
            other => other,
        }
    }

    /// 类型导向的强制转换
    pub fn convert<T: FromValue>(&self) -> Result<T, crate::core::error::ConversionError> {
        T::from_value(self)
    }

    fn number(&self) -> Option<Number> {
        Some(match *self {
            Value::I8(v) => Number::Int(v as i128),
            Value::U8(v) => Number::Int(v as i128),
            Value::I16(v) => Number::Int(v as i128),
            Value::U16(v) => Number::Int(v as i128),
            Value::I32(v) => Number::Int(v as i128),
            Value::U32(v) => Number::Int(v as i128),
            Value::I64(v) => Number::Int(v as i128),
            Value::U64(v) => Number::Int(v as i128),
            Value::F32(v) => Number::Float(v as f64),
            Value::F64(v) => Number::Float(v),
            _ => return None,
        })
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        self.number().map(|n| match n {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        })
    }

    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self.number()? {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i128),
            Number::Float(_) => None,
        }
    }

    /// 观察等价
    ///
    /// 数值跨宽度按值比较，窄/宽字符串按内容比较，对象按身份比较，
    /// 列表/映射逐元素比较；另一侧为宿主数组/对象时通过其属性回读。
    pub fn observably_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.number(), other.number()) {
            return match (a, b) {
                (Number::Int(x), Number::Int(y)) => x == y,
                (Number::Float(x), Number::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
                (Number::Int(x), Number::Float(y)) | (Number::Float(y), Number::Int(x)) => {
                    int_eq_float(x, y)
                }
            };
        }
        if let (Some(a), Some(b)) = (self.as_string(), other.as_string()) {
            return a == b;
        }

        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => lists_eq(a, b),
            (Value::Map(a), Value::Map(b)) => maps_eq(a, b),
            (Value::List(items), Value::HostObject(host))
            | (Value::HostObject(host), Value::List(items)) => host
                .array_values()
                .map(|read| lists_eq(items, &read))
                .unwrap_or(false),
            (Value::Map(entries), Value::HostObject(host))
            | (Value::HostObject(host), Value::Map(entries)) => host
                .object_values()
                .map(|read| maps_eq(entries, &read))
                .unwrap_or(false),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            (Value::WeakObject(a), Value::WeakObject(b)) => match (a.upgrade(), b.upgrade()) {
                (Some(x), Some(y)) => same_object(&x, &y),
                (None, None) => true,
                _ => false,
            },
            (Value::WeakObject(w), Value::Null) | (Value::Null, Value::WeakObject(w)) => {
                w.strong_count() == 0
            }
            (a, b) => match (a.as_object(), b.as_object()) {
                (Some(x), Some(y)) => {
                    same_object(&x, &y)
                        || matches!(
                            (x.host_handle(), y.host_handle()),
                            (Some(hx), Some(hy)) if hx == hy
                        )
                }
                _ => false,
            },
        }
    }
}

/// 整数与浮点精确比较：浮点必须是整数值且落在 i128 范围内
fn int_eq_float(x: i128, y: f64) -> bool {
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0; // 2^127
    y.fract() == 0.0 && (-LIMIT..LIMIT).contains(&y) && y as i128 == x
}

fn lists_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.observably_eq(y))
}

fn maps_eq(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(k, v)| b.get(k).map(|other| v.observably_eq(other)).unwrap_or(false))
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::I8(v) => write!(f, "I8({})", v),
            Value::U8(v) => write!(f, "U8({})", v),
            Value::I16(v) => write!(f, "I16({})", v),
            Value::U16(v) => write!(f, "U16({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::U32(v) => write!(f, "U32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::U64(v) => write!(f, "U64({})", v),
            Value::F32(v) => write!(f, "F32({})", v),
            Value::F64(v) => write!(f, "F64({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::WString(w) => write!(f, "WString({:?})", String::from_utf16_lossy(w)),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Object(obj) => write!(f, "Object({:p})", Arc::as_ptr(obj) as *const ()),
            Value::WeakObject(weak) => write!(
                f,
                "WeakObject({:p}, alive={})",
                weak.as_ptr() as *const (),
                weak.strong_count() > 0
            ),
            Value::HostObject(obj) => write!(f, "HostObject({:?})", obj.host_handle()),
            Value::Opaque(o) => write!(f, "{:?}", o),
        }
    }
}

impl_value_from!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<Value> => List,
    BTreeMap<String, Value> => Map,
    ScriptObjectRef => Object,
    WeakScriptObjectRef => WeakObject,
);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
