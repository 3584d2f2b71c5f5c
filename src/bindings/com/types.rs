//! COM automation types
//!
//! `IDispatch`, `VARIANT`, `BSTR` and `HRESULT` as the bridge sees them.
//! `Dispatch::invoke` takes its arguments in natural order; hosts that pass
//! `DISPPARAMS` reversed must flip them at the boundary.

use std::any::Any;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use thiserror::Error;

use crate::bindings::protocol::ComIdentity;
use crate::core::error::{BridgeError, ErrorKind};

pub type DispatchRef = Arc<dyn Dispatch>;

/// `DISPID`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispId(pub i32);

impl DispId {
    pub const VALUE: DispId = DispId(0);
    pub const UNKNOWN: DispId = DispId(-1);
    pub const PROPERTYPUT: DispId = DispId(-3);
}

/// `DISPATCH_*` invoke flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchFlags(pub u16);

impl DispatchFlags {
    pub const METHOD: DispatchFlags = DispatchFlags(0x1);
    pub const PROPERTYGET: DispatchFlags = DispatchFlags(0x2);
    pub const PROPERTYPUT: DispatchFlags = DispatchFlags(0x4);
    pub const PROPERTYPUTREF: DispatchFlags = DispatchFlags(0x8);

    pub fn contains(self, other: DispatchFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_put(self) -> bool {
        self.contains(Self::PROPERTYPUT) || self.contains(Self::PROPERTYPUTREF)
    }
}

impl BitOr for DispatchFlags {
    type Output = DispatchFlags;

    fn bitor(self, rhs: DispatchFlags) -> DispatchFlags {
        DispatchFlags(self.0 | rhs.0)
    }
}

/// `HRESULT`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub u32);

impl HResult {
    pub const S_OK: HResult = HResult(0);
    pub const E_NOTIMPL: HResult = HResult(0x8000_4001);
    pub const E_FAIL: HResult = HResult(0x8000_4005);
    pub const E_UNEXPECTED: HResult = HResult(0x8000_FFFF);
    pub const E_ACCESSDENIED: HResult = HResult(0x8007_0005);
    pub const E_INVALIDARG: HResult = HResult(0x8007_0057);
    pub const DISP_E_MEMBERNOTFOUND: HResult = HResult(0x8002_0003);
    pub const DISP_E_TYPEMISMATCH: HResult = HResult(0x8002_0005);
    pub const DISP_E_UNKNOWNNAME: HResult = HResult(0x8002_0006);
    pub const DISP_E_EXCEPTION: HResult = HResult(0x8002_0009);
    pub const DISP_E_OVERFLOW: HResult = HResult(0x8002_000A);
    pub const DISP_E_BADPARAMCOUNT: HResult = HResult(0x8002_000E);

    pub fn is_success(self) -> bool {
        self.0 & 0x8000_0000 == 0
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult(0x{:08X})", self.0)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Failed `IDispatch` call with its `EXCEPINFO` description
#[derive(Error, Debug, Clone, PartialEq)]
#[error("COM call failed with {hresult}: {description}")]
pub struct ComError {
    pub hresult: HResult,
    pub description: String,
}

impl ComError {
    pub fn new(hresult: HResult, description: impl Into<String>) -> Self {
        Self {
            hresult,
            description: description.into(),
        }
    }

    /// HRESULT a bridge failure is reported with
    pub fn from_bridge(err: &BridgeError) -> Self {
        let hresult = match err {
            BridgeError::NoSuchMethod(_) | BridgeError::NoSuchProperty(_) => {
                HResult::DISP_E_MEMBERNOTFOUND
            }
            BridgeError::Invocation { argument: None, .. } => HResult::DISP_E_BADPARAMCOUNT,
            BridgeError::Conversion(_) | BridgeError::Invocation { .. } => {
                HResult::DISP_E_TYPEMISMATCH
            }
            _ => match err.kind() {
                ErrorKind::AccessDenied => HResult::E_ACCESSDENIED,
                ErrorKind::Lookup => HResult::DISP_E_MEMBERNOTFOUND,
                ErrorKind::TypeConversion => HResult::E_INVALIDARG,
                ErrorKind::HostUnavailable => HResult::E_NOTIMPL,
                ErrorKind::Invalidated => HResult::E_UNEXPECTED,
                ErrorKind::Exception => HResult::DISP_E_EXCEPTION,
            },
        };
        ComError::new(hresult, err.to_string())
    }
}

impl From<ComError> for BridgeError {
    fn from(err: ComError) -> Self {
        match err.hresult {
            HResult::DISP_E_UNKNOWNNAME | HResult::DISP_E_MEMBERNOTFOUND => {
                BridgeError::NoSuchMethod(err.description)
            }
            _ => BridgeError::Exception(err.to_string()),
        }
    }
}

pub type ComResult<T> = Result<T, ComError>;

/// `BSTR`: length-prefixed UTF-16
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Bstr(Vec<u16>);

impl Bstr {
    pub fn new(s: &str) -> Self {
        Bstr(s.encode_utf16().collect())
    }

    pub fn from_wide(units: Vec<u16>) -> Self {
        Bstr(units)
    }

    pub fn as_wide(&self) -> &[u16] {
        &self.0
    }

    pub fn into_wide(self) -> Vec<u16> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl fmt::Debug for Bstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

/// `VARIANT` subset used by script hosts
#[derive(Clone)]
pub enum ComVariant {
    Empty,
    Null,
    Bool(bool),
    I1(i8),
    UI1(u8),
    I2(i16),
    UI2(u16),
    I4(i32),
    UI4(u32),
    I8(i64),
    UI8(u64),
    R4(f32),
    R8(f64),
    Bstr(Bstr),
    Dispatch(DispatchRef),
}

impl ComVariant {
    pub fn as_dispatch(&self) -> Option<&DispatchRef> {
        match self {
            ComVariant::Dispatch(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ComVariant::Empty)
    }
}

impl fmt::Debug for ComVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComVariant::Empty => write!(f, "Empty"),
            ComVariant::Null => write!(f, "Null"),
            ComVariant::Bool(v) => write!(f, "Bool({})", v),
            ComVariant::I1(v) => write!(f, "I1({})", v),
            ComVariant::UI1(v) => write!(f, "UI1({})", v),
            ComVariant::I2(v) => write!(f, "I2({})", v),
            ComVariant::UI2(v) => write!(f, "UI2({})", v),
            ComVariant::I4(v) => write!(f, "I4({})", v),
            ComVariant::UI4(v) => write!(f, "UI4({})", v),
            ComVariant::I8(v) => write!(f, "I8({})", v),
            ComVariant::UI8(v) => write!(f, "UI8({})", v),
            ComVariant::R4(v) => write!(f, "R4({})", v),
            ComVariant::R8(v) => write!(f, "R8({})", v),
            ComVariant::Bstr(v) => write!(f, "Bstr({:?})", v),
            ComVariant::Dispatch(d) => write!(f, "Dispatch({:?})", dispatch_identity(d)),
        }
    }
}

/// `IDispatch`
///
/// Reference counting is explicit: whoever keeps an interface pointer beyond
/// a call holds one `add_ref` and gives it back with `release`.
pub trait Dispatch: Send + Sync {
    fn add_ref(&self) -> u32;

    fn release(&self) -> u32;

    /// `GetIDsOfNames` for a single name
    fn get_dispid(&self, name: &str) -> ComResult<DispId>;

    fn invoke(&self, id: DispId, flags: DispatchFlags, args: &[ComVariant]) -> ComResult<ComVariant>;

    /// `IDispatchEx::GetNextDispID` walked to the end
    fn member_names(&self) -> ComResult<Vec<String>> {
        Err(ComError::new(HResult::E_NOTIMPL, "enumeration not supported"))
    }

    /// `IDispatchEx::DeleteMemberByName`
    fn delete_member(&self, _name: &str) -> ComResult<()> {
        Err(ComError::new(HResult::E_NOTIMPL, "member deletion not supported"))
    }

    fn as_any(&self) -> &dyn Any;
}

/// Identity of an interface pointer
pub fn dispatch_identity(dispatch: &DispatchRef) -> ComIdentity {
    ComIdentity(Arc::as_ptr(dispatch) as *const () as usize)
}
