//! NPAPI value and handle types

use std::fmt;
use thiserror::Error;

use crate::core::error::BridgeError;

/// Opaque host object pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NpObject(pub usize);

/// Interned identifier (string or integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NpIdentifier(pub usize);

/// Plugin instance handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Npp(pub usize);

/// Decoded identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierValue {
    Name(String),
    Index(i32),
}

/// UTF-8 string owned by the host allocator
#[derive(Clone, PartialEq, Eq)]
pub struct NpString(Vec<u8>);

impl NpString {
    pub fn new(s: &str) -> Self {
        NpString(s.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        NpString(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Invalid UTF-8 sequences become U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for NpString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

/// `NPVariant`
#[derive(Debug, Clone, PartialEq)]
pub enum NpVariant {
    Void,
    Null,
    Bool(bool),
    Int32(i32),
    Double(f64),
    String(NpString),
    Object(NpObject),
}

impl NpVariant {
    pub fn as_object(&self) -> Option<NpObject> {
        match self {
            NpVariant::Object(obj) => Some(*obj),
            _ => None,
        }
    }
}

/// `NPNVariable` values the bridge queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NpnVariable {
    WindowNpObject,
    PluginElementNpObject,
}

/// `NPError` codes
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpError {
    #[error("NPERR_GENERIC_ERROR")]
    GenericError,
    #[error("NPERR_INVALID_INSTANCE_ERROR")]
    InvalidInstance,
    #[error("NPERR_INVALID_PARAM")]
    InvalidParam,
    #[error("NPERR_INVALID_URL")]
    InvalidUrl,
    #[error("NPERR_OUT_OF_MEMORY_ERROR")]
    OutOfMemory,
}

impl NpError {
    pub fn code(self) -> i16 {
        match self {
            NpError::GenericError => 1,
            NpError::InvalidInstance => 2,
            NpError::OutOfMemory => 5,
            NpError::InvalidParam => 9,
            NpError::InvalidUrl => 10,
        }
    }
}

impl From<NpError> for BridgeError {
    fn from(err: NpError) -> Self {
        BridgeError::Exception(format!("{} ({})", err, err.code()))
    }
}
