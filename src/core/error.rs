//! 统一错误处理模块
//!
//! 提供桥接层范围内的统一错误类型定义
//!
//! ## 错误分类
//!
//! - **查找失败** (`Lookup`): 成员不存在，总是以结构化结果返回
//! - **访问拒绝** (`AccessDenied`): 安全区检查失败，与查找失败可区分
//! - **类型转换失败** (`TypeConversion`): 参数无法收窄/强制转换，携带参数索引
//! - **宿主不可用** (`HostUnavailable`): 宿主未提供所需原语，降级为文档化的默认值
//! - **原生异常** (`Exception`): 在分发边界捕获，转换为脚本可见的错误
//!
//! 线程亲和性违规不在此列：它是致命的前置条件失败，直接 panic。

use crate::scripting::zone::SecurityZone;
use thiserror::Error;

/// 值转换错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("value {value} does not fit in {target}")]
    Overflow { value: String, target: &'static str },

    #[error("cannot convert {from} to {to}")]
    Incompatible { from: &'static str, to: &'static str },

    #[error("cannot parse '{input}' as {target}")]
    Parse { input: String, target: &'static str },

    #[error("weak object reference has expired")]
    Expired,
}

/// 桥接层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("No such method: {0}")]
    NoSuchMethod(String),

    #[error("No such property: {0}")]
    NoSuchProperty(String),

    #[error("Access denied to '{member}': requires zone {required}, active zone is {active}")]
    AccessDenied {
        member: String,
        required: SecurityZone,
        active: SecurityZone,
    },

    #[error("Invocation error in '{member}': {reason}")]
    Invocation {
        member: String,
        argument: Option<usize>,
        reason: String,
    },

    #[error("Type conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Unsupported value type: {0}")]
    UnsupportedType(&'static str),

    #[error("Host primitive unavailable: {0}")]
    HostUnavailable(&'static str),

    #[error("Not available: {0}")]
    NotAvailable(&'static str),

    #[error("Property is read-only: {0}")]
    ReadOnly(String),

    #[error("Invalid event name: {0}")]
    InvalidEventName(String),

    #[error("Object has been invalidated")]
    Invalidated,

    #[error("{0}")]
    Exception(String),
}

/// 错误类别，供宿主构造 undefined / protected 等不同的脚本诊断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lookup,
    AccessDenied,
    TypeConversion,
    HostUnavailable,
    Invalidated,
    Exception,
}

impl BridgeError {
    /// 参数强制转换失败
    pub fn bad_argument(member: &str, index: usize, err: ConversionError) -> Self {
        BridgeError::Invocation {
            member: member.to_string(),
            argument: Some(index),
            reason: format!("argument {}: {}", index, err),
        }
    }

    /// 参数个数不匹配
    pub fn arity(member: &str, expected: usize, got: usize) -> Self {
        BridgeError::Invocation {
            member: member.to_string(),
            argument: None,
            reason: format!("expected {} argument(s), got {}", expected, got),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NoSuchMethod(_) | BridgeError::NoSuchProperty(_) => ErrorKind::Lookup,
            BridgeError::InvalidEventName(_) => ErrorKind::Lookup,
            BridgeError::AccessDenied { .. } => ErrorKind::AccessDenied,
            BridgeError::Invocation { .. }
            | BridgeError::Conversion(_)
            | BridgeError::UnsupportedType(_)
            | BridgeError::ReadOnly(_) => ErrorKind::TypeConversion,
            BridgeError::HostUnavailable(_) | BridgeError::NotAvailable(_) => {
                ErrorKind::HostUnavailable
            }
            BridgeError::Invalidated => ErrorKind::Invalidated,
            BridgeError::Exception(_) => ErrorKind::Exception,
        }
    }

    pub fn is_lookup_failure(&self) -> bool {
        self.kind() == ErrorKind::Lookup
    }

    pub fn is_access_denied(&self) -> bool {
        self.kind() == ErrorKind::AccessDenied
    }
}

/// 桥接层结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let conv = ConversionError::Overflow {
            value: "300".to_string(),
            target: "u8",
        };
        let err: BridgeError = conv.into();
        assert!(matches!(err, BridgeError::Conversion(_)));
        assert_eq!(err.kind(), ErrorKind::TypeConversion);
    }

    #[test]
    fn test_lookup_and_access_are_distinct() {
        let missing = BridgeError::NoSuchMethod("frobnicate".to_string());
        let denied = BridgeError::AccessDenied {
            member: "secret".to_string(),
            required: SecurityZone::PRIVATE,
            active: SecurityZone::PUBLIC,
        };
        assert!(missing.is_lookup_failure());
        assert!(!missing.is_access_denied());
        assert!(denied.is_access_denied());
        assert!(!denied.is_lookup_failure());
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::arity("add", 2, 1);
        assert_eq!(
            err.to_string(),
            "Invocation error in 'add': expected 2 argument(s), got 1"
        );
        let err = BridgeError::bad_argument(
            "add",
            1,
            ConversionError::Incompatible {
                from: "string",
                to: "i32",
            },
        );
        assert!(matches!(
            err,
            BridgeError::Invocation {
                argument: Some(1),
                ..
            }
        ));
    }
}
