//! 核心宏定义
//!
//! 提供统一的宏来减少代码重复

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use script_bridge::impl_default;
///
/// struct MarshalOptions {
///     strict_types: bool,
///     label: String,
/// }
///
/// impl_default!(MarshalOptions {
///     strict_types: false,
///     label: String::from("npapi"),
/// });
///
/// assert!(!MarshalOptions::default().strict_types);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

/// 为值类型批量实现 `From<T> for Value` 的宏
///
/// 每一项把一个原生类型映射到 `Value` 的一个变体。
#[macro_export]
macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for $crate::value::Value {
                fn from(v: $ty) -> Self {
                    $crate::value::Value::$variant(v)
                }
            }
        )*
    };
}
