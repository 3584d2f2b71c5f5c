//! 类型化原生方法
//!
//! 闭包的参数通过 `FromValue` 强制转换，返回值通过 `IntoScriptResult` 装回。
//! 缺少的尾部参数按 void 处理，因此 `Option<T>` 参数可以省略。

use std::sync::Arc;

use crate::core::error::{BridgeError, BridgeResult};
use crate::value::{FromValue, IntoScriptResult, Value};

/// 类型擦除后的方法
pub type MethodFn = Arc<dyn Fn(&[Value]) -> BridgeResult<Value> + Send + Sync>;

/// 可注册为脚本方法的原生函数
///
/// `Args` 只用于区分不同元数的实现。
pub trait NativeMethod<Args>: Send + Sync + 'static {
    fn arity(&self) -> usize;

    fn call(&self, member: &str, args: &[Value]) -> BridgeResult<Value>;
}

/// 取第 `index` 个参数并转换
fn argument<T: FromValue>(member: &str, args: &[Value], index: usize, arity: usize) -> BridgeResult<T> {
    match args.get(index) {
        Some(value) => {
            T::from_value(value).map_err(|err| BridgeError::bad_argument(member, index, err))
        }
        None => T::from_value(&Value::Void).map_err(|_| BridgeError::arity(member, arity, args.len())),
    }
}

macro_rules! impl_native_method {
    ($arity:expr; $($arg:ident => $idx:tt),*) => {
        impl<F, R, $($arg,)*> NativeMethod<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoScriptResult,
            $($arg: FromValue,)*
        {
            fn arity(&self) -> usize {
                $arity
            }

            #[allow(non_snake_case, unused_variables)]
            fn call(&self, member: &str, args: &[Value]) -> BridgeResult<Value> {
                if args.len() > $arity {
                    return Err(BridgeError::arity(member, $arity, args.len()));
                }
                $(let $arg = argument::<$arg>(member, args, $idx, $arity)?;)*
                (self)($($arg),*).into_script_result()
            }
        }
    };
}

impl_native_method!(0;);
impl_native_method!(1; A => 0);
impl_native_method!(2; A => 0, B => 1);
impl_native_method!(3; A => 0, B => 1, C => 2);
impl_native_method!(4; A => 0, B => 1, C => 2, D => 3);
impl_native_method!(5; A => 0, B => 1, C => 2, D => 3, E => 4);

/// 擦除参数类型
pub fn erase<Args, M>(member: &str, method: M) -> MethodFn
where
    Args: 'static,
    M: NativeMethod<Args>,
{
    let member = member.to_string();
    Arc::new(move |args: &[Value]| method.call(&member, args))
}

/// 直接接收参数切片的方法
pub fn raw<F>(method: F) -> MethodFn
where
    F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
{
    Arc::new(method)
}
