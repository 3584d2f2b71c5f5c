//! 脚本对象模型
//!
//! 包含：
//! - `object` - `ScriptObject` 能力接口与安全区守卫
//! - `auto` - 由构建器注册成员的原生脚本对象 `ScriptApi`
//! - `method` - 类型化方法的参数强制转换
//! - `events` - 事件路由
//! - `zone` - 安全区栈
//! - `proxy` - 宿主代理登记表

pub mod auto;
pub mod events;
pub mod method;
pub mod object;
pub mod proxy;
pub mod zone;

pub use auto::{ScriptApi, ScriptApiBuilder};
pub use events::EventRouter;
pub use method::{MethodFn, NativeMethod};
pub use object::{
    same_object, ScopedZoneLock, ScriptObject, ScriptObjectExt, ScriptObjectRef,
    WeakScriptObjectRef,
};
pub use proxy::{ProxyRegistry, ScriptProxy};
pub use zone::{SecurityZone, ZoneGuard, ZoneStack};
