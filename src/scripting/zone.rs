//! 安全区栈
//!
//! 每个脚本对象持有一个默认安全区和一个压栈的安全区序列。成员在注册时捕获
//! 当时的有效安全区，查找时与当前有效安全区比较：当前安全区 ≥ 成员安全区
//! 才可见。
//!
//! 栈由带属主线程标记的可重入锁保护：属主线程可以嵌套压栈，其他线程在属主
//! 全部出栈之前阻塞。

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread::{self, ThreadId};

use crate::core::error::ConversionError;

/// 有序安全区
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityZone(pub i32);

impl SecurityZone {
    pub const PUBLIC: SecurityZone = SecurityZone(0);
    pub const PROTECTED: SecurityZone = SecurityZone(2);
    pub const PRIVATE: SecurityZone = SecurityZone(4);
    pub const LOCAL: SecurityZone = SecurityZone(6);

    /// 在 `active` 为有效安全区时，注册于 `self` 的成员是否可见
    pub fn permits(self, active: SecurityZone) -> bool {
        active >= self
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            SecurityZone::PUBLIC => Some("public"),
            SecurityZone::PROTECTED => Some("protected"),
            SecurityZone::PRIVATE => Some("private"),
            SecurityZone::LOCAL => Some("local"),
            _ => None,
        }
    }
}

impl Default for SecurityZone {
    fn default() -> Self {
        SecurityZone::PUBLIC
    }
}

impl fmt::Display for SecurityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for SecurityZone {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "public" => Ok(SecurityZone::PUBLIC),
            "protected" => Ok(SecurityZone::PROTECTED),
            "private" => Ok(SecurityZone::PRIVATE),
            "local" => Ok(SecurityZone::LOCAL),
            other => other
                .parse::<i32>()
                .map(SecurityZone)
                .map_err(|_| ConversionError::Parse {
                    input: s.to_string(),
                    target: "SecurityZone",
                }),
        }
    }
}

#[derive(Debug)]
struct ZoneState {
    default: SecurityZone,
    stack: Vec<SecurityZone>,
    owner: Option<ThreadId>,
}

/// 单个对象的安全区栈
#[derive(Debug)]
pub struct ZoneStack {
    state: Mutex<ZoneState>,
    released: Condvar,
}

impl ZoneStack {
    pub fn new(default: SecurityZone) -> Self {
        Self {
            state: Mutex::new(ZoneState {
                default,
                stack: Vec::new(),
                owner: None,
            }),
            released: Condvar::new(),
        }
    }

    /// 压入安全区
    ///
    /// 栈由其他线程持有时阻塞，直到属主线程全部出栈。
    pub fn push_zone(&self, zone: SecurityZone) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while matches!(state.owner, Some(owner) if owner != me) {
            self.released.wait(&mut state);
        }
        state.owner = Some(me);
        state.stack.push(zone);
        tracing::trace!(target: "bridge::zone", %zone, depth = state.stack.len(), "push zone");
    }

    /// 弹出安全区
    ///
    /// 非属主线程的弹出被忽略并记录告警。
    pub fn pop_zone(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            tracing::warn!(target: "bridge::zone", "pop_zone without a matching push on this thread");
            return;
        }
        state.stack.pop();
        if state.stack.is_empty() {
            state.owner = None;
            self.released.notify_all();
        }
    }

    /// 当前有效安全区：栈顶或默认安全区
    ///
    /// 栈由其他线程持有时阻塞，直到属主线程全部出栈；非属主线程永远看不到
    /// 属主压入的安全区。
    pub fn zone(&self) -> SecurityZone {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while matches!(state.owner, Some(owner) if owner != me) {
            self.released.wait(&mut state);
        }
        state.stack.last().copied().unwrap_or(state.default)
    }

    pub fn default_zone(&self) -> SecurityZone {
        self.state.lock().default
    }

    pub fn set_default_zone(&self, zone: SecurityZone) {
        self.state.lock().default = zone;
    }

    pub fn depth(&self) -> usize {
        self.state.lock().stack.len()
    }

    /// 压栈并返回在离开作用域时出栈的守卫
    pub fn scoped(&self, zone: SecurityZone) -> ZoneGuard<'_> {
        self.push_zone(zone);
        ZoneGuard { stack: self }
    }
}

impl Default for ZoneStack {
    fn default() -> Self {
        Self::new(SecurityZone::PUBLIC)
    }
}

/// `ZoneStack::scoped` 返回的守卫
#[must_use = "the zone is popped as soon as the guard is dropped"]
pub struct ZoneGuard<'a> {
    stack: &'a ZoneStack,
}

impl Drop for ZoneGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop_zone();
    }
}
