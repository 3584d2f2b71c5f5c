//! 线程亲和性守卫
//!
//! 宿主 ABI 不可重入、非线程安全。所有面向宿主的操作在触碰宿主句柄之前
//! 都必须确认当前线程就是宿主指定的主线程；违反即为调用方的编程错误，
//! 以致命断言处理，不做恢复。

use std::thread::{self, ThreadId};

/// 记录宿主主线程的守卫
#[derive(Debug, Clone)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl ThreadAffinity {
    /// 以当前线程为主线程创建守卫
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// 当前线程是否为主线程
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// 断言在主线程上执行
    ///
    /// # 参数
    ///
    /// * `operation` - 正在执行的宿主操作名，写入诊断信息
    ///
    /// # Panics
    ///
    /// 不在主线程上调用时 panic。
    #[track_caller]
    pub fn assert_main_thread(&self, operation: &str) {
        if !self.is_current() {
            let current = thread::current();
            tracing::error!(
                target: "bridge::thread",
                operation,
                thread = ?current.id(),
                "host operation called off the main thread"
            );
            panic!(
                "thread affinity violation: '{}' called from {:?} ({}), host main thread is {:?}",
                operation,
                current.id(),
                current.name().unwrap_or("<unnamed>"),
                self.owner
            );
        }
    }
}
