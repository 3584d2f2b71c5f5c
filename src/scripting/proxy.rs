//! 代理登记表
//!
//! 原生对象只观察包装它的宿主端代理，不拥有它们。登记表在第一个代理创建时
//! 才分配；代理被宿主回收时自行注销。失效时遍历一次并通知每个存活代理脱离。

use parking_lot::Mutex;
use std::sync::Weak;

/// 宿主端包装器
pub trait ScriptProxy: Send + Sync {
    /// 与原生对象脱离；之后的访问全部失败
    fn detach(&self);

    fn is_detached(&self) -> bool;
}

fn proxy_address<T: ?Sized>(proxy: *const T) -> usize {
    proxy as *const () as usize
}

/// 弱引用代理集合
#[derive(Default)]
pub struct ProxyRegistry {
    proxies: Mutex<Option<Vec<Weak<dyn ScriptProxy>>>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, proxy: Weak<dyn ScriptProxy>) {
        let mut guard = self.proxies.lock();
        let proxies = guard.get_or_insert_with(Vec::new);
        proxies.retain(|p| p.strong_count() > 0);
        let address = proxy_address(proxy.as_ptr());
        if !proxies.iter().any(|p| proxy_address(p.as_ptr()) == address) {
            proxies.push(proxy);
        }
    }

    pub fn unregister(&self, proxy: &dyn ScriptProxy) {
        let address = proxy_address(proxy as *const (dyn ScriptProxy + '_));
        if let Some(proxies) = self.proxies.lock().as_mut() {
            proxies.retain(|p| proxy_address(p.as_ptr()) != address);
        }
    }

    /// 登记表是否已分配
    pub fn is_allocated(&self) -> bool {
        self.proxies.lock().is_some()
    }

    pub fn live_count(&self) -> usize {
        self.proxies
            .lock()
            .as_ref()
            .map(|p| p.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// 通知全部存活代理脱离，返回通知的数量
    ///
    /// 集合先从锁中取出再逐个通知，代理在 `detach` 中回调 `unregister`
    /// 不会死锁；第二次调用是空操作。
    pub fn invalidate_all(&self) -> usize {
        let taken = self.proxies.lock().take();
        let mut notified = 0;
        for proxy in taken.into_iter().flatten() {
            if let Some(proxy) = proxy.upgrade() {
                proxy.detach();
                notified += 1;
            }
        }
        notified
    }
}
