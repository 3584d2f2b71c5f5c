//! 浏览器流协作者
//!
//! 桥接层不管理流缓冲，只负责向宿主请求流，并在宿主接受后通过事件路由发送
//! 一次 "stream created" 通知。

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::error::BridgeResult;
use crate::core::scheduler::TaskScheduler;
use crate::scripting::events::EventRouter;
use crate::scripting::object::ScriptObjectRef;
use crate::value::Value;

/// 流创建完成时触发的事件
pub const STREAM_CREATED_EVENT: &str = "onstreamcreated";

/// 流请求参数
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    pub cache: bool,
    pub seekable: bool,
    pub internal_buffer_size: usize,
}

crate::impl_default!(StreamOptions {
    cache: true,
    seekable: false,
    internal_buffer_size: 128 * 1024,
});

/// 宿主流
pub struct BrowserStream {
    url: String,
    options: StreamOptions,
    created: AtomicBool,
    events: EventRouter,
}

impl BrowserStream {
    pub fn new(url: &str, options: StreamOptions, scheduler: Arc<dyn TaskScheduler>) -> Arc<Self> {
        let events = EventRouter::new(Some("on".to_string()));
        events.set_scheduler(scheduler);
        Arc::new(Self {
            url: url.to_string(),
            options,
            created: AtomicBool::new(false),
            events,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    /// 流事件的监听者注册入口
    pub fn events(&self) -> &EventRouter {
        &self.events
    }

    /// 挂接接收创建通知的监听者
    pub fn attach_listener(&self, listener: ScriptObjectRef) -> BridgeResult<()> {
        self.events.add_listener(STREAM_CREATED_EVENT, listener)
    }

    /// 标记流已创建并发送通知；重复调用不会再次通知
    pub fn mark_created(&self) -> BridgeResult<()> {
        if self.created.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(target: "bridge::stream", url = %self.url, "stream created");
        self.events
            .fire(STREAM_CREATED_EVENT, vec![Value::from(self.url.as_str())])
    }
}

impl fmt::Debug for BrowserStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserStream")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("created", &self.is_created())
            .finish()
    }
}
