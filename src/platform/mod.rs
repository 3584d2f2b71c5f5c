//! 外部协作者
//!
//! - `dom` - 窗口/文档/元素包装
//! - `stream` - 流创建通知

pub mod dom;
pub mod stream;

pub use dom::{DomDocument, DomElement, DomNode, DomWindow};
pub use stream::{BrowserStream, StreamOptions, STREAM_CREATED_EVENT};
