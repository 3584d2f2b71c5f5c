//! DOM 协作者
//!
//! 对宿主窗口、文档与插件元素的薄包装。底层是宿主对象适配器，所有操作都走
//! `ScriptObject` 契约，因此与 ABI 无关。

use std::ops::Deref;

use crate::core::error::{BridgeError, BridgeResult};
use crate::scripting::object::ScriptObjectRef;
use crate::value::Value;

/// DOM 节点的公共操作
#[derive(Clone)]
pub struct DomNode {
    object: ScriptObjectRef,
}

impl DomNode {
    pub fn new(object: ScriptObjectRef) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &ScriptObjectRef {
        &self.object
    }

    pub fn property(&self, name: &str) -> BridgeResult<Value> {
        self.object.get_property(name)
    }

    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> BridgeResult<()> {
        self.object.set_property(name, value.into())
    }

    pub fn call(&self, method: &str, args: &[Value]) -> BridgeResult<Value> {
        self.object.invoke(method, args)
    }

    /// 读取对象类型的属性
    fn child(&self, name: &str) -> BridgeResult<ScriptObjectRef> {
        self.property(name)?
            .as_object()
            .ok_or(BridgeError::NotAvailable("dom node"))
    }
}

macro_rules! dom_wrapper {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone)]
            pub struct $name(DomNode);

            impl $name {
                pub fn new(object: ScriptObjectRef) -> Self {
                    Self(DomNode::new(object))
                }
            }

            impl Deref for $name {
                type Target = DomNode;

                fn deref(&self) -> &DomNode {
                    &self.0
                }
            }
        )*
    };
}

dom_wrapper!(
    /// 宿主窗口
    DomWindow,
    /// 窗口文档
    DomDocument,
    /// DOM 元素
    DomElement,
);

impl DomWindow {
    pub fn document(&self) -> BridgeResult<DomDocument> {
        self.child("document").map(DomDocument::new)
    }

    pub fn alert(&self, message: &str) -> BridgeResult<()> {
        self.call("alert", &[Value::from(message)]).map(|_| ())
    }

    /// `window.location.href`
    pub fn location(&self) -> BridgeResult<String> {
        let location = self.child("location")?;
        Ok(location.get_property("href")?.convert()?)
    }

    /// 通过 `Array()` 创建空的宿主数组
    pub fn create_array(&self) -> BridgeResult<ScriptObjectRef> {
        self.call("Array", &[])?
            .as_object()
            .ok_or(BridgeError::HostUnavailable("Array()"))
    }

    /// 通过 `Object()` 创建空的宿主对象
    pub fn create_object(&self) -> BridgeResult<ScriptObjectRef> {
        self.call("Object", &[])?
            .as_object()
            .ok_or(BridgeError::HostUnavailable("Object()"))
    }
}

impl DomDocument {
    /// 找不到元素时返回 `None`
    pub fn get_element_by_id(&self, id: &str) -> BridgeResult<Option<DomElement>> {
        let found = self.call("getElementById", &[Value::from(id)])?;
        Ok(found.as_object().map(DomElement::new))
    }

    pub fn body(&self) -> BridgeResult<DomElement> {
        self.child("body").map(DomElement::new)
    }
}

impl DomElement {
    pub fn get_attribute(&self, name: &str) -> BridgeResult<Value> {
        self.call("getAttribute", &[Value::from(name)])
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) -> BridgeResult<()> {
        self.call("setAttribute", &[Value::from(name), value.into()])
            .map(|_| ())
    }

    pub fn inner_html(&self) -> BridgeResult<String> {
        Ok(self.property("innerHTML")?.convert()?)
    }

    pub fn set_inner_html(&self, html: &str) -> BridgeResult<()> {
        self.set_property("innerHTML", html)
    }

    pub fn width(&self) -> BridgeResult<i32> {
        Ok(self.property("width")?.convert()?)
    }

    pub fn height(&self) -> BridgeResult<i32> {
        Ok(self.property("height")?.convert()?)
    }
}
