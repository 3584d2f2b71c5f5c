//! Shared fixtures for the integration tests: in-process NPAPI and COM hosts
//! plus a few native objects.

#![allow(dead_code)]

pub mod com;
pub mod npapi;

use parking_lot::Mutex;
use std::sync::Arc;

use script_bridge::scripting::ScriptApi;
use script_bridge::{BridgeError, BridgeResult};
use script_bridge::value::Value;

/// A native object exercising every member family
pub fn calculator() -> Arc<ScriptApi> {
    let memory = Arc::new(Mutex::new(0.0f64));
    let store = Arc::clone(&memory);
    ScriptApi::builder("Calculator")
        .method("add", |a: i32, b: i32| a + b)
        .method("concat", |a: String, b: String| format!("{}{}", a, b))
        .method("fail", || -> BridgeResult<i32> {
            Err(BridgeError::Exception("calculator is broken".to_string()))
        })
        .method("echo", |v: Value| v)
        .property_rw(
            "memory",
            move || *memory.lock(),
            move |v: f64| *store.lock() = v,
        )
        .attribute("version", "1.0", true)
        .event("onload")
        .build()
        .expect("calculator builds")
}
