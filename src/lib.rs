//! # Script Bridge
//!
//! Exposes native objects to browser script and browser objects to native
//! code, over the two classic plugin ABIs: NPAPI and COM (`IDispatch`).
//!
//! ## Features
//!
//! - **One object contract**: `ScriptObject` is implemented by native objects
//!   and by adapters over browser objects alike
//! - **Typed methods**: closures with typed arguments are registered on a
//!   `ScriptApi` builder; arguments are coerced and range-checked
//! - **Security zones**: members are registered under a zone and hidden from
//!   callers with a lower active zone
//! - **Events**: named events with function listeners, a default slot and
//!   interface listeners, always delivered asynchronously on the main thread
//! - **Lifetime safety**: invalidating a native object detaches every host
//!   wrapper that still points at it
//!
//! ## Architecture Design
//!
//! - **Value**: the tagged union crossing the boundary
//! - **Scripting**: the object model (zones, events, proxies, typed methods)
//! - **Bindings**: per-ABI host, adapter, wrapper and marshaler
//! - **Platform**: DOM and stream collaborators built on the object model
//!
//! ### Example
//!
//! ```rust
//! use script_bridge::scripting::{ScriptApi, ScriptObject};
//! use script_bridge::value::Value;
//!
//! let api = ScriptApi::builder("Calculator")
//!     .method("add", |a: i32, b: i32| a + b)
//!     .build()
//!     .unwrap();
//! let sum = api.invoke("add", &[Value::I32(2), Value::I32(3)]).unwrap();
//! assert!(sum.observably_eq(&Value::I32(5)));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: errors, lifecycle, logging, main-thread scheduling
//! - [`value`]: the bridge value model
//! - [`scripting`]: script objects
//! - [`bindings`]: NPAPI and COM
//! - [`platform`]: DOM and streams
//! - [`config`]: configuration

/// Core infrastructure: errors, lifecycle, logging, main-thread scheduling
pub mod core;
/// The value model crossing the bridge
pub mod value;
/// Script object model with zones, events and typed methods
pub mod scripting;
/// NPAPI and COM host bindings
pub mod bindings;
/// DOM and stream collaborators
pub mod platform;
/// Configuration system
pub mod config;

pub use crate::config::BridgeConfig;
pub use crate::core::error::{BridgeError, BridgeResult};
pub use crate::scripting::{ScriptApi, ScriptObject, ScriptObjectRef, SecurityZone};
pub use crate::value::Value;
