//! Host Binding Layer (FFI)
//!
//! This module connects the ABI-independent scripting core to the two
//! browser plugin ABIs. Both bindings share one object contract
//! (`ScriptObject`), one value model (`Value`) and one host protocol
//! (`BrowserHost`); each contributes an adapter (host object → native view),
//! a wrapper (native object → host view) and a marshaler.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Browser Script                         │
//! │        ┌──────────────┐            ┌──────────────┐         │
//! │        │    NPAPI     │            │  COM / ActiveX│        │
//! │        │  NPObject*   │            │  IDispatch*   │        │
//! │        └──────┬───────┘            └──────┬───────┘         │
//! │               │                           │                 │
//! │               v                           v                 │
//! │  ┌────────────────────────┐  ┌────────────────────────┐     │
//! │  │ NpObjectApi /          │  │ ComDispatchApi /       │     │
//! │  │ NpJavascriptObject     │  │ ComJavascriptObject    │     │
//! │  │ NpapiBrowserHost       │  │ ComBrowserHost         │     │
//! │  └───────────┬────────────┘  └───────────┬────────────┘     │
//! │              │  VariantMarshaler          │                  │
//! │              v                            v                  │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │        BrowserHost protocol + Value model           │    │
//! │  └───────────────────────┬─────────────────────────────┘    │
//! │                          v                                   │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  ScriptObject / ScriptApi (zones, events, proxies)  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod com;
pub mod marshal;
pub mod npapi;
pub mod protocol;

pub use marshal::{VariantMarshaler, SUPPORTED_KINDS};
pub use protocol::*;
