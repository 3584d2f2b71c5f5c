//! NPAPI binding
//!
//! - `types` - handles, `NPVariant`, `NPError`
//! - `funcs` - the browser function table and the `NPClass` callbacks
//! - `host` - `NpapiBrowserHost`, the per-instance browser host
//! - `object_api` - browser objects seen as `ScriptObject`
//! - `js_object` - native objects seen by the browser
//! - `marshal` - `Value` to `NPVariant` converters

pub mod funcs;
pub mod host;
pub mod js_object;
pub(crate) mod marshal;
pub mod object_api;
pub mod types;

pub use funcs::{NpClass, NpnFuncs};
pub use host::NpapiBrowserHost;
pub use js_object::NpJavascriptObject;
pub use object_api::NpObjectApi;
pub use types::{IdentifierValue, NpError, NpIdentifier, NpObject, NpString, NpVariant, Npp, NpnVariable};
