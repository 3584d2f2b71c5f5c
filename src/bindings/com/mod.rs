//! COM (ActiveX) binding
//!
//! - `types` - `IDispatch`, `VARIANT`, `BSTR`, `HRESULT`
//! - `host` - `ComBrowserHost` and the container-facing `ComSite`
//! - `dispatch_api` - container objects seen as `ScriptObject`
//! - `js_object` - native objects seen by the container
//! - `marshal` - `Value` to `VARIANT` converters

pub mod dispatch_api;
pub mod host;
pub mod js_object;
pub(crate) mod marshal;
pub mod types;

pub use dispatch_api::ComDispatchApi;
pub use host::{ComBrowserHost, ComSite};
pub use js_object::ComJavascriptObject;
pub use types::{
    dispatch_identity, Bstr, ComError, ComResult, ComVariant, DispId, Dispatch, DispatchFlags,
    DispatchRef, HResult,
};
