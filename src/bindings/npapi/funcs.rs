//! Browser function table and plugin object class
//!
//! `NpnFuncs` mirrors the browser-supplied function table: every entry is
//! optional, because a browser may leave any of them null. Callers go through
//! `NpapiBrowserHost`, which applies the documented fallback when an entry is
//! missing.
//!
//! `NpClass` is the other direction: the callbacks the browser makes into a
//! plugin-created object.

use std::sync::Arc;

use super::types::{NpError, NpIdentifier, NpObject, NpVariant, Npp, NpnVariable, NpString};
use crate::core::scheduler::Task;

pub type RetainFn = Arc<dyn Fn(NpObject) + Send + Sync>;
pub type ReleaseFn = Arc<dyn Fn(NpObject) + Send + Sync>;
pub type ReleaseVariantFn = Arc<dyn Fn(&NpVariant) + Send + Sync>;
pub type StringIdentifierFn = Arc<dyn Fn(&str) -> NpIdentifier + Send + Sync>;
pub type IntIdentifierFn = Arc<dyn Fn(i32) -> NpIdentifier + Send + Sync>;
pub type IdentifierIsStringFn = Arc<dyn Fn(NpIdentifier) -> bool + Send + Sync>;
pub type Utf8FromIdentifierFn = Arc<dyn Fn(NpIdentifier) -> Option<String> + Send + Sync>;
pub type IntFromIdentifierFn = Arc<dyn Fn(NpIdentifier) -> i32 + Send + Sync>;
pub type InvokeFn =
    Arc<dyn Fn(Npp, NpObject, NpIdentifier, &[NpVariant]) -> Option<NpVariant> + Send + Sync>;
pub type InvokeDefaultFn = Arc<dyn Fn(Npp, NpObject, &[NpVariant]) -> Option<NpVariant> + Send + Sync>;
pub type EvaluateFn = Arc<dyn Fn(Npp, NpObject, &NpString) -> Option<NpVariant> + Send + Sync>;
pub type GetPropertyFn = Arc<dyn Fn(Npp, NpObject, NpIdentifier) -> Option<NpVariant> + Send + Sync>;
pub type SetPropertyFn = Arc<dyn Fn(Npp, NpObject, NpIdentifier, &NpVariant) -> bool + Send + Sync>;
pub type MemberTestFn = Arc<dyn Fn(Npp, NpObject, NpIdentifier) -> bool + Send + Sync>;
pub type EnumerateFn = Arc<dyn Fn(Npp, NpObject) -> Option<Vec<NpIdentifier>> + Send + Sync>;
pub type SetExceptionFn = Arc<dyn Fn(NpObject, &str) + Send + Sync>;
pub type CreateObjectFn = Arc<dyn Fn(Npp, Arc<dyn NpClass>) -> Option<NpObject> + Send + Sync>;
pub type GetValueFn = Arc<dyn Fn(Npp, NpnVariable) -> Result<NpObject, NpError> + Send + Sync>;
pub type AsyncCallFn = Arc<dyn Fn(Npp, Task) + Send + Sync>;
pub type GetUrlNotifyFn =
    Arc<dyn Fn(Npp, &str, Option<&str>, usize) -> Result<(), NpError> + Send + Sync>;
pub type UserAgentFn = Arc<dyn Fn(Npp) -> Option<String> + Send + Sync>;
pub type StatusFn = Arc<dyn Fn(Npp, &str) + Send + Sync>;

/// `NPNetscapeFuncs`
#[derive(Clone, Default)]
pub struct NpnFuncs {
    pub retain_object: Option<RetainFn>,
    pub release_object: Option<ReleaseFn>,
    pub release_variant_value: Option<ReleaseVariantFn>,
    pub get_string_identifier: Option<StringIdentifierFn>,
    pub get_int_identifier: Option<IntIdentifierFn>,
    pub identifier_is_string: Option<IdentifierIsStringFn>,
    pub utf8_from_identifier: Option<Utf8FromIdentifierFn>,
    pub int_from_identifier: Option<IntFromIdentifierFn>,
    pub invoke: Option<InvokeFn>,
    pub invoke_default: Option<InvokeDefaultFn>,
    pub evaluate: Option<EvaluateFn>,
    pub get_property: Option<GetPropertyFn>,
    pub set_property: Option<SetPropertyFn>,
    pub remove_property: Option<MemberTestFn>,
    pub has_property: Option<MemberTestFn>,
    pub has_method: Option<MemberTestFn>,
    pub enumerate: Option<EnumerateFn>,
    pub set_exception: Option<SetExceptionFn>,
    pub create_object: Option<CreateObjectFn>,
    pub get_value: Option<GetValueFn>,
    pub plugin_thread_async_call: Option<AsyncCallFn>,
    pub get_url_notify: Option<GetUrlNotifyFn>,
    pub user_agent: Option<UserAgentFn>,
    pub status: Option<StatusFn>,
}

impl NpnFuncs {
    /// Names of the entries the browser left empty
    pub fn missing_entries(&self) -> Vec<&'static str> {
        let entries: [(&'static str, bool); 24] = [
            ("retainobject", self.retain_object.is_some()),
            ("releaseobject", self.release_object.is_some()),
            ("releasevariantvalue", self.release_variant_value.is_some()),
            ("getstringidentifier", self.get_string_identifier.is_some()),
            ("getintidentifier", self.get_int_identifier.is_some()),
            ("identifierisstring", self.identifier_is_string.is_some()),
            ("utf8fromidentifier", self.utf8_from_identifier.is_some()),
            ("intfromidentifier", self.int_from_identifier.is_some()),
            ("invoke", self.invoke.is_some()),
            ("invokeDefault", self.invoke_default.is_some()),
            ("evaluate", self.evaluate.is_some()),
            ("getproperty", self.get_property.is_some()),
            ("setproperty", self.set_property.is_some()),
            ("removeproperty", self.remove_property.is_some()),
            ("hasproperty", self.has_property.is_some()),
            ("hasmethod", self.has_method.is_some()),
            ("enumerate", self.enumerate.is_some()),
            ("setexception", self.set_exception.is_some()),
            ("createobject", self.create_object.is_some()),
            ("getvalue", self.get_value.is_some()),
            ("pluginthreadasynccall", self.plugin_thread_async_call.is_some()),
            ("geturlnotify", self.get_url_notify.is_some()),
            ("uagent", self.user_agent.is_some()),
            ("status", self.status.is_some()),
        ];
        entries
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// `NPClass` callbacks of a plugin-created object
///
/// Failure is reported the NPAPI way: `None`/`false`, with the message
/// passed to `NPN_SetException` beforehand.
pub trait NpClass: Send + Sync {
    /// The browser is tearing the object down; later calls must fail
    fn invalidate(&self);

    /// The browser's reference count reached zero
    fn deallocate(&self);

    fn has_method(&self, name: NpIdentifier) -> bool;

    fn invoke(&self, name: NpIdentifier, args: &[NpVariant]) -> Option<NpVariant>;

    fn invoke_default(&self, args: &[NpVariant]) -> Option<NpVariant>;

    fn has_property(&self, name: NpIdentifier) -> bool;

    fn get_property(&self, name: NpIdentifier) -> Option<NpVariant>;

    fn set_property(&self, name: NpIdentifier, value: &NpVariant) -> bool;

    fn remove_property(&self, name: NpIdentifier) -> bool;

    fn enumerate(&self) -> Option<Vec<NpIdentifier>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entries() {
        let mut funcs = NpnFuncs::default();
        assert_eq!(funcs.missing_entries().len(), 24);
        funcs.retain_object = Some(Arc::new(|_: NpObject| {}));
        let missing = funcs.missing_entries();
        assert_eq!(missing.len(), 23);
        assert!(!missing.contains(&"retainobject"));
    }
}
