//! Host Protocol
//!
//! The ABI-independent surface every browser host exposes to the bridge:
//! which ABI it speaks, how its handles are identified, how work reaches its
//! main thread, and how the DOM collaborators are obtained.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::bindings::npapi::types::NpObject;
use crate::core::error::BridgeResult;
use crate::core::thread_guard::ThreadAffinity;
use crate::platform::dom::{DomDocument, DomElement, DomWindow};

pub use crate::core::scheduler::{Task, TaskScheduler};

/// Host ABI flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostAbi {
    /// C function table plus opaque object handles
    Npapi,
    /// `IDispatch` interface pointers
    Com,
}

impl fmt::Display for HostAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAbi::Npapi => write!(f, "npapi"),
            HostAbi::Com => write!(f, "com"),
        }
    }
}

/// Identity of a COM interface pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComIdentity(pub usize);

/// Handle of a host-side script object, tagged by ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostHandle {
    Npapi(NpObject),
    Com(ComIdentity),
}

impl HostHandle {
    pub fn abi(&self) -> HostAbi {
        match self {
            HostHandle::Npapi(_) => HostAbi::Npapi,
            HostHandle::Com(_) => HostAbi::Com,
        }
    }
}

/// A browser host the bridge is attached to
pub trait BrowserHost: Send + Sync {
    fn abi(&self) -> HostAbi;

    /// The host's designated main thread
    fn affinity(&self) -> &ThreadAffinity;

    fn is_main_thread(&self) -> bool {
        self.affinity().is_current()
    }

    /// Posts `task` to the host main thread. Returns false when the host
    /// cannot accept it (shut down or no async primitive).
    fn schedule_on_main_thread(&self, task: Task) -> bool;

    /// Evaluates script in the host window. Any script result is discarded.
    fn evaluate_script(&self, script: &str) -> BridgeResult<()>;

    fn dom_window(&self) -> BridgeResult<DomWindow>;

    fn dom_document(&self) -> BridgeResult<DomDocument> {
        self.dom_window()?.document()
    }

    /// The element hosting the plugin
    fn dom_element(&self) -> BridgeResult<DomElement>;

    fn shutdown(&self);

    fn is_shut_down(&self) -> bool;
}

/// `TaskScheduler` view of a host that does not keep the host alive
#[derive(Clone)]
pub struct HostScheduler {
    host: Weak<dyn BrowserHost>,
}

impl HostScheduler {
    pub fn new(host: &Arc<dyn BrowserHost>) -> Self {
        Self {
            host: Arc::downgrade(host),
        }
    }
}

impl TaskScheduler for HostScheduler {
    fn schedule(&self, task: Task) -> bool {
        match self.host.upgrade() {
            Some(host) => host.schedule_on_main_thread(task),
            None => false,
        }
    }
}
