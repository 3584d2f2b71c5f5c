//! In-process COM container: `IDispatch` objects with counted references, a
//! window exposing `Array()`/`Object()`, and a site that posts async calls to
//! a `MainThreadQueue`.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use script_bridge::bindings::com::{
    Bstr, ComError, ComResult, ComSite, ComVariant, DispId, Dispatch, DispatchFlags, DispatchRef,
    HResult,
};
use script_bridge::core::scheduler::{MainThreadQueue, Task, TaskScheduler};

const PUSH: DispId = DispId(1);
const LENGTH: DispId = DispId(2);
const INDEX_BASE: i32 = 1000;

pub enum FakeKind {
    Plain(BTreeMap<String, ComVariant>),
    Array(Vec<ComVariant>),
    Window,
    Function(Vec<Vec<ComVariant>>),
}

pub struct FakeDispatch {
    refs: AtomicU32,
    names: Mutex<Vec<String>>,
    pub kind: Mutex<FakeKind>,
}

impl FakeDispatch {
    pub fn new(kind: FakeKind) -> Arc<Self> {
        Arc::new(Self {
            refs: AtomicU32::new(0),
            names: Mutex::new(Vec::new()),
            kind: Mutex::new(kind),
        })
    }

    pub fn plain() -> Arc<Self> {
        Self::new(FakeKind::Plain(BTreeMap::new()))
    }

    pub fn function() -> Arc<Self> {
        Self::new(FakeKind::Function(Vec::new()))
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Vec<ComVariant>> {
        match &*self.kind.lock() {
            FakeKind::Function(calls) => calls.clone(),
            _ => Vec::new(),
        }
    }

    pub fn array_items(&self) -> Vec<ComVariant> {
        match &*self.kind.lock() {
            FakeKind::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn name_count(&self) -> usize {
        self.names.lock().len()
    }

    pub fn entry(&self, name: &str) -> Option<ComVariant> {
        match &*self.kind.lock() {
            FakeKind::Plain(props) => props.get(name).cloned(),
            _ => None,
        }
    }

    fn intern(&self, name: &str) -> DispId {
        let mut names = self.names.lock();
        let index = match names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                names.push(name.to_string());
                names.len() - 1
            }
        };
        DispId(index as i32 + 1)
    }

    fn name_of(&self, id: DispId) -> Option<String> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.names.lock().get(index).cloned()
    }
}

fn not_found() -> ComError {
    ComError::new(HResult::DISP_E_MEMBERNOTFOUND, "member not found")
}

fn unknown(name: &str) -> ComError {
    ComError::new(HResult::DISP_E_UNKNOWNNAME, format!("Unknown name: {}", name))
}

impl Dispatch for FakeDispatch {
    fn add_ref(&self) -> u32 {
        self.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn release(&self) -> u32 {
        self.refs.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    fn get_dispid(&self, name: &str) -> ComResult<DispId> {
        match &*self.kind.lock() {
            FakeKind::Plain(_) => Ok(self.intern(name)),
            FakeKind::Array(_) => match name {
                "push" => Ok(PUSH),
                "length" => Ok(LENGTH),
                _ => name
                    .parse::<i32>()
                    .map(|i| DispId(INDEX_BASE + i))
                    .map_err(|_| unknown(name)),
            },
            FakeKind::Window => match name {
                "Array" | "Object" | "alert" => Ok(self.intern(name)),
                _ => Err(unknown(name)),
            },
            FakeKind::Function(_) => Err(unknown(name)),
        }
    }

    fn invoke(&self, id: DispId, flags: DispatchFlags, args: &[ComVariant]) -> ComResult<ComVariant> {
        let mut kind = self.kind.lock();
        match &mut *kind {
            FakeKind::Plain(props) => {
                let name = self.name_of(id).ok_or_else(not_found)?;
                if flags.is_put() {
                    let value = args.last().cloned().unwrap_or(ComVariant::Empty);
                    props.insert(name, value);
                    Ok(ComVariant::Empty)
                } else {
                    props.get(&name).cloned().ok_or_else(not_found)
                }
            }
            FakeKind::Array(items) => match id {
                PUSH => {
                    items.extend(args.iter().cloned());
                    Ok(ComVariant::I4(items.len() as i32))
                }
                LENGTH => Ok(ComVariant::I4(items.len() as i32)),
                DispId(n) if n >= INDEX_BASE => {
                    let index = (n - INDEX_BASE) as usize;
                    if flags.is_put() {
                        if items.len() <= index {
                            items.resize(index + 1, ComVariant::Empty);
                        }
                        items[index] = args.last().cloned().unwrap_or(ComVariant::Empty);
                        Ok(ComVariant::Empty)
                    } else {
                        items.get(index).cloned().ok_or_else(not_found)
                    }
                }
                _ => Err(not_found()),
            },
            FakeKind::Window => {
                let name = self.name_of(id).ok_or_else(not_found)?;
                match name.as_str() {
                    "Array" => Ok(ComVariant::Dispatch(FakeDispatch::new(FakeKind::Array(Vec::new())))),
                    "Object" => Ok(ComVariant::Dispatch(FakeDispatch::plain())),
                    _ => Ok(ComVariant::Empty),
                }
            }
            FakeKind::Function(calls) => {
                if id != DispId::VALUE {
                    return Err(not_found());
                }
                calls.push(args.to_vec());
                Ok(ComVariant::Empty)
            }
        }
    }

    fn member_names(&self) -> ComResult<Vec<String>> {
        match &*self.kind.lock() {
            FakeKind::Plain(props) => Ok(props.keys().cloned().collect()),
            _ => Err(ComError::new(HResult::E_NOTIMPL, "enumeration not supported")),
        }
    }

    fn delete_member(&self, name: &str) -> ComResult<()> {
        match &mut *self.kind.lock() {
            FakeKind::Plain(props) => props.remove(name).map(|_| ()).ok_or_else(not_found),
            _ => Err(ComError::new(HResult::E_NOTIMPL, "member deletion not supported")),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Container site backed by fake window and element objects
pub struct FakeSite {
    pub window: Arc<FakeDispatch>,
    pub element: Arc<FakeDispatch>,
    pub scripts: Mutex<Vec<String>>,
    pub queue: Arc<MainThreadQueue>,
    pub user_agent: Option<String>,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            window: FakeDispatch::new(FakeKind::Window),
            element: FakeDispatch::plain(),
            scripts: Mutex::new(Vec::new()),
            queue: Arc::new(MainThreadQueue::new()),
            user_agent: Some("Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1)".to_string()),
        })
    }

    pub fn pump(&self) -> usize {
        self.queue.process_main_thread_tasks()
    }
}

impl ComSite for FakeSite {
    fn window(&self) -> Option<DispatchRef> {
        Some(Arc::clone(&self.window) as DispatchRef)
    }

    fn element(&self) -> Option<DispatchRef> {
        Some(Arc::clone(&self.element) as DispatchRef)
    }

    fn exec_script(&self, script: &str) -> ComResult<()> {
        self.scripts.lock().push(script.to_string());
        if script.contains("throw") {
            return Err(ComError::new(HResult::DISP_E_EXCEPTION, "script error"));
        }
        Ok(())
    }

    fn post_async_call(&self, task: Task) -> bool {
        self.queue.handle().schedule(task)
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }
}

/// Page-script style call: look the name up, then invoke it
pub fn call(target: &DispatchRef, name: &str, flags: DispatchFlags, args: &[ComVariant]) -> ComResult<ComVariant> {
    let id = target.get_dispid(name)?;
    target.invoke(id, flags, args)
}

pub fn bstr(s: &str) -> ComVariant {
    ComVariant::Bstr(Bstr::new(s))
}
