//! In-process NPAPI browser: object table with reference counts, identifier
//! interning, a window with `Array()`/`Object()` constructors and an async
//! call queue drained by `pump()`.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use script_bridge::bindings::npapi::{
    IdentifierValue, NpClass, NpError, NpIdentifier, NpObject, NpString, NpVariant, NpnFuncs,
    NpnVariable, Npp,
};
use script_bridge::core::scheduler::{MainThreadQueue, Task, TaskScheduler};

pub enum Kind {
    Plain(BTreeMap<String, NpVariant>),
    Array(Vec<NpVariant>),
    Window,
    Function,
    Plugin(Arc<dyn NpClass>),
}

pub struct Entry {
    pub refs: u32,
    pub kind: Kind,
}

#[derive(Default)]
pub struct State {
    next_handle: usize,
    pub objects: HashMap<NpObject, Entry>,
    identifiers: Vec<IdentifierValue>,
    pub exceptions: Vec<String>,
    pub statuses: Vec<String>,
    pub evaluated: Vec<String>,
    pub url_requests: Vec<(String, usize)>,
    pub function_calls: Vec<(NpObject, Vec<NpVariant>)>,
    pub window: Option<NpObject>,
    pub element: Option<NpObject>,
    pub user_agent: Option<String>,
}

impl State {
    fn alloc(&mut self, kind: Kind) -> NpObject {
        self.next_handle += 1;
        let handle = NpObject(0x1000 + self.next_handle);
        self.objects.insert(handle, Entry { refs: 1, kind });
        handle
    }

    fn retain(&mut self, handle: NpObject) {
        if let Some(entry) = self.objects.get_mut(&handle) {
            entry.refs += 1;
        }
    }

    fn retain_variant(&mut self, value: &NpVariant) {
        if let NpVariant::Object(handle) = value {
            self.retain(*handle);
        }
    }

    /// Returns the plugin class when the object was freed
    fn release(&mut self, handle: NpObject) -> Option<Arc<dyn NpClass>> {
        let entry = self.objects.get_mut(&handle)?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return None;
        }
        match self.objects.remove(&handle)?.kind {
            Kind::Plugin(class) => Some(class),
            _ => None,
        }
    }

    fn intern(&mut self, value: IdentifierValue) -> NpIdentifier {
        if let Some(pos) = self.identifiers.iter().position(|v| *v == value) {
            return NpIdentifier(pos + 1);
        }
        self.identifiers.push(value);
        NpIdentifier(self.identifiers.len())
    }

    fn identifier(&self, id: NpIdentifier) -> Option<IdentifierValue> {
        self.identifiers.get(id.0.checked_sub(1)?).cloned()
    }

    fn plugin(&self, handle: NpObject) -> Option<Arc<dyn NpClass>> {
        match &self.objects.get(&handle)?.kind {
            Kind::Plugin(class) => Some(Arc::clone(class)),
            _ => None,
        }
    }
}

pub struct FakeBrowser {
    pub state: Arc<Mutex<State>>,
    pub queue: Arc<MainThreadQueue>,
}

fn release_and_deallocate(state: &Mutex<State>, handle: NpObject) {
    let freed = state.lock().release(handle);
    if let Some(class) = freed {
        class.deallocate();
    }
}

impl FakeBrowser {
    pub fn new() -> Self {
        let mut state = State::default();
        let window = state.alloc(Kind::Window);
        let element = state.alloc(Kind::Plain(BTreeMap::new()));
        state.window = Some(window);
        state.element = Some(element);
        state.user_agent = Some("Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/3.6".into());
        Self {
            state: Arc::new(Mutex::new(state)),
            queue: Arc::new(MainThreadQueue::new()),
        }
    }

    pub fn npp(&self) -> Npp {
        Npp(1)
    }

    pub fn pump(&self) -> usize {
        self.queue.process_main_thread_tasks()
    }

    pub fn ref_count(&self, handle: NpObject) -> Option<u32> {
        self.state.lock().objects.get(&handle).map(|e| e.refs)
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.state.lock().exceptions.clone()
    }

    pub fn window(&self) -> NpObject {
        self.state.lock().window.unwrap()
    }

    pub fn new_plain(&self) -> NpObject {
        self.state.lock().alloc(Kind::Plain(BTreeMap::new()))
    }

    pub fn new_function(&self) -> NpObject {
        self.state.lock().alloc(Kind::Function)
    }

    pub fn function_calls(&self, function: NpObject) -> Vec<Vec<NpVariant>> {
        self.state
            .lock()
            .function_calls
            .iter()
            .filter(|(f, _)| *f == function)
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Drops the page's reference to an object, as the garbage collector would
    pub fn collect(&self, handle: NpObject) {
        release_and_deallocate(&self.state, handle);
    }

    pub fn string_id(&self, name: &str) -> NpIdentifier {
        self.state.lock().intern(IdentifierValue::Name(name.to_string()))
    }

    pub fn int_id(&self, index: i32) -> NpIdentifier {
        self.state.lock().intern(IdentifierValue::Index(index))
    }

    pub fn plugin_class(&self, handle: NpObject) -> Arc<dyn NpClass> {
        self.state.lock().plugin(handle).expect("not a plugin object")
    }

    /// `obj.name(args)` from page script
    pub fn js_invoke(&self, handle: NpObject, name: &str, args: &[NpVariant]) -> Option<NpVariant> {
        let id = self.string_id(name);
        self.plugin_class(handle).invoke(id, args)
    }

    pub fn js_get(&self, handle: NpObject, name: &str) -> Option<NpVariant> {
        let id = self.string_id(name);
        self.plugin_class(handle).get_property(id)
    }

    pub fn js_set(&self, handle: NpObject, name: &str, value: &NpVariant) -> bool {
        let id = self.string_id(name);
        self.plugin_class(handle).set_property(id, value)
    }

    pub fn funcs(&self) -> NpnFuncs {
        let mut funcs = NpnFuncs::default();

        let s = Arc::clone(&self.state);
        funcs.retain_object = Some(Arc::new(move |h: NpObject| s.lock().retain(h)));

        let s = Arc::clone(&self.state);
        funcs.release_object = Some(Arc::new(move |h: NpObject| release_and_deallocate(&s, h)));

        let s = Arc::clone(&self.state);
        funcs.release_variant_value = Some(Arc::new(move |v: &NpVariant| {
            if let NpVariant::Object(h) = v {
                release_and_deallocate(&s, *h);
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.get_string_identifier =
            Some(Arc::new(move |name: &str| s.lock().intern(IdentifierValue::Name(name.to_string()))));

        let s = Arc::clone(&self.state);
        funcs.get_int_identifier = Some(Arc::new(move |i: i32| s.lock().intern(IdentifierValue::Index(i))));

        let s = Arc::clone(&self.state);
        funcs.identifier_is_string = Some(Arc::new(move |id: NpIdentifier| {
            matches!(s.lock().identifier(id), Some(IdentifierValue::Name(_)))
        }));

        let s = Arc::clone(&self.state);
        funcs.utf8_from_identifier = Some(Arc::new(move |id: NpIdentifier| match s.lock().identifier(id) {
            Some(IdentifierValue::Name(name)) => Some(name),
            _ => None,
        }));

        let s = Arc::clone(&self.state);
        funcs.int_from_identifier = Some(Arc::new(move |id: NpIdentifier| match s.lock().identifier(id) {
            Some(IdentifierValue::Index(i)) => i,
            _ => -1,
        }));

        let s = Arc::clone(&self.state);
        funcs.invoke = Some(Arc::new(move |_npp: Npp, obj: NpObject, id: NpIdentifier, args: &[NpVariant]| {
            let plugin = s.lock().plugin(obj);
            if let Some(class) = plugin {
                return class.invoke(id, args);
            }
            let mut st = s.lock();
            let name = match st.identifier(id)? {
                IdentifierValue::Name(name) => name,
                IdentifierValue::Index(_) => return None,
            };
            let is_window = matches!(st.objects.get(&obj)?.kind, Kind::Window);
            if is_window {
                return match name.as_str() {
                    "Array" => Some(NpVariant::Object(st.alloc(Kind::Array(Vec::new())))),
                    "Object" => Some(NpVariant::Object(st.alloc(Kind::Plain(BTreeMap::new())))),
                    "alert" => Some(NpVariant::Void),
                    _ => None,
                };
            }
            if name == "push" {
                for arg in args {
                    st.retain_variant(arg);
                }
                if let Kind::Array(items) = &mut st.objects.get_mut(&obj)?.kind {
                    items.extend(args.iter().cloned());
                    return Some(NpVariant::Int32(items.len() as i32));
                }
            }
            None
        }));

        let s = Arc::clone(&self.state);
        funcs.invoke_default = Some(Arc::new(move |_npp: Npp, obj: NpObject, args: &[NpVariant]| {
            let plugin = s.lock().plugin(obj);
            if let Some(class) = plugin {
                return class.invoke_default(args);
            }
            let mut st = s.lock();
            match st.objects.get(&obj)?.kind {
                Kind::Function => {
                    st.function_calls.push((obj, args.to_vec()));
                    Some(NpVariant::Void)
                }
                _ => None,
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.evaluate = Some(Arc::new(move |_npp: Npp, _obj: NpObject, script: &NpString| {
            let text = script.to_string_lossy();
            let mut st = s.lock();
            st.evaluated.push(text.clone());
            if text.contains("throw") {
                None
            } else {
                Some(NpVariant::Int32(1))
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.get_property = Some(Arc::new(move |_npp: Npp, obj: NpObject, id: NpIdentifier| {
            let plugin = s.lock().plugin(obj);
            if let Some(class) = plugin {
                return class.get_property(id);
            }
            let mut st = s.lock();
            let key = st.identifier(id)?;
            let value = match (&st.objects.get(&obj)?.kind, key) {
                (Kind::Array(items), IdentifierValue::Name(name)) if name == "length" => {
                    NpVariant::Int32(items.len() as i32)
                }
                (Kind::Array(items), IdentifierValue::Index(i)) => items.get(i as usize)?.clone(),
                (Kind::Plain(props), IdentifierValue::Name(name)) => props.get(&name)?.clone(),
                _ => return None,
            };
            st.retain_variant(&value);
            Some(value)
        }));

        let s = Arc::clone(&self.state);
        funcs.set_property = Some(Arc::new(move |_npp: Npp, obj: NpObject, id: NpIdentifier, value: &NpVariant| {
            let plugin = s.lock().plugin(obj);
            if let Some(class) = plugin {
                return class.set_property(id, value);
            }
            let mut st = s.lock();
            let Some(key) = st.identifier(id) else {
                return false;
            };
            st.retain_variant(value);
            match (st.objects.get_mut(&obj).map(|e| &mut e.kind), key) {
                (Some(Kind::Plain(props)), IdentifierValue::Name(name)) => {
                    props.insert(name, value.clone());
                    true
                }
                (Some(Kind::Array(items)), IdentifierValue::Index(i)) if i >= 0 => {
                    let i = i as usize;
                    if items.len() <= i {
                        items.resize(i + 1, NpVariant::Void);
                    }
                    items[i] = value.clone();
                    true
                }
                _ => false,
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.remove_property = Some(Arc::new(move |_npp: Npp, obj: NpObject, id: NpIdentifier| {
            let mut st = s.lock();
            let Some(IdentifierValue::Name(name)) = st.identifier(id) else {
                return false;
            };
            match st.objects.get_mut(&obj).map(|e| &mut e.kind) {
                Some(Kind::Plain(props)) => props.remove(&name).is_some(),
                _ => false,
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.has_property = Some(Arc::new(move |_npp: Npp, obj: NpObject, id: NpIdentifier| {
            let st = s.lock();
            match (st.objects.get(&obj).map(|e| &e.kind), st.identifier(id)) {
                (Some(Kind::Plain(props)), Some(IdentifierValue::Name(name))) => props.contains_key(&name),
                (Some(Kind::Array(_)), Some(IdentifierValue::Name(name))) => name == "length",
                (Some(Kind::Array(items)), Some(IdentifierValue::Index(i))) => (i as usize) < items.len(),
                _ => false,
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.has_method = Some(Arc::new(move |_npp: Npp, obj: NpObject, id: NpIdentifier| {
            let st = s.lock();
            match (st.objects.get(&obj).map(|e| &e.kind), st.identifier(id)) {
                (Some(Kind::Window), Some(IdentifierValue::Name(name))) => {
                    matches!(name.as_str(), "Array" | "Object" | "alert")
                }
                (Some(Kind::Array(_)), Some(IdentifierValue::Name(name))) => name == "push",
                _ => false,
            }
        }));

        let s = Arc::clone(&self.state);
        funcs.enumerate = Some(Arc::new(move |_npp: Npp, obj: NpObject| {
            let mut st = s.lock();
            let names: Vec<String> = match &st.objects.get(&obj)?.kind {
                Kind::Plain(props) => props.keys().cloned().collect(),
                _ => return None,
            };
            Some(
                names
                    .into_iter()
                    .map(|n| st.intern(IdentifierValue::Name(n)))
                    .collect(),
            )
        }));

        let s = Arc::clone(&self.state);
        funcs.set_exception = Some(Arc::new(move |_obj: NpObject, message: &str| {
            s.lock().exceptions.push(message.to_string());
        }));

        let s = Arc::clone(&self.state);
        funcs.create_object = Some(Arc::new(move |_npp: Npp, class: Arc<dyn NpClass>| {
            Some(s.lock().alloc(Kind::Plugin(class)))
        }));

        let s = Arc::clone(&self.state);
        funcs.get_value = Some(Arc::new(move |_npp: Npp, variable: NpnVariable| {
            let mut st = s.lock();
            let handle = match variable {
                NpnVariable::WindowNpObject => st.window,
                NpnVariable::PluginElementNpObject => st.element,
            }
            .ok_or(NpError::GenericError)?;
            st.retain(handle);
            Ok(handle)
        }));

        let handle = self.queue.handle();
        funcs.plugin_thread_async_call = Some(Arc::new(move |_npp: Npp, task: Task| {
            handle.schedule(task);
        }));

        let s = Arc::clone(&self.state);
        funcs.get_url_notify = Some(Arc::new(move |_npp: Npp, url: &str, _target: Option<&str>, notify: usize| {
            if url.starts_with("bad:") {
                return Err(NpError::InvalidUrl);
            }
            s.lock().url_requests.push((url.to_string(), notify));
            Ok(())
        }));

        let s = Arc::clone(&self.state);
        funcs.user_agent = Some(Arc::new(move |_npp: Npp| s.lock().user_agent.clone()));

        let s = Arc::clone(&self.state);
        funcs.status = Some(Arc::new(move |_npp: Npp, message: &str| {
            s.lock().statuses.push(message.to_string());
        }));

        funcs
    }
}
