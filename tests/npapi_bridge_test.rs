mod common;

use std::sync::Arc;

use common::npapi::FakeBrowser;
use script_bridge::bindings::npapi::{NpString, NpVariant, NpapiBrowserHost};
use script_bridge::bindings::protocol::{BrowserHost, HostHandle, HostScheduler};
use script_bridge::bindings::VariantMarshaler;
use script_bridge::config::MarshalConfig;
use script_bridge::platform::stream::StreamOptions;
use script_bridge::scripting::object::{ScopedZoneLock, ScriptObjectExt};
use script_bridge::scripting::{ScriptApi, ScriptObject, ScriptObjectRef, SecurityZone};
use script_bridge::value::Value;
use script_bridge::BridgeError;

fn setup() -> (FakeBrowser, Arc<NpapiBrowserHost>) {
    let fake = FakeBrowser::new();
    let host = NpapiBrowserHost::new(fake.npp(), fake.funcs(), &MarshalConfig::default());
    (fake, host)
}

// ============================================================================
// 值封送
// ============================================================================

#[test]
fn test_scalar_marshaling() {
    let (_fake, host) = setup();

    assert_eq!(host.to_host_value(&Value::I32(7)).unwrap(), NpVariant::Int32(7));
    assert_eq!(host.to_host_value(&Value::I16(-3)).unwrap(), NpVariant::Int32(-3));
    // NPVariant 没有无符号和 64 位整数
    assert_eq!(host.to_host_value(&Value::U32(7)).unwrap(), NpVariant::Double(7.0));
    assert_eq!(host.to_host_value(&Value::I64(1 << 40)).unwrap(), NpVariant::Double((1u64 << 40) as f64));
    assert_eq!(host.to_host_value(&Value::Bool(true)).unwrap(), NpVariant::Bool(true));
    assert_eq!(
        host.to_host_value(&Value::String("hi".into())).unwrap(),
        NpVariant::String(NpString::new("hi"))
    );
    assert_eq!(host.to_host_value(&Value::wide("wide")).unwrap(), NpVariant::String(NpString::new("wide")));
    assert_eq!(host.to_host_value(&Value::Null).unwrap(), NpVariant::Null);

    let back = host.to_native_value(&NpVariant::Double(2.5)).unwrap();
    assert!(back.observably_eq(&Value::F64(2.5)));
    let back = host.to_native_value(&NpVariant::String(NpString::new("x"))).unwrap();
    assert!(back.observably_eq(&Value::String("x".into())));
}

#[test]
fn test_opaque_value_becomes_void() {
    let (_fake, host) = setup();
    let variant = host.to_host_value(&Value::opaque(std::time::Instant::now())).unwrap();
    assert_eq!(variant, NpVariant::Void);
}

#[test]
fn test_strict_mode_rejects_opaque_value() {
    let fake = FakeBrowser::new();
    let host = NpapiBrowserHost::new(fake.npp(), fake.funcs(), &MarshalConfig { strict_types: true });
    let result = host.to_host_value(&Value::opaque(42u32));
    assert!(matches!(result, Err(BridgeError::UnsupportedType(_))));
}

#[test]
fn test_list_becomes_page_array() {
    let (fake, host) = setup();

    let variant = host
        .to_host_value(&Value::List(vec![Value::I32(1), Value::String("x".into())]))
        .unwrap();
    let array = variant.as_object().expect("array object");
    // 接收方持有唯一的引用
    assert_eq!(fake.ref_count(array), Some(1));

    let native = host.to_native_value(&variant).unwrap();
    let items = native.as_object().unwrap().array_values().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].observably_eq(&Value::I32(1)));
    assert!(items[1].observably_eq(&Value::String("x".into())));

    drop(native);
    drop(items);
    host.release_variant(&variant);
    assert_eq!(fake.ref_count(array), None);
}

// ============================================================================
// 页面调用原生对象
// ============================================================================

#[test]
fn test_page_calls_native_object() {
    let (fake, host) = setup();
    let api = common::calculator();
    let root: ScriptObjectRef = api.clone();
    let handle = host.scriptable_object(&root).unwrap();

    let sum = fake.js_invoke(handle, "add", &[NpVariant::Int32(2), NpVariant::Int32(3)]);
    assert_eq!(sum, Some(NpVariant::Int32(5)));

    let joined = fake.js_invoke(
        handle,
        "concat",
        &[NpVariant::String(NpString::new("a")), NpVariant::String(NpString::new("b"))],
    );
    assert_eq!(joined, Some(NpVariant::String(NpString::new("ab"))));

    assert_eq!(fake.js_get(handle, "memory"), Some(NpVariant::Double(0.0)));
    assert!(fake.js_set(handle, "memory", &NpVariant::Double(4.5)));
    assert!(api.get_property("memory").unwrap().observably_eq(&Value::F64(4.5)));
    assert!(fake.exceptions().is_empty());
}

#[test]
fn test_native_failure_raises_page_exception() {
    let (fake, host) = setup();
    let root: ScriptObjectRef = common::calculator();
    let handle = host.scriptable_object(&root).unwrap();

    assert_eq!(fake.js_invoke(handle, "fail", &[]), None);
    assert!(fake.exceptions().iter().any(|e| e.contains("calculator is broken")));

    assert_eq!(fake.js_invoke(handle, "missing", &[]), None);
    assert!(fake.exceptions().iter().any(|e| e.contains("No such method: missing")));

    assert!(!fake.js_set(handle, "version", &NpVariant::String(NpString::new("2.0"))));
    assert!(fake.exceptions().iter().any(|e| e.contains("read-only")));

    // 类型不匹配
    let result = fake.js_invoke(handle, "add", &[NpVariant::String(NpString::new("two")), NpVariant::Int32(3)]);
    assert_eq!(result, None);
    assert_eq!(fake.exceptions().len(), 4);
}

#[test]
fn test_zone_hidden_member() {
    let (fake, host) = setup();
    let api = ScriptApi::builder("Secure")
        .method("open", || 1)
        .with_zone(SecurityZone::PRIVATE, |b| b.method("secret", || 42))
        .build()
        .unwrap();
    let root: ScriptObjectRef = api.clone();
    let handle = host.scriptable_object(&root).unwrap();
    let class = fake.plugin_class(handle);

    assert!(class.has_method(fake.string_id("open")));
    assert!(!class.has_method(fake.string_id("secret")));
    assert_eq!(fake.js_invoke(handle, "secret", &[]), None);
    assert!(fake.exceptions().iter().any(|e| e.contains("Access denied")));

    {
        let _lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);
        assert!(class.has_method(fake.string_id("secret")));
        assert_eq!(fake.js_invoke(handle, "secret", &[]), Some(NpVariant::Int32(42)));
    }
    assert!(!class.has_method(fake.string_id("secret")));
}

#[test]
fn test_wrapper_is_reused_per_object() {
    let (fake, host) = setup();
    let root: ScriptObjectRef = common::calculator();

    let first = host.wrap_native(&root, false).unwrap();
    let second = host.wrap_native(&root, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(fake.ref_count(first), Some(2));

    // 弱包装与强包装分开缓存
    let weak = host.wrap_native(&root, true).unwrap();
    assert_ne!(weak, first);
    assert_eq!(host.wrapper_count(), 2);
}

#[test]
fn test_invalidation_detaches_wrappers() {
    let (fake, host) = setup();
    let api = common::calculator();
    let root: ScriptObjectRef = api.clone();
    let handle = host.scriptable_object(&root).unwrap();
    assert_eq!(api.proxy_count(), 1);

    api.invalidate();
    let wrapper = host.wrapper_for(handle).expect("wrapper still owned by the page");
    assert!(!wrapper.is_attached());
    assert_eq!(fake.js_invoke(handle, "add", &[NpVariant::Int32(1), NpVariant::Int32(1)]), None);
    assert!(fake.exceptions().iter().any(|e| e.contains("invalidated")));
    drop(wrapper);

    // 页面回收后包装从宿主中移除
    fake.collect(handle);
    assert_eq!(fake.ref_count(handle), None);
    assert_eq!(host.wrapper_count(), 0);
}

#[test]
fn test_wrapper_comes_back_as_native_object() {
    let (_fake, host) = setup();
    let root: ScriptObjectRef = common::calculator();
    let variant = host.to_host_value(&Value::Object(root.clone())).unwrap();

    let back = host.to_native_value(&variant).unwrap();
    let object = back.as_object().unwrap();
    assert!(script_bridge::scripting::object::same_object(&object, &root));
    host.release_variant(&variant);
}

// ============================================================================
// 原生调用页面对象
// ============================================================================

#[test]
fn test_adapter_identity_and_refcount() {
    let (fake, host) = setup();
    let object = fake.new_plain();
    let baseline = host.adapter_count();

    let a = host.object_api(object);
    let b = host.object_api(object);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(fake.ref_count(object), Some(2));
    assert_eq!(host.adapter_count(), baseline + 1);
    assert_eq!(a.host_handle(), Some(HostHandle::Npapi(object)));

    drop(a);
    assert_eq!(fake.ref_count(object), Some(2));
    drop(b);
    assert_eq!(fake.ref_count(object), Some(1));
    assert_eq!(host.adapter_count(), baseline);
}

#[test]
fn test_adapter_dropped_off_thread_posts_release() {
    let (fake, host) = setup();
    let object = fake.new_plain();
    let adapter = host.object_api(object);
    assert_eq!(fake.ref_count(object), Some(2));

    std::thread::spawn(move || drop(adapter)).join().unwrap();
    assert_eq!(fake.ref_count(object), Some(2));

    assert_eq!(fake.pump(), 1);
    assert_eq!(fake.ref_count(object), Some(1));
}

#[test]
fn test_page_object_properties() {
    let (fake, host) = setup();
    let object = fake.new_plain();
    let adapter = host.object_api(object);

    adapter.set_property("name", Value::String("plugin".into())).unwrap();
    assert!(adapter.has_property("name"));
    assert!(adapter
        .get_property("name")
        .unwrap()
        .observably_eq(&Value::String("plugin".into())));
    assert_eq!(adapter.member_names(), vec!["name".to_string()]);

    adapter.remove_property("name").unwrap();
    assert!(matches!(
        adapter.get_property("name"),
        Err(BridgeError::NoSuchProperty(_))
    ));
}

#[test]
fn test_native_calls_page_function() {
    let (fake, host) = setup();
    let function = fake.new_function();
    let adapter = host.object_api(function);

    adapter
        .invoke_default(&[Value::I32(1), Value::String("a".into())])
        .unwrap();
    assert_eq!(
        fake.function_calls(function),
        vec![vec![NpVariant::Int32(1), NpVariant::String(NpString::new("a"))]]
    );

    let result = adapter.invoke("nope", &[]);
    assert!(matches!(result, Err(BridgeError::Exception(_))));
}

#[test]
fn test_event_reaches_page_function() {
    let (fake, host) = setup();
    let api = common::calculator();
    let dyn_host: Arc<dyn BrowserHost> = host.clone();
    api.set_scheduler(Arc::new(HostScheduler::new(&dyn_host)));
    let root: ScriptObjectRef = api.clone();
    let handle = host.scriptable_object(&root).unwrap();

    let function = fake.new_function();
    let registered = fake.js_invoke(
        handle,
        "addEventListener",
        &[NpVariant::String(NpString::new("load")), NpVariant::Object(function)],
    );
    assert_eq!(registered, Some(NpVariant::Void));
    // 监听者适配器持有一个引用
    assert_eq!(fake.ref_count(function), Some(2));

    api.fire_event("onload", vec![Value::I32(9)]).unwrap();
    assert!(fake.function_calls(function).is_empty());
    fake.pump();
    assert_eq!(fake.function_calls(function), vec![vec![NpVariant::Int32(9)]]);
}

// ============================================================================
// 浏览器服务
// ============================================================================

#[test]
fn test_evaluate_script() {
    let (fake, host) = setup();
    host.evaluate_script("alert('hi')").unwrap();
    assert_eq!(fake.state.lock().evaluated, vec!["alert('hi')".to_string()]);

    let err = host.evaluate_script("throw new Error()").unwrap_err();
    assert_eq!(err.to_string(), "Error executing JavaScript code");
}

#[test]
fn test_window_array_constructor() {
    let (fake, host) = setup();
    let window = host.dom_window().unwrap();
    let array = window.create_array().unwrap();
    array.invoke("push", &[Value::I32(3)]).unwrap();
    assert!(array.get_property("length").unwrap().observably_eq(&Value::I32(1)));

    let handle = match array.host_handle() {
        Some(HostHandle::Npapi(handle)) => handle,
        other => panic!("unexpected handle {:?}", other),
    };
    assert_eq!(fake.ref_count(handle), Some(1));
    drop(array);
    assert_eq!(fake.ref_count(handle), None);
}

#[test]
fn test_index_beyond_int32_names_no_property() {
    let (_fake, host) = setup();
    let window = host.dom_window().unwrap();
    let array = window.create_array().unwrap();
    array.invoke("push", &[Value::I32(3)]).unwrap();

    // u32::MAX 不能回绕成 -1
    assert!(matches!(
        array.get_property_index(u32::MAX),
        Err(BridgeError::NoSuchProperty(name)) if name == u32::MAX.to_string()
    ));
    assert!(matches!(
        array.set_property_index(1 << 31, Value::I32(1)),
        Err(BridgeError::NoSuchProperty(_))
    ));
    assert!(!array.has_property_index(u32::MAX));
    assert!(array.get_property_index(0).unwrap().observably_eq(&Value::I32(3)));
}

#[test]
fn test_create_stream() {
    let (fake, host) = setup();
    let urls = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&urls);
    let listener: ScriptObjectRef = ScriptApi::builder("StreamSink")
        .default_method(move |url: String| sink.lock().push(url))
        .build()
        .unwrap();

    let stream = host
        .create_stream("http://example.com/data.bin", listener.clone(), StreamOptions::default())
        .unwrap();
    assert!(stream.is_created());
    assert_eq!(stream.url(), "http://example.com/data.bin");

    // 创建通知经主线程送达调用方的监听者
    assert!(urls.lock().is_empty());
    assert_eq!(fake.pump(), 1);
    assert_eq!(*urls.lock(), vec!["http://example.com/data.bin".to_string()]);

    let (url, notify) = fake.state.lock().url_requests[0].clone();
    assert_eq!(url, "http://example.com/data.bin");
    assert!(host.stream_for_notify(notify).is_some());
    assert!(host.finish_stream(notify).is_some());
    assert!(host.stream_for_notify(notify).is_none());

    let err = host
        .create_stream("bad:url", listener, StreamOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("NPERR_INVALID_URL"));
    assert_eq!(fake.pump(), 0);
    assert_eq!(urls.lock().len(), 1);
}

#[test]
fn test_user_agent() {
    let (_fake, host) = setup();
    assert!(host.user_agent().unwrap().contains("Firefox"));
    assert!(!host.is_safari());
}

#[test]
fn test_shutdown_releases_and_detaches() {
    let (fake, host) = setup();
    let window = fake.window();
    assert_eq!(fake.ref_count(window), Some(2));

    let root: ScriptObjectRef = common::calculator();
    let handle = host.scriptable_object(&root).unwrap();

    host.shutdown();
    assert!(host.is_shut_down());
    assert_eq!(fake.ref_count(window), Some(1));
    assert!(!host.wrapper_for(handle).unwrap().is_attached());
    assert!(!host.schedule_on_main_thread(Box::new(|| {})));
    assert!(matches!(host.dom_window(), Err(BridgeError::NotAvailable(_))));

    // 关闭后的调用以异常失败
    assert_eq!(fake.js_invoke(handle, "add", &[NpVariant::Int32(1), NpVariant::Int32(1)]), None);
}
