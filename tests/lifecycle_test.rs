use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use script_bridge::bindings::protocol::BrowserHost;
use script_bridge::core::lifecycle::{active_instance_count, PluginFactory, PluginInstance};
use script_bridge::scripting::{ScriptApi, ScriptObject, ScriptObjectRef};
use script_bridge::value::Value;
use script_bridge::{BridgeError, BridgeResult};

#[derive(Default)]
struct CountingFactory {
    initialized: AtomicUsize,
    deinitialized: AtomicUsize,
    roots_created: AtomicUsize,
    count_seen_by_init: AtomicUsize,
    count_seen_by_deinit: AtomicUsize,
}

impl PluginFactory for CountingFactory {
    fn plugin_name(&self) -> String {
        "Counting Plugin".to_string()
    }

    fn global_plugin_initialize(&self) {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        self.count_seen_by_init.store(active_instance_count(), Ordering::SeqCst);
    }

    fn global_plugin_deinitialize(&self) {
        self.deinitialized.fetch_add(1, Ordering::SeqCst);
        self.count_seen_by_deinit.store(active_instance_count(), Ordering::SeqCst);
    }

    fn create_root_api(&self, _host: Option<&Arc<dyn BrowserHost>>) -> BridgeResult<ScriptObjectRef> {
        self.roots_created.fetch_add(1, Ordering::SeqCst);
        let api: ScriptObjectRef = ScriptApi::builder("Root")
            .method("ping", || "pong".to_string())
            .build()?;
        Ok(api)
    }
}

// 全局计数在整个测试进程内共享，所以生命周期只在这一个测试里驱动
#[test]
fn test_global_init_and_deinit_run_once() {
    let factory = Arc::new(CountingFactory::default());

    let first = PluginInstance::new(factory.clone());
    let second = PluginInstance::new(factory.clone());
    assert_eq!(active_instance_count(), 2);
    assert_eq!(factory.initialized.load(Ordering::SeqCst), 1);
    // 钩子内读取实例数不会死锁
    assert_eq!(factory.count_seen_by_init.load(Ordering::SeqCst), 1);

    // 根对象惰性创建并被复用
    assert_eq!(factory.roots_created.load(Ordering::SeqCst), 0);
    let root = first.root_api().unwrap();
    let again = first.root_api().unwrap();
    assert!(Arc::ptr_eq(&root, &again));
    assert_eq!(factory.roots_created.load(Ordering::SeqCst), 1);
    let pong = root.invoke("ping", &[]).unwrap();
    assert!(pong.observably_eq(&Value::String("pong".into())));

    // 关闭后根对象失效
    first.shutdown();
    assert!(first.is_shut_down());
    assert!(!root.is_valid());
    assert!(matches!(first.root_api(), Err(BridgeError::Invalidated)));

    drop(first);
    assert_eq!(active_instance_count(), 1);
    assert_eq!(factory.deinitialized.load(Ordering::SeqCst), 0);

    drop(second);
    assert_eq!(active_instance_count(), 0);
    assert_eq!(factory.initialized.load(Ordering::SeqCst), 1);
    assert_eq!(factory.deinitialized.load(Ordering::SeqCst), 1);
    assert_eq!(factory.count_seen_by_deinit.load(Ordering::SeqCst), 0);

    // 新一轮实例再次触发全局初始化
    let third = PluginInstance::new(factory.clone());
    assert_eq!(factory.initialized.load(Ordering::SeqCst), 2);
    drop(third);
    assert_eq!(factory.deinitialized.load(Ordering::SeqCst), 2);
}
