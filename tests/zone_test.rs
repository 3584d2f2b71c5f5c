use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use script_bridge::scripting::object::ScopedZoneLock;
use script_bridge::scripting::{ScriptApi, ScriptObject, SecurityZone};
use script_bridge::value::Value;
use script_bridge::BridgeError;

/// 公开的 `add` 与仅私有安全区可见的 `secret`
fn guarded_api() -> Arc<ScriptApi> {
    ScriptApi::builder("Vault")
        .method("add", |a: i32, b: i32| a + b)
        .with_zone(SecurityZone::PRIVATE, |b| {
            b.method("secret", || "42".to_string())
                .attribute("pin", 1234, true)
        })
        .build()
        .unwrap()
}

// ============================================================================
// 成员可见性
// ============================================================================

#[test]
fn test_member_hidden_below_its_zone() {
    let api = guarded_api();

    assert!(api.has_method("add"));
    assert!(!api.has_method("secret"));
    assert!(!api.member_names().contains(&"pin".to_string()));
    assert!(matches!(
        api.invoke("secret", &[]),
        Err(BridgeError::AccessDenied { .. })
    ));
    assert!(matches!(
        api.get_property("pin"),
        Err(BridgeError::AccessDenied { .. })
    ));
}

#[test]
fn test_scoped_lock_reveals_member() {
    let api = guarded_api();
    {
        let _lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);
        assert!(api.has_method("secret"));
        let value = api.invoke("secret", &[]).unwrap();
        assert_eq!(value.as_string().as_deref(), Some("42"));
        assert!(api.get_property("pin").unwrap().observably_eq(&Value::I32(1234)));
    }
    assert_eq!(api.zone(), SecurityZone::PUBLIC);
    assert!(!api.has_method("secret"));
}

#[test]
fn test_nested_locks_pop_in_reverse_order() {
    let api = guarded_api();
    let _outer = ScopedZoneLock::new(api.as_ref(), SecurityZone::LOCAL);
    {
        let _inner = ScopedZoneLock::new(api.as_ref(), SecurityZone::PROTECTED);
        assert_eq!(api.zone(), SecurityZone::PROTECTED);
        // 内层安全区较低，私有成员再次隐藏
        assert!(!api.has_method("secret"));
    }
    assert_eq!(api.zone(), SecurityZone::LOCAL);
    assert!(api.has_method("secret"));
}

#[test]
fn test_lock_pops_when_native_code_panics() {
    let api = guarded_api();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let _lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);
        api.invoke("secret", &[]).unwrap();
        panic!("native failure");
    }));

    assert!(result.is_err());
    assert_eq!(api.zone(), SecurityZone::PUBLIC);
    assert!(!api.has_method("secret"));
}

#[test]
fn test_default_zone_applies_without_lock() {
    let api = guarded_api();
    api.set_default_zone(SecurityZone::LOCAL);
    assert!(api.has_method("secret"));
    api.set_default_zone(SecurityZone::PUBLIC);
    assert!(!api.has_method("secret"));
}

// ============================================================================
// 跨线程
// ============================================================================

#[test]
fn test_other_thread_waits_for_zone_owner() {
    let api = guarded_api();
    let entered = Arc::new(AtomicBool::new(false));

    let lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);

    let worker = {
        let api = Arc::clone(&api);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            let _lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PUBLIC);
            entered.store(true, Ordering::SeqCst);
            api.has_method("secret")
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!entered.load(Ordering::SeqCst));
    drop(lock);

    // 工作线程持有的是公开安全区
    assert!(!worker.join().unwrap());
    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(api.zone(), SecurityZone::PUBLIC);
}

#[test]
fn test_other_thread_never_sees_owner_zone() {
    let api = guarded_api();
    let checked = Arc::new(AtomicBool::new(false));

    let lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);

    // 工作线程没有压栈，只做查找与调用
    let worker = {
        let api = Arc::clone(&api);
        let checked = Arc::clone(&checked);
        thread::spawn(move || {
            let visible = api.has_method("secret");
            let denied = matches!(api.invoke("secret", &[]), Err(BridgeError::AccessDenied { .. }));
            checked.store(true, Ordering::SeqCst);
            (visible, denied)
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!checked.load(Ordering::SeqCst));
    assert!(api.has_method("secret"));
    drop(lock);

    let (visible, denied) = worker.join().unwrap();
    assert!(!visible);
    assert!(denied);
}

#[test]
fn test_pop_from_foreign_thread_is_ignored() {
    let api = guarded_api();
    let _lock = ScopedZoneLock::new(api.as_ref(), SecurityZone::PRIVATE);

    let other = Arc::clone(&api);
    thread::spawn(move || other.pop_zone()).join().unwrap();

    assert_eq!(api.zone(), SecurityZone::PRIVATE);
}
