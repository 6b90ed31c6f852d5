//! Integration tests for Slotcan

use parking_lot::Mutex;
use serde_json::{json, Value};
use slotcan::runtime::ReactiveRuntime;
use slotcan::{
    add_change_listener, declare_store, remove_change_listener, use_store_slot, ChangeListener,
    FileStorage, MemoryStorage, StoreConfig, StoreError, StoreProvider,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Provider whose children record every value of `key` they render.
fn recording_provider(key: &'static str) -> (StoreProvider, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let provider = StoreProvider::new({
        let seen = seen.clone();
        move || {
            let (value, _) = use_store_slot(key).unwrap();
            seen.lock().push(value);
        }
    });
    (provider, seen)
}

fn counting_listener(counter: &Arc<AtomicUsize>) -> ChangeListener {
    let counter = counter.clone();
    Arc::new(move |_: &Value| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn counter_scenario() {
    ReactiveRuntime::scope(|| {
        let store = declare_store(StoreConfig::new().initial("count", 0)).unwrap();
        let (provider, seen) = recording_provider("count");
        let _mounted = provider.mount().unwrap();

        assert_eq!(seen.lock().last(), Some(&json!(0)));

        store.set("count", 5).unwrap();
        assert_eq!(seen.lock().last(), Some(&json!(5)));
        assert_eq!(store.get("count").unwrap(), json!(5));
    });
}

#[test]
fn persisted_theme_scenario() {
    ReactiveRuntime::scope(|| {
        let storage = MemoryStorage::new();
        let store = declare_store(
            StoreConfig::new()
                .initial("theme", "light")
                .persist("theme")
                .storage(storage.clone()),
        )
        .unwrap();
        assert!(storage.is_empty());

        let _mounted = StoreProvider::new(|| {}).mount().unwrap();
        assert_eq!(storage.raw("theme").as_deref(), Some("\"light\""));

        store.set("theme", "dark").unwrap();
        assert_eq!(storage.raw("theme").as_deref(), Some("\"dark\""));
    });
}

#[test]
fn user_listener_scenario() {
    ReactiveRuntime::scope(|| {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let cb: ChangeListener = {
            let calls = calls.clone();
            Arc::new(move |user: &Value| calls.lock().push(user.clone()))
        };
        let store = declare_store(
            StoreConfig::new()
                .initial("user", Value::Null)
                .on_change_shared("user", cb.clone()),
        )
        .unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();

        store.set("user", json!({"id": 1})).unwrap();
        assert_eq!(*calls.lock(), vec![json!({"id": 1})]);

        remove_change_listener("user", &cb);
        store.set("user", json!({"id": 2})).unwrap();
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(store.get("user").unwrap()["id"], 2);
    });
}

#[test]
fn default_is_read_without_persisted_value_or_write() {
    ReactiveRuntime::scope(|| {
        declare_store(
            StoreConfig::new()
                .initial("n", 1)
                .initial("s", "x")
                .initial("list", json!([1, 2]))
                .initial("none", Value::Null),
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = StoreProvider::new({
            let seen = seen.clone();
            move || {
                let mut values = Vec::new();
                for key in ["n", "s", "list", "none"] {
                    values.push(use_store_slot(key).unwrap().0);
                }
                *seen.lock() = values;
            }
        });
        let _mounted = provider.mount().unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!("x"), json!([1, 2]), Value::Null]);
    });
}

#[test]
fn persistence_survives_fresh_runtime() {
    let storage = MemoryStorage::new();
    let value = json!({"layout": "grid", "columns": [1, 2, 3]});

    ReactiveRuntime::scope(|| {
        let store = declare_store(
            StoreConfig::new()
                .initial("prefs", Value::Null)
                .persist("prefs")
                .storage(storage.clone()),
        )
        .unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();
        store.set("prefs", value.clone()).unwrap();
    });

    ReactiveRuntime::scope(|| {
        declare_store(
            StoreConfig::new()
                .initial("prefs", Value::Null)
                .persist("prefs")
                .storage(storage.clone()),
        )
        .unwrap();
        let (provider, seen) = recording_provider("prefs");
        let _mounted = provider.mount().unwrap();

        assert_eq!(seen.lock().first(), Some(&value));
    });
}

#[test]
fn transform_rule_applies_to_stored_value() {
    let storage = MemoryStorage::new();
    storage.insert_raw("visits", "41");

    ReactiveRuntime::scope(|| {
        let store = declare_store(
            StoreConfig::new()
                .initial("visits", 0)
                .persist_with("visits", |stored| json!(stored.as_i64().unwrap_or(0) + 1))
                .storage(storage.clone()),
        )
        .unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();

        assert_eq!(store.get("visits").unwrap(), json!(42));
    });
}

#[test]
fn listeners_run_in_registration_order_once_per_write() {
    ReactiveRuntime::scope(|| {
        let store = declare_store(StoreConfig::new().initial("k", 0)).unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let make = |name: &'static str| -> ChangeListener {
            let log = log.clone();
            Arc::new(move |v: &Value| log.lock().push((name, v.clone())))
        };
        let (c1, c2, c3) = (make("c1"), make("c2"), make("c3"));
        for cb in [&c1, &c2, &c3] {
            add_change_listener("k", cb.clone()).unwrap();
        }

        store.set("k", 1).unwrap();
        assert_eq!(
            *log.lock(),
            vec![("c1", json!(1)), ("c2", json!(1)), ("c3", json!(1))]
        );

        log.lock().clear();
        remove_change_listener("k", &c2);
        store.set("k", 2).unwrap();
        assert_eq!(*log.lock(), vec![("c1", json!(2)), ("c3", json!(2))]);
    });
}

#[test]
fn duplicate_listener_runs_per_registration() {
    ReactiveRuntime::scope(|| {
        let store = declare_store(StoreConfig::new().initial("k", 0)).unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let cb = counting_listener(&counter);

        store.add_change_listener("k", cb.clone()).unwrap();
        store.add_change_listener("k", cb.clone()).unwrap();
        store.set("k", 1).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    });
}

#[test]
fn init_hook_runs_once_across_mounts() {
    ReactiveRuntime::scope(|| {
        let runs = Arc::new(AtomicUsize::new(0));
        declare_store(StoreConfig::new().initial("k", 0).on_init({
            let runs = runs.clone();
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .unwrap();

        for _ in 0..5 {
            let mounted = StoreProvider::new(|| {}).mount().unwrap();
            mounted.unmount();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn facade_and_scoped_writes_are_equivalent() {
    fn run(use_facade: bool) -> (Value, Value, Vec<Value>, Option<String>) {
        ReactiveRuntime::scope(|| {
            let storage = MemoryStorage::new();
            let calls = Arc::new(Mutex::new(Vec::new()));
            let store = declare_store(
                StoreConfig::new()
                    .initial("k", 0)
                    .persist("k")
                    .storage(storage.clone())
                    .on_change("k", {
                        let calls = calls.clone();
                        move |v: &Value| calls.lock().push(v.clone())
                    }),
            )
            .unwrap();

            let setter = Arc::new(Mutex::new(None));
            let provider = StoreProvider::new({
                let setter = setter.clone();
                move || {
                    let (_, dispatcher) = use_store_slot("k").unwrap();
                    *setter.lock() = Some(dispatcher);
                }
            });
            let mounted = provider.mount().unwrap();

            if use_facade {
                store.set("k", 9).unwrap();
            } else {
                let dispatcher = setter.lock().clone().unwrap();
                dispatcher.dispatch(9).unwrap();
            }

            let calls = calls.lock().clone();
            (
                store.get("k").unwrap(),
                mounted.scoped_value("k").unwrap(),
                calls,
                storage.raw("k"),
            )
        })
    }

    assert_eq!(run(true), run(false));
}

#[test]
fn listener_may_write_through_the_facade() {
    ReactiveRuntime::scope(|| {
        let store = declare_store(StoreConfig::new().initial("celsius", 0).initial("fahrenheit", 32)).unwrap();
        let (provider, seen) = recording_provider("fahrenheit");
        let _mounted = provider.mount().unwrap();

        let mirror = store.clone();
        store
            .add_change_listener(
                "celsius",
                Arc::new(move |c: &Value| {
                    let f = c.as_f64().unwrap_or(0.0) * 9.0 / 5.0 + 32.0;
                    mirror.set("fahrenheit", f).unwrap();
                }),
            )
            .unwrap();

        store.set("celsius", 100).unwrap();
        assert_eq!(store.get("celsius").unwrap(), json!(100));
        assert_eq!(store.get("fahrenheit").unwrap(), json!(212.0));
        assert_eq!(seen.lock().last(), Some(&json!(212.0)));
    });
}

#[test]
fn last_write_wins_on_reentrant_self_write() {
    ReactiveRuntime::scope(|| {
        let store = declare_store(StoreConfig::new().initial("n", 0)).unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();

        let inner = store.clone();
        store
            .add_change_listener(
                "n",
                Arc::new(move |v: &Value| {
                    if v == &json!(1) {
                        inner.set("n", 2).unwrap();
                    }
                }),
            )
            .unwrap();

        // The nested write propagates first, then the outer one lands.
        store.set("n", 1).unwrap();
        assert_eq!(store.get("n").unwrap(), json!(1));
    });
}

#[test]
fn reentrant_self_write_stores_the_value_that_lands_last() {
    ReactiveRuntime::scope(|| {
        let storage = MemoryStorage::new();
        let store = declare_store(
            StoreConfig::new()
                .initial("n", 0)
                .persist("n")
                .storage(storage.clone()),
        )
        .unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();

        let inner = store.clone();
        store
            .add_change_listener(
                "n",
                Arc::new(move |v: &Value| {
                    if v == &json!(1) {
                        inner.set("n", 2).unwrap();
                    }
                }),
            )
            .unwrap();

        store.set("n", 1).unwrap();
        assert_eq!(store.get("n").unwrap(), json!(1));
        assert_eq!(storage.raw("n").as_deref(), Some("1"));

        // A plain write afterwards is stored once, as usual.
        store.set("n", 3).unwrap();
        assert_eq!(storage.raw("n").as_deref(), Some("3"));
    });
}

#[test]
fn unchanged_writes_do_not_rerender() {
    ReactiveRuntime::scope(|| {
        let storage = MemoryStorage::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = declare_store(
            StoreConfig::new()
                .initial("k", 0)
                .persist("k")
                .storage(storage.clone())
                .on_change_shared("k", counting_listener(&calls)),
        )
        .unwrap();
        let (provider, seen) = recording_provider("k");
        let _mounted = provider.mount().unwrap();
        assert_eq!(seen.lock().len(), 1);

        store.set("k", 0).unwrap();
        store.set("k", 0).unwrap();
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(storage.raw("k").as_deref(), Some("0"));

        store.set("k", 4).unwrap();
        assert_eq!(*seen.lock(), vec![json!(0), json!(4)]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    });
}

#[test]
fn later_init_hook_replaces_earlier_one() {
    ReactiveRuntime::scope(|| {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = |tag: u32| {
            let log = log.clone();
            move || log.lock().push(tag)
        };
        declare_store(StoreConfig::new().initial("a", 0).on_init(hook(1))).unwrap();
        declare_store(StoreConfig::new().initial("b", 0).on_init(hook(2))).unwrap();
        // No hook here: the second one stays in place.
        declare_store(StoreConfig::new().initial("c", 0)).unwrap();

        let first = StoreProvider::new(|| {}).mount().unwrap();
        first.unmount();
        let _second = StoreProvider::new(|| {}).mount().unwrap();

        assert_eq!(*log.lock(), vec![2]);
    });
}

#[test]
fn file_storage_round_trip_across_runtimes() {
    let dir = tempfile::tempdir().unwrap();
    let config = |storage: FileStorage| {
        StoreConfig::new()
            .initial("theme", "light")
            .initial("draft", "")
            .persist("theme")
            .storage(storage)
    };

    ReactiveRuntime::scope(|| {
        let store = declare_store(config(FileStorage::open(dir.path()).unwrap())).unwrap();
        let _mounted = StoreProvider::new(|| {}).mount().unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("theme.json")).unwrap(),
            "\"light\""
        );

        store.set("theme", "dark").unwrap();
        store.set("draft", "unsaved").unwrap();
        assert!(!dir.path().join("draft.json").exists());
    });

    ReactiveRuntime::scope(|| {
        let store = declare_store(config(FileStorage::open(dir.path()).unwrap())).unwrap();
        let (provider, seen) = recording_provider("theme");
        let _mounted = provider.mount().unwrap();

        assert_eq!(seen.lock().first(), Some(&json!("dark")));
        assert_eq!(store.get("draft").unwrap(), json!(""));
    });
}

#[test]
fn errors_are_local_to_the_call() {
    ReactiveRuntime::scope(|| {
        let store = declare_store(StoreConfig::new().initial("a", 1)).unwrap();

        assert!(matches!(store.set("a", 2), Err(StoreError::UnmountedKey { .. })));
        assert!(matches!(store.get("b"), Err(StoreError::UndeclaredKey { .. })));
        assert!(matches!(
            add_change_listener("b", Arc::new(|_: &Value| {})),
            Err(StoreError::UndeclaredKey { .. })
        ));

        let _mounted = StoreProvider::new(|| {}).mount().unwrap();
        store.set("a", 3).unwrap();
        assert_eq!(store.get("a").unwrap(), json!(3));
    });
}

#[test]
fn reset_gives_a_clean_runtime() {
    let runtime = ReactiveRuntime::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let declare = || {
        let runs = runs.clone();
        runtime
            .declare(StoreConfig::new().initial("k", 0).on_init(move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap()
    };

    let store = declare();
    let mounted = StoreProvider::in_runtime(runtime.clone(), || {}).mount().unwrap();
    store.set("k", 5).unwrap();
    drop(mounted);

    runtime.reset();
    assert!(!store.contains("k"));

    let store = declare();
    let _mounted = StoreProvider::in_runtime(runtime.clone(), || {}).mount().unwrap();
    assert_eq!(store.get("k").unwrap(), json!(0));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}
