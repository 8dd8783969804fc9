//! Scaling tests with large observer counts and long action sequences.
//!
//! Measures and checks:
//! - Fan-out to thousands of observers
//! - Sequential commits with a live observer set
//! - Concurrent callers on a multi-threaded runtime
//! - Observer churn between broadcasts
//! - Broadcast issue order under racing commits

use parking_lot::Mutex;
use serde_json::json;
use statecast::{Observer, State, Store, StoreBundle, StoreConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

const OBSERVER_COUNT: usize = 5_000;
const ACTION_COUNT: usize = 1_000;

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report(&self) {
        println!("  {} took {:.2}ms", self.name, self.elapsed_ms());
    }
}

fn counter_store() -> StoreBundle {
    Store::builder()
        .initial_state(&json!({ "count": 0 }))
        .action("inc", |s: &State, _: ()| {
            json!({ "count": s["count"].as_i64().unwrap_or(0) + 1 }).into()
        })
        .action("set", |_s: &State, n: i64| json!({ "count": n }).into())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_scaling_fan_out() {
    println!("\n=== Fan-out to {} observers ===", OBSERVER_COUNT);
    let StoreBundle { store, actions } = counter_store();
    let hits = Arc::new(AtomicUsize::new(0));

    let t = Timer::new("register observers");
    for _ in 0..OBSERVER_COUNT {
        let h = hits.clone();
        store
            .observe(
                move |_s: &State| {
                    h.fetch_add(1, Ordering::SeqCst);
                },
                None,
                false,
            )
            .unwrap();
    }
    t.report();
    assert_eq!(store.observer_count(), OBSERVER_COUNT);

    let t = Timer::new("one broadcast");
    assert!(actions.call("inc", ()).await.unwrap());
    store.pending_settled().await;
    t.report();

    assert_eq!(hits.load(Ordering::SeqCst), OBSERVER_COUNT);
    assert_eq!(store.pending_count(), 0);
}

#[tokio::test]
async fn test_scaling_sequential_actions() {
    println!("\n=== {} sequential actions ===", ACTION_COUNT);
    let StoreBundle { store, actions } = counter_store();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let h = hits.clone();
        store
            .observe(
                move |_s: &State| {
                    h.fetch_add(1, Ordering::SeqCst);
                },
                None,
                false,
            )
            .unwrap();
    }

    let t = Timer::new("sequential actions");
    for _ in 0..ACTION_COUNT {
        assert!(actions.call("inc", ()).await.unwrap());
    }
    store.pending_settled().await;
    t.report();

    assert_eq!(store.state()["count"], json!(ACTION_COUNT));
    assert_eq!(hits.load(Ordering::SeqCst), ACTION_COUNT * 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scaling_concurrent_callers() {
    println!("\n=== Concurrent callers ===");
    let StoreBundle { store, actions } = counter_store();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    store
        .observe(
            move |_s: &State| {
                h.fetch_add(1, Ordering::SeqCst);
            },
            None,
            false,
        )
        .unwrap();

    let t = Timer::new("concurrent set calls");
    let mut tasks = Vec::new();
    for n in 1..=ACTION_COUNT as i64 {
        let actions = actions.clone();
        tasks.push(tokio::spawn(async move { actions.call("set", n).await }));
    }
    let mut committed = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() {
            committed += 1;
        }
    }
    store.pending_settled().await;
    t.report();

    // Every value is distinct, so at most one commit per call and exactly
    // one delivery per commit.
    assert!(committed >= 1 && committed <= ACTION_COUNT);
    assert_eq!(hits.load(Ordering::SeqCst), committed);
    assert_eq!(store.pending_count(), 0);
}

#[tokio::test]
async fn test_scaling_observer_churn() {
    println!("\n=== Observer churn ===");
    let store = Store::new(State::new(), StoreConfig::default());
    let survivors = Arc::new(AtomicUsize::new(0));

    let t = Timer::new("churn rounds");
    for round in 0..50i64 {
        let mut handles = Vec::new();
        for _ in 0..100 {
            handles.push(store.observe(|_s: &State| {}, None, false).unwrap());
        }
        let s = survivors.clone();
        store
            .observe(
                move |_s: &State| {
                    s.fetch_add(1, Ordering::SeqCst);
                },
                None,
                false,
            )
            .unwrap();

        let mut partial = State::new();
        partial.insert("round".into(), json!(round));
        let inflight = store.apply(partial).unwrap();
        store.destroy_all(handles);
        inflight.await;
    }
    t.report();

    // Observer added in round r sees rounds r..50.
    assert_eq!(store.observer_count(), 50);
    assert_eq!(survivors.load(Ordering::SeqCst), (1..=50).sum::<usize>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scaling_broadcasts_follow_commit_order() {
    println!("\n=== Racing commits ===");
    let issued = Arc::new(Mutex::new(Vec::new()));
    let log = issued.clone();
    // The selector runs as each broadcast is issued.
    let config = StoreConfig::default().with_selector_fn(move |state: &State, _o: &dyn Observer| {
        log.lock().push(state["writer"].clone());
        true
    });
    let store = Store::new(State::new(), config);
    store.observe(|_s: &State| {}, None, false).unwrap();

    let t = Timer::new("racing applies");
    let mut tasks = Vec::new();
    for writer in 0..ACTION_COUNT {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut partial = State::new();
            partial.insert("writer".into(), json!(writer));
            if let Some(handle) = store.apply(partial) {
                handle.await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    store.pending_settled().await;
    t.report();

    let issued = issued.lock();
    assert_eq!(issued.len(), ACTION_COUNT);
    assert_eq!(issued.last(), Some(&store.state()["writer"]));
}
