use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use modevisor::{
    Config, EventKind, IdentityKey, Mode, SharedRegistry, Supervisor, TaskContext, TaskError,
    TaskFn,
};
use parking_lot::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

fn ctx(name: &str) -> TaskContext {
    TaskContext::detached(name, Mode::Teleoperated, CancellationToken::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn borrowers_never_overlap() {
    let key = IdentityKey::new();
    let reg: SharedRegistry<u64> = SharedRegistry::new();
    reg.register(key, 0).unwrap();
    let in_use = Arc::new(AtomicBool::new(false));

    let mut joins = Vec::new();
    for i in 0..4 {
        let reg = reg.clone();
        let in_use = Arc::clone(&in_use);
        joins.push(tokio::spawn(async move {
            let ctx = ctx(&format!("worker-{i}"));
            for _ in 0..25 {
                let mut guard = reg.borrow(key, &ctx).await.unwrap().unwrap();
                assert!(!in_use.swap(true, Ordering::SeqCst), "two holders at once");
                *guard += 1;
                tokio::task::yield_now().await;
                in_use.store(false, Ordering::SeqCst);
                reg.release(guard);
            }
        }));
    }
    for j in joins {
        j.await.unwrap();
    }

    let guard = reg.borrow(key, &ctx("check")).await.unwrap().unwrap();
    assert_eq!(*guard, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_contenders_all_make_progress() {
    let key = IdentityKey::new();
    let reg: SharedRegistry<Vec<usize>> = SharedRegistry::new();
    reg.register(key, Vec::new()).unwrap();

    let mut joins = Vec::new();
    for i in 0..5 {
        let reg = reg.clone();
        joins.push(tokio::spawn(async move {
            let ctx = ctx(&format!("contender-{i}"));
            for _ in 0..10 {
                let mut guard = reg.borrow(key, &ctx).await.unwrap().unwrap();
                guard.push(i);
                sleep(Duration::from_millis(2)).await;
            }
        }));
    }
    timeout(Duration::from_secs(5), async {
        for j in joins {
            j.await.unwrap();
        }
    })
    .await
    .expect("a contender starved");

    let guard = reg.borrow(key, &ctx("check")).await.unwrap().unwrap();
    for i in 0..5 {
        assert_eq!(guard.iter().filter(|&&v| v == i).count(), 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_are_served_in_arrival_order() {
    let key = IdentityKey::new();
    let reg: SharedRegistry<()> = SharedRegistry::new();
    reg.register(key, ()).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let a = reg.borrow(key, &ctx("a")).await.unwrap().unwrap();
    let started = Instant::now();

    let mut joins = Vec::new();
    for name in ["b", "c"] {
        let waiter_reg = reg.clone();
        let order = Arc::clone(&order);
        joins.push(tokio::spawn(async move {
            let guard = waiter_reg.borrow(key, &ctx(name)).await.unwrap().unwrap();
            order.lock().push((name, started.elapsed()));
            sleep(Duration::from_millis(10)).await;
            drop(guard);
        }));
        let lock = reg.lock(key).unwrap();
        timeout(Duration::from_secs(1), async {
            while lock.waiters() < joins.len() {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("waiter did not queue");
        // the counter rises just before the waiter enters the mutex queue
        sleep(Duration::from_millis(10)).await;
    }

    let release_at = started + Duration::from_millis(100);
    tokio::time::sleep_until(release_at).await;
    a.release();
    for j in joins {
        j.await.unwrap();
    }

    let order = order.lock();
    assert_eq!(order.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec!["b", "c"]);
    assert!(order[0].1 >= Duration::from_millis(100));
    assert!(
        order[0].1 < Duration::from_millis(150),
        "b unblocked {:?} after a's release",
        order[0].1 - Duration::from_millis(100)
    );
}

#[tokio::test]
async fn unregistered_key_returns_none_without_waiting() {
    let held = IdentityKey::new();
    let reg: SharedRegistry<u8> = SharedRegistry::new();
    reg.register(held, 1).unwrap();
    let _guard = reg.borrow(held, &ctx("holder")).await.unwrap().unwrap();

    let missing = IdentityKey::new();
    let res = timeout(Duration::from_millis(50), reg.borrow(missing, &ctx("other")))
        .await
        .expect("borrow of an unknown key blocked");
    assert!(res.unwrap().is_none());
    assert!(reg.try_borrow(missing, &ctx("other")).is_none());
}

#[tokio::test]
async fn release_and_reborrow_reaches_the_same_value() {
    let key = IdentityKey::new();
    let reg: SharedRegistry<Vec<u8>> = SharedRegistry::new();
    reg.register(key, Vec::with_capacity(8)).unwrap();
    let ctx = ctx("roundtrip");

    let mut first = reg.borrow(key, &ctx).await.unwrap().unwrap();
    first.push(7);
    let addr = &*first as *const Vec<u8>;
    reg.release(first);

    let second = reg.borrow(key, &ctx).await.unwrap().unwrap();
    assert_eq!(&*second as *const Vec<u8>, addr);
    assert_eq!(*second, vec![7]);
}

#[tokio::test]
async fn same_task_borrowing_twice_is_rejected() {
    let key = IdentityKey::new();
    let reg: SharedRegistry<u8> = SharedRegistry::new();
    reg.register(key, 0).unwrap();
    let ctx = ctx("greedy");

    let _held = reg.borrow(key, &ctx).await.unwrap().unwrap();
    let err = reg.borrow(key, &ctx).await.unwrap_err();
    assert!(matches!(err, TaskError::Reentrant { key: k } if k == key));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mode_change_releases_a_queued_borrower() {
    let key = IdentityKey::new();
    let reg: SharedRegistry<u32> = SharedRegistry::new();
    reg.register(key, 0).unwrap();
    reg.seal();

    let mut cfg = Config::default();
    cfg.min_handler_time = Duration::ZERO;
    let sup = Supervisor::builder(cfg).build();
    let mut rx = sup.subscribe();

    let held = reg.borrow(key, &ctx("driver-station")).await.unwrap().unwrap();

    let shared = reg.clone();
    sup.add_task(TaskFn::new("arm").on_autonomous(move |ctx: TaskContext| {
        let shared = shared.clone();
        async move {
            let mut value = shared.borrow(key, &ctx).await?.ok_or_else(|| TaskError::fail("missing"))?;
            *value += 1;
            Ok(())
        }
    }))
    .unwrap();

    sup.broadcast(Mode::Autonomous);
    let lock = reg.lock(key).unwrap();
    timeout(Duration::from_secs(1), async {
        while lock.waiters() == 0 {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("arm never queued");

    sup.broadcast(Mode::Disabled);
    timeout(Duration::from_secs(1), async {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == EventKind::HandlerCancelled && ev.mode == Some(Mode::Autonomous) {
                break;
            }
        }
    })
    .await
    .expect("queued borrow was not interrupted");

    assert_eq!(lock.waiters(), 0);
    assert_eq!(*held, 0);
    drop(held);
    assert!(!lock.is_held());
    sup.shutdown().await.unwrap();
}
