use std::{sync::Arc, thread, time::Duration};

use ttlmap::{ExpiringMap, LifetimeScope};

const NUM_THREADS: usize = 16;
const NUM_KEYS_PER_THREAD: usize = 64;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .expect("failed to build a runtime")
}

// Plain OS threads driving the map, with the watchers on a separate runtime.
#[test]
fn test_threads_share_one_map() -> anyhow::Result<()> {
    let rt = runtime();
    let map = ExpiringMap::builder(Duration::from_millis(300))
        .runtime(rt.handle().clone())
        .build()?;
    let request = LifetimeScope::new();

    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let my_map = map.clone();
            let my_scope = request.child();
            let start = i * NUM_KEYS_PER_THREAD;
            let end = (i + 1) * NUM_KEYS_PER_THREAD;

            thread::spawn(move || {
                for key in start..end {
                    assert!(my_map.test_and_put(&my_scope, key, format!("value {key}")));
                    assert_eq!(my_map.get(&key), Some(format!("value {key}")));
                }
                // Every 4th key is removed right away.
                for key in (start..end).step_by(4) {
                    assert!(my_map.remove(&key).is_some());
                }
            })
        })
        .collect();

    threads.into_iter().for_each(|t| t.join().expect("thread failed"));

    for key in 0..(NUM_THREADS * NUM_KEYS_PER_THREAD) {
        if key % 4 == 0 {
            assert_eq!(map.get(&key), None);
        } else {
            assert_eq!(map.get(&key), Some(format!("value {key}")));
        }
    }

    thread::sleep(Duration::from_millis(600));
    assert!(map.is_empty());
    Ok(())
}

#[test]
fn test_cancel_from_another_thread() -> anyhow::Result<()> {
    let rt = runtime();
    let map = Arc::new(
        ExpiringMap::builder(Duration::from_secs(60))
            .runtime(rt.handle().clone())
            .build()?,
    );
    let scope = LifetimeScope::new();

    for key in 0..100u32 {
        map.put(&scope.child(), key, key);
    }
    assert_eq!(map.len(), 100);

    let canceller = {
        let scope = scope.clone();
        thread::spawn(move || scope.cancel())
    };
    canceller.join().expect("thread failed");

    thread::sleep(Duration::from_millis(100));
    assert!(map.is_empty());
    Ok(())
}
