//! Integration test: stress.
//!
//! Many concurrent writers and readers against one node. Verifies that no
//! acknowledged write is lost and that the logs agree with memory.

use std::sync::Arc;

use reef_integration_tests::{TestNode, test_value};
use tokio::sync::Barrier;

/// 10 concurrent writers, 100 keys each, then a crash and replay.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(60000)]
async fn test_concurrent_writers_1000_keys() {
    let mut node = TestNode::start(3).await;
    let barrier = Arc::new(Barrier::new(10));
    let mut handles = Vec::new();

    for writer in 0..10 {
        let manager = node.manager().clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for j in 0..100 {
                let i = writer * 100 + j;
                manager.put(&format!("w{writer}-{j:03}"), &test_value(i)).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(node.manager().size().await.unwrap(), 1000);

    node.crash_and_restart().await;

    let m = node.manager();
    assert_eq!(m.size().await.unwrap(), 1000);
    for writer in 0..10 {
        for j in (0..100).step_by(17) {
            let i = writer * 100 + j;
            assert_eq!(
                m.get(&format!("w{writer}-{j:03}")).await.unwrap(),
                Some(test_value(i))
            );
        }
    }
}

/// Writers and deleters racing on a shared key set: after the dust settles,
/// replayed state equals the live state key for key.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(60000)]
async fn test_mixed_workload_replays_to_live_state() {
    let mut node = TestNode::start(3).await;
    let mut handles = Vec::new();

    for t in 0..6usize {
        let manager = node.manager().clone();
        handles.push(tokio::spawn(async move {
            for round in 0..50usize {
                let key = format!("shared:{}", (t * 7 + round) % 40);
                if (t + round) % 3 == 0 {
                    manager.delete(&key).await.unwrap();
                } else {
                    manager.put(&key, &format!("{t}/{round}")).await.unwrap();
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let mut live = Vec::new();
    for k in 0..40 {
        live.push(node.manager().get(&format!("shared:{k}")).await.unwrap());
    }
    let live_size = node.manager().size().await.unwrap();

    node.restart().await;

    assert_eq!(node.manager().size().await.unwrap(), live_size);
    for (k, expected) in live.iter().enumerate() {
        assert_eq!(
            &node.manager().get(&format!("shared:{k}")).await.unwrap(),
            expected,
            "shared:{k}"
        );
    }
}
