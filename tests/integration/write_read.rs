//! Integration test: write / read through a multi-shard node.
//!
//! Exercises the full path: ring routing → shard lock → WAL append →
//! in-memory map, and the reverse on reads and restarts.

use reef_integration_tests::{TestNode, test_value};

/// Write 300 keys to 3 shards, read every one back, and check the spread.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_three_shard_round_trip() {
    let node = TestNode::start(3).await;
    let m = node.manager();

    for i in 0..300 {
        m.put(&format!("key:{i}"), &test_value(i)).await.unwrap();
    }
    for i in 0..300 {
        assert_eq!(
            m.get(&format!("key:{i}")).await.unwrap(),
            Some(test_value(i)),
            "key:{i}"
        );
    }

    let stats = m.get_stats().await.unwrap();
    assert_eq!(stats.total_keys, 300);
    for (shard, count) in &stats.shards {
        assert!((60..=140).contains(count), "{shard} has {count} keys");
    }
}

/// Overwrites and deletes survive a clean restart exactly.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_overwrite_and_delete_survive_restart() {
    let mut node = TestNode::start(3).await;

    for i in 0..50 {
        node.manager().put(&format!("k{i}"), "first").await.unwrap();
    }
    for i in 0..50 {
        if i % 2 == 0 {
            node.manager().put(&format!("k{i}"), "second").await.unwrap();
        } else {
            assert!(node.manager().delete(&format!("k{i}")).await.unwrap());
        }
    }

    node.restart().await;
    let m = node.manager();

    assert_eq!(m.size().await.unwrap(), 25);
    for i in 0..50 {
        let got = m.get(&format!("k{i}")).await.unwrap();
        if i % 2 == 0 {
            assert_eq!(got.as_deref(), Some("second"), "k{i}");
        } else {
            assert_eq!(got, None, "k{i}");
        }
    }
}

/// Every key lives in the log of the shard the ring assigns it to, and only
/// there.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_each_key_logged_only_on_its_shard() {
    let node = TestNode::start(3).await;
    let m = node.manager();

    let keys: Vec<String> = (0..30).map(|i| format!("user:{i}")).collect();
    for key in &keys {
        m.put(key, "v").await.unwrap();
    }
    let owners: Vec<_> = keys.iter().map(|k| m.shard_for(k).unwrap()).collect();
    m.close().await.unwrap();

    let shard_ids = m.config().shard_ids.clone();
    for (key, owner) in keys.iter().zip(&owners) {
        let needle = format!("\"key\":\"{key}\"");
        for shard in &shard_ids {
            let log = std::fs::read_to_string(node.wal_path(shard)).unwrap();
            assert_eq!(log.contains(&needle), shard == owner, "{key} in {shard}");
        }
    }
}

/// A key's shard does not change across restarts.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_routing_stable_across_restart() {
    let mut node = TestNode::start(4).await;
    let before: Vec<_> = (0..100)
        .map(|i| node.manager().shard_for(&format!("key:{i}")).unwrap())
        .collect();

    node.restart().await;

    let after: Vec<_> = (0..100)
        .map(|i| node.manager().shard_for(&format!("key:{i}")).unwrap())
        .collect();
    assert_eq!(before, after);
}
