//! Integration test: crash recovery.
//!
//! Abandons managers without closing them and damages shard logs the way a
//! crash mid-write would, then checks that a restarted node recovers every
//! acknowledged write.

use reef_integration_tests::{TestNode, append_raw, test_value};
use reef_wal::{WriteAheadLog, replay_file};

/// Acknowledged writes survive an abandoned manager.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_acknowledged_writes_survive_crash() {
    let mut node = TestNode::start(3).await;
    for i in 0..200 {
        node.manager()
            .put(&format!("key:{i}"), &test_value(i))
            .await
            .unwrap();
    }

    node.crash_and_restart().await;

    let m = node.manager();
    assert_eq!(m.size().await.unwrap(), 200);
    for i in [0, 99, 199] {
        assert_eq!(
            m.get(&format!("key:{i}")).await.unwrap(),
            Some(test_value(i))
        );
    }
}

/// A half-written final record is skipped and the shard keeps accepting
/// writes that survive the next restart.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_torn_tail_is_skipped_and_log_stays_usable() {
    let mut node = TestNode::start(3).await;
    node.manager().put("a", "1").await.unwrap();
    node.manager().put("b", "2").await.unwrap();

    let shard = node.manager().shard_for("a").unwrap();
    append_raw(&node.wal_path(&shard), br#"{"op":"PUT","key":"torn","val"#);

    node.crash_and_restart().await;
    assert_eq!(node.manager().get("a").await.unwrap().as_deref(), Some("1"));
    assert_eq!(node.manager().get("torn").await.unwrap(), None);

    // Route a fresh write to the damaged shard.
    let fresh = (0..)
        .map(|i| format!("fresh:{i}"))
        .find(|k| node.manager().shard_for(k).unwrap() == shard)
        .unwrap();
    node.manager().put(&fresh, "after").await.unwrap();

    node.restart().await;
    assert_eq!(
        node.manager().get(&fresh).await.unwrap().as_deref(),
        Some("after")
    );
    assert_eq!(node.manager().get("b").await.unwrap().as_deref(), Some("2"));
}

/// Garbage in the middle of a log loses only that line.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_corrupt_line_mid_log_is_contained() {
    let mut node = TestNode::start(1).await;
    node.manager().put("before", "1").await.unwrap();
    node.manager().close().await.unwrap();

    let shard = node.manager().config().shard_ids[0].clone();
    let path = node.wal_path(&shard);
    append_raw(&path, b"not json at all\n");
    append_raw(&path, b"{\"op\":\"MERGE\",\"key\":\"x\",\"ts\":1}\n");

    node.crash_and_restart().await;
    node.manager().put("after", "2").await.unwrap();
    node.restart().await;

    let m = node.manager();
    assert_eq!(m.size().await.unwrap(), 2);
    assert_eq!(m.get("before").await.unwrap().as_deref(), Some("1"));
    assert_eq!(m.get("after").await.unwrap().as_deref(), Some("2"));

    m.close().await.unwrap();
    let wal = WriteAheadLog::open(&path).await.unwrap();
    let (_, report) = wal.replay_with_report().await.unwrap();
    assert_eq!(report.records, 4);
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 2);
}

/// A put whose caller stops waiting is still logged and applied.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_abandoned_put_is_committed() {
    let mut node = TestNode::start(3).await;

    {
        let put = node.manager().put("dropped", "kept");
        tokio::pin!(put);
        tokio::select! {
            biased;
            _ = &mut put => {}
            _ = std::future::ready(()) => {}
        }
    }

    assert_eq!(
        node.manager().get("dropped").await.unwrap().as_deref(),
        Some("kept")
    );
    node.manager().put("next", "1").await.unwrap();

    node.crash_and_restart().await;
    let m = node.manager();
    assert_eq!(m.get("dropped").await.unwrap().as_deref(), Some("kept"));
    assert_eq!(m.get("next").await.unwrap().as_deref(), Some("1"));
}

/// A torn record buried mid-log by later appends costs only itself.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_torn_record_mid_log_followed_by_appends() {
    let mut node = TestNode::start(3).await;
    node.manager().put("a", "1").await.unwrap();
    let shard = node.manager().shard_for("a").unwrap();
    node.manager().close().await.unwrap();

    let path = node.wal_path(&shard);
    append_raw(&path, br#"{"op":"PUT","key":"torn","value":"par"#);

    node.crash_and_restart().await;
    let routed: Vec<String> = (0..)
        .map(|i| format!("later:{i}"))
        .filter(|k| node.manager().shard_for(k).unwrap() == shard)
        .take(5)
        .collect();
    for key in &routed {
        node.manager().put(key, "v").await.unwrap();
    }

    node.restart().await;
    let m = node.manager();
    assert_eq!(m.get("a").await.unwrap().as_deref(), Some("1"));
    assert_eq!(m.get("torn").await.unwrap(), None);
    for key in &routed {
        assert_eq!(m.get(key).await.unwrap().as_deref(), Some("v"), "{key}");
    }

    m.close().await.unwrap();
    let (state, report) = replay_file(&path).await.unwrap();
    assert_eq!(state.len(), 6);
    assert_eq!(report.applied, 6);
    assert_eq!(report.skipped, 1);
}
