//! Integration test: rebalancing.
//!
//! The manager never migrates data, but the ring tells an operator exactly
//! which keys would move when a shard is added. These tests check that plan
//! against a live node's routing.

use reef_engine::ShardManagerConfig;
use reef_integration_tests::TestNode;
use reef_placement::HashRing;

fn ring_for(config: &ShardManagerConfig) -> HashRing {
    let mut ring = HashRing::new(config.vnodes_per_node);
    for id in &config.shard_ids {
        ring.add_node(id.clone());
    }
    ring
}

/// A ring built from the node's config routes exactly like the node.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_offline_ring_matches_live_routing() {
    let node = TestNode::start(3).await;
    let ring = ring_for(node.manager().config());

    for i in 0..1000 {
        let key = format!("key:{i}");
        assert_eq!(
            ring.get_node(&key),
            Some(&node.manager().shard_for(&key).unwrap())
        );
    }
}

/// Adding a fourth shard moves roughly a quarter of the keys, all of them
/// onto the new shard.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_adding_a_shard_moves_keys_only_to_it() {
    let node = TestNode::start(3).await;
    let old = ring_for(node.manager().config());

    let mut new = old.clone();
    new.add_node("shard-3");

    let keys: Vec<String> = (0..10_000).map(|i| format!("key:{i}")).collect();
    let moves = HashRing::diff(&old, &new, keys.iter().map(String::as_str));

    assert!(
        (1500..=3500).contains(&moves.len()),
        "{} of 10000 keys moved",
        moves.len()
    );
    for m in &moves {
        assert_eq!(m.to.as_str(), "shard-3", "{} moved to {}", m.key, m.to);
        assert_eq!(
            node.manager().shard_for(&m.key).unwrap(),
            m.from,
            "{} was not on {}",
            m.key,
            m.from
        );
    }
}

/// Keys whose owner is unchanged stay readable after the node restarts with
/// the same layout; the plan for removing a shard only moves that shard's
/// keys.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_removing_a_shard_moves_only_its_keys() {
    let node = TestNode::start(3).await;
    for i in 0..300 {
        node.manager().put(&format!("key:{i}"), "v").await.unwrap();
    }

    let old = ring_for(node.manager().config());
    let mut new = old.clone();
    new.remove_node("shard-1");

    let keys: Vec<String> = (0..300).map(|i| format!("key:{i}")).collect();
    let moves = HashRing::diff(&old, &new, keys.iter().map(String::as_str));

    let stats = node.manager().get_stats().await.unwrap();
    let on_removed = stats.shards.get("shard-1").copied().unwrap_or_default();
    assert_eq!(moves.len(), on_removed);
    assert!(moves.iter().all(|m| m.from.as_str() == "shard-1"));
    assert!(moves.iter().all(|m| m.to.as_str() != "shard-1"));
}
