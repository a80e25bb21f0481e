//! Checkpoint lifecycle through the public API: append, acknowledge,
//! tail-scan, compact, delete.

use tempfile::TempDir;
use uuid::Uuid;

use tally_core::ledger::{ACK_MARKER, PurchaseLedger, ShopKey};
use tally_core::record::{BuyerId, ItemKind, PurchaseRecord};

fn setup() -> (TempDir, PurchaseLedger, ShopKey) {
    let tmp = TempDir::new().expect("tempdir");
    let ledger = PurchaseLedger::new(tmp.path().join("purchase_transactions"));
    let shop = ShopKey::new(Uuid::new_v4());
    (tmp, ledger, shop)
}

fn purchase(timestamp_ms: i64, buyer_name: &str, quantity: i64) -> PurchaseRecord {
    PurchaseRecord {
        timestamp_ms,
        buyer_id: BuyerId::new(Uuid::new_v4()),
        buyer_name: buyer_name.into(),
        item: ItemKind::parse("GOLD_INGOT"),
        quantity,
    }
}

#[test]
fn fresh_shop_has_no_history_and_no_tail() {
    let (_tmp, ledger, shop) = setup();
    assert!(ledger.list_all(shop).expect("list").is_empty());
    assert!(ledger.unacknowledged(shop).expect("tail").is_empty());
}

#[test]
fn acknowledge_splits_old_from_new() {
    let (_tmp, ledger, shop) = setup();

    let before = purchase(1_000, "Alice", 2);
    ledger.append(shop, &before).expect("append e1");
    ledger.acknowledge(shop).expect("ack");

    let after = purchase(2_000, "Bob", 1);
    ledger.append(shop, &after).expect("append e2");

    let tail = ledger.unacknowledged(shop).expect("tail");
    assert_eq!(tail, vec![after.clone()]);

    let all = ledger.list_all(shop).expect("list");
    assert_eq!(all, vec![before, after]);
}

#[test]
fn repeated_acknowledge_is_idempotent_and_compacts() {
    let (_tmp, ledger, shop) = setup();

    for i in 0..5 {
        ledger
            .append(shop, &purchase(i * 100, "Alice", 1))
            .expect("append");
        ledger.acknowledge(shop).expect("ack");
    }
    ledger.acknowledge(shop).expect("extra ack");
    ledger.acknowledge(shop).expect("another extra ack");

    assert!(ledger.unacknowledged(shop).expect("tail").is_empty());
    assert_eq!(ledger.list_all(shop).expect("list").len(), 5);

    let content = std::fs::read_to_string(ledger.ledger_path(shop)).expect("read");
    let markers = content.lines().filter(|l| l.trim() == ACK_MARKER).count();
    assert_eq!(markers, 1, "compaction must leave a single marker");
}

#[test]
fn tail_grows_until_the_next_checkpoint() {
    let (_tmp, ledger, shop) = setup();

    ledger.append(shop, &purchase(1, "Alice", 1)).expect("append");
    ledger.acknowledge(shop).expect("ack");

    for ts in [10, 20, 30] {
        ledger.append(shop, &purchase(ts, "Bob", 1)).expect("append");
    }
    assert_eq!(ledger.unacknowledged_count(shop).expect("count"), 3);

    ledger.acknowledge(shop).expect("second ack");
    assert_eq!(ledger.unacknowledged_count(shop).expect("count"), 0);
}

#[test]
fn delete_erases_history_and_checkpoints() {
    let (_tmp, ledger, shop) = setup();

    ledger.append(shop, &purchase(1, "Alice", 1)).expect("append");
    ledger.acknowledge(shop).expect("ack");
    ledger.delete(shop).expect("delete");

    assert!(ledger.list_all(shop).expect("list").is_empty());
    assert!(ledger.unacknowledged(shop).expect("tail").is_empty());

    // A new history starts from scratch.
    ledger.append(shop, &purchase(2, "Bob", 4)).expect("append");
    assert_eq!(ledger.unacknowledged_count(shop).expect("count"), 1);
}
