//! Cache sync feed tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use govstore_core::storage::{CircuitBreakerCacheFeed, CircuitBreakerStore};
use govstore_core::{CircuitBreaker, CircuitBreakerRelation, VERSION_MASTER};
use govstore_sqlite::SqliteStore;
use pretty_assertions::assert_eq;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn put_rule(store: &SqliteStore, id: &str, valid: bool) {
    let cb = CircuitBreaker {
        valid,
        create_time: at(0),
        modify_time: at(0),
        ..CircuitBreaker::master(id, format!("rule-{}", id))
    };
    store.handler().save_value(&cb).unwrap();
}

fn put_relation(store: &SqliteStore, service_id: &str, rule_id: &str, valid: bool, minutes: i64) {
    let relation = CircuitBreakerRelation {
        valid,
        create_time: at(0),
        modify_time: at(minutes),
        ..CircuitBreakerRelation::new(service_id, rule_id, VERSION_MASTER)
    };
    store.handler().save_value(&relation).unwrap();
}

fn service_ids(entries: &[govstore_core::ServiceWithCircuitBreaker]) -> Vec<&str> {
    entries.iter().map(|e| e.service_id.as_str()).collect()
}

#[test]
fn test_cursor_is_inclusive_and_redelivers() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", true);
    put_relation(&store, "s1", "r1", true, 5);
    put_relation(&store, "s2", "r1", true, 10);
    put_relation(&store, "s3", "r1", true, 15);

    let feed = store.circuit_breaker_cache();
    let first = feed.get_circuit_breakers_for_cache(at(10), false).unwrap();
    let second = feed.get_circuit_breakers_for_cache(at(10), false).unwrap();

    assert_eq!(service_ids(&first), vec!["s2", "s3"]);
    assert_eq!(first, second);
}

#[test]
fn test_first_update_returns_whole_bucket() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", true);
    put_relation(&store, "s2", "r1", true, 1);
    put_relation(&store, "s1", "r1", false, 2);

    let entries = store
        .circuit_breaker_cache()
        .get_circuit_breakers_for_cache(at(100), true)
        .unwrap();
    assert_eq!(service_ids(&entries), vec!["s1", "s2"]);
}

#[test]
fn test_entry_carries_binding_flag_and_times() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", true);
    put_relation(&store, "s1", "r1", false, 7);

    let entries = store
        .circuit_breaker_cache()
        .get_circuit_breakers_for_cache(at(0), false)
        .unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert!(!entry.valid);
    assert!(entry.circuit_breaker.valid);
    assert_eq!(entry.modify_time, at(7));
    assert_eq!(entry.create_time, at(0));
    assert_eq!(entry.circuit_breaker.id, "r1");
}

#[test]
fn test_unbind_of_deleted_rule_still_reaches_cache() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", false);
    put_relation(&store, "s1", "r1", false, 3);

    let entries = store
        .circuit_breaker_cache()
        .get_circuit_breakers_for_cache(at(0), false)
        .unwrap();
    assert_eq!(service_ids(&entries), vec!["s1"]);
    assert!(!entries[0].circuit_breaker.valid);
}

#[test]
fn test_unresolvable_rule_is_dropped() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", true);
    put_relation(&store, "s1", "r1", true, 1);
    put_relation(&store, "s2", "gone", true, 1);

    let entries = store
        .circuit_breaker_cache()
        .get_circuit_breakers_for_cache(at(0), false)
        .unwrap();
    assert_eq!(service_ids(&entries), vec!["s1"]);
}

#[test]
fn test_lifecycle_changes_are_picked_up() {
    let store = SqliteStore::in_memory().unwrap();
    let rules = store.circuit_breakers();
    let feed = store.circuit_breaker_cache();

    rules
        .create_circuit_breaker(CircuitBreaker::master("r1", "one"))
        .unwrap();
    rules
        .release_circuit_breaker(CircuitBreakerRelation::new("s1", "r1", VERSION_MASTER))
        .unwrap();

    let initial = feed.get_circuit_breakers_for_cache(at(0), true).unwrap();
    assert_eq!(initial.len(), 1);
    assert!(initial[0].valid);
    let cursor = initial[0].modify_time;

    rules.unbind_circuit_breaker("s1", "r1", VERSION_MASTER).unwrap();
    let changes = feed.get_circuit_breakers_for_cache(cursor, false).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(!changes[0].valid);
    assert!(changes[0].modify_time >= cursor);
}
