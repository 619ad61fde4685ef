//! Listing, filtering and pagination tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use govstore_core::storage::{CircuitBreakerStore, StoreError};
use govstore_core::{
    CircuitBreaker, CircuitBreakerRelation, Filters, OffsetOverflow, Service, VERSION_MASTER,
};
use govstore_sqlite::{SqliteStore, StoreConfig};
use pretty_assertions::assert_eq;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Store a valid rule with a fixed modify time, bypassing the lifecycle
/// so ordering does not depend on the clock.
fn put_rule(store: &SqliteStore, id: &str, version: &str, minutes: i64) {
    let cb = CircuitBreaker {
        namespace: "default".to_string(),
        owner: if id.starts_with('x') { "bob" } else { "alice" }.to_string(),
        valid: true,
        create_time: at(0),
        modify_time: at(minutes),
        ..CircuitBreaker::master(id, format!("rule-{}", id)).tagged(version)
    };
    store.handler().save_value(&cb).unwrap();
}

fn put_relation(store: &SqliteStore, service_id: &str, rule_id: &str, version: &str, valid: bool) {
    let relation = CircuitBreakerRelation {
        valid,
        create_time: at(0),
        modify_time: at(0),
        ..CircuitBreakerRelation::new(service_id, rule_id, version)
    };
    store.handler().save_value(&relation).unwrap();
}

fn add_service(store: &SqliteStore, id: &str) {
    store
        .services()
        .add_service(Service {
            id: id.to_string(),
            name: format!("svc-{}", id),
            namespace: "default".to_string(),
            ..Default::default()
        })
        .unwrap();
}

fn ids(detail: &govstore_core::CircuitBreakerDetail) -> Vec<String> {
    detail
        .infos
        .iter()
        .map(|info| info.circuit_breaker.id.clone())
        .collect()
}

#[test]
fn test_master_list_window() {
    let store = SqliteStore::in_memory().unwrap();
    // Stored out of key order; modify time gives a..e.
    for (id, minutes) in [("e", 5), ("c", 3), ("a", 1), ("d", 4), ("b", 2)] {
        put_rule(&store, id, VERSION_MASTER, minutes);
    }

    let page = store
        .circuit_breakers()
        .list_master_circuit_breakers(&Filters::new(), 2, 2)
        .unwrap();
    assert_eq!(ids(&page), vec!["c", "d"]);
    assert_eq!(page.total, 5);
}

#[test]
fn test_master_list_sorts_by_modify_time_not_key() {
    let store = SqliteStore::in_memory().unwrap();
    for (id, minutes) in [("a", 3), ("b", 1), ("c", 2)] {
        put_rule(&store, id, VERSION_MASTER, minutes);
    }

    let page = store
        .circuit_breakers()
        .list_master_circuit_breakers(&Filters::new(), 0, 10)
        .unwrap();
    assert_eq!(ids(&page), vec!["b", "c", "a"]);
}

#[test]
fn test_master_list_skips_tags_and_deleted() {
    let store = SqliteStore::in_memory().unwrap();
    let rules = store.circuit_breakers();
    rules.create_circuit_breaker(CircuitBreaker::master("r1", "one")).unwrap();
    rules.create_circuit_breaker(CircuitBreaker::master("r2", "two")).unwrap();
    rules
        .tag_circuit_breaker(CircuitBreaker::master("r1", "one").tagged("v1"))
        .unwrap();
    rules.delete_master_circuit_breaker("r2").unwrap();

    let page = rules.list_master_circuit_breakers(&Filters::new(), 0, 10).unwrap();
    assert_eq!(ids(&page), vec!["r1"]);
    assert_eq!(page.total, 1);
    assert!(page.infos[0].services.is_empty());
}

#[test]
fn test_master_list_filters_are_a_conjunction() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "a1", VERSION_MASTER, 1);
    put_rule(&store, "x1", VERSION_MASTER, 2);
    put_rule(&store, "a2", VERSION_MASTER, 3);

    let rules = store.circuit_breakers();
    let by_owner = rules
        .list_master_circuit_breakers(&Filters::new().with("owner", "alice"), 0, 10)
        .unwrap();
    assert_eq!(ids(&by_owner), vec!["a1", "a2"]);

    let both = rules
        .list_master_circuit_breakers(
            &Filters::new().with("owner", "alice").with("name", "rule-a2"),
            0,
            10,
        )
        .unwrap();
    assert_eq!(ids(&both), vec!["a2"]);

    let none = rules
        .list_master_circuit_breakers(
            &Filters::new().with("owner", "bob").with("name", "rule-a2"),
            0,
            10,
        )
        .unwrap();
    assert_eq!(none.total, 0);
}

#[test]
fn test_unknown_filter_field_is_invalid() {
    let store = SqliteStore::in_memory().unwrap();
    let rules = store.circuit_breakers();

    let err = rules
        .list_master_circuit_breakers(&Filters::new().with("colour", "red"), 0, 10)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    let err = rules
        .list_release_circuit_breakers(&Filters::new().with("owner", "alice"), 0, 10)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[test]
fn test_offset_overflow_returns_everything_by_default() {
    let store = SqliteStore::in_memory().unwrap();
    for (id, minutes) in [("a", 1), ("b", 2), ("c", 3)] {
        put_rule(&store, id, VERSION_MASTER, minutes);
    }

    let page = store
        .circuit_breakers()
        .list_master_circuit_breakers(&Filters::new(), 3, 1)
        .unwrap();
    assert_eq!(ids(&page), vec!["a", "b", "c"]);
    assert_eq!(page.total, 3);
}

#[test]
fn test_offset_overflow_empty_page_policy() {
    let config = StoreConfig {
        offset_overflow: OffsetOverflow::EmptyPage,
        ..StoreConfig::default()
    };
    let store = SqliteStore::open(&config).unwrap();
    for (id, minutes) in [("a", 1), ("b", 2), ("c", 3)] {
        put_rule(&store, id, VERSION_MASTER, minutes);
    }

    let page = store
        .circuit_breakers()
        .list_master_circuit_breakers(&Filters::new(), 3, 1)
        .unwrap();
    assert!(page.infos.is_empty());
    assert_eq!(page.total, 3);
}

#[test]
fn test_release_list_filters_by_rule_id() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", VERSION_MASTER, 1);
    put_rule(&store, "r1", "v1", 2);
    put_rule(&store, "r2", VERSION_MASTER, 3);
    for id in ["s1", "s2", "s3", "s4"] {
        add_service(&store, id);
    }
    put_relation(&store, "s1", "r1", VERSION_MASTER, true);
    put_relation(&store, "s2", "r1", "v1", true);
    put_relation(&store, "s3", "r2", VERSION_MASTER, true);
    put_relation(&store, "s4", "r1", VERSION_MASTER, false);

    let page = store
        .circuit_breakers()
        .list_release_circuit_breakers(&Filters::new().with("rule_id", "r1"), 0, 10)
        .unwrap();

    assert_eq!(page.total, 2);
    assert!(page.infos.iter().all(|i| i.circuit_breaker.id == "r1"));
    let services: Vec<&str> = page
        .infos
        .iter()
        .map(|i| i.services[0].id.as_str())
        .collect();
    assert_eq!(services, vec!["s1", "s2"]);
}

#[test]
fn test_release_list_one_service_per_entry_in_rule_time_order() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", VERSION_MASTER, 5);
    put_rule(&store, "r2", VERSION_MASTER, 1);
    for id in ["s1", "s2", "s3"] {
        add_service(&store, id);
    }
    put_relation(&store, "s3", "r1", VERSION_MASTER, true);
    put_relation(&store, "s1", "r1", VERSION_MASTER, true);
    put_relation(&store, "s2", "r2", VERSION_MASTER, true);

    let page = store
        .circuit_breakers()
        .list_release_circuit_breakers(&Filters::new(), 0, 10)
        .unwrap();

    let entries: Vec<(String, String)> = page
        .infos
        .iter()
        .map(|i| {
            assert_eq!(i.services.len(), 1);
            (i.circuit_breaker.id.clone(), i.services[0].id.clone())
        })
        .collect();
    assert_eq!(
        entries,
        vec![
            ("r2".to_string(), "s2".to_string()),
            ("r1".to_string(), "s1".to_string()),
            ("r1".to_string(), "s3".to_string()),
        ]
    );
}

#[test]
fn test_release_list_drops_unresolvable_entries() {
    let store = SqliteStore::in_memory().unwrap();
    put_rule(&store, "r1", VERSION_MASTER, 1);
    add_service(&store, "s1");
    put_relation(&store, "s1", "r1", VERSION_MASTER, true);
    // No such service.
    put_relation(&store, "s2", "r1", VERSION_MASTER, true);
    // No such rule.
    add_service(&store, "s3");
    put_relation(&store, "s3", "r9", VERSION_MASTER, true);

    let page = store
        .circuit_breakers()
        .list_release_circuit_breakers(&Filters::new(), 0, 10)
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.infos[0].services[0].id, "s1");
}

#[test]
fn test_release_list_window() {
    let store = SqliteStore::in_memory().unwrap();
    for (i, id) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        put_rule(&store, id, VERSION_MASTER, i as i64);
        let service_id = format!("s-{}", id);
        add_service(&store, &service_id);
        put_relation(&store, &service_id, id, VERSION_MASTER, true);
    }

    let page = store
        .circuit_breakers()
        .list_release_circuit_breakers(&Filters::new(), 2, 2)
        .unwrap();
    assert_eq!(ids(&page), vec!["c", "d"]);
    assert_eq!(page.total, 5);
}
