//! Transaction handler tests

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use govstore_core::storage::{BackendKind, CircuitBreakerStore, StoreError};
use govstore_core::{CircuitBreaker, Service, VERSION_MASTER};
use govstore_sqlite::{telemetry, SqliteError, SqliteStore, StoreConfig, TxHandler};
use tempfile::TempDir;

fn service(id: &str) -> Service {
    Service {
        id: id.to_string(),
        name: format!("svc-{}", id),
        namespace: "default".to_string(),
        valid: true,
        ..Default::default()
    }
}

#[test]
fn test_start_tx_commit() {
    let handler = TxHandler::in_memory().unwrap();

    let tx = handler.start_tx().unwrap();
    tx.tx().unwrap().save_value(&service("s1")).unwrap();
    tx.tx().unwrap().save_value(&service("s2")).unwrap();
    tx.commit().unwrap();

    assert_eq!(handler.load_all::<Service>().unwrap().len(), 2);
}

#[test]
fn test_start_tx_rollback_and_drop() {
    let handler = TxHandler::in_memory().unwrap();

    let tx = handler.start_tx().unwrap();
    tx.tx().unwrap().save_value(&service("s1")).unwrap();
    tx.rollback().unwrap();
    assert!(handler.load_value::<Service>("s1").unwrap().is_none());

    {
        let tx = handler.start_tx().unwrap();
        tx.tx().unwrap().save_value(&service("s2")).unwrap();
    }
    assert!(handler.load_value::<Service>("s2").unwrap().is_none());

    // The handler is usable again after an abandoned transaction.
    handler.save_value(&service("s3")).unwrap();
    assert!(handler.load_value::<Service>("s3").unwrap().is_some());
}

#[test]
fn test_execute_is_all_or_nothing() {
    let handler = TxHandler::in_memory().unwrap();

    let result: Result<(), SqliteError> = handler.execute(true, |tx| {
        tx.save_value(&service("s1"))?;
        tx.save_value(&service("s2"))?;
        Err(StoreError::InvalidArgument("stop".to_string()).into())
    });
    assert!(result.is_err());
    assert!(handler.load_all::<Service>().unwrap().is_empty());
}

#[test]
fn test_read_only_unit_rejects_writes() {
    let handler = TxHandler::in_memory().unwrap();
    let err = handler
        .execute(false, |tx| tx.save_value(&service("s1")))
        .unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendKind::ReadOnly));
}

#[test]
fn test_closed_store_fails_with_closed_kind() {
    let store = SqliteStore::in_memory().unwrap();
    store.close().unwrap();

    let err = store
        .circuit_breakers()
        .create_circuit_breaker(CircuitBreaker::master("r1", "n"))
        .unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendKind::Closed));

    let err = store.start_tx().err().unwrap();
    assert_eq!(err.backend_kind(), Some(BackendKind::Closed));
}

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.db");

    {
        let store = SqliteStore::open(&StoreConfig::file(&path)).unwrap();
        store
            .circuit_breakers()
            .create_circuit_breaker(CircuitBreaker::master("r1", "persisted"))
            .unwrap();
        store.close().unwrap();
    }

    let store = SqliteStore::open(&StoreConfig::file(&path)).unwrap();
    let cb = store
        .circuit_breakers()
        .get_circuit_breaker("r1", VERSION_MASTER)
        .unwrap()
        .unwrap();
    assert_eq!(cb.name, "persisted");
}

#[test]
fn test_second_handle_sees_busy_while_writer_holds_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("busy.db");

    let writer = TxHandler::open(&path, Duration::from_millis(10)).unwrap();
    let other = TxHandler::open(&path, Duration::from_millis(10)).unwrap();

    let held = writer.start_tx().unwrap();
    held.tx().unwrap().save_value(&service("s1")).unwrap();

    let err = other.save_value(&service("s2")).unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendKind::Busy));

    held.commit().unwrap();
    other.save_value(&service("s2")).unwrap();
    assert_eq!(writer.load_all::<Service>().unwrap().len(), 2);
}

#[test]
fn test_reads_see_committed_snapshot_while_writer_is_open() {
    let dir = TempDir::new().unwrap();
    let handler =
        TxHandler::open(dir.path().join("snapshot.db"), Duration::from_millis(10)).unwrap();
    assert!(handler.has_reader());
    handler.save_value(&service("s1")).unwrap();

    let held = handler.start_tx().unwrap();
    held.tx().unwrap().save_value(&service("s2")).unwrap();

    assert!(handler.load_value::<Service>("s1").unwrap().is_some());
    assert!(handler.load_value::<Service>("s2").unwrap().is_none());

    held.commit().unwrap();
    assert!(handler.load_value::<Service>("s2").unwrap().is_some());

    handler.close().unwrap();
    let err = handler.load_value::<Service>("s1").unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendKind::Closed));
}

#[test]
fn test_concurrent_writers_serialize() {
    telemetry::init_with_filter("warn");
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for j in 0..10 {
                    let id = format!("r{}-{}", i, j);
                    store
                        .circuit_breakers()
                        .create_circuit_breaker(CircuitBreaker::master(id, "n"))
                        .unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let all = store.handler().load_all::<CircuitBreaker>().unwrap();
    assert_eq!(all.len(), 80);
    assert!(all.values().all(|cb| cb.valid));
}
