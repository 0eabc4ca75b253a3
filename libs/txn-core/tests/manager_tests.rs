#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end scenarios for `Manager` + `HeldTransaction` against an
//! in-memory SQLite database, covering the concrete scenarios listed for
//! this subsystem: happy commit, timeout clamping, savepoint isolation,
//! the concurrency cap, and expiry + reaper.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseTransaction, Statement};
use txn_core::{Config, FakeClock, Manager};
use txn_db::{Db, DbEngine, DbError};
use txn_errors::TransactionError;

/// A single real connection shared by every checkout from the pool, so all
/// held transactions in a test see the same in-memory database.
async fn test_db() -> Db {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
    opts.max_connections(1).min_connections(1);
    let conn = Database::connect(opts)
        .await
        .expect("connect to in-memory sqlite");
    conn.execute(Statement::from_string(
        conn.get_database_backend(),
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    ))
    .await
    .expect("create widgets table");
    Db::from_connection(conn, DbEngine::Sqlite)
}

fn insert(
    name: &'static str,
) -> impl for<'a> FnOnce(
    &'a DatabaseTransaction,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), DbError>> + Send + 'a>> {
    move |tx| {
        Box::pin(async move {
            tx.execute(Statement::from_string(
                tx.get_database_backend(),
                format!("INSERT INTO widgets (name) VALUES ('{name}')"),
            ))
            .await?;
            Ok(())
        })
    }
}

async fn count_widgets(db: &Db) -> i64 {
    let outer = db.begin_outer().await.expect("begin outer for assertion");
    let row = outer
        .inner()
        .query_one(Statement::from_string(
            outer.inner().get_database_backend(),
            "SELECT COUNT(*) AS c FROM widgets",
        ))
        .await
        .expect("count query")
        .expect("one row");
    let count = row.try_get::<i64>("", "c").expect("count column");
    outer.rollback().await.expect("release assertion connection");
    count
}

#[tokio::test]
async fn happy_commit_persists_and_removes_entry() {
    let db = test_db().await;
    let manager = Manager::new(db.clone(), Config::default(), Arc::new(FakeClock::new(Utc::now())));

    let held = manager.create(None).await.expect("create");
    assert_eq!(held.as_view().timeout_seconds, 30);

    held.submit(insert("A")).await.expect("insert A");

    manager.commit(held.id()).await.expect("commit");
    assert!(matches!(
        manager.find(held.id()).await,
        Err(TransactionError::NotFound(_))
    ));

    assert_eq!(count_widgets(&db).await, 1);
}

#[tokio::test]
async fn clamp_and_default_timeout() {
    let db = test_db().await;
    let config = Config {
        default_timeout_secs: 15,
        max_timeout_secs: 60,
        ..Config::default()
    };
    let manager = Manager::new(db, config, Arc::new(FakeClock::new(Utc::now())));

    let clamped = manager.create(Some(500)).await.expect("create clamped");
    assert_eq!(clamped.as_view().timeout_seconds, 60);
    manager.rollback(clamped.id()).await.expect("rollback clamped");

    let defaulted = manager.create(None).await.expect("create defaulted");
    assert_eq!(defaulted.as_view().timeout_seconds, 15);
    manager.rollback(defaulted.id()).await.expect("rollback defaulted");
}

#[tokio::test]
async fn savepoint_isolation_across_a_failing_and_a_succeeding_operation() {
    let db = test_db().await;
    let manager = Manager::new(db.clone(), Config::default(), Arc::new(FakeClock::new(Utc::now())));

    let held = manager.create(None).await.expect("create");

    let failing = held
        .submit(|tx: &DatabaseTransaction| {
            Box::pin(async move {
                tx.execute(Statement::from_string(
                    tx.get_database_backend(),
                    "INSERT INTO widgets (name) VALUES ('bad')",
                ))
                .await?;
                Err(DbError::Other(anyhow::anyhow!("validation failed")))
            })
        })
        .await;
    let err = failing.expect_err("action should have failed");
    assert!(
        !err.transaction_rolled_back(),
        "a failing action must only roll back its savepoint"
    );

    held.submit(insert("good")).await.expect("second insert");
    manager.commit(held.id()).await.expect("commit");

    assert_eq!(
        count_widgets(&db).await,
        1,
        "only the successful insert should be durable"
    );
}

#[tokio::test]
async fn concurrency_cap_rejects_then_admits_after_a_slot_frees() {
    let db = test_db().await;
    let config = Config {
        max_concurrent: 1,
        ..Config::default()
    };
    let manager = Manager::new(db, config, Arc::new(FakeClock::new(Utc::now())));

    let first = manager.create(None).await.expect("first create");
    assert!(matches!(
        manager.create(None).await,
        Err(TransactionError::ConcurrencyLimit(1))
    ));

    manager.commit(first.id()).await.expect("commit first");

    let third = manager.create(None).await.expect("create after a slot frees");
    manager.rollback(third.id()).await.expect("rollback third");
}

#[tokio::test]
async fn reaper_rolls_back_expired_transactions() {
    let db = test_db().await;
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let config = Config {
        reaper_interval_secs: 1,
        ..Config::default()
    };
    let manager = Manager::new(db.clone(), config, clock.clone());

    let held = manager.create(Some(1)).await.expect("create");
    held.submit(insert("should not survive")).await.expect("insert");

    clock.advance(chrono::Duration::seconds(5));

    manager.start_reaper().await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    assert!(matches!(
        manager.find(held.id()).await,
        Err(TransactionError::NotFound(_))
    ));
    assert_eq!(count_widgets(&db).await, 0, "expired writes must not be durable");

    manager.stop_reaper().await;
}
