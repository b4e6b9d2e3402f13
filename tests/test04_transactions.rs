use std::sync::Arc;
use std::time::Duration;

use sql_dispatch::prelude::*;
use sql_dispatch::test_utils::FakeDriver;
use sql_dispatch::transaction::Transaction;

fn fake_factory(driver: &FakeDriver) -> DbFactory {
    let mut config = FactoryConfig::new("localhost", "testing", "tester", "pw");
    config.write_pool_size = 2;
    config.read_pool_size = 2;
    config.timeout = Duration::from_secs(1);
    DbFactory::with_session_factory(config, Arc::new(driver.clone())).expect("valid config")
}

#[tokio::test]
async fn commit_applies_queued_statements_in_submission_order() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver);
    factory.initialize().await?;

    let mut tx = factory.begin_transaction().await?;
    assert_eq!(tx.state(), TxState::Active);

    tx.queue_statement("INSERT INTO t (name) VALUES ('A')")?;
    tx.queue_statement("UPDATE t SET x = 1 WHERE name = 'A'")?;
    assert_eq!(tx.queued(), 2);

    let outcome = tx.commit().await;
    assert!(outcome.success, "commit failed: {:?}", outcome.message);
    assert_eq!(tx.state(), TxState::Committed);
    assert_eq!(tx.queued(), 0);

    // Both effects are visible to a subsequent read.
    assert_eq!(driver.committed_names(), vec!["A".to_string()]);
    assert_eq!(driver.committed_x("A"), Some(1));
    let read = factory.execute("SELECT * FROM t WHERE name = 'A'").await?;
    assert_eq!(read.row_count, 1);

    // Strict submission order on the one reserved session.
    let executed = driver.executed_for(PoolRole::Write);
    let insert_pos = executed.iter().position(|sql| sql.contains("INSERT")).unwrap();
    let update_pos = executed.iter().position(|sql| sql.contains("UPDATE")).unwrap();
    let commit_pos = executed.iter().position(|sql| sql == "COMMIT").unwrap();
    assert!(insert_pos < update_pos && update_pos < commit_pos);

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn first_failing_statement_rolls_back_and_discards_the_rest()
-> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    driver.fail_statements_containing("no_such_table");
    let factory = fake_factory(&driver);
    factory.initialize().await?;

    let mut tx = factory.begin_transaction().await?;
    tx.queue_statement("INSERT INTO t (name) VALUES ('B')")?;
    tx.queue_statement("INSERT INTO no_such_table (name) VALUES ('X')")?;
    tx.queue_statement("INSERT INTO t (name) VALUES ('C')")?;

    let outcome = tx.commit().await;
    assert!(!outcome.success);
    let message = outcome.error_message().expect("failure message");
    assert!(message.contains("statement 2 of 3"), "got: {message}");
    assert_eq!(tx.state(), TxState::RolledBack);
    assert!(tx.last_error().is_some());

    // The prefix's effects were undone; the remainder never executed.
    assert!(driver.committed_names().is_empty());
    let executed = driver.executed_for(PoolRole::Write);
    assert!(!executed.iter().any(|sql| sql.contains("'C'")));
    assert!(executed.iter().any(|sql| sql == "ROLLBACK"));

    let read = factory.execute("SELECT * FROM t WHERE name = 'B'").await?;
    assert_eq!(read.row_count, 0);

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn queuing_is_illegal_outside_the_active_state() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver);
    factory.initialize().await?;

    // Idle: constructed but not begun.
    let session = factory
        .pool(PoolRole::Write)
        .expect("write pool")
        .acquire()
        .await?;
    let mut tx = Transaction::new(session);
    assert_eq!(tx.state(), TxState::Idle);
    match tx.queue_statement("INSERT INTO t (name) VALUES ('X')") {
        Err(SqlDispatchError::TransactionNotActive(_)) => {}
        other => panic!("expected not-active error, got {other:?}"),
    }

    let begun = tx.begin().await;
    assert!(begun.success);
    assert!(tx.is_active());

    // Active -> Active transitions are only for queuing; begin is not one.
    let again = tx.begin().await;
    assert!(!again.success);

    let outcome = tx.commit().await;
    assert!(outcome.success);

    // Terminal: queuing always fails, never silently succeeds.
    match tx.queue_statement("INSERT INTO t (name) VALUES ('X')") {
        Err(SqlDispatchError::TransactionFinished(_)) => {}
        other => panic!("expected finished error, got {other:?}"),
    }

    // Terminal commit/rollback are failure outcomes, not panics.
    assert!(!tx.commit().await.success);
    assert!(!tx.rollback().await.success);

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn terminal_transitions_release_the_write_lease() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver);
    factory.initialize().await?;
    let write_pool = factory.pool(PoolRole::Write).expect("write pool");

    let mut tx = factory.begin_transaction().await?;
    assert_eq!(write_pool.active_leases(), 1);
    tx.queue_statement("INSERT INTO t (name) VALUES ('D')")?;
    tx.commit().await;
    assert_eq!(write_pool.active_leases(), 0);

    let mut tx = factory.begin_transaction().await?;
    assert_eq!(write_pool.active_leases(), 1);
    tx.rollback().await;
    assert_eq!(write_pool.active_leases(), 0);

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_begin_releases_the_lease_before_the_error() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    driver.fail_statements_containing("START TRANSACTION");
    let factory = fake_factory(&driver);
    factory.initialize().await?;
    let write_pool = factory.pool(PoolRole::Write).expect("write pool");

    match factory.begin_transaction().await {
        Err(SqlDispatchError::ExecutionError(_)) => {}
        other => panic!("expected execution error, got {other:?}"),
    }
    assert_eq!(write_pool.active_leases(), 0);

    factory.shutdown().await?;
    Ok(())
}
