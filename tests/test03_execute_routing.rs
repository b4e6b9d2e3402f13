use std::sync::Arc;
use std::time::Duration;

use sql_dispatch::prelude::*;
use sql_dispatch::test_utils::FakeDriver;

fn fake_factory(driver: &FakeDriver, debug: bool) -> DbFactory {
    let mut config = FactoryConfig::new("localhost", "testing", "tester", "pw");
    config.write_pool_size = 2;
    config.read_pool_size = 2;
    config.timeout = Duration::from_secs(1);
    config.debug = debug;
    DbFactory::with_session_factory(config, Arc::new(driver.clone())).expect("valid config")
}

#[tokio::test]
async fn statements_route_by_pool_usage_not_result_content() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver, false);
    factory.initialize().await?;

    // initialize() probes one lease per pool; measure from that baseline.
    let write_pool = factory.pool(PoolRole::Write).expect("write pool");
    let read_pool = factory.pool(PoolRole::Read).expect("read pool");
    let write_baseline = write_pool.leases_granted();
    let read_baseline = read_pool.leases_granted();

    factory.execute("SELECT 1").await?;
    assert_eq!(read_pool.leases_granted(), read_baseline + 1);
    assert_eq!(write_pool.leases_granted(), write_baseline);

    factory.execute("DELETE FROM t").await?;
    assert_eq!(write_pool.leases_granted(), write_baseline + 1);

    factory.execute("SHOW TABLES").await?;
    factory.execute("  -- leading comment\n  select 1").await?;
    assert_eq!(read_pool.leases_granted(), read_baseline + 3);

    // Conservative default: the empty statement goes to the pool that can mutate.
    factory.execute("").await?;
    assert_eq!(write_pool.leases_granted(), write_baseline + 2);

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn debug_mode_records_an_audit_entry_per_execute() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    driver.fail_statements_containing("no_such_table");
    let factory = fake_factory(&driver, true);
    factory.initialize().await?;

    let ok = factory.execute("SELECT 1").await?;
    assert!(ok.success);
    let failed = factory.execute("DELETE FROM no_such_table").await?;
    assert!(!failed.success);

    let log = factory.audit_log();
    assert_eq!(log.len(), 2);

    assert_eq!(log[0].statement, "SELECT 1");
    assert_eq!(log[0].route, PoolRole::Read);
    assert!(log[0].success);
    assert!(log[0].error.is_none());

    assert_eq!(log[1].route, PoolRole::Write);
    assert!(!log[1].success);
    let error = log[1].error.as_deref().expect("error text recorded");
    assert!(error.contains("no_such_table"), "got: {error}");

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn audit_log_stays_empty_without_debug() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver, false);
    factory.initialize().await?;

    factory.execute("SELECT 1").await?;
    assert!(factory.audit_log().is_empty());

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn driver_failure_is_a_failure_outcome_not_an_error() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    driver.fail_statements_containing("boom");
    let factory = fake_factory(&driver, false);
    factory.initialize().await?;

    let outcome = factory.execute("UPDATE t SET x = 1 WHERE note = 'boom'").await?;
    assert!(!outcome.success);
    assert!(outcome.error_message().is_some());

    // The lease went back despite the failure.
    let write_pool = factory.pool(PoolRole::Write).expect("write pool");
    assert_eq!(write_pool.active_leases(), 0);

    factory.shutdown().await?;
    Ok(())
}
