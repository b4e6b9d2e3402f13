use std::sync::Arc;
use std::time::Duration;

use sql_dispatch::prelude::*;
use sql_dispatch::test_utils::FakeDriver;

fn fake_factory(driver: &FakeDriver) -> DbFactory {
    let mut config = FactoryConfig::new("localhost", "testing", "tester", "pw");
    config.write_pool_size = 2;
    config.read_pool_size = 2;
    config.timeout = Duration::from_secs(1);
    DbFactory::with_session_factory(config, Arc::new(driver.clone())).expect("valid config")
}

#[tokio::test]
async fn run_transaction_commits_the_whole_batch() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver);
    factory.initialize().await?;

    let outcome = factory
        .run_transaction([
            "INSERT INTO t (name) VALUES ('A')",
            "UPDATE t SET x = 2 WHERE name = 'A'",
        ])
        .await;
    assert!(outcome.success, "batch failed: {:?}", outcome.message);
    assert_eq!(driver.committed_x("A"), Some(2));

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn run_transaction_reports_the_failing_step_and_rolls_back()
-> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    driver.fail_statements_containing("no_such_table");
    let factory = fake_factory(&driver);
    factory.initialize().await?;

    let outcome = factory
        .run_transaction([
            "INSERT INTO t (name) VALUES ('B')",
            "INSERT INTO no_such_table (name) VALUES ('X')",
        ])
        .await;
    assert!(!outcome.success);
    let message = outcome.error_message().expect("failure message");
    assert!(message.contains("statement 2 of 2"), "got: {message}");

    // The insert was rolled back: zero matching rows afterwards.
    let read = factory.execute("SELECT * FROM t WHERE name = 'B'").await?;
    assert!(read.success);
    assert_eq!(read.row_count, 0);

    factory.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn run_transaction_never_errors_even_out_of_sequence() {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver);

    // Not initialized: still a reportable outcome, not an Err or a panic.
    let outcome = factory
        .run_transaction(["INSERT INTO t (name) VALUES ('A')"])
        .await;
    assert!(!outcome.success);
    assert!(outcome.error_message().is_some());
}

#[tokio::test]
async fn empty_batch_commits_cleanly() -> Result<(), SqlDispatchError> {
    let driver = FakeDriver::new();
    let factory = fake_factory(&driver);
    factory.initialize().await?;

    let outcome = factory.run_transaction(Vec::<String>::new()).await;
    assert!(outcome.success);

    factory.shutdown().await?;
    Ok(())
}
