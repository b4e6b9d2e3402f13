use std::time::Duration;

use crate::error::SqlDispatchError;

/// Construction-time configuration for a [`crate::DbFactory`].
///
/// This is the only configuration channel; nothing is tunable after
/// construction. Write and read traffic may target different ports of the same
/// host (primary vs. replica endpoint).
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Database server host
    pub host: String,
    /// Database name
    pub db_name: String,
    /// Username for both pools
    pub username: String,
    /// Password for both pools
    pub password: String,
    /// Port the write pool connects to
    pub write_port: u16,
    /// Port the read pool connects to
    pub read_port: u16,
    /// Capacity of the write pool
    pub write_pool_size: usize,
    /// Capacity of the read pool
    pub read_pool_size: usize,
    /// Bound on pool waits and each network round-trip
    pub timeout: Duration,
    /// Client character set, passed through to the driver
    pub charset: String,
    /// When set, every `execute` call is recorded in the audit log
    pub debug: bool,
    /// Sessions idle longer than this are retired on their next lease
    pub recycle_after: Duration,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            db_name: String::new(),
            username: String::new(),
            password: String::new(),
            write_port: 5432,
            read_port: 5432,
            write_pool_size: 2,
            read_pool_size: 2,
            timeout: Duration::from_secs(2),
            charset: "UTF8".to_string(),
            debug: false,
            recycle_after: Duration::from_secs(300),
        }
    }
}

impl FactoryConfig {
    /// Minimal config with defaults for ports, pool sizes, timeout and charset.
    pub fn new(
        host: impl Into<String>,
        db_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            db_name: db_name.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Check that every required field is present and every bound is sane.
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first invalid field.
    pub fn validate(&self) -> Result<(), SqlDispatchError> {
        if self.host.is_empty() {
            return Err(SqlDispatchError::ConfigError("host is required".to_string()));
        }
        if self.db_name.is_empty() {
            return Err(SqlDispatchError::ConfigError(
                "db_name is required".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(SqlDispatchError::ConfigError(
                "username is required".to_string(),
            ));
        }
        if self.write_pool_size == 0 || self.read_pool_size == 0 {
            return Err(SqlDispatchError::ConfigError(
                "pool sizes must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SqlDispatchError::ConfigError(
                "timeout must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}
