//! Production driver: one `tokio-postgres` client per session.
//!
//! Statements arrive as finished SQL strings, so execution goes through the
//! simple-query protocol; row values come back as text. PostgreSQL has no
//! last-insert-id concept at this protocol level, so `last_insert_id` is always
//! absent here.

use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::{NoTls, SimpleQueryMessage};

use super::{RawResponse, SessionFactory, SqlSession};
use crate::error::SqlDispatchError;
use crate::factory::FactoryConfig;
use crate::types::{PoolRole, SqlValue};

/// Establishes `tokio-postgres` sessions for a pool role, using the role's
/// configured port.
#[derive(Debug, Clone)]
pub struct PgSessionFactory {
    config: FactoryConfig,
}

impl PgSessionFactory {
    #[must_use]
    pub fn new(config: FactoryConfig) -> Self {
        Self { config }
    }

    fn pg_config(&self, role: PoolRole) -> tokio_postgres::Config {
        let cfg = &self.config;
        let port = match role {
            PoolRole::Write => cfg.write_port,
            PoolRole::Read => cfg.read_port,
        };
        let mut pg = tokio_postgres::Config::new();
        pg.host(&cfg.host)
            .port(port)
            .dbname(&cfg.db_name)
            .user(&cfg.username)
            .password(&cfg.password)
            .connect_timeout(cfg.timeout)
            .options(&format!("-c client_encoding={}", cfg.charset));
        pg
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    async fn connect(&self, role: PoolRole) -> Result<Box<dyn SqlSession>, SqlDispatchError> {
        let pg = self.pg_config(role);
        let timeout = self.config.timeout;

        let (client, connection) = tokio::time::timeout(timeout, pg.connect(NoTls))
            .await
            .map_err(|_| {
                SqlDispatchError::Timeout(format!(
                    "connecting {role} session took longer than {timeout:?}"
                ))
            })??;

        // The connection task owns the socket; it ends when the client drops.
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(error = %err, "postgres connection task ended with error");
            }
        });

        Ok(Box::new(PgSession { client, timeout }))
    }
}

/// One live PostgreSQL session.
pub struct PgSession {
    client: tokio_postgres::Client,
    timeout: Duration,
}

#[async_trait]
impl SqlSession for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<RawResponse, SqlDispatchError> {
        let messages = tokio::time::timeout(self.timeout, self.client.simple_query(sql))
            .await
            .map_err(|_| {
                SqlDispatchError::Timeout(format!(
                    "statement took longer than {:?}",
                    self.timeout
                ))
            })??;

        let mut response = RawResponse::default();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(description) => {
                    response.columns = Some(
                        description.iter().map(|col| col.name().to_string()).collect(),
                    );
                }
                SimpleQueryMessage::Row(row) => {
                    if response.columns.is_none() {
                        response.columns = Some(
                            row.columns().iter().map(|col| col.name().to_string()).collect(),
                        );
                    }
                    let values = (0..row.len())
                        .map(|idx| {
                            row.get(idx)
                                .map_or(SqlValue::Null, |text| SqlValue::Text(text.to_string()))
                        })
                        .collect();
                    response.rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    response.affected_rows = count;
                }
                _ => {}
            }
        }
        Ok(response)
    }

    fn is_healthy(&self) -> bool {
        !self.client.is_closed()
    }
}
