use crate::factory::DbFactory;
use crate::results::QueryOutcome;

/// An immutable, finished SQL statement produced by a statement builder.
///
/// The execution core performs no further escaping or validation of the text;
/// injection safety is the builder's responsibility before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    sql: String,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind this statement to a factory for direct invocation.
    #[must_use]
    pub fn bind<'a>(self, factory: &'a DbFactory) -> EagerStatement<'a> {
        EagerStatement {
            statement: self,
            factory,
        }
    }
}

impl From<&str> for CompiledStatement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for CompiledStatement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// A compiled statement bound to its execution core, offering a single
/// terminal `run` call.
#[derive(Debug, Clone)]
pub struct EagerStatement<'a> {
    statement: CompiledStatement,
    factory: &'a DbFactory,
}

impl<'a> EagerStatement<'a> {
    pub fn new(sql: impl Into<String>, factory: &'a DbFactory) -> Self {
        Self {
            statement: CompiledStatement::new(sql),
            factory,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.statement.sql()
    }

    /// Submit the statement through the bound factory.
    ///
    /// Sequencing errors (factory not initialized) are folded into a failure
    /// outcome so the caller sees the same envelope either way.
    pub async fn run(&self) -> QueryOutcome {
        match self.factory.execute(self.statement.sql()).await {
            Ok(outcome) => outcome,
            Err(err) => QueryOutcome::failure(err.to_string()),
        }
    }

    /// Unbind, keeping only the SQL text.
    #[must_use]
    pub fn into_inner(self) -> CompiledStatement {
        self.statement
    }
}

impl<'a> From<EagerStatement<'a>> for CompiledStatement {
    fn from(eager: EagerStatement<'a>) -> Self {
        eager.statement
    }
}
