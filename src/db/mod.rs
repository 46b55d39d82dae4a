/// Database Module
///
/// This module defines the driver-agnostic session used by the ETL stages:
/// - The `Session` trait (execute, execute_many, query, commit, close)
/// - Parameter values and result rows
/// - Typed connection/statement errors
///
/// Stage SQL is written with `?` placeholders; each driver rewrites them.
pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

pub use postgres::PgSession;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a database session
#[derive(Debug, Error)]
pub enum DbError {
    /// Credential, network or handshake failure while connecting
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),

    #[error("unsupported database driver '{0}'")]
    UnsupportedDriver(String),

    /// Any DDL/DML failure (constraint violation, syntax, permission)
    #[error("statement failed: {0}")]
    Statement(#[source] BoxError),

    #[error("unexpected column value: {0}")]
    Decode(String),
}

impl DbError {
    pub fn connection(err: impl Into<BoxError>) -> Self {
        Self::Connection(err.into())
    }

    pub fn statement(err: impl Into<BoxError>) -> Self {
        Self::Statement(err.into())
    }

    /// True for failures that happened before a session existed
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::UnsupportedDriver(_))
    }
}

/// A bound parameter or a decoded column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_i64(&self) -> Result<i64, DbError> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(DbError::Decode(format!("expected integer, got {:?}", other))),
        }
    }

    pub fn as_str(&self) -> Result<&str, DbError> {
        match self {
            Self::Text(v) => Ok(v),
            other => Err(DbError::Decode(format!("expected text, got {:?}", other))),
        }
    }

    pub fn as_decimal(&self) -> Result<Decimal, DbError> {
        match self {
            Self::Decimal(v) => Ok(*v),
            Self::Int(v) => Ok(Decimal::from(*v)),
            other => Err(DbError::Decode(format!("expected decimal, got {:?}", other))),
        }
    }

    #[allow(dead_code)]
    pub fn as_timestamp(&self) -> Result<NaiveDateTime, DbError> {
        match self {
            Self::Timestamp(v) => Ok(*v),
            other => Err(DbError::Decode(format!("expected timestamp, got {:?}", other))),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// One result row, columns in select-list order
pub type Row = Vec<Value>;

/// An open, transactable database session
///
/// Statements run inside an implicit transaction that stays open until
/// `commit`. Nothing is committed on failure. Futures are not `Send`; a
/// session is driven by one task from connect to close.
#[async_trait(?Send)]
pub trait Session {
    /// Execute a single statement, returning the affected row count
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError>;

    /// Execute one statement for every parameter set, as a single batch
    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError>;

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn close(self) -> Result<(), DbError>
    where
        Self: Sized;
}

/// Rewrite `?` placeholders into numbered `$n` placeholders
///
/// A placeholder whose parameter is `Value::Null` becomes a literal `NULL`
/// and takes no number, so the server infers its type from the column.
/// Question marks inside single-quoted literals or double-quoted
/// identifiers are left alone.
pub fn numbered_placeholders(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut position = 0;
    let mut index = 0;
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                out.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                if matches!(params.get(position), Some(Value::Null)) {
                    out.push_str("NULL");
                } else {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                position += 1;
            }
            _ => out.push(c),
        }
    }

    out
}

/// Split `INSERT ... VALUES (?, ?, ...)` into the part before `VALUES`
///
/// Returns `None` unless the values list is a single tuple made only of
/// placeholders, which is the shape a multi-row insert can be built from.
pub fn bulk_insert_prefix(sql: &str) -> Option<&str> {
    let at = sql.to_ascii_uppercase().rfind("VALUES")?;
    let tuple = &sql[at + "VALUES".len()..];

    let placeholders_only = tuple.chars().all(|c| matches!(c, '(' | ')' | '?' | ',') || c.is_whitespace());
    let single_tuple = tuple.matches('(').count() == 1 && tuple.matches(')').count() == 1;

    if placeholders_only && single_tuple && tuple.contains('?') {
        Some(&sql[..at])
    } else {
        None
    }
}
