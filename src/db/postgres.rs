/// PostgreSQL Session
///
/// A one-connection pool wrapped in the `Session` interface. A transaction
/// is begun lazily by the first statement and finished by `commit`.
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{
    postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow},
    query::Query,
    Column, Connection, PgConnection, PgPool, Postgres, QueryBuilder, Row as _, Transaction, TypeInfo,
};

use super::{bulk_insert_prefix, numbered_placeholders, DbError, Row, Session, Value};
use crate::config::{DbConfig, DRIVER};

/// Postgres accepts at most this many bind parameters per statement
const MAX_BIND_PARAMS: usize = 65_535;

pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    /// Open a session with a single connection attempt
    ///
    /// Failures are logged here, then returned to the caller.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        if config.driver != DRIVER {
            let err = DbError::UnsupportedDriver(config.driver.clone());
            tracing::error!("Failed to connect to the database: {}", err);
            return Err(err);
        }

        let (host, port) = config.host_and_port();
        let options = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(&config.database)
            .username(&config.username)
            .password(&config.password);

        let report = |e: sqlx::Error| {
            tracing::error!("Failed to connect to {} (database '{}'): {}", config.server, config.database, e);
            DbError::connection(e)
        };

        // The pool keeps retrying refused connections until its acquire
        // timeout, so the single attempt is made on a plain connection first.
        let conn = PgConnection::connect_with(&options).await.map_err(&report)?;
        conn.close().await.map_err(&report)?;

        let pool = PgPoolOptions::new().max_connections(1).connect_with(options).await.map_err(&report)?;

        Ok(Self { pool, tx: None })
    }

    async fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, DbError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await.map_err(DbError::statement)?,
        };

        Ok(self.tx.insert(tx))
    }
}

#[async_trait(?Send)]
impl Session for PgSession {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let tx = self.transaction().await?;

        // DDL goes through the simple protocol, nothing to bind
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(&mut **tx).await
        } else {
            let sql = numbered_placeholders(sql, params);
            bind_all(sqlx::query(&sql), params).execute(&mut **tx).await
        };

        Ok(result.map_err(DbError::statement)?.rows_affected())
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let Some(prefix) = bulk_insert_prefix(sql) else {
            let mut affected = 0;
            for params in rows {
                affected += self.execute(sql, params).await?;
            }
            return Ok(affected);
        };

        let width = sql[prefix.len()..].matches('?').count();
        if let Some(params) = rows.iter().find(|params| params.len() != width) {
            return Err(DbError::statement(format!(
                "expected {} parameters per row, got {}",
                width,
                params.len()
            )));
        }

        let tx = self.transaction().await?;
        let mut affected = 0;

        for chunk in rows.chunks(MAX_BIND_PARAMS / width) {
            let mut builder = QueryBuilder::<Postgres>::new(prefix);
            builder.push_values(chunk, |mut tuple, params| {
                for value in params {
                    match value {
                        Value::Null => tuple.push("NULL"),
                        Value::Int(v) => tuple.push_bind(*v),
                        Value::Text(v) => tuple.push_bind(v.as_str()),
                        Value::Decimal(v) => tuple.push_bind(*v),
                        Value::Timestamp(v) => tuple.push_bind(*v),
                    };
                }
            });

            let result = builder.build().execute(&mut **tx).await.map_err(DbError::statement)?;
            affected += result.rows_affected();
        }

        tracing::debug!("Bulk insert wrote {} rows", affected);
        Ok(affected)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let tx = self.transaction().await?;

        let sql = numbered_placeholders(sql, params);
        let rows = bind_all(sqlx::query(&sql), params).fetch_all(&mut **tx).await.map_err(DbError::statement)?;

        rows.iter().map(decode_row).collect()
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(DbError::statement)?;
        }

        Ok(())
    }

    async fn close(mut self) -> Result<(), DbError> {
        // Uncommitted work is discarded, never flushed
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(DbError::statement)?;
        }

        self.pool.close().await;
        Ok(())
    }
}

/// Bind every non-NULL parameter; NULLs are inlined by `numbered_placeholders`
fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value {
            Value::Null => query,
            Value::Int(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Decimal(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        };
    }

    query
}

fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    row.columns()
        .iter()
        .map(|column| {
            let i = column.ordinal();
            let decoded = match column.type_info().name() {
                "INT2" => row.try_get::<Option<i16>, _>(i).map(|v| Value::from(v.map(i64::from))),
                "INT4" => row.try_get::<Option<i32>, _>(i).map(|v| Value::from(v.map(i64::from))),
                "INT8" => row.try_get::<Option<i64>, _>(i).map(Value::from),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(i).map(Value::from),
                "NUMERIC" => row.try_get::<Option<Decimal>, _>(i).map(Value::from),
                "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(i).map(Value::from),
                other => {
                    return Err(DbError::Decode(format!(
                        "unsupported column type {} for '{}'",
                        other,
                        column.name()
                    )))
                }
            };

            decoded.map_err(|e| DbError::Decode(e.to_string()))
        })
        .collect()
}
