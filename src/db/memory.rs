/// In-memory `Session` for tests
///
/// Understands exactly the statements the ETL stages issue and enforces the
/// same constraints as the real schema (NOT NULL name, non-negative price,
/// foreign key from sales to products). Work is staged until `commit`; a
/// failed statement discards everything since the last commit.
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::{DbError, Row, Session, Value};
use crate::etl::{
    dimension::{INSERT_PRODUCT, SELECT_PRODUCTS},
    facts::INSERT_SALE,
    schema::{CREATE_DIMENSION_TABLE, CREATE_FACT_TABLE, DROP_DIMENSION_TABLE, DROP_FACT_TABLE},
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub product_id: i64,
    pub name: String,
    pub category: Option<String>,
    pub base_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSale {
    pub sale_id: i64,
    pub product_id: i64,
    pub sale_date: Option<NaiveDateTime>,
    pub quantity: i64,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: Option<Vec<StoredProduct>>,
    sales: Option<Vec<StoredSale>>,
    next_product_id: i64,
    next_sale_id: i64,
}

#[derive(Debug, Default)]
pub struct MemorySession {
    working: Tables,
    committed: Tables,
    commits: usize,
    fail_on: Option<&'static str>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every execution of `sql` fail with a statement error
    pub fn fail_on(mut self, sql: &'static str) -> Self {
        self.fail_on = Some(sql);
        self
    }

    pub fn committed_products(&self) -> Option<Vec<StoredProduct>> {
        self.committed.products.clone()
    }

    pub fn committed_sales(&self) -> Option<Vec<StoredSale>> {
        self.committed.sales.clone()
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    fn apply(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let result = self.apply_statement(sql, params);
        if result.is_err() {
            self.rollback();
        }
        result
    }

    /// Drop uncommitted work, as an aborted transaction does
    fn rollback(&mut self) {
        self.working = self.committed.clone();
    }

    fn apply_statement(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        if self.fail_on.is_some_and(|failing| failing == sql) {
            return Err(DbError::statement("injected failure"));
        }

        let tables = &mut self.working;
        match sql {
            DROP_FACT_TABLE => {
                tables.sales = None;
                Ok(0)
            }
            DROP_DIMENSION_TABLE => {
                if tables.sales.is_some() {
                    return Err(DbError::statement("cannot drop dim_product: fact_sales depends on it"));
                }
                tables.products = None;
                Ok(0)
            }
            CREATE_DIMENSION_TABLE => {
                if tables.products.is_some() {
                    return Err(DbError::statement("relation \"dim_product\" already exists"));
                }
                tables.products = Some(Vec::new());
                tables.next_product_id = 1;
                Ok(0)
            }
            CREATE_FACT_TABLE => {
                if tables.products.is_none() {
                    return Err(DbError::statement("relation \"dim_product\" does not exist"));
                }
                if tables.sales.is_some() {
                    return Err(DbError::statement("relation \"fact_sales\" already exists"));
                }
                tables.sales = Some(Vec::new());
                tables.next_sale_id = 1;
                Ok(0)
            }
            INSERT_PRODUCT => {
                let [name, category, price] = params else {
                    return Err(DbError::statement("INSERT INTO dim_product expects 3 parameters"));
                };
                let name = match name {
                    Value::Null => return Err(DbError::statement("null value in column \"name\"")),
                    other => other.as_str().map_err(DbError::statement)?.to_string(),
                };
                let category = match category {
                    Value::Null => None,
                    other => Some(other.as_str().map_err(DbError::statement)?.to_string()),
                };
                let base_price = price.as_decimal().map_err(DbError::statement)?.round_dp(2);
                if base_price < Decimal::ZERO {
                    return Err(DbError::statement("check constraint on \"base_price\" violated"));
                }

                let products = tables.products.as_mut().ok_or_else(|| missing("dim_product"))?;
                products.push(StoredProduct { product_id: tables.next_product_id, name, category, base_price });
                tables.next_product_id += 1;
                Ok(1)
            }
            INSERT_SALE => {
                let [product_id, sale_date, quantity, total] = params else {
                    return Err(DbError::statement("INSERT INTO fact_sales expects 4 parameters"));
                };
                let product_id = product_id.as_i64().map_err(DbError::statement)?;
                let known = tables
                    .products
                    .as_ref()
                    .is_some_and(|products| products.iter().any(|p| p.product_id == product_id));
                if !known {
                    return Err(DbError::statement(format!(
                        "insert on fact_sales violates foreign key: product_id {} not in dim_product",
                        product_id
                    )));
                }

                let sale = StoredSale {
                    sale_id: tables.next_sale_id,
                    product_id,
                    sale_date: match sale_date {
                        Value::Null => None,
                        other => Some(other.as_timestamp().map_err(DbError::statement)?),
                    },
                    quantity: quantity.as_i64().map_err(DbError::statement)?,
                    total_value: total.as_decimal().map_err(DbError::statement)?.round_dp(2),
                };
                tables.sales.as_mut().ok_or_else(|| missing("fact_sales"))?.push(sale);
                tables.next_sale_id += 1;
                Ok(1)
            }
            other => Err(DbError::statement(format!("unrecognised statement: {}", other.trim()))),
        }
    }
}

fn missing(table: &str) -> DbError {
    DbError::statement(format!("relation \"{}\" does not exist", table))
}

#[async_trait(?Send)]
impl Session for MemorySession {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        self.apply(sql, params)
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        let mut affected = 0;
        for params in rows {
            affected += self.apply(sql, params)?;
        }
        Ok(affected)
    }

    async fn query(&mut self, sql: &str, _params: &[Value]) -> Result<Vec<Row>, DbError> {
        if sql != SELECT_PRODUCTS {
            self.rollback();
            return Err(DbError::statement(format!("unrecognised query: {}", sql)));
        }

        let products = self.working.products.as_ref().ok_or_else(|| missing("dim_product"))?;
        Ok(products
            .iter()
            .map(|p| {
                vec![Value::from(p.name.as_str()), Value::Int(p.product_id), Value::Decimal(p.base_price)]
            })
            .collect())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.committed = self.working.clone();
        self.commits += 1;
        Ok(())
    }

    async fn close(self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn with_schema() -> MemorySession {
        let mut session = MemorySession::new();
        for sql in [CREATE_DIMENSION_TABLE, CREATE_FACT_TABLE] {
            session.execute(sql, &[]).await.unwrap();
        }
        session.execute(INSERT_PRODUCT, &[Value::from("Mouse"), Value::Null, Value::Int(10)]).await.unwrap();
        session.commit().await.unwrap();
        session
    }

    fn sale(product_id: i64, sale_date: Value) -> Vec<Value> {
        vec![Value::Int(product_id), sale_date, Value::Int(1), Value::Int(10)]
    }

    #[tokio::test]
    async fn test_failed_statement_discards_uncommitted_work() {
        let mut session = with_schema().await;
        let date = Value::from(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(9, 0, 0).unwrap());

        session.execute(INSERT_SALE, &sale(1, date.clone())).await.unwrap();
        assert!(session.execute(INSERT_SALE, &sale(42, date.clone())).await.is_err());

        // The valid row before the failure went with it
        session.execute(INSERT_SALE, &sale(1, date)).await.unwrap();
        session.commit().await.unwrap();

        let sales = session.committed_sales().unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].sale_id, 1);
    }

    #[tokio::test]
    async fn test_null_sale_date_is_stored() {
        let mut session = with_schema().await;

        session.execute(INSERT_SALE, &sale(1, Value::Null)).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(session.committed_sales().unwrap()[0].sale_date, None);
    }
}
