/// Schema Module
///
/// Drops and recreates the star schema. Destructive: every run starts
/// from empty tables.
use crate::db::{DbError, Session};

pub const DROP_FACT_TABLE: &str = "DROP TABLE IF EXISTS fact_sales";

pub const DROP_DIMENSION_TABLE: &str = "DROP TABLE IF EXISTS dim_product";

pub const CREATE_DIMENSION_TABLE: &str = r#"
    CREATE TABLE dim_product (
        product_id INTEGER GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        category VARCHAR(50),
        base_price NUMERIC(10, 2) CHECK (base_price >= 0)
    )
"#;

pub const CREATE_FACT_TABLE: &str = r#"
    CREATE TABLE fact_sales (
        sale_id INTEGER GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        product_id INTEGER REFERENCES dim_product (product_id),
        sale_date TIMESTAMP,
        quantity INTEGER,
        total_value NUMERIC(10, 2)
    )
"#;

/// Drop both tables (fact first, it holds the foreign key) and recreate them
///
/// Committed as one unit.
pub async fn reset_schema<S: Session + ?Sized>(session: &mut S) -> Result<(), DbError> {
    for statement in [DROP_FACT_TABLE, DROP_DIMENSION_TABLE, CREATE_DIMENSION_TABLE, CREATE_FACT_TABLE] {
        session.execute(statement, &[]).await?;
    }
    session.commit().await?;

    tracing::info!("Tables (fact and dimension) recreated successfully.");
    Ok(())
}
