/// Facts Module
///
/// Generates randomized sales against the product lookup and bulk-loads
/// them into `fact_sales`.
use chrono::{Duration, NaiveDateTime};
use rand::{seq::SliceRandom, Rng};
use rust_decimal::Decimal;

use super::dimension::ProductLookup;
use crate::{
    db::{DbError, Session, Value},
    models::Sale,
};

pub const INSERT_SALE: &str =
    "INSERT INTO fact_sales (product_id, sale_date, quantity, total_value) VALUES (?, ?, ?, ?)";

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 5;

/// Sales are dated up to this many whole days before generation time
pub const MAX_SALE_AGE_DAYS: i64 = 60;

/// Generate `count` sales, each referencing a product from `lookup`
///
/// Product, quantity and age in days are drawn uniformly. The time of day
/// of every sale is the time of day of `now`. Returns fewer than `count`
/// sales only when the lookup is empty.
pub fn generate_sales<R: Rng>(
    lookup: &ProductLookup,
    count: usize,
    now: NaiveDateTime,
    rng: &mut R,
) -> Vec<Sale> {
    let names = lookup.names();
    let mut sales = Vec::with_capacity(count);

    for _ in 0..count {
        let Some(product) = names.choose(rng).and_then(|name| lookup.get(name)) else {
            break;
        };

        let quantity = rng.gen_range(MIN_QUANTITY..=MAX_QUANTITY);
        let total_value = (Decimal::from(quantity) * product.base_price).round_dp(2);
        let sale_date = now - Duration::days(rng.gen_range(0..=MAX_SALE_AGE_DAYS));

        sales.push(Sale { product_id: product.product_id, sale_date, quantity, total_value });
    }

    sales
}

/// Insert all sales as one batch, then commit once
pub async fn load_sales<S: Session + ?Sized>(session: &mut S, sales: &[Sale]) -> Result<u64, DbError> {
    let rows: Vec<Vec<Value>> = sales
        .iter()
        .map(|sale| {
            vec![
                Value::from(sale.product_id),
                Value::from(sale.sale_date),
                Value::from(sale.quantity),
                Value::from(sale.total_value),
            ]
        })
        .collect();

    let inserted = session.execute_many(INSERT_SALE, &rows).await?;
    session.commit().await?;

    tracing::info!("Sales load finished. {} records inserted.", inserted);
    Ok(inserted)
}
