/// Dimension Module
///
/// Loads the product catalog into `dim_product` and reads the generated
/// identifiers back into a name-keyed lookup.
use std::collections::BTreeMap;

use crate::{
    db::{DbError, Row, Session, Value},
    models::{Product, ProductRef},
};

pub const INSERT_PRODUCT: &str = "INSERT INTO dim_product (name, category, base_price) VALUES (?, ?, ?)";

pub const SELECT_PRODUCTS: &str = "SELECT name, product_id, base_price FROM dim_product ORDER BY product_id";

/// Product name -> (identifier, base price)
#[derive(Debug, Clone, Default)]
pub struct ProductLookup {
    products: BTreeMap<String, ProductRef>,
}

impl ProductLookup {
    /// Build the lookup from `(name, product_id, base_price)` rows
    ///
    /// Rows are applied in order, so a repeated name keeps the last row.
    pub fn from_rows(rows: &[Row]) -> Result<Self, DbError> {
        let mut products = BTreeMap::new();

        for row in rows {
            let [name, id, price] = row.as_slice() else {
                return Err(DbError::Decode(format!("expected 3 columns, got {}", row.len())));
            };
            let product = ProductRef { product_id: id.as_i64()?, base_price: price.as_decimal()? };
            products.insert(name.as_str()?.to_string(), product);
        }

        Ok(Self { products })
    }

    pub fn get(&self, name: &str) -> Option<&ProductRef> {
        self.products.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.products.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Insert every catalog entry, then commit once
pub async fn load_products<S: Session + ?Sized>(session: &mut S, catalog: &[Product]) -> Result<usize, DbError> {
    for product in catalog {
        let params = [
            Value::from(product.name.as_str()),
            Value::from(product.category.as_deref()),
            Value::from(product.base_price),
        ];
        session.execute(INSERT_PRODUCT, &params).await?;
    }
    session.commit().await?;

    tracing::info!("Product catalog loaded: {} items.", catalog.len());
    Ok(catalog.len())
}

/// Read the loaded products back with their generated identifiers
pub async fn fetch_product_lookup<S: Session + ?Sized>(session: &mut S) -> Result<ProductLookup, DbError> {
    let rows = session.query(SELECT_PRODUCTS, &[]).await?;
    let lookup = ProductLookup::from_rows(&rows)?;

    tracing::debug!("Resolved {} product identifiers", lookup.len());
    Ok(lookup)
}
