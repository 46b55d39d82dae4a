/// Data Models Module
///
/// This module defines the core data structures used throughout the application.
/// These models represent the star schema rows (products and sales) and the
/// fixed product catalog seeded on every run.
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// A product descriptor, as inserted into the dimension table
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub category: Option<String>,
    pub base_price: Decimal,
}

impl Product {
    pub fn new(name: &str, category: &str, base_price: Decimal) -> Self {
        Self { name: name.to_string(), category: Some(category.to_string()), base_price }
    }
}

/// Identifier and price of a loaded product, as seen by the fact generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductRef {
    pub product_id: i64,
    pub base_price: Decimal,
}

/// One generated sales transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Sale {
    pub product_id: i64,
    pub sale_date: NaiveDateTime,
    pub quantity: i32,
    pub total_value: Decimal,
}

/// (name, category, price in cents)
const CATALOG: [(&str, &str, i64); 5] = [
    ("Notebook Dell", "Eletrônicos", 450_000),
    ("Mouse Logitech", "Periféricos", 15_000),
    ("Monitor LG 24", "Monitores", 80_000),
    ("Teclado Mecânico", "Periféricos", 35_000),
    ("Cadeira Gamer", "Móveis", 120_000),
];

/// The product catalog loaded on every run, in insertion order
pub fn catalog() -> Vec<Product> {
    CATALOG.iter().map(|(name, category, cents)| Product::new(name, category, Decimal::new(*cents, 2))).collect()
}
