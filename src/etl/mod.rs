/// ETL Stages Module
///
/// The three loading stages of a run, in order:
/// - Schema: drop and recreate the star schema
/// - Dimension: load the product catalog and resolve product identifiers
/// - Facts: generate randomized sales and bulk-load them
///
/// Each stage commits its own work before the next one starts.
pub mod dimension;
pub mod facts;
pub mod schema;
