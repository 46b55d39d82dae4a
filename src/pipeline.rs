/// Pipeline Module
///
/// Orchestrates a complete run: Connect → Schema → Dimension → Facts → Close
/// with typed stage errors, state tracking, and run statistics.
use chrono::Local;
use rand::{rngs::StdRng, SeedableRng};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::{
    config::DbConfig,
    db::{DbError, PgSession, Session},
    etl::{dimension, facts, schema},
    models::{self, Product},
};

/// Number of sales generated per run
pub const SALES_TO_GENERATE: usize = 100;

/// Where a run currently stands
///
/// `Failed` is absorbing: once entered, no further transition happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Disconnected,
    Connected,
    SchemaReset,
    DimensionLoaded,
    FactsLoaded,
    Closed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Connect,
    Schema,
    Dimension,
    Facts,
    Close,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Connect => write!(f, "Connect"),
            PipelineStage::Schema => write!(f, "Schema"),
            PipelineStage::Dimension => write!(f, "Dimension"),
            PipelineStage::Facts => write!(f, "Facts"),
            PipelineStage::Close => write!(f, "Close"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: DbError,
    },

    #[error("product lookup is empty, cannot generate {0} sales")]
    EmptyCatalog(usize),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Stage { stage, .. } => *stage,
            Self::EmptyCatalog(_) => PipelineStage::Facts,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Stage { source, .. } if source.is_connection())
    }
}

fn at(stage: PipelineStage) -> impl FnOnce(DbError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}

/// Pipeline execution statistics
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub products_loaded: usize,
    pub sales_inserted: u64,
    pub elapsed_time: Duration,
}

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sales_to_generate: usize,
    /// Fixed seed for a reproducible run; entropy when unset
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { sales_to_generate: SALES_TO_GENERATE, seed: None }
    }
}

/// Main ETL Pipeline
pub struct Pipeline {
    catalog: Vec<Product>,
    config: PipelineConfig,
    rng: StdRng,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let rng = config.seed.map(StdRng::seed_from_u64).unwrap_or_else(StdRng::from_entropy);

        Self { catalog: models::catalog(), config, rng, state: PipelineState::Disconnected }
    }

    /// Replace the product catalog loaded into the dimension table
    #[cfg(test)]
    pub fn with_catalog(mut self, catalog: Vec<Product>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Connect to the configured database and run every stage
    pub async fn execute(&mut self, db: &DbConfig) -> Result<PipelineStats, PipelineError> {
        let started = Instant::now();

        let connected = PgSession::connect(db).await.map_err(at(PipelineStage::Connect));
        let mut session = self.track(connected)?;

        let mut stats = self.run(&mut session).await?;

        let closed = session.close().await.map_err(at(PipelineStage::Close));
        self.track(closed)?;
        self.advance(PipelineState::Closed);

        stats.elapsed_time = started.elapsed();
        Ok(stats)
    }

    /// Run the loading stages on an already open session
    ///
    /// Stages committed before a failure stay committed.
    pub async fn run<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<PipelineStats, PipelineError> {
        self.advance(PipelineState::Connected);
        tracing::info!("Connection to the database established successfully.");

        let started = Instant::now();
        let result = self.run_stages(session).await;
        let mut stats = self.track(result)?;

        stats.elapsed_time = started.elapsed();
        Ok(stats)
    }

    async fn run_stages<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<PipelineStats, PipelineError> {
        let mut stats = PipelineStats::default();

        schema::reset_schema(session).await.map_err(at(PipelineStage::Schema))?;
        self.advance(PipelineState::SchemaReset);

        stats.products_loaded =
            dimension::load_products(session, &self.catalog).await.map_err(at(PipelineStage::Dimension))?;
        let lookup = dimension::fetch_product_lookup(session).await.map_err(at(PipelineStage::Dimension))?;
        self.advance(PipelineState::DimensionLoaded);

        let count = self.config.sales_to_generate;
        if lookup.is_empty() && count > 0 {
            return Err(PipelineError::EmptyCatalog(count));
        }

        let sales = facts::generate_sales(&lookup, count, Local::now().naive_local(), &mut self.rng);
        stats.sales_inserted = facts::load_sales(session, &sales).await.map_err(at(PipelineStage::Facts))?;
        self.advance(PipelineState::FactsLoaded);

        Ok(stats)
    }

    fn advance(&mut self, next: PipelineState) {
        if self.state == PipelineState::Failed {
            return;
        }

        tracing::debug!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn track<T>(&mut self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if let Err(e) = &result {
            self.state = PipelineState::Failed;
            tracing::error!("Fatal error in the process: {}", e);
        }

        result
    }
}

impl PipelineStats {
    /// Print final statistics
    pub fn print_summary(&self) {
        println!("\n📊 Pipeline Statistics:");
        println!("   ⏱️  Total time: {:.2}s", self.elapsed_time.as_secs_f64());
        println!("   📦 Products loaded: {}", self.products_loaded);
        println!("   💾 Sales inserted: {}", self.sales_inserted);
    }
}
