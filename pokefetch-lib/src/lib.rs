//! `pokefetch` is a library for fetching JSON resources concurrently and
//! reliably.
//!
//! Load a set of endpoints, 20 requests at a time, with every endpoint
//! fetched from the network only once:
//!
//! ```no_run
//! use std::sync::Arc;
//! use pokefetch_lib::{BatchFetcher, CacheConfig, ExecutorBuilder, FetchTarget, ResultCache, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let executor = ExecutorBuilder::default().executor()?;
//!   let cache = Arc::new(ResultCache::new(CacheConfig::default())?);
//!   let batch = BatchFetcher::new(executor).with_cache(cache);
//!
//!   let urls = [FetchTarget::from("https://pokeapi.co/api/v2/pokemon/pikachu")];
//!   let report = batch.run(&urls, 100, 20, true).await?;
//!   println!("{} successful in {:?}", report.stats.successful, report.elapsed);
//!   Ok(())
//! }
//! ```
//!
//! For single requests that should survive rate limiting and flaky servers,
//! wrap the executor in a [`RetryingClient`]:
//!
//! ```no_run
//! use pokefetch_lib::{ExecutorBuilder, FetchTarget, Result, RetryPolicy, RetryingClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let executor = ExecutorBuilder::default().executor()?;
//!   let client = RetryingClient::new(executor, RetryPolicy::default());
//!   let payload = client
//!       .try_call(&FetchTarget::from("https://pokeapi.co/api/v2/pokemon/ditto"))
//!       .await?;
//!   println!("{}", payload["name"]);
//!   Ok(())
//! }
//! ```

mod batch;
mod cache;
mod executor;
mod headers;
mod limiter;
mod retry;
mod types;

pub mod battle;
pub mod pokeapi;
pub mod store;

pub use batch::{BatchFetcher, BatchReport, BatchStats, expand_targets};
pub use cache::{CacheConfig, CacheStats, Clock, ManualClock, ResultCache, SystemClock};
pub use executor::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, Executor, ExecutorBuilder,
    Fetch,
};
pub use limiter::{ConcurrencyLimiter, run_batch};
pub use pokeapi::{PokeApi, SpeciesStats};
pub use retry::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES, RetryPolicy, RetryState, RetryingClient,
};
pub use types::*;
