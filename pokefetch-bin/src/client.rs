use std::time::Duration;

use anyhow::{Context, Result};
use pokefetch_lib::{Executor, ExecutorBuilder, PokeApi, RetryingClient};

use crate::options::Config;

/// Creates an executor according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<Executor> {
    ExecutorBuilder::builder()
        .timeout(Duration::from_secs(cfg.timeout))
        .user_agent(cfg.user_agent.clone())
        // Keep one idle connection per admitted request
        .max_idle_per_host(cfg.max_concurrency)
        .build()
        .executor()
        .context("Failed to create request client")
}

/// Creates the species API client used by the lookup commands
pub(crate) fn api(cfg: &Config) -> Result<PokeApi<Executor>> {
    let executor = create(cfg)?;
    let client = RetryingClient::new(executor, cfg.retry_policy());
    PokeApi::new(&cfg.api_url, client)
        .with_context(|| format!("Invalid API URL `{}`", cfg.api_url))
}
