use std::io;
use std::sync::Arc;

use anyhow::Result;
use pokefetch_lib::{BatchFetcher, FetchTarget, ResultCache};

use crate::ExitCode;
use crate::client;
use crate::formatters::stats::write_report;
use crate::options::Config;

/// Species fetched when `load` gets no URLs
const DEFAULT_SPECIES: [&str; 3] = ["pikachu", "jigglypuff", "charizard"];

/// Fetch the workload and print throughput statistics.
///
/// Exits with [`ExitCode::FetchFailure`] if any single request failed.
pub(crate) async fn load(urls: &[String], cfg: &Config) -> Result<ExitCode> {
    let api = client::api(cfg)?;
    let targets: Vec<FetchTarget> = if urls.is_empty() {
        DEFAULT_SPECIES
            .iter()
            .map(|name| api.species_url(name))
            .collect()
    } else {
        urls.iter().map(FetchTarget::new).collect()
    };

    let mut fetcher = BatchFetcher::new(api.client().fetcher().clone());
    if cfg.cache {
        fetcher = fetcher.with_cache(Arc::new(ResultCache::new(cfg.cache_config())?));
    }

    let report = if cfg.sequential {
        fetcher.run_sequential(&targets, cfg.total_requests).await
    } else {
        fetcher
            .run(&targets, cfg.total_requests, cfg.max_concurrency, cfg.cache)
            .await?
    };

    write_report(&report, cfg.format, &mut io::stdout().lock())?;

    if report.stats.is_success() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::FetchFailure)
    }
}
