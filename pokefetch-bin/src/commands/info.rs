use anyhow::Result;

use super::{fetch_failure, write_output};
use crate::ExitCode;
use crate::client;
use crate::options::Config;

pub(crate) async fn info(name: &str, cfg: &Config) -> Result<ExitCode> {
    let api = client::api(cfg)?;
    match api.species(name).await {
        Ok(stats) => write_output(&stats, cfg.format).map(|()| ExitCode::Success),
        Err(e) => fetch_failure(e),
    }
}

pub(crate) async fn compare(first: &str, second: &str, cfg: &Config) -> Result<ExitCode> {
    let api = client::api(cfg)?;
    match api.compare(first, second).await {
        Ok(comparison) => write_output(&comparison, cfg.format).map(|()| ExitCode::Success),
        Err(e) => fetch_failure(e),
    }
}

/// Average HP over a type. Members which cannot be fetched are skipped,
/// only the type itself has to be reachable.
pub(crate) async fn type_stats(name: &str, cfg: &Config) -> Result<ExitCode> {
    let api = client::api(cfg)?;
    match api.type_stats(name, cfg.max_concurrency).await {
        Ok(stats) => write_output(&stats, cfg.format).map(|()| ExitCode::Success),
        Err(e) => fetch_failure(e),
    }
}
