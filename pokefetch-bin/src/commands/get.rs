use std::io::{self, Write};

use anyhow::Result;
use pokefetch_lib::FetchTarget;

use super::fetch_failure;
use crate::ExitCode;
use crate::client;
use crate::options::Config;

/// Fetch a single URL with retries and print its payload
pub(crate) async fn get(url: &str, cfg: &Config) -> Result<ExitCode> {
    let api = client::api(cfg)?;
    let payload = match api.client().try_call(&FetchTarget::new(url)).await {
        Ok(payload) => payload,
        Err(e) => return fetch_failure(e),
    };

    // The payload is JSON already, so the format flag makes no difference
    writeln!(io::stdout().lock(), "{}", serde_json::to_string_pretty(&payload)?)?;
    Ok(ExitCode::Success)
}
