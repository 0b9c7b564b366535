//! `pokefetch` fetches species data from the PokéAPI.
//!
//! The binary is a wrapper around pokefetch-lib, which provides the
//! concurrent fetch layer and the species helpers built on top of it.
//!
//! Measure throughput with 300 concurrent requests:
//! ```sh
//! pokefetch load --total-requests 300
//! ```
//!
//! Serve repeated requests from memory:
//! ```sh
//! pokefetch load --cache --cache-ttl 10m
//! ```
//!
//! Look up and compare species:
//! ```sh
//! pokefetch info pikachu
//! pokefetch compare pikachu bulbasaur
//! pokefetch type fire
//! ```
//!
//! Let two species battle:
//! ```sh
//! pokefetch battle pikachu bulbasaur --rounds 3
//! ```
//!
//! Manage self-made pokemon:
//! ```sh
//! pokefetch own add sparky 40 60 30
//! pokefetch own list
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, ErrorKind};
use std::path::PathBuf;

use anyhow::{Error, Result, bail};
use clap::Parser;
use formatters::log::init_logging;
use log::error;
#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature

mod client;
mod commands;
mod formatters;
mod options;
mod verbosity;

use crate::options::{Command, Config, POKEFETCH_CONFIG_FILE, PokefetchOptions};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator, including errors of the pokemon store.
    #[allow(unused)]
    UnexpectedFailure = 1,
    FetchFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<PokefetchOptions> {
    let mut opts = PokefetchOptions::parse();

    init_logging(&opts.config.verbose);

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // Without an explicit config file, fall back to the default one in
        // the current directory, but only if it exists. An invalid default
        // file is still an error.
        let default_config = PathBuf::from(POKEFETCH_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    Ok(opts)
}

/// Set up runtime and call pokefetch entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!("Error while loading config: {e}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = match opts.config.threads {
        Some(threads) => {
            // We define our own runtime instead of the `tokio::main` attribute
            // since we want to make the number of threads configurable
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .enable_all()
                .build()?
        }
        None => tokio::runtime::Runtime::new()?,
    };

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Run the requested command
async fn run(opts: &PokefetchOptions) -> Result<i32> {
    let cfg = &opts.config;
    let exit_code = match &opts.command {
        Command::Load { urls } => commands::load(urls, cfg).await?,
        Command::Get { url } => commands::get(url, cfg).await?,
        Command::Info { name } => commands::info(name, cfg).await?,
        Command::Compare { first, second } => commands::compare(first, second, cfg).await?,
        Command::Type { name } => commands::type_stats(name, cfg).await?,
        Command::Battle { first, second } => commands::battle(first, second, cfg).await?,
        Command::Own { action } => commands::own(action, cfg)?,
    };
    Ok(exit_code as i32)
}
