use std::path::{Path, PathBuf};
use std::{fs, time::Duration};

use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand, builder::TypedValueParser};
use const_format::{concatcp, formatcp};
use pokefetch_lib::battle::DEFAULT_ROUNDS;
use pokefetch_lib::pokeapi::DEFAULT_API_URL;
use pokefetch_lib::store::DEFAULT_STORE_PATH;
use pokefetch_lib::{
    CacheConfig, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, RetryPolicy,
};
use serde::Deserialize;
use strum::{Display, EnumString, VariantNames};

use crate::verbosity::Verbosity;

pub(crate) const POKEFETCH_CONFIG_FILE: &str = "pokefetch.toml";

const DEFAULT_TOTAL_REQUESTS: usize = 1000;
const DEFAULT_CACHE_TTL: &str = "1h";
const DEFAULT_CACHE_SIZE: usize = 100;

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const MAX_CONCURRENCY_STR: &str = concatcp!(DEFAULT_MAX_CONCURRENCY);
const TOTAL_REQUESTS_STR: &str = concatcp!(DEFAULT_TOTAL_REQUESTS);
const CACHE_SIZE_STR: &str = concatcp!(DEFAULT_CACHE_SIZE);
const MAX_RETRIES_STR: &str = concatcp!(DEFAULT_MAX_RETRIES);
const BACKOFF_FACTOR_STR: &str = concatcp!(DEFAULT_BACKOFF_FACTOR);
const TIMEOUT_STR: &str = concatcp!(DEFAULT_TIMEOUT_SECS);
const ROUNDS_STR: &str = concatcp!(DEFAULT_ROUNDS);
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    POKEFETCH_CONFIG_FILE,
);

/// Output format of command results
#[derive(Debug, Deserialize, Default, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Format {
    /// Human readable, colored where the terminal supports it
    #[default]
    Compact,
    /// Machine readable
    Json,
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    max_concurrency: usize = DEFAULT_MAX_CONCURRENCY;
    total_requests: usize = DEFAULT_TOTAL_REQUESTS;
    cache_ttl: Duration = default_cache_ttl();
    cache_size: usize = DEFAULT_CACHE_SIZE;
    max_retries: u32 = DEFAULT_MAX_RETRIES;
    backoff_factor: u32 = DEFAULT_BACKOFF_FACTOR;
    timeout: u64 = DEFAULT_TIMEOUT_SECS;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    api_url: String = DEFAULT_API_URL.to_string();
    rounds: u32 = DEFAULT_ROUNDS;
    store: PathBuf = PathBuf::from(DEFAULT_STORE_PATH);
    verbosity: Verbosity = Verbosity::default();
}

fn default_cache_ttl() -> Duration {
    CacheConfig::default().ttl
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// pokefetch fetches species data from the PokéAPI: many requests at once
/// to measure throughput, or one at a time with retries to look up species,
/// compare them and let them battle.
///
/// It also manages a local file of self-made pokemon.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct PokefetchOptions {
    /// Configuration file to use
    #[arg(short, long = "config", global = true)]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Fetch a list of endpoints many times and report throughput
    ///
    /// The list is repeated as many whole times as fit into
    /// `--total-requests`. Without URLs, the species endpoints of pikachu,
    /// jigglypuff and charizard are used.
    Load {
        /// Endpoints to fetch
        urls: Vec<String>,
    },

    /// Fetch one URL with retries and print the JSON payload
    Get {
        /// URL to fetch
        url: String,
    },

    /// Show the base stats of a species
    Info {
        /// Species name
        name: String,
    },

    /// Compare HP and attack of two species
    Compare {
        /// First species
        first: String,
        /// Second species
        second: String,
    },

    /// Show the average HP of all members of a type
    Type {
        /// Type name, e.g. `fire`
        name: String,
    },

    /// Let two species battle
    Battle {
        /// Attacks first
        first: String,
        /// Attacks second
        second: String,
    },

    /// Manage self-made pokemon
    Own {
        #[command(subcommand)]
        action: OwnCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum OwnCommand {
    /// List all pokemon in the store
    List,

    /// Show one pokemon
    Show {
        /// Name of the pokemon
        name: String,
    },

    /// Add a new pokemon
    Add {
        /// Unique name
        name: String,
        /// Hit points
        #[arg(allow_negative_numbers = true)]
        hp: i64,
        /// Attack
        #[arg(allow_negative_numbers = true)]
        attack: i64,
        /// Defense
        #[arg(allow_negative_numbers = true)]
        defense: i64,
    },

    /// Rename a pokemon
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },

    /// Remove a pokemon
    Remove {
        /// Name of the pokemon
        name: String,
    },
}

/// The main configuration for pokefetch
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Number of threads to utilize.
    /// Defaults to number of cores available to the system
    #[arg(short = 'T', long, global = true)]
    #[serde(default)]
    pub(crate) threads: Option<usize>,

    /// Timeout in seconds for a single request, from connect to body read
    #[arg(short, long, global = true, default_value = &TIMEOUT_STR)]
    #[serde(default = "timeout")]
    pub(crate) timeout: u64,

    /// User agent
    #[arg(short, long, global = true, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Base URL of the species API
    #[arg(long, global = true, env = "POKEFETCH_API_URL", default_value = DEFAULT_API_URL)]
    #[serde(default = "api_url")]
    pub(crate) api_url: String,

    /// Maximum number of concurrent network requests
    #[arg(long, global = true, default_value = &MAX_CONCURRENCY_STR)]
    #[serde(default = "max_concurrency")]
    pub(crate) max_concurrency: usize,

    /// Number of requests for `load`.
    /// The URL list is only repeated as a whole, so the remainder is dropped
    #[arg(long, global = true, default_value = &TOTAL_REQUESTS_STR, verbatim_doc_comment)]
    #[serde(default = "total_requests")]
    pub(crate) total_requests: usize,

    /// Fetch every URL of `load` only once and serve repeats from memory
    #[arg(long, global = true)]
    #[serde(default)]
    pub(crate) cache: bool,

    /// Fetch the `load` workload one request at a time
    #[arg(long, global = true, conflicts_with = "cache")]
    #[serde(default)]
    pub(crate) sequential: bool,

    /// How long a cached response stays valid, e.g. "30s", "10m", "1h"
    #[arg(long, global = true, default_value = &DEFAULT_CACHE_TTL, value_parser = humantime::parse_duration)]
    #[serde(default = "cache_ttl", with = "humantime_serde")]
    pub(crate) cache_ttl: Duration,

    /// Maximum number of cached responses
    #[arg(long, global = true, default_value = &CACHE_SIZE_STR)]
    #[serde(default = "cache_size")]
    pub(crate) cache_size: usize,

    /// Maximum number of attempts per request for single lookups
    #[arg(long, global = true, default_value = &MAX_RETRIES_STR)]
    #[serde(default = "max_retries")]
    pub(crate) max_retries: u32,

    /// Base of the exponential backoff in seconds between attempts
    #[arg(long, global = true, default_value = &BACKOFF_FACTOR_STR)]
    #[serde(default = "backoff_factor")]
    pub(crate) backoff_factor: u32,

    /// Number of rounds of a battle
    #[arg(long, global = true, default_value = &ROUNDS_STR)]
    #[serde(default = "rounds")]
    pub(crate) rounds: u32,

    /// File holding self-made pokemon
    #[arg(long, global = true, default_value = DEFAULT_STORE_PATH)]
    #[serde(default = "store")]
    pub(crate) store: PathBuf,

    /// Output format of command results
    #[arg(short, long, global = true, default_value = "compact", value_parser = PossibleValuesParser::new(Format::VARIANTS).map(|s| s.parse::<Format>().unwrap()))]
    #[serde(default)]
    pub(crate) format: Format,
}

impl Config {
    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys with defaults to assign
                verbose: Verbosity::default(),
                threads: None,
                timeout: DEFAULT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT,
                api_url: DEFAULT_API_URL,
                max_concurrency: DEFAULT_MAX_CONCURRENCY,
                total_requests: DEFAULT_TOTAL_REQUESTS,
                cache: false,
                sequential: false,
                cache_ttl: default_cache_ttl(),
                cache_size: DEFAULT_CACHE_SIZE,
                max_retries: DEFAULT_MAX_RETRIES,
                backoff_factor: DEFAULT_BACKOFF_FACTOR,
                rounds: DEFAULT_ROUNDS,
                store: PathBuf::from(DEFAULT_STORE_PATH),
                format: Format::default(),
            }
        }
    }

    /// Retry settings for single lookups
    pub(crate) const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
        }
    }

    /// Cache settings for `load --cache`
    pub(crate) const fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
            max_entries: self.cache_size,
        }
    }
}
