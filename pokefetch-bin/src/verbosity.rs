//! `-v` and `-q` flags which can be passed multiple times.
//!
//! By default, warnings and errors are reported.
//! - `-q` only reports errors
//! - `-qq` silences all log output
//! - `-v` shows info
//! - `-vv` shows debug
//! - `-vvv` shows trace

use std::fmt;

use log::{Level, LevelFilter};
use serde::Deserialize;

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// Pass many times for more log output
    ///
    /// By default, only warnings and errors are reported. Passing `-v` one
    /// time also prints info, `-vv` enables debug logging, and `-vvv` trace.
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet",
    )]
    verbose: u8,

    /// Less output per occurrence
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose",
    )]
    quiet: u8,
}

impl Verbosity {
    /// Get the log level filter.
    pub(crate) const fn log_level_filter(&self) -> LevelFilter {
        match self.verbosity() {
            i16::MIN..=-1 => LevelFilter::Off,
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    const fn verbosity(&self) -> i16 {
        level_value(Level::Warn) - self.quiet as i16 + self.verbose as i16
    }
}

// Deserialized from a level name like "warn", "warning", or "Info"
impl<'de> Deserialize<'de> for Verbosity {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let level = match s.to_lowercase().as_str() {
            "error" => Level::Error,
            "warn" | "warning" => Level::Warn,
            "info" => Level::Info,
            "debug" => Level::Debug,
            "trace" => Level::Trace,
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };
        let offset = level_value(level) - level_value(Level::Warn);
        Ok(Self {
            verbose: offset.max(0) as u8,
            quiet: (-offset).max(0) as u8,
        })
    }
}

const fn level_value(level: Level) -> i16 {
    match level {
        Level::Error => 0,
        Level::Warn => 1,
        Level::Info => 2,
        Level::Debug => 3,
        Level::Trace => 4,
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.log_level_filter())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use log::LevelFilter;
    use serde::Deserialize;

    use super::Verbosity;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        verbose: Verbosity,
    }

    #[derive(Deserialize)]
    struct File {
        verbose: Verbosity,
    }

    fn filter(args: &[&str]) -> LevelFilter {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).verbose.log_level_filter()
    }

    #[test]
    fn test_flags() {
        assert_eq!(filter(&[]), LevelFilter::Warn);
        assert_eq!(filter(&["-v"]), LevelFilter::Info);
        assert_eq!(filter(&["-vv"]), LevelFilter::Debug);
        assert_eq!(filter(&["-vvvvv"]), LevelFilter::Trace);
        assert_eq!(filter(&["-q"]), LevelFilter::Error);
        assert_eq!(filter(&["-qqq"]), LevelFilter::Off);
    }

    #[test]
    fn test_conflict() {
        assert!(Cli::try_parse_from(["test", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_deserialize() {
        let level = |s: &str| {
            toml::from_str::<File>(&format!("verbose = \"{s}\""))
                .unwrap()
                .verbose
                .log_level_filter()
        };
        assert_eq!(level("error"), LevelFilter::Error);
        assert_eq!(level("Warning"), LevelFilter::Warn);
        assert_eq!(level("debug"), LevelFilter::Debug);
        assert!(toml::from_str::<File>("verbose = \"loud\"").is_err());
    }
}
