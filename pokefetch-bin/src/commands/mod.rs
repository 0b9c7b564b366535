pub(crate) mod battle;
pub(crate) mod get;
pub(crate) mod info;
pub(crate) mod load;
pub(crate) mod own;

pub(crate) use battle::battle;
pub(crate) use get::get;
pub(crate) use info::{compare, info, type_stats};
pub(crate) use load::load;
pub(crate) use own::own;

use std::fmt::Display;
use std::io::{self, Write};

use anyhow::Result;
use log::error;
use pokefetch_lib::ErrorKind;
use serde::Serialize;

use crate::ExitCode;
use crate::options::Format;

/// Print a command result to stdout in the requested format
fn write_output<T: Display + Serialize>(value: &T, format: Format) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        Format::Compact => writeln!(out, "{value}")?,
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
    }
    Ok(())
}

/// Report a lookup which could not be answered by the server.
///
/// Remote failures end the command with [`ExitCode::FetchFailure`];
/// everything else is passed on to the caller.
fn fetch_failure(e: ErrorKind) -> Result<ExitCode> {
    if e.is_fetch_failure() {
        error!("{e}");
        Ok(ExitCode::FetchFailure)
    } else {
        Err(e.into())
    }
}
