#![allow(unreachable_pub)]

mod error;
mod outcome;
mod target;

pub use error::ErrorKind;
pub use outcome::{FetchOutcome, TransportErrorKind};
pub use target::FetchTarget;

/// The pokefetch `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
