use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The key of a single fetch request.
///
/// A target is compared by its exact string. No URL normalization takes place,
/// so `https://pokeapi.co/api/v2/pokemon/pikachu` and
/// `https://pokeapi.co/api/v2/pokemon/pikachu/` are two different targets and
/// get cached separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchTarget(String);

impl FetchTarget {
    /// Create a new target from anything string-like
    #[must_use]
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self(target.into())
    }

    /// Returns the target as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FetchTarget {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FetchTarget {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<&String> for FetchTarget {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl AsRef<str> for FetchTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
