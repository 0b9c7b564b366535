//! Typed access to the species API.
//!
//! Only the handful of fields the rest of the crate needs are read: the
//! species name, the `hp`, `attack`, `defense` and `speed` base stats, and
//! the member list of a type. Stats are looked up by name, never by position.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{ConcurrencyLimiter, ErrorKind, Fetch, FetchTarget, Result, RetryingClient};

/// Default base URL of the species API
pub const DEFAULT_API_URL: &str = "https://pokeapi.co/api/v2";

#[derive(Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Deserialize)]
struct StatEntry {
    base_stat: i64,
    stat: NamedResource,
}

#[derive(Deserialize)]
struct SpeciesPayload {
    name: String,
    stats: Vec<StatEntry>,
}

#[derive(Deserialize)]
struct TypeMember {
    pokemon: NamedResource,
}

#[derive(Deserialize)]
struct TypePayload {
    pokemon: Vec<TypeMember>,
}

/// Uppercase the first character, the way names are shown to users
#[must_use]
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Base stats of one species
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesStats {
    /// Species name as reported by the API
    pub name: String,
    /// Hit points
    pub hp: i64,
    /// Attack
    pub attack: i64,
    /// Defense
    pub defense: i64,
    /// Speed
    pub speed: i64,
}

impl SpeciesStats {
    /// Read the stats from a species payload
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::MalformedPayload`] if `name` or `stats` are missing
    /// - [`ErrorKind::MissingStat`] if one of the four stats is not listed
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let SpeciesPayload { name, stats } = SpeciesPayload::deserialize(payload)
            .map_err(|e| ErrorKind::MalformedPayload(e.to_string()))?;

        let stat = |stat: &'static str| {
            stats
                .iter()
                .find(|entry| entry.stat.name == stat)
                .map(|entry| entry.base_stat)
                .ok_or_else(|| ErrorKind::MissingStat {
                    name: name.clone(),
                    stat,
                })
        };

        Ok(Self {
            hp: stat("hp")?,
            attack: stat("attack")?,
            defense: stat("defense")?,
            speed: stat("speed")?,
            name: name.clone(),
        })
    }
}

impl Display for SpeciesStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Stats of {}:", capitalize(&self.name))?;
        writeln!(f, "- HP: {}", self.hp)?;
        writeln!(f, "- Attack: {}", self.attack)?;
        writeln!(f, "- Defense: {}", self.defense)?;
        write!(f, "- Speed: {}", self.speed)
    }
}

/// Side-by-side view of two species
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    /// The first species
    pub first: SpeciesStats,
    /// The second species
    pub second: SpeciesStats,
}

impl Comparison {
    /// The species with more hit points. Ties go to the second one.
    #[must_use]
    pub fn more_hp(&self) -> &SpeciesStats {
        if self.first.hp > self.second.hp {
            &self.first
        } else {
            &self.second
        }
    }

    /// The species with the better attack. Ties go to the second one.
    #[must_use]
    pub fn better_attack(&self) -> &SpeciesStats {
        if self.first.attack > self.second.attack {
            &self.first
        } else {
            &self.second
        }
    }

    fn other(&self, stats: &SpeciesStats) -> &SpeciesStats {
        if std::ptr::eq(stats, &self.first) {
            &self.second
        } else {
            &self.first
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Comparing {} and {}:",
            capitalize(&self.first.name),
            capitalize(&self.second.name)
        )?;

        let winner = self.more_hp();
        writeln!(
            f,
            "{} has more HP ({} vs {}).",
            capitalize(&winner.name),
            winner.hp,
            self.other(winner).hp
        )?;

        let winner = self.better_attack();
        write!(
            f,
            "{} has a better attack ({} vs {}).",
            capitalize(&winner.name),
            winner.attack,
            self.other(winner).attack
        )
    }
}

/// Aggregate over the members of a type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeStats {
    /// Type name as requested
    pub name: String,
    /// Members listed by the type endpoint
    pub listed: usize,
    /// Members whose stats could be fetched
    pub counted: usize,
    /// Average HP over the counted members, `None` if none could be fetched
    pub average_hp: Option<f64>,
}

impl Display for TypeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.average_hp {
            Some(average) => {
                writeln!(f, "Stats of type {}:", capitalize(&self.name))?;
                writeln!(f, "- Number of pokemon: {}", self.counted)?;
                write!(f, "- Average HP: {average:.2}")
            }
            None => write!(f, "No pokemon found for type {}", self.name),
        }
    }
}

/// Client for the species and type endpoints
#[derive(Debug, Clone)]
pub struct PokeApi<F> {
    base: Url,
    client: RetryingClient<F>,
}

impl<F: Fetch> PokeApi<F> {
    /// Create an API client rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidUrl`] if `base_url` is not an absolute URL
    /// which can have path segments.
    pub fn new(base_url: &str, client: RetryingClient<F>) -> Result<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        Ok(Self { base, client })
    }

    /// The retrying client used for every request
    pub const fn client(&self) -> &RetryingClient<F> {
        &self.client
    }

    /// Endpoint of a species, e.g. `{base}/pokemon/pikachu`
    #[must_use]
    pub fn species_url(&self, name: &str) -> FetchTarget {
        self.endpoint("pokemon", name)
    }

    /// Endpoint of a type, e.g. `{base}/type/fire`
    #[must_use]
    pub fn type_url(&self, name: &str) -> FetchTarget {
        self.endpoint("type", name)
    }

    fn endpoint(&self, resource: &str, name: &str) -> FetchTarget {
        let mut url = self.base.clone();
        // Checked in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(resource)
                .push(&name.to_lowercase());
        }
        FetchTarget::new(url)
    }

    /// Fetch the stats of one species
    ///
    /// # Errors
    ///
    /// Fails if the species cannot be fetched (see
    /// [`RetryingClient::try_call`]) or its payload lacks the needed stats.
    pub async fn species(&self, name: &str) -> Result<SpeciesStats> {
        let payload = self.client.try_call(&self.species_url(name)).await?;
        SpeciesStats::from_payload(&payload)
    }

    /// Fetch two species and compare them
    ///
    /// # Errors
    ///
    /// Fails if either species cannot be fetched.
    pub async fn compare(&self, first: &str, second: &str) -> Result<Comparison> {
        let (first, second) = tokio::try_join!(self.species(first), self.species(second))?;
        Ok(Comparison { first, second })
    }

    /// Average HP over all members of a type.
    ///
    /// Members are fetched once each, at most `max_concurrent` at a time.
    /// Members that cannot be fetched are left out of the average.
    ///
    /// # Errors
    ///
    /// Fails if the type itself cannot be fetched or is malformed, or if
    /// `max_concurrent` is zero.
    pub async fn type_stats(&self, name: &str, max_concurrent: usize) -> Result<TypeStats> {
        let limiter = ConcurrencyLimiter::new(max_concurrent)?;
        let payload = self.client.try_call(&self.type_url(name)).await?;
        let TypePayload { pokemon } = TypePayload::deserialize(&payload)
            .map_err(|e| ErrorKind::MalformedPayload(e.to_string()))?;

        let targets: Vec<FetchTarget> = pokemon
            .iter()
            .map(|member| self.species_url(&member.pokemon.name))
            .collect();
        let listed = targets.len();
        log::info!("Type {name} lists {listed} pokemon");

        let fetcher = self.client.fetcher();
        let outcomes = limiter
            .run_batch(targets, |target| async move { fetcher.fetch(&target).await })
            .await;

        let hps: Vec<i64> = outcomes
            .iter()
            .filter_map(|outcome| outcome.payload())
            .filter_map(|payload| match SpeciesStats::from_payload(payload) {
                Ok(stats) => Some(stats.hp),
                Err(e) => {
                    log::warn!("Skipping type member: {e}");
                    None
                }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let average_hp = (!hps.is_empty()).then(|| hps.iter().sum::<i64>() as f64 / hps.len() as f64);

        Ok(TypeStats {
            name: name.to_string(),
            listed,
            counted: hps.len(),
            average_hp,
        })
    }
}
