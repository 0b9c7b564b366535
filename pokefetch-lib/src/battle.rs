//! Turn-based battle between two species.
//!
//! Each round the first participant attacks, then the second one does,
//! unless the first attack knocked it out. A participant is knocked out once
//! its HP drops to zero or below. If nobody is knocked out after the last
//! round, whoever dealt more damage in total wins; equal totals are a draw.

use std::fmt::Display;

use serde::Serialize;

use crate::{Fetch, PokeApi, Result, SpeciesStats};

/// Default number of rounds, 5.
pub const DEFAULT_ROUNDS: u32 = 5;

/// A battle participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pokemon {
    /// Species name
    pub name: String,
    /// Remaining hit points, may become negative
    pub hp: i64,
    /// Attack
    pub attack: i64,
    /// Defense
    pub defense: i64,
}

impl Pokemon {
    /// Create a participant from raw stats
    pub fn new(name: impl Into<String>, hp: i64, attack: i64, defense: i64) -> Self {
        Self {
            name: name.into(),
            hp,
            attack,
            defense,
        }
    }

    /// Fetch a participant's stats
    ///
    /// # Errors
    ///
    /// Fails if the species cannot be fetched or lacks a needed stat. The
    /// battle cannot start without both participants.
    pub async fn fetch<F: Fetch>(api: &PokeApi<F>, name: &str) -> Result<Self> {
        let pokemon = Self::from(api.species(name).await?);
        log::info!(
            "{} - HP: {}, Attack: {}, Defense: {}",
            pokemon.name,
            pokemon.hp,
            pokemon.attack,
            pokemon.defense
        );
        Ok(pokemon)
    }

    /// Damage dealt to `opponent` by one attack.
    ///
    /// `attack - defense / 2`, truncated towards zero, but at least 1.
    #[must_use]
    pub fn damage_to(&self, opponent: &Self) -> i64 {
        ((2 * self.attack - opponent.defense) / 2).max(1)
    }

    /// Returns `true` once the participant cannot fight any longer
    #[must_use]
    pub const fn is_knocked_out(&self) -> bool {
        self.hp <= 0
    }
}

impl From<SpeciesStats> for Pokemon {
    fn from(stats: SpeciesStats) -> Self {
        Self::new(stats.name, stats.hp, stats.attack, stats.defense)
    }
}

/// Something that happened during a battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BattleEvent {
    /// One attack
    Attack {
        /// Round number, starting at 1
        round: u32,
        /// Name of the attacker
        attacker: String,
        /// Name of the defender
        defender: String,
        /// Damage dealt
        damage: i64,
        /// HP of the defender after the attack
        remaining_hp: i64,
    },
    /// The defender of the last attack cannot fight any longer
    KnockedOut {
        /// Name of the knocked out participant
        loser: String,
        /// Name of the other participant
        winner: String,
    },
    /// Damage dealt by one participant over the whole battle
    TotalDamage {
        /// Name of the participant
        name: String,
        /// Sum of all damage dealt
        damage: i64,
    },
}

impl Display for BattleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attack {
                round,
                attacker,
                defender,
                damage,
                remaining_hp,
            } => write!(
                f,
                "Round {round}: {attacker} deals {damage} damage to {defender} (HP left: {remaining_hp})"
            ),
            Self::KnockedOut { loser, winner } => {
                write!(f, "{loser} is knocked out! {winner} wins the battle!")
            }
            Self::TotalDamage { name, damage } => {
                write!(f, "Total damage dealt by {name}: {damage}")
            }
        }
    }
}

/// How a battle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BattleOutcome {
    /// The opponent was knocked out
    KnockOut {
        /// Name of the winner
        winner: String,
    },
    /// Nobody was knocked out, but the winner dealt more damage
    MoreDamage {
        /// Name of the winner
        winner: String,
    },
    /// Nobody was knocked out and both dealt the same damage
    Draw,
}

impl BattleOutcome {
    /// Name of the winner, `None` for a draw
    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        match self {
            Self::KnockOut { winner } | Self::MoreDamage { winner } => Some(winner),
            Self::Draw => None,
        }
    }
}

impl Display for BattleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KnockOut { winner } => write!(f, "{winner} wins by knock out!"),
            Self::MoreDamage { winner } => {
                write!(f, "{winner} wins the battle by dealing the most damage!")
            }
            Self::Draw => f.write_str("The battle ends in a draw."),
        }
    }
}

/// Full account of a battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BattleReport {
    /// How it ended
    pub outcome: BattleOutcome,
    /// Everything that happened, in order
    pub log: Vec<BattleEvent>,
}

/// Let `first` and `second` fight for at most `rounds` rounds.
///
/// Both participants' HP is updated in place.
pub fn simulate_battle(first: &mut Pokemon, second: &mut Pokemon, rounds: u32) -> BattleReport {
    let mut log = Vec::new();
    let mut total_first = 0;
    let mut total_second = 0;

    for round in 1..=rounds {
        total_first += attack(round, first, second, &mut log);
        if second.is_knocked_out() {
            return knock_out(first, second, log);
        }

        total_second += attack(round, second, first, &mut log);
        if first.is_knocked_out() {
            return knock_out(second, first, log);
        }
    }

    log.push(BattleEvent::TotalDamage {
        name: first.name.clone(),
        damage: total_first,
    });
    log.push(BattleEvent::TotalDamage {
        name: second.name.clone(),
        damage: total_second,
    });

    let outcome = match total_first.cmp(&total_second) {
        std::cmp::Ordering::Greater => BattleOutcome::MoreDamage {
            winner: first.name.clone(),
        },
        std::cmp::Ordering::Less => BattleOutcome::MoreDamage {
            winner: second.name.clone(),
        },
        std::cmp::Ordering::Equal => BattleOutcome::Draw,
    };
    BattleReport { outcome, log }
}

fn attack(round: u32, attacker: &Pokemon, defender: &mut Pokemon, log: &mut Vec<BattleEvent>) -> i64 {
    let damage = attacker.damage_to(defender);
    defender.hp -= damage;
    log.push(BattleEvent::Attack {
        round,
        attacker: attacker.name.clone(),
        defender: defender.name.clone(),
        damage,
        remaining_hp: defender.hp,
    });
    damage
}

fn knock_out(winner: &Pokemon, loser: &Pokemon, mut log: Vec<BattleEvent>) -> BattleReport {
    log.push(BattleEvent::KnockedOut {
        loser: loser.name.clone(),
        winner: winner.name.clone(),
    });
    BattleReport {
        outcome: BattleOutcome::KnockOut {
            winner: winner.name.clone(),
        },
        log,
    }
}

/// Fetch both participants, then let them fight
///
/// # Errors
///
/// Fails if either participant cannot be fetched.
pub async fn battle<F: Fetch>(
    api: &PokeApi<F>,
    first: &str,
    second: &str,
    rounds: u32,
) -> Result<BattleReport> {
    let (mut first, mut second) =
        tokio::try_join!(Pokemon::fetch(api, first), Pokemon::fetch(api, second))?;
    Ok(simulate_battle(&mut first, &mut second, rounds))
}
