//! A small JSON file of self-made pokemon.
//!
//! The file holds a JSON array of records. It is read once by
//! [`PokemonStore::load`] and rewritten in full after every successful
//! mutation. Names are unique within a store.

use std::fmt::Display;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::{ErrorKind, Result};

/// Default location of the store
pub const DEFAULT_STORE_PATH: &str = "own_poke.json";

/// Fields every record must have, in the order they are checked
const REQUIRED_FIELDS: [&str; 4] = ["name", "hp", "attack", "defense"];

/// A user-defined pokemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedPokemon {
    /// Unique name
    pub name: String,
    /// Hit points
    pub hp: i64,
    /// Attack
    pub attack: i64,
    /// Defense
    pub defense: i64,
}

impl Display for OwnedPokemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - HP: {}, Attack: {}, Defense: {}",
            self.name, self.hp, self.attack, self.defense
        )
    }
}

/// All owned pokemon, backed by a JSON file
#[derive(Debug)]
pub struct PokemonStore {
    path: PathBuf,
    pokemon: Vec<OwnedPokemon>,
}

impl PokemonStore {
    /// Read the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed, or if it
    /// contains the same name twice.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pokemon: Vec<OwnedPokemon> = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                log::debug!("No store at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(ErrorKind::Io(path, e)),
        };

        for (i, p) in pokemon.iter().enumerate() {
            if pokemon[..i].iter().any(|other| other.name == p.name) {
                return Err(ErrorKind::Duplicate(p.name.clone()));
            }
        }

        Ok(Self { path, pokemon })
    }

    /// Write the whole store to its file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.pokemon.serialize(&mut serializer)?;
        fs::write(&self.path, buf).map_err(|e| ErrorKind::Io(self.path.clone(), e))
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in insertion order
    #[must_use]
    pub fn list(&self) -> &[OwnedPokemon] {
        &self.pokemon
    }

    /// Look up one record by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OwnedPokemon> {
        self.pokemon.iter().find(|p| p.name == name)
    }

    /// Add a record and persist.
    ///
    /// Mutations are undone in memory if the file cannot be written.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Duplicate`] if the name is taken, or an I/O error
    /// from saving.
    pub fn create(&mut self, pokemon: OwnedPokemon) -> Result<&OwnedPokemon> {
        if self.get(&pokemon.name).is_some() {
            return Err(ErrorKind::Duplicate(pokemon.name));
        }
        self.pokemon.push(pokemon);
        if let Err(e) = self.save() {
            self.pokemon.pop();
            return Err(e);
        }
        log::info!("Saved {} pokemon to {}", self.pokemon.len(), self.path.display());
        Ok(&self.pokemon[self.pokemon.len() - 1])
    }

    /// Add a record from an untyped JSON object and persist
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::MissingField`] if any of `name`, `hp`, `attack` or
    ///   `defense` is absent
    /// - [`ErrorKind::MalformedPayload`] if a field has the wrong type
    /// - anything [`PokemonStore::create`] returns
    pub fn create_from_json(&mut self, record: &Value) -> Result<&OwnedPokemon> {
        if let Some(field) = REQUIRED_FIELDS
            .into_iter()
            .find(|field| record.get(field).is_none())
        {
            return Err(ErrorKind::MissingField(field));
        }
        let pokemon = OwnedPokemon::deserialize(record)
            .map_err(|e| ErrorKind::MalformedPayload(e.to_string()))?;
        self.create(pokemon)
    }

    /// Give a record a new name and persist
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NotFound`] if `old` does not exist
    /// - [`ErrorKind::Duplicate`] if `new` is already taken by another record
    pub fn rename(&mut self, old: &str, new: &str) -> Result<&OwnedPokemon> {
        let index = self
            .pokemon
            .iter()
            .position(|p| p.name == old)
            .ok_or_else(|| ErrorKind::NotFound(old.to_string()))?;
        if old != new && self.get(new).is_some() {
            return Err(ErrorKind::Duplicate(new.to_string()));
        }
        let previous = std::mem::replace(&mut self.pokemon[index].name, new.to_string());
        if let Err(e) = self.save() {
            self.pokemon[index].name = previous;
            return Err(e);
        }
        Ok(&self.pokemon[index])
    }

    /// Remove a record and persist
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotFound`] if there is no such record.
    pub fn delete(&mut self, name: &str) -> Result<OwnedPokemon> {
        let index = self
            .pokemon
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ErrorKind::NotFound(name.to_string()))?;
        let removed = self.pokemon.remove(index);
        if let Err(e) = self.save() {
            self.pokemon.insert(index, removed);
            return Err(e);
        }
        Ok(removed)
    }
}
