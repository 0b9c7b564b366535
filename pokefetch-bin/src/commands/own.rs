use std::io::{self, Write};

use anyhow::{Context, Result};
use log::info;
use pokefetch_lib::ErrorKind;
use pokefetch_lib::store::{OwnedPokemon, PokemonStore};

use crate::ExitCode;
use crate::options::{Config, Format, OwnCommand};

/// Run one action against the store of self-made pokemon.
///
/// Store errors, such as a duplicate or unknown name, are returned as
/// errors and end the program with a non-zero exit code.
pub(crate) fn own(action: &OwnCommand, cfg: &Config) -> Result<ExitCode> {
    let mut store = PokemonStore::load(&cfg.store)
        .with_context(|| format!("Cannot load store `{}`", cfg.store.display()))?;
    let mut out = io::stdout().lock();

    // Mutations write the store themselves
    match action {
        OwnCommand::List => write_list(&mut out, store.list(), cfg.format)?,
        OwnCommand::Show { name } => {
            let pokemon = store
                .get(name)
                .ok_or_else(|| ErrorKind::NotFound(name.clone()))?;
            write_one(&mut out, pokemon, cfg.format)?;
        }
        OwnCommand::Add {
            name,
            hp,
            attack,
            defense,
        } => {
            let pokemon = store
                .create(OwnedPokemon {
                    name: name.clone(),
                    hp: *hp,
                    attack: *attack,
                    defense: *defense,
                })?
                .clone();
            info!("Added {name} to {}", store.path().display());
            write_one(&mut out, &pokemon, cfg.format)?;
        }
        OwnCommand::Rename { old, new } => {
            let pokemon = store.rename(old, new)?.clone();
            info!("Renamed {old} to {new}");
            write_one(&mut out, &pokemon, cfg.format)?;
        }
        OwnCommand::Remove { name } => {
            let pokemon = store.delete(name)?;
            info!("Removed {name} from {}", store.path().display());
            write_one(&mut out, &pokemon, cfg.format)?;
        }
    }
    Ok(ExitCode::Success)
}

fn write_one(out: &mut impl Write, pokemon: &OwnedPokemon, format: Format) -> Result<()> {
    match format {
        Format::Compact => writeln!(out, "{pokemon}")?,
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(pokemon)?)?,
    }
    Ok(())
}

fn write_list(out: &mut impl Write, pokemon: &[OwnedPokemon], format: Format) -> Result<()> {
    match format {
        Format::Compact if pokemon.is_empty() => writeln!(out, "No pokemon in store")?,
        Format::Compact => {
            for p in pokemon {
                writeln!(out, "{p}")?;
            }
        }
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(pokemon)?)?,
    }
    Ok(())
}
