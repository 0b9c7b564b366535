use std::io::{self, Write};

use anyhow::Result;
use pokefetch_lib::battle::{BattleEvent, BattleReport};

use super::fetch_failure;
use crate::ExitCode;
use crate::client;
use crate::formatters::color::{BOLD_GREEN, DIM, NORMAL, PINK, color};
use crate::options::{Config, Format};

/// Fetch both species and print the course of the battle
pub(crate) async fn battle(first: &str, second: &str, cfg: &Config) -> Result<ExitCode> {
    let api = client::api(cfg)?;
    let report = match pokefetch_lib::battle::battle(&api, first, second, cfg.rounds).await {
        Ok(report) => report,
        Err(e) => return fetch_failure(e),
    };

    let mut out = io::stdout().lock();
    match cfg.format {
        Format::Compact => write_battle(&mut out, &report)?,
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
    }
    Ok(ExitCode::Success)
}

fn write_battle(f: &mut impl Write, report: &BattleReport) -> io::Result<()> {
    for event in &report.log {
        match event {
            BattleEvent::Attack { .. } => color!(f, NORMAL, "{}\n", event)?,
            BattleEvent::KnockedOut { .. } => color!(f, PINK, "{}\n", event)?,
            BattleEvent::TotalDamage { .. } => color!(f, DIM, "{}\n", event)?,
        }
    }
    color!(f, BOLD_GREEN, "{}\n", report.outcome)
}

#[cfg(test)]
mod tests {
    use pokefetch_lib::battle::{Pokemon, simulate_battle};

    use super::write_battle;

    #[test]
    fn test_write_battle() {
        console::set_colors_enabled(false);
        let mut first = Pokemon::new("pikachu", 35, 55, 40);
        let mut second = Pokemon::new("bulbasaur", 45, 49, 49);
        let report = simulate_battle(&mut first, &mut second, 5);

        let mut out = Vec::new();
        write_battle(&mut out, &report).unwrap();
        let output = String::from_utf8(out).unwrap();

        assert!(output.starts_with("Round 1: pikachu deals 30 damage to bulbasaur (HP left: 15)\n"));
        assert!(output.ends_with(&format!("{}\n", report.outcome)));
    }
}
