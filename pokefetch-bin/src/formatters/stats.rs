use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::io::Write;

use anyhow::{Context, Result};
use pokefetch_lib::{BatchReport, BatchStats, CacheStats};
use serde::Serialize;

use crate::formatters::color::{BOLD_GREEN, BOLD_PINK, DIM, NORMAL, color, color_for_outcome};
use crate::options::Format;

// Maximum padding for each entry in the final statistics output
const MAX_PADDING: usize = 20;

/// Distinct failure outcomes with the number of times they occurred
fn failure_counts(report: &BatchReport) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for outcome in report.outcomes.iter().filter(|o| o.is_failure()) {
        *counts.entry(outcome.to_string()).or_default() += 1;
    }
    counts
}

fn write_stat(f: &mut fmt::Formatter, title: &str, stat: usize) -> fmt::Result {
    let fill = MAX_PADDING.saturating_sub(title.chars().count());
    writeln!(f, "{title}{stat:.>fill$}")
}

struct CompactReport<'a>(&'a BatchReport);

impl Display for CompactReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let stats = &report.stats;
        let separator = "-".repeat(MAX_PADDING + 3);

        writeln!(f, "\u{1f4dd} Summary")?; // 📝
        writeln!(f, "{separator}")?;
        write_stat(f, "\u{1f50d} Total", stats.total)?; // 🔍
        write_stat(f, "\u{2705} Successful", stats.successful)?; // ✅
        write_stat(f, "\u{21bb} Soft failures", stats.soft_failures)?; // ↻
        write_stat(f, "\u{2717} Hard failures", stats.hard_failures)?; // ✗
        write_stat(f, "\u{26a1} Transport", stats.transport_errors)?; // ⚡
        writeln!(f, "{separator}")?;

        color!(
            f,
            DIM,
            "Finished in {} ({:.1} requests/s)\n",
            humantime::format_duration(truncate_to_millis(report.elapsed)),
            report.throughput()
        )?;

        if let Some(cache) = report.cache {
            color!(
                f,
                NORMAL,
                "Cache: {} hit(s), {} miss(es), {} entr{}\n",
                cache.hits,
                cache.misses,
                cache.entries,
                if cache.entries == 1 { "y" } else { "ies" }
            )?;
        }

        let failures = failure_counts(report);
        if failures.is_empty() {
            color!(f, BOLD_GREEN, "{} OK", stats.successful)?;
        } else {
            color!(f, BOLD_PINK, "Failures ({}):", stats.failed())?;
            for (text, count) in &failures {
                // All outcomes with the same text share a variant
                let style = report
                    .outcomes
                    .iter()
                    .find(|o| o.is_failure() && &o.to_string() == text)
                    .map_or(&*BOLD_PINK, color_for_outcome);
                write!(f, "\n{count:>6} \u{d7} {}", style.apply_to(text))?; // ×
            }
        }
        Ok(())
    }
}

/// Drop sub-millisecond noise before showing a duration
fn truncate_to_millis(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    stats: &'a BatchStats,
    duration_secs: f64,
    throughput: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheStats>,
    failures: BTreeMap<String, usize>,
}

/// Write the result of a `load` run in the requested format
pub(crate) fn write_report(report: &BatchReport, format: Format, out: &mut impl Write) -> Result<()> {
    match format {
        Format::Compact => writeln!(out, "{}", CompactReport(report))?,
        Format::Json => {
            let json = JsonReport {
                stats: &report.stats,
                duration_secs: report.elapsed.as_secs_f64(),
                throughput: report.throughput(),
                cache: report.cache,
                failures: failure_counts(report),
            };
            let output = serde_json::to_string_pretty(&json)
                .context("Cannot format report as JSON")?;
            writeln!(out, "{output}")?;
        }
    }
    Ok(())
}
