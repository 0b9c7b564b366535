use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::{formatters::color::color_for_level, verbosity::Verbosity};

/// Initialize the logging system with the given verbosity level.
pub(crate) fn init_logging(verbose: &Verbosity) {
    // Set a base level for all modules to `warn`, which is a reasonable default.
    // It will be overridden by RUST_LOG if it's set.
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);
    builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);

    if std::env::var("RUST_LOG").is_err() {
        // Adjust the base log level filter based on the verbosity from CLI.
        // This applies to all modules not explicitly mentioned in RUST_LOG.
        let level_filter = verbose.log_level_filter();

        // Other crates only get to report problems
        builder.filter_level(LevelFilter::Warn.min(level_filter));

        // Apply more specific filters to our own crates, enabling more verbose logging as per `-vv`.
        builder
            .filter_module("pokefetch", level_filter)
            .filter_module("pokefetch_lib", level_filter);
    }

    builder.format(move |buf, record| {
        let level = record.level();
        writeln!(
            buf,
            "{} {}",
            color_for_level(level).apply_to(format!("[{level}]")),
            record.args()
        )
    });

    builder.init();
}
