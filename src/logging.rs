//! Logging setup for geofetch.
//!
//! Everything logs through the `log` facade; the binary installs
//! `env_logger`. The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `--verbose` (`-v` debug, `-vv` trace)
//! 3. Default: info
//!
//! The HTTP stack is held at `warn` unless tracing, so `-v` shows what
//! geofetch decides (cache hits, lock waits, refreshes) without connection
//! chatter.
//!
//! # Example
//!
//! ```rust,no_run
//! use geofetch::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("Resolving @earth_relief_01m");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Crates whose logs are only shown at trace level.
const NOISY_DEPENDENCIES: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls", "h2"];

/// Initialize logging from CLI verbosity flags.
///
/// Calling it again is harmless: the first logger stays installed.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        let level = determine_level(verbose, quiet);
        builder.filter_level(level);
        if level < LevelFilter::Trace {
            for name in NOISY_DEPENDENCIES {
                builder.filter_module(name, LevelFilter::Warn.min(level));
            }
        }
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_ok() {
        log::trace!(
            "Logging initialized ({})",
            if from_env { "RUST_LOG" } else { "CLI flags" }
        );
    }
}

/// Map CLI flags to a level. `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Plain messages at the default level; timestamps and module paths when
/// verbose.
fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if verbose == 0 {
            return writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args());
        }
        writeln!(
            buf,
            "{} {style}{:<5}{style:#} [{}] {}",
            buf.timestamp_millis(),
            level,
            record.module_path().unwrap_or("geofetch"),
            record.args()
        )
    });
}
