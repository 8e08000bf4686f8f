//! Logging setup for audiotool.
//!
//! Uses the `log` facade with an `env_logger` backend. The effective level
//! is chosen in this order:
//!
//! 1. `RUST_LOG`, when set, is used verbatim
//! 2. `--quiet` selects errors only
//! 3. `-d` selects debug, `-dd` selects trace
//! 4. Otherwise info
//!
//! Debug builds prefix every line with a timestamp, and with the module
//! path once `-d` is given. Release builds print level and message only.
//!
//! ```rust,no_run
//! use audiotool::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("store opened");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the global logger from the `--debug` count and `--quiet` flag.
///
/// Calling this a second time in the same process is a no-op; `log`
/// rejects the second logger.
pub fn init_logging(debug: u8, quiet: bool) {
    let from_env = env::var("RUST_LOG").is_ok();
    let level = level_for(debug, quiet);

    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }
    configure_format(&mut builder, debug);

    if builder.try_init().is_err() {
        return;
    }

    if from_env {
        log::debug!("Log filter taken from RUST_LOG: {:?}", env::var("RUST_LOG").ok());
    } else {
        log::debug!("Log level set to {:?}", level);
    }
}

fn level_for(debug: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match debug {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(debug_assertions)]
fn configure_format(builder: &mut Builder, debug: u8) {
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        let timestamp = buf.timestamp_seconds();
        if debug > 0 {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{} {style}{:<5}{style:#} {}", timestamp, level, record.args())
        }
    });
}

#[cfg(not(debug_assertions))]
fn configure_format(builder: &mut Builder, _debug: u8) {
    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
    });
}
