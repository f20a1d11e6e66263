//! Operator-facing log output on stderr.
//!
//! Progress lines are emitted at `info`, so the default level shows them.
//! `--log-level` wins over `TRNG_LOG`, which wins over `RUST_LOG`.

use std::sync::Once;

use log::LevelFilter;

pub const LOG_ENV: &str = "TRNG_LOG";

static INIT: Once = Once::new();

/// First level that parses, in precedence order; `info` when none does.
fn resolve_level<F>(explicit: Option<&str>, lookup: F) -> LevelFilter
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .map(str::to_string)
        .into_iter()
        .chain(lookup(LOG_ENV))
        .chain(lookup("RUST_LOG"))
        .find_map(|v| v.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the stderr logger. Only the first call has any effect.
pub fn init_logging(explicit: Option<&str>) {
    let level = resolve_level(explicit, |key| std::env::var(key).ok());
    INIT.call_once(|| {
        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp_millis()
            .format_module_path(false)
            .format_target(level >= LevelFilter::Debug)
            .init();
    });
}
