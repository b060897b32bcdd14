//! Parses the optional `milton-debug.cfg` debug-level file into a
//! `tracing_subscriber::filter::Targets`, replacing a global mutable
//! debug-level table with an explicit, constructed-once value.

use tracing_subscriber::filter::{LevelFilter, Targets};

/// Parses `Namespace::Path = <level>` lines (`#` comments, blank lines
/// ignored) into a `Targets` filter. Unparsable levels are skipped with a
/// warning rather than aborting the whole file.
pub fn parse(contents: &str) -> Targets {
    let mut targets = Targets::new().with_default(LevelFilter::INFO);

    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((namespace, level)) = line.split_once('=') else {
            tracing::warn!("milton-debug.cfg:{}: malformed line, expected `Namespace = level`", lineno + 1);
            continue;
        };
        let namespace = namespace.trim().replace("::", ".");
        let Some(level) = parse_level(level.trim()) else {
            tracing::warn!("milton-debug.cfg:{}: unrecognized level {:?}", lineno + 1, level.trim());
            continue;
        };
        targets = targets.with_target(namespace, level);
    }

    targets
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

/// Loads and parses `path` if it exists; returns the default (everything at
/// the ambient `RUST_LOG`/default level) filter otherwise.
pub fn load(path: &std::path::Path) -> Targets {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents),
        Err(_) => Targets::new().with_default(LevelFilter::INFO),
    }
}
