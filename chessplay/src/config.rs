//! Runtime tunables for the chessplay shell.
//!
//! Every value has a compile-time default and can be overridden through a
//! dedicated environment variable. Command-line flags take priority over both.

use std::path::PathBuf;
use std::time::Duration;

/// Default fixed search depth for engine moves.
const DEFAULT_SEARCH_DEPTH: u8 = 15;

/// Default number of engine threads.
const DEFAULT_ENGINE_THREADS: u32 = 2;

/// Get an explicit engine binary path.
///
/// Priority:
/// 1. `CHESSPLAY_ENGINE_PATH` env variable if set
/// 2. `None`, meaning the usual Stockfish locations are searched
pub fn get_engine_path() -> Option<PathBuf> {
    std::env::var("CHESSPLAY_ENGINE_PATH").ok().map(PathBuf::from)
}

/// Get the engine search depth.
///
/// Priority:
/// 1. `CHESSPLAY_SEARCH_DEPTH` env variable if set (falls back to default
///    if the value is not a positive `u8`)
/// 2. `15` as fallback
pub fn get_search_depth() -> u8 {
    if let Ok(depth) = std::env::var("CHESSPLAY_SEARCH_DEPTH") {
        return parse_depth(&depth).unwrap_or(DEFAULT_SEARCH_DEPTH);
    }

    DEFAULT_SEARCH_DEPTH
}

/// Get the engine thread count.
///
/// Priority:
/// 1. `CHESSPLAY_ENGINE_THREADS` env variable if set (falls back to default
///    if the value cannot be parsed as a `u32`)
/// 2. `2` as fallback
pub fn get_engine_threads() -> u32 {
    if let Ok(threads) = std::env::var("CHESSPLAY_ENGINE_THREADS") {
        return threads.parse().unwrap_or(DEFAULT_ENGINE_THREADS);
    }

    DEFAULT_ENGINE_THREADS
}

/// Get the per-search timeout.
///
/// `CHESSPLAY_SEARCH_TIMEOUT_SECS` if set and parseable, otherwise no
/// timeout: the engine is trusted to finish its fixed-depth search.
pub fn get_search_timeout() -> Option<Duration> {
    std::env::var("CHESSPLAY_SEARCH_TIMEOUT_SECS")
        .ok()
        .and_then(|secs| parse_timeout(&secs))
}

/// Get the directory for rolling log files.
///
/// `CHESSPLAY_LOG_DIR` if set. When unset, logs go to stderr.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var("CHESSPLAY_LOG_DIR").ok().map(PathBuf::from)
}

fn parse_depth(value: &str) -> Option<u8> {
    value.trim().parse().ok().filter(|depth| *depth > 0)
}

fn parse_timeout(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
