//! Command-line configuration.
//!
//! Ported from the option table in `main.c` (`getopt(argc, argv,
//! "p:t:s:i:h")`): port, worker thread count, idle timeout, and static
//! file root — exactly these four flags, no more. `clap`'s derive API
//! replaces the hand-rolled `getopt`/`parse_int_arg` loop; the accepted
//! ranges and defaults are unchanged. Listen backlog is not
//! user-configurable in the reference implementation either, so it
//! stays a fixed internal constant here too.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::limits;

/// Listen backlog passed to `listen(2)`. Not exposed on the command
/// line, matching the reference implementation.
pub(crate) const LISTEN_BACKLOG: i32 = 1024;

const MIN_THREADS: usize = 1;
const MAX_THREADS: usize = 128;
const MIN_IDLE_TIMEOUT_SEC: u64 = 1;
const MAX_IDLE_TIMEOUT_SEC: u64 = 3600;

#[derive(Debug, Parser)]
#[command(name = "edge-httpd", version, about = "Non-blocking HTTP/1.1 server for a single host")]
pub(crate) struct Cli {
    /// TCP port to listen on.
    ///
    /// Parsed as `u32` rather than `u16` so an out-of-range value (e.g.
    /// `70000`) is rejected by this crate's own bounds check in
    /// `TryFrom<Cli>` — and therefore exits with status 1 — instead of
    /// failing inside clap's argument parsing, which exits with status 2.
    #[arg(short = 'p', long, default_value_t = 8080)]
    port: u32,

    /// Number of worker threads (each runs its own event loop and binds
    /// the listening port with SO_REUSEPORT).
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Seconds of inactivity before an idle connection is closed.
    #[arg(short = 'i', long = "idle-timeout", default_value_t = 10)]
    idle_timeout_sec: u64,

    /// Directory `/static/<rel>` requests are resolved against.
    #[arg(short = 's', long = "static-root", default_value = "./static")]
    static_root: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port must be in range 1..=65535")]
    InvalidPort,
    #[error("thread count must be in range {MIN_THREADS}..={MAX_THREADS}")]
    InvalidThreadCount,
    #[error("idle timeout must be in range {MIN_IDLE_TIMEOUT_SEC}..={MAX_IDLE_TIMEOUT_SEC} seconds")]
    InvalidIdleTimeout,
    #[error("static root path exceeds {max} bytes", max = limits::MAX_STATIC_ROOT_LEN)]
    StaticRootTooLong,
}

/// Validated, immutable configuration for one server run.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub threads: usize,
    pub idle_timeout_sec: u64,
    pub static_root: PathBuf,
    pub backlog: i32,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, ConfigError> {
        if !(1..=u16::MAX as u32).contains(&cli.port) {
            return Err(ConfigError::InvalidPort);
        }
        let port = cli.port as u16;
        if !(MIN_THREADS..=MAX_THREADS).contains(&cli.threads) {
            return Err(ConfigError::InvalidThreadCount);
        }
        if !(MIN_IDLE_TIMEOUT_SEC..=MAX_IDLE_TIMEOUT_SEC).contains(&cli.idle_timeout_sec) {
            return Err(ConfigError::InvalidIdleTimeout);
        }
        if cli.static_root.as_os_str().len() > limits::MAX_STATIC_ROOT_LEN {
            return Err(ConfigError::StaticRootTooLong);
        }

        Ok(ServerConfig {
            port,
            threads: cli.threads,
            idle_timeout_sec: cli.idle_timeout_sec,
            static_root: cli.static_root,
            backlog: LISTEN_BACKLOG,
        })
    }
}

impl ServerConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        Cli::parse().try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            port: 8080,
            threads: 1,
            idle_timeout_sec: 10,
            static_root: PathBuf::from("./static"),
        }
    }

    #[test]
    fn defaults_are_accepted() {
        assert!(ServerConfig::try_from(base_cli()).is_ok());
    }

    #[test]
    fn port_zero_rejected() {
        let mut cli = base_cli();
        cli.port = 0;
        assert!(matches!(ServerConfig::try_from(cli), Err(ConfigError::InvalidPort)));
    }

    #[test]
    fn port_above_u16_range_rejected_without_panicking() {
        let mut cli = base_cli();
        cli.port = 70_000;
        assert!(matches!(ServerConfig::try_from(cli), Err(ConfigError::InvalidPort)));
    }

    #[test]
    fn zero_threads_rejected() {
        let mut cli = base_cli();
        cli.threads = 0;
        assert!(matches!(
            ServerConfig::try_from(cli),
            Err(ConfigError::InvalidThreadCount)
        ));
    }

    #[test]
    fn thread_count_over_cap_rejected() {
        let mut cli = base_cli();
        cli.threads = MAX_THREADS + 1;
        assert!(matches!(
            ServerConfig::try_from(cli),
            Err(ConfigError::InvalidThreadCount)
        ));
    }

    #[test]
    fn idle_timeout_out_of_range_rejected() {
        let mut cli = base_cli();
        cli.idle_timeout_sec = 0;
        assert!(matches!(
            ServerConfig::try_from(cli),
            Err(ConfigError::InvalidIdleTimeout)
        ));

        let mut cli = base_cli();
        cli.idle_timeout_sec = MAX_IDLE_TIMEOUT_SEC + 1;
        assert!(matches!(
            ServerConfig::try_from(cli),
            Err(ConfigError::InvalidIdleTimeout)
        ));
    }

    #[test]
    fn oversized_static_root_rejected() {
        let mut cli = base_cli();
        cli.static_root = PathBuf::from("a".repeat(limits::MAX_STATIC_ROOT_LEN + 1));
        assert!(matches!(
            ServerConfig::try_from(cli),
            Err(ConfigError::StaticRootTooLong)
        ));
    }
}
