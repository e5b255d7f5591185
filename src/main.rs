//! Binary entry point: parse CLI flags, install a logger, and hand off
//! to the worker pool. Mirrors the startup sequence of `main.c`'s
//! `main` function.

use std::sync::Arc;

use edge_httpd::config::ServerConfig;
use edge_httpd::metrics::Metrics;
use edge_httpd::server::pool;

fn main() {
    env_logger::init();

    let config = match ServerConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-httpd: {e}");
            std::process::exit(1);
        }
    };

    log::info!(
        "edge-httpd listening on port {} with {} worker thread(s), static root {:?}, idle timeout {}s",
        config.port,
        config.threads,
        config.static_root,
        config.idle_timeout_sec,
    );

    let metrics = Arc::new(Metrics::new());
    if let Err(e) = pool::run(config, metrics) {
        log::error!("fatal error running server: {e}");
        std::process::exit(1);
    }
}
