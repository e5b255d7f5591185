//! Launches the configured number of independent worker threads, each
//! bound to the same port via `SO_REUSEPORT`, and propagates the
//! process-level shutdown signal to every one of them.
//!
//! Grounded on `server_run`'s thread-spawn loop in `server.c`; the
//! `tokio::sync::watch`-based shutdown broadcast plays the role the
//! reference implementation's global stop flag plays for its threads.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::server::worker;

/// Start every worker thread and block until a shutdown signal arrives,
/// then wait for all workers to exit.
pub fn run(config: ServerConfig, metrics: Arc<Metrics>) -> std::io::Result<()> {
    let config = Arc::new(config);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut handles = Vec::with_capacity(config.threads);
    for idx in 0..config.threads {
        let config = Arc::clone(&config);
        let metrics = Arc::clone(&metrics);
        let shutdown_rx = shutdown_rx.clone();
        let shutdown_tx = shutdown_tx.clone();
        let handle = std::thread::Builder::new()
            .name(format!("edge-httpd-worker-{idx}"))
            .spawn(move || {
                if let Err(e) = worker::run(config, metrics, shutdown_rx) {
                    log::error!("worker {idx} exited with a fatal error: {e}; signalling the other workers to stop");
                    let _ = shutdown_tx.send(true);
                }
            })?;
        handles.push(handle);
    }

    wait_for_shutdown_signal(shutdown_tx.subscribe());
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}

/// Block the calling thread until `SIGINT`/`SIGTERM` arrives, or until
/// `shutdown_rx` is flipped to `true` by a worker that hit a fatal
/// startup error — either way every worker must be told to stop, so this
/// wait can't be an OS-signal-only wait. A dedicated, throwaway
/// single-threaded runtime is enough for this — the main thread has
/// nothing else to do while the workers run.
fn wait_for_shutdown_signal(mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start the shutdown-signal runtime");
    runtime.block_on(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
            _ = shutdown_rx.changed() => {}
        }
    });
}
