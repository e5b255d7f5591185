//! Per-worker event loop: one OS thread, one single-threaded Tokio
//! runtime, one listener bound with `SO_REUSEPORT`, one idle reaper.
//!
//! Grounded on `worker_main` in `server.c`. The reference implementation
//! hand-rolls an epoll loop over a fixed `MAX_EVENTS` batch; this crate
//! gets the same "one thread, one multiplexer, independent connection
//! state" shape from a `current_thread` Tokio runtime plus a
//! `LocalSet`, with each connection driven by its own cooperatively
//! scheduled task instead of a manually tracked epoll registration. The
//! descriptor-indexed table SPEC_FULL.md describes survives as `Table`
//! below — it holds each connection's activity timestamp and task
//! handle, grows by doubling, and is scanned by [`run_reaper`] once a
//! second exactly as `close_idle_connections` does.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::net;
use crate::server::connection;

struct Slot {
    last_active: Rc<Cell<Instant>>,
    handle: JoinHandle<()>,
}

type Table = Rc<RefCell<Vec<Option<Slot>>>>;

/// Insert `slot` into the first empty index, growing the table by
/// doubling (minimum 16) when none is free. Mirrors
/// `ensure_conn_capacity`'s growth policy; slots are never removed by
/// shrinking the backing `Vec`, only cleared in place.
fn insert(table: &Table, slot: Slot) {
    let mut table = table.borrow_mut();
    if let Some(entry) = table.iter_mut().find(|e| e.is_none()) {
        *entry = Some(slot);
        return;
    }
    let new_cap = (table.len() * 2).max(16);
    let old_len = table.len();
    table.resize_with(new_cap, || None);
    table[old_len] = Some(slot);
}

/// Scan the table once per second; abort and drop any slot whose last
/// recorded activity is older than `idle_timeout`. Mirrors
/// `close_idle_connections`. Aborting the task drops its `Connection`
/// (and therefore its socket, any open file handle, and the
/// `connections_current` guard it holds) at its next cooperative yield
/// point — the same release guarantee the reference implementation gets
/// from its own explicit close primitive.
async fn run_reaper(table: Table, idle_timeout: Duration) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tick.tick().await;
        let now = Instant::now();
        let mut table = table.borrow_mut();
        for entry in table.iter_mut() {
            let expired =
                matches!(entry, Some(slot) if now.duration_since(slot.last_active.get()) > idle_timeout);
            if expired {
                if let Some(slot) = entry.take() {
                    slot.handle.abort();
                }
            }
        }
    }
}

/// Run one worker: bind the listening port, accept connections forever,
/// and reap idle ones once a second, until the shutdown signal fires.
/// Blocks the calling OS thread for the lifetime of the worker.
pub(crate) fn run(
    config: Arc<ServerConfig>,
    metrics: Arc<Metrics>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = net::create_listener(config.port, config.backlog, config.threads > 1)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let local = tokio::task::LocalSet::new();
    let static_root: Arc<Path> = Arc::from(config.static_root.as_path());
    let idle_timeout = Duration::from_secs(config.idle_timeout_sec);

    local.block_on(&runtime, async move {
        let table: Table = Rc::new(RefCell::new(Vec::new()));
        tokio::task::spawn_local(run_reaper(Rc::clone(&table), idle_timeout));

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(_) => continue,
                    };

                    let last_active = Rc::new(Cell::new(Instant::now()));
                    let handle = tokio::task::spawn_local(connection::serve(
                        stream,
                        Arc::clone(&static_root),
                        Arc::clone(&metrics),
                        Rc::clone(&last_active),
                    ));
                    insert(&table, Slot { last_active, handle });
                }
            }
        }
    });

    Ok(())
}
