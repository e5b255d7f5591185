//! edge-httpd — a small, non-blocking HTTP/1.1 server for a single host.
//!
//! Serves static files with zero-copy streaming, an `/echo` endpoint,
//! and the operational `/healthz`/`/metrics` endpoints, over a pool of
//! independent worker threads that share nothing but a handful of
//! atomic counters.
//!
//! The binary entry point lives in `src/main.rs`; this crate exposes
//! the pieces it wires together ([`config`], [`metrics`], and
//! [`server::pool`]) so they can be composed or tested independently.

pub mod config;
pub(crate) mod errors;
pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod router;
    pub(crate) mod types;
}
pub mod limits;
pub mod metrics;
pub(crate) mod net;
pub mod server {
    pub(crate) mod connection;
    pub mod pool;
    pub(crate) mod worker;
}
