//! Per-connection state machine: fixed input buffer, incremental parse,
//! route, flush — one iteration of the loop the reference
//! implementation's `handle_client_read` / `try_parse_and_route` /
//! `flush_response` together describe in `server.c`.
//!
//! Each connection is driven by its own spawned task inside a worker's
//! `LocalSet` (see [`crate::server::worker`]); there is no cross-task
//! shared state here besides the process-wide [`Metrics`] counters and
//! the connection's own `last_active` cell, which the worker's reaper
//! reads to decide whether to abort this task.

use std::cell::Cell;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpStream;

use crate::errors::ErrorKind;
use crate::http::request::{parse_request, ParseOutcome};
use crate::http::response::Response;
use crate::http::router;
use crate::limits;
use crate::metrics::Metrics;
use crate::net;

/// Keeps `connections_current` accurate even when the owning task is
/// cancelled out from under it (the idle reaper's `abort()` in
/// [`crate::server::worker`] drops this connection's future without
/// running the rest of [`serve`]'s body) — the decrement lives in `Drop`
/// instead of at the end of `serve` so it runs unconditionally.
struct ConnectionCountGuard {
    metrics: Arc<Metrics>,
}

impl ConnectionCountGuard {
    fn new(metrics: Arc<Metrics>) -> Self {
        metrics.inc_connections_current();
        Self { metrics }
    }
}

impl Drop for ConnectionCountGuard {
    fn drop(&mut self) {
        self.metrics.dec_connections_current();
    }
}

struct Connection {
    stream: TcpStream,
    in_buf: Box<[u8; limits::INPUT_BUFFER_CAP]>,
    filled: usize,
    response: Response,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            in_buf: Box::new([0u8; limits::INPUT_BUFFER_CAP]),
            filled: 0,
            response: Response::new(),
        }
    }

    /// Drain bytes off the socket into `in_buf` until the kernel reports
    /// would-block or the peer closes. Returns `Ok(false)` on EOF.
    async fn read_more(&mut self, metrics: &Metrics) -> io::Result<bool> {
        self.stream.readable().await?;
        loop {
            if self.filled == self.in_buf.len() {
                return self.drain_overflow(metrics).await;
            }
            match self.stream.try_read(&mut self.in_buf[self.filled..]) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.filled += n;
                    metrics.add_bytes_in(n as u64);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// The input buffer is full and the client is still sending — this
    /// can only mean the request line/headers/body exceed every cap this
    /// server enforces. Discard whatever else is in flight through a
    /// small scratch buffer (mirroring the reference implementation's
    /// `overflow_buf`) and arm a `413` to be sent once routing resumes.
    async fn drain_overflow(&mut self, metrics: &Metrics) -> io::Result<bool> {
        let mut scratch = [0u8; limits::OVERFLOW_SCRATCH_LEN];
        loop {
            match self.stream.try_read(&mut scratch) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    metrics.add_bytes_in(n as u64);
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn shift(&mut self, consumed: usize) {
        debug_assert!(consumed <= self.filled);
        self.in_buf.copy_within(consumed..self.filled, 0);
        self.filled -= consumed;
    }

    /// Parse whatever is buffered and, if a complete request is present,
    /// route it into `self.response`. Returns `true` if the caller should
    /// close the connection after the response (if any) is flushed.
    async fn try_parse_and_route(&mut self, static_root: &Path, metrics: &Metrics) -> bool {
        if self.filled == self.in_buf.len() && self.filled > 0 {
            // No request has been parsed yet, so there is no `Connection`
            // header to honor — `PayloadTooLarge` already forces a close
            // on its own.
            router::write_error(&mut self.response, ErrorKind::PayloadTooLarge, false);
            self.filled = 0;
            return true;
        }

        match parse_request(&self.in_buf[..self.filled]) {
            ParseOutcome::Incomplete => false,
            ParseOutcome::Error(kind) => {
                // Parsing failed before any `Connection` header could be
                // read reliably; `kind.forces_close()` already governs
                // every error this branch can produce.
                let close = kind.forces_close();
                router::write_error(&mut self.response, kind, false);
                self.filled = 0;
                close
            }
            ParseOutcome::Complete { request, consumed } => {
                metrics.inc_requests_total();
                let keep_alive = !request.headers.connection_close;
                router::route(
                    request.method,
                    request.target,
                    &request.headers,
                    request.body,
                    static_root,
                    keep_alive,
                    metrics,
                    &mut self.response,
                )
                .await;
                self.shift(consumed);
                self.response.close_after_send
            }
        }
    }

    async fn flush(&mut self, metrics: &Metrics) -> io::Result<bool> {
        self.stream.writable().await?;
        self.response.flush(&self.stream, metrics).await
    }
}

/// Drive one accepted connection to completion: read, parse, route,
/// flush, repeat for as many pipelined requests as the client sends,
/// until EOF, an I/O error, a close-mandating response, or the worker's
/// reaper aborts this task for inactivity.
pub(crate) async fn serve(
    stream: TcpStream,
    static_root: Arc<Path>,
    metrics: Arc<Metrics>,
    last_active: Rc<Cell<Instant>>,
) {
    if net::set_nodelay(&stream).is_err() {
        return;
    }

    let _count_guard = ConnectionCountGuard::new(Arc::clone(&metrics));
    let mut conn = Connection::new(stream);

    let result: io::Result<()> = async {
        loop {
            if !conn.response.active {
                let should_close = conn.try_parse_and_route(&static_root, &metrics).await;
                last_active.set(Instant::now());
                if should_close && !conn.response.active {
                    return Ok(());
                }
            }

            if conn.response.active {
                if conn.flush(&metrics).await? {
                    last_active.set(Instant::now());
                    let close = conn.response.close_after_send;
                    conn.response.reset();
                    if close {
                        return Ok(());
                    }
                    continue;
                }
                continue;
            }

            if !conn.read_more(&metrics).await? {
                return Ok(());
            }
            last_active.set(Instant::now());
        }
    }
    .await;

    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn connection_count_guard_decrements_on_drop_even_without_a_graceful_close() {
        let metrics = Arc::new(Metrics::new());
        {
            let _guard = ConnectionCountGuard::new(Arc::clone(&metrics));
            assert!(metrics.render_plain().contains("connections_current 1"));
            // Simulates the idle reaper's `JoinHandle::abort()`: the task
            // (and therefore this guard) is dropped without ever reaching
            // the end of `serve`'s body.
        }
        assert!(metrics.render_plain().contains("connections_current 0"));
    }

    /// Spawn `serve` against one end of a real loopback TCP pair and hand
    /// back the connected client half, so tests exercise the whole
    /// read/parse/route/flush loop exactly as a real client would.
    async fn spawn_server() -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_stream, _) = listener.accept().await.unwrap();

        let static_root: Arc<Path> = Arc::from(Path::new("."));
        let metrics = Arc::new(Metrics::new());
        let last_active = Rc::new(Cell::new(Instant::now()));
        tokio::task::spawn_local(serve(server_stream, static_root, metrics, last_active));

        client
    }

    async fn read_until_would_block(client: &mut TcpStream) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            client.readable().await.unwrap();
            match client.try_read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("unexpected read error: {e}"),
            }
        }
        out
    }

    #[tokio::test(flavor = "current_thread")]
    async fn basic_get_returns_ok_and_keeps_connection_open() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = spawn_server().await;
                client
                    .write_all(b"GET /healthz HTTP/1.1\r\nHost: x\r\n\r\n")
                    .await
                    .unwrap();

                let response = read_until_would_block(&mut client).await;
                let text = String::from_utf8(response).unwrap();
                assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
                assert!(text.contains("Connection: keep-alive\r\n"));
                assert!(text.ends_with("ok"));

                // The server must still be alive: a second request on the
                // same connection should get a second full response.
                client
                    .write_all(b"GET /healthz HTTP/1.1\r\nHost: x\r\n\r\n")
                    .await
                    .unwrap();
                let second = read_until_would_block(&mut client).await;
                assert!(String::from_utf8(second).unwrap().starts_with("HTTP/1.1 200 OK\r\n"));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn pipelined_requests_get_two_back_to_back_responses() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = spawn_server().await;
                let two_requests = b"GET /healthz HTTP/1.1\r\nHost: x\r\n\r\nGET /healthz HTTP/1.1\r\nHost: x\r\n\r\n";
                client.write_all(two_requests).await.unwrap();

                // Give both responses a chance to flush before reading.
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                let response = read_until_would_block(&mut client).await;
                let count = response.windows(15).filter(|w| *w == b"HTTP/1.1 200 OK").count();
                assert_eq!(count, 2, "expected two complete responses, got: {response:?}");
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn connection_close_header_closes_after_response() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = spawn_server().await;
                client
                    .write_all(b"GET /healthz HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();

                let response = read_until_would_block(&mut client).await;
                let text = String::from_utf8(response).unwrap();
                assert!(text.contains("Connection: close\r\n"));

                // The server closes its half; further reads see EOF.
                let mut buf = [0u8; 16];
                let n = client.read(&mut buf).await.unwrap();
                assert_eq!(n, 0, "expected EOF after a close-after-send response");
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_request_gets_400_and_closes() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = spawn_server().await;
                client.write_all(b"Host localhost\r\n\r\n").await.unwrap();

                let response = read_until_would_block(&mut client).await;
                assert!(String::from_utf8(response).unwrap().starts_with("HTTP/1.1 400 "));

                let mut buf = [0u8; 16];
                let n = client.read(&mut buf).await.unwrap();
                assert_eq!(n, 0);
            })
            .await;
    }
}
