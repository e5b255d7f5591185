//! Fixed route table: `/healthz`, `/metrics`, `/echo`, `/static/<rel>`.
//!
//! Grounded on the reference implementation's `http_route_request`,
//! `http_build_error_response`, and `content_type_for_path` in
//! `router.c`. Unlike a general-purpose router there is no registration
//! API — the four routes are the whole of this server's surface, so they
//! are matched directly rather than through a dispatch table.

use crate::errors::{canned_body, ErrorKind};
use crate::http::response::Response;
use crate::http::types::{HeaderList, StatusCode};
use crate::limits;
use crate::metrics::Metrics;

/// Truncate a request-target at its first `?`, mirroring `strcspn(path,
/// "?")` in the reference router — this server has no route that reads
/// query parameters, so everything after `?` is simply never looked at.
fn path_without_query(target: &[u8]) -> &[u8] {
    match memchr::memchr(b'?', target) {
        Some(idx) => &target[..idx],
        None => target,
    }
}

/// Reject any relative path containing a leading `/`, a backslash, an
/// empty segment, or a `.`/`..` segment — ported from
/// `util_static_path_is_safe`. `rel` has already had the `/static/`
/// prefix stripped.
fn static_path_is_safe(rel: &[u8]) -> bool {
    if rel.is_empty() || rel.starts_with(b"/") || rel.contains(&b'\\') {
        return false;
    }
    rel.split(|&b| b == b'/').all(|segment| !segment.is_empty() && segment != b"." && segment != b"..")
}

/// Map a static file's extension to a `Content-Type`, defaulting to
/// `application/octet-stream` for anything unrecognized — ported from
/// `content_type_for_path`.
fn content_type_for_path(path: &[u8]) -> &'static str {
    let ext = path
        .rsplit(|&b| b == b'.')
        .next()
        .filter(|_| memchr::memchr(b'.', path).is_some())
        .unwrap_or(b"");

    match ext {
        b"txt" => "text/plain",
        b"html" | b"htm" => "text/html",
        b"json" => "application/json",
        b"css" => "text/css",
        b"js" => "application/javascript",
        b"png" => "image/png",
        b"jpg" | b"jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Write the canned plain-text body for `kind` into `response`.
///
/// Close-after-send is the OR of `kind`'s own forced-close policy and
/// `client_wants_close` — the caller's reading of the request's
/// `Connection` header — matching SPEC_FULL.md §4.2's
/// `close_after_send = force_close || req->connection_close` formula.
/// `404`/`405` don't force a close on their own, but a client that asked
/// for `Connection: close` still gets one.
pub(crate) fn write_error(response: &mut Response, kind: ErrorKind, client_wants_close: bool) {
    let status = kind.status();
    let body = canned_body(status);
    let close = client_wants_close || kind.forces_close();
    if response.prepare_memory(status, "text/plain", body, close).is_err() {
        let _ = response.prepare_memory(StatusCode::InternalServerError, "text/plain", canned_body(StatusCode::InternalServerError), true);
    }
}

/// Route one fully-parsed request, filling in `response` in place.
///
/// `static_root` is the directory `/static/<rel>` is resolved against.
/// `keep_alive` reflects whether the connection should stay open after
/// this response is flushed (already folded in by the caller from the
/// request's `Connection` header and the HTTP/1.1 keep-alive default).
pub(crate) async fn route(
    method: &[u8],
    target: &[u8],
    headers: &HeaderList<'_>,
    body: &[u8],
    static_root: &std::path::Path,
    keep_alive: bool,
    metrics: &Metrics,
    response: &mut Response,
) {
    let _ = headers;
    let close = !keep_alive;
    let path = path_without_query(target);

    match path {
        b"/healthz" => {
            if !method.eq_ignore_ascii_case(b"GET") {
                write_error(response, ErrorKind::MethodNotAllowed, close);
                return;
            }
            let _ = response.prepare_memory(StatusCode::Ok, "text/plain", b"ok", close);
        }
        b"/metrics" => {
            if !method.eq_ignore_ascii_case(b"GET") {
                write_error(response, ErrorKind::MethodNotAllowed, close);
                return;
            }
            let rendered = metrics.render_plain();
            let _ = response.prepare_memory(StatusCode::Ok, "text/plain", rendered.as_bytes(), close);
        }
        b"/echo" => {
            if !method.eq_ignore_ascii_case(b"POST") {
                write_error(response, ErrorKind::MethodNotAllowed, close);
                return;
            }
            if body.len() > limits::RESPONSE_BODY_CAP {
                write_error(response, ErrorKind::PayloadTooLarge, close);
                return;
            }
            let _ = response.prepare_memory(StatusCode::Ok, "application/octet-stream", body, close);
        }
        _ if path.starts_with(b"/static/") => {
            if !method.eq_ignore_ascii_case(b"GET") {
                write_error(response, ErrorKind::MethodNotAllowed, close);
                return;
            }
            serve_static(&path[b"/static/".len()..], static_root, close, response).await;
        }
        _ => write_error(response, ErrorKind::NotFound, close),
    }
}

async fn serve_static(
    rel: &[u8],
    static_root: &std::path::Path,
    close: bool,
    response: &mut Response,
) {
    if !static_path_is_safe(rel) {
        write_error(response, ErrorKind::MalformedRequest, close);
        return;
    }

    // Built directly from the request's raw bytes rather than requiring
    // UTF-8 — filesystem paths on this platform are arbitrary byte
    // strings, and `static_path_is_safe` has already ruled out the
    // traversal-relevant separators.
    use std::os::unix::ffi::OsStrExt;
    let full_path = static_root.join(std::ffi::OsStr::from_bytes(rel));
    let file = match tokio::fs::File::open(&full_path).await {
        Ok(f) => f,
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound) => {
            write_error(response, ErrorKind::NotFound, close);
            return;
        }
        Err(_) => {
            write_error(response, ErrorKind::ServerError, close);
            return;
        }
    };

    let metadata = match file.metadata().await {
        Ok(m) => m,
        Err(_) => {
            write_error(response, ErrorKind::ServerError, close);
            return;
        }
    };

    if !metadata.is_file() {
        write_error(response, ErrorKind::NotFound, close);
        return;
    }

    let content_type = content_type_for_path(rel);
    if response
        .prepare_file(StatusCode::Ok, content_type, file, metadata.len(), close)
        .is_err()
    {
        write_error(response, ErrorKind::ServerError, close);
    }
}
