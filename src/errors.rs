//! The hot-path error taxonomy and its pre-rendered wire responses.
//!
//! Every variant here corresponds to exactly one status code this server
//! can emit for a request it could not (or would not) serve. There is no
//! `std::error::Error` impl and no formatting: responses are `&'static
//! [u8]` constants built once at compile time, the same zero-allocation
//! shape the parser and response builder use elsewhere in this crate.
//! Cold-path configuration errors live in [`crate::config::ConfigError`]
//! instead, where `thiserror` ergonomics are worth the allocation.

use crate::http::types::StatusCode;

/// Why a request could not be served normally.
///
/// This is the taxonomy from the error-handling design: each variant maps
/// to exactly one status code and exactly one close-after-send policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Parser failure of any kind other than the specific cases below —
    /// maps to `400`.
    MalformedRequest,
    /// Request line or a request-line field exceeded its length cap —
    /// maps to `414`.
    RequestLineTooLong,
    /// A header line, header name, or header value exceeded its cap, or
    /// more than 64 headers were present — maps to `431`.
    HeaderTooLarge,
    /// Declared `Content-Length` exceeded the configured cap — maps to
    /// `413`.
    PayloadTooLarge,
    /// The request line's version was not exactly `HTTP/1.1` — maps to
    /// `505`.
    UnsupportedVersion,
    /// The router could not find the requested resource — maps to `404`.
    NotFound,
    /// The route exists but does not accept this method — maps to `405`.
    MethodNotAllowed,
    /// Head preparation or an unexpected stat/open failure — maps to
    /// `500`, always with close.
    ServerError,
}

impl ErrorKind {
    /// The status code this error is reported to the client as.
    pub(crate) const fn status(&self) -> StatusCode {
        match self {
            ErrorKind::MalformedRequest => StatusCode::BadRequest,
            ErrorKind::RequestLineTooLong => StatusCode::UriTooLong,
            ErrorKind::HeaderTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            ErrorKind::PayloadTooLarge => StatusCode::PayloadTooLarge,
            ErrorKind::UnsupportedVersion => StatusCode::HttpVersionNotSupported,
            ErrorKind::NotFound => StatusCode::NotFound,
            ErrorKind::MethodNotAllowed => StatusCode::MethodNotAllowed,
            ErrorKind::ServerError => StatusCode::InternalServerError,
        }
    }

    /// Whether a response of this kind always closes the connection
    /// afterwards, independent of what the client asked for. `404` and
    /// `405` do not force a close; everything else does.
    pub(crate) const fn forces_close(&self) -> bool {
        !matches!(self, ErrorKind::NotFound | ErrorKind::MethodNotAllowed)
    }
}

/// Fixed one-line plain-text body for a status code, terminated by `\n`,
/// ported verbatim from the reference router's canned error bodies.
pub(crate) const fn canned_body(status: StatusCode) -> &'static [u8] {
    match status {
        StatusCode::Ok => b"",
        StatusCode::BadRequest => b"bad request\n",
        StatusCode::NotFound => b"not found\n",
        StatusCode::MethodNotAllowed => b"method not allowed\n",
        StatusCode::PayloadTooLarge => b"payload too large\n",
        StatusCode::UriTooLong => b"uri too long\n",
        StatusCode::RequestHeaderFieldsTooLarge => b"request header fields too large\n",
        StatusCode::InternalServerError => b"internal server error\n",
        StatusCode::HttpVersionNotSupported => b"http version not supported\n",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_kind_forces_close_except_not_found_and_method_not_allowed() {
        let always_close = [
            ErrorKind::MalformedRequest,
            ErrorKind::RequestLineTooLong,
            ErrorKind::HeaderTooLarge,
            ErrorKind::PayloadTooLarge,
            ErrorKind::UnsupportedVersion,
            ErrorKind::ServerError,
        ];
        for kind in always_close {
            assert!(kind.forces_close(), "{kind:?} should force close");
        }
        assert!(!ErrorKind::NotFound.forces_close());
        assert!(!ErrorKind::MethodNotAllowed.forces_close());
    }

    #[test]
    fn canned_bodies_are_newline_terminated() {
        for status in [
            StatusCode::BadRequest,
            StatusCode::NotFound,
            StatusCode::MethodNotAllowed,
            StatusCode::PayloadTooLarge,
            StatusCode::UriTooLong,
            StatusCode::RequestHeaderFieldsTooLarge,
            StatusCode::InternalServerError,
            StatusCode::HttpVersionNotSupported,
        ] {
            let body = canned_body(status);
            assert_eq!(*body.last().unwrap(), b'\n');
        }
    }
}
