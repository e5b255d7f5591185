//! Incremental HTTP/1.1 request-line + header parser.
//!
//! Ported from the reference implementation's `http_parse_request` in
//! `parser.c`. The function is a pure, restartable scan over a byte-slice
//! prefix of a connection's input buffer: it never blocks, never copies,
//! and can be called again with a longer prefix of the same buffer if it
//! previously reported [`ParseOutcome::Incomplete`].
//!
//! Zero-copy note: the reference implementation stores the parsed
//! request and its parser side by side in one long-lived connection
//! struct, which forces it to `mem::transmute` the parsed borrows to
//! `'static` to get past the borrow checker. This crate's event loop
//! parses, routes, and serializes a response before the next `.await`
//! point, so the parsed request never needs to outlive the buffer
//! borrow — an ordinary lifetime parameter does the job without unsafe.

use crate::errors::ErrorKind;
use crate::http::types::{Header, HeaderList, SUPPORTED_VERSION};
use crate::limits;

pub(crate) struct ParsedRequest<'a> {
    pub(crate) method: &'a [u8],
    pub(crate) target: &'a [u8],
    pub(crate) headers: HeaderList<'a>,
    pub(crate) body: &'a [u8],
}

pub(crate) enum ParseOutcome<'a> {
    /// Not enough bytes in `buf` yet to determine anything; call again
    /// once more bytes have arrived.
    Incomplete,
    /// A complete request was parsed from the front of `buf`. `consumed`
    /// is the number of bytes (request line + headers + body) the
    /// caller should advance past.
    Complete { request: ParsedRequest<'a>, consumed: usize },
    Error(ErrorKind),
}

fn trim(mut field: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = field {
        field = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = field {
        field = rest;
    }
    field
}

/// Parse the ASCII decimal digits of a `Content-Length` value, rejecting
/// anything non-digit and overflow the way the reference parser's
/// `parse_content_length` does (`-2` there is this function's
/// `Err(ErrorKind::PayloadTooLarge)`).
fn parse_content_length(value: &[u8]) -> Result<usize, ErrorKind> {
    if value.is_empty() {
        return Err(ErrorKind::MalformedRequest);
    }
    let mut total: usize = 0;
    for &b in value {
        if !b.is_ascii_digit() {
            return Err(ErrorKind::MalformedRequest);
        }
        total = total
            .checked_mul(10)
            .and_then(|t| t.checked_add((b - b'0') as usize))
            .ok_or(ErrorKind::PayloadTooLarge)?;
        if total > limits::MAX_CONTENT_LENGTH {
            return Err(ErrorKind::PayloadTooLarge);
        }
    }
    Ok(total)
}

/// Attempt to parse one complete request from the front of `buf`.
///
/// `buf` is the connection's input buffer, already filled up to however
/// many bytes have been read off the socket so far — it may contain
/// trailing bytes belonging to a subsequent pipelined request, which are
/// simply ignored.
pub(crate) fn parse_request(buf: &[u8]) -> ParseOutcome<'_> {
    // The header terminator must be found before anything else is
    // validated — a request line that is merely long but still arriving
    // is incomplete, not an error, until the whole header block is in.
    let header_block_end = match memchr::memmem::find(buf, b"\r\n\r\n") {
        Some(idx) => idx,
        None => return ParseOutcome::Incomplete,
    };
    let body_start = header_block_end + 4;

    let line_end = match memchr::memmem::find(&buf[..body_start], b"\r\n") {
        Some(idx) => idx,
        None => return ParseOutcome::Error(ErrorKind::MalformedRequest),
    };

    if line_end >= limits::MAX_REQUEST_LINE_LEN {
        return ParseOutcome::Error(ErrorKind::RequestLineTooLong);
    }

    let request_line = &buf[..line_end];
    let mut parts = request_line.splitn(3, |&b| b == b' ');
    let method = match parts.next() {
        Some(m) if !m.is_empty() => m,
        _ => return ParseOutcome::Error(ErrorKind::MalformedRequest),
    };
    let target = match parts.next() {
        Some(t) if !t.is_empty() => t,
        _ => return ParseOutcome::Error(ErrorKind::MalformedRequest),
    };
    let version = match parts.next() {
        Some(v) if !v.is_empty() => v,
        _ => return ParseOutcome::Error(ErrorKind::MalformedRequest),
    };
    // `splitn(3, ' ')` folds a third space into `version`, matching the
    // reference parser's "exactly two spaces, else malformed" rule: a
    // genuine `HTTP/1.1` value never contains a space, so any leftover
    // space here means the request line had more than two fields.
    if memchr::memchr(b' ', version).is_some() {
        return ParseOutcome::Error(ErrorKind::MalformedRequest);
    }

    if method.len() > limits::MAX_METHOD_LEN
        || target.len() > limits::MAX_PATH_LEN
        || version.len() > limits::MAX_VERSION_LEN
    {
        return ParseOutcome::Error(ErrorKind::RequestLineTooLong);
    }

    if version != SUPPORTED_VERSION {
        return ParseOutcome::Error(ErrorKind::UnsupportedVersion);
    }

    let headers_start = line_end + 2;
    let mut headers = HeaderList::new();
    let mut pos = headers_start;
    while pos < header_block_end {
        let line_len = memchr::memmem::find(&buf[pos..header_block_end], b"\r\n")
            .unwrap_or(header_block_end - pos);
        let line = &buf[pos..pos + line_len];
        pos += line_len + 2;

        let colon = match memchr::memchr(b':', line) {
            Some(idx) => idx,
            None => return ParseOutcome::Error(ErrorKind::MalformedRequest),
        };
        let name = trim(&line[..colon]);
        let value = trim(&line[colon + 1..]);

        if name.is_empty() {
            return ParseOutcome::Error(ErrorKind::MalformedRequest);
        }
        if name.len() > limits::MAX_HEADER_NAME_LEN || value.len() > limits::MAX_HEADER_VALUE_LEN {
            return ParseOutcome::Error(ErrorKind::HeaderTooLarge);
        }

        if name.eq_ignore_ascii_case(b"transfer-encoding") {
            return ParseOutcome::Error(ErrorKind::MalformedRequest);
        }

        if name.eq_ignore_ascii_case(b"content-length") {
            let parsed = match parse_content_length(value) {
                Ok(v) => v,
                Err(e) => return ParseOutcome::Error(e),
            };
            if headers.headers.iter().any(|h| h.name.eq_ignore_ascii_case(b"content-length")) {
                if parsed != headers.content_length {
                    return ParseOutcome::Error(ErrorKind::MalformedRequest);
                }
            } else {
                headers.content_length = parsed;
            }
        } else if name.eq_ignore_ascii_case(b"connection") && value.eq_ignore_ascii_case(b"close") {
            headers.connection_close = true;
        }

        headers.headers.push(Header { name, value });
        if headers.headers.len() > limits::MAX_HEADERS {
            return ParseOutcome::Error(ErrorKind::HeaderTooLarge);
        }
    }

    let total_needed = match body_start.checked_add(headers.content_length) {
        Some(total) => total,
        None => return ParseOutcome::Error(ErrorKind::MalformedRequest),
    };

    if buf.len() < total_needed {
        return ParseOutcome::Incomplete;
    }

    let body = &buf[body_start..total_needed];
    ParseOutcome::Complete {
        request: ParsedRequest {
            method,
            target,
            headers,
            body,
        },
        consumed: total_needed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_complete(out: ParseOutcome<'_>) -> (ParsedRequest<'_>, usize) {
        match out {
            ParseOutcome::Complete { request, consumed } => (request, consumed),
            ParseOutcome::Incomplete => panic!("expected Complete, got Incomplete"),
            ParseOutcome::Error(e) => panic!("expected Complete, got Error({e:?})"),
        }
    }

    #[test]
    fn parses_simple_get() {
        let buf = b"GET /healthz HTTP/1.1\r\nHost: x\r\n\r\n";
        let (req, consumed) = expect_complete(parse_request(buf));
        assert_eq!(req.method, b"GET");
        assert_eq!(req.target, b"/healthz");
        assert_eq!(req.body, b"");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn incomplete_on_partial_headers() {
        let buf = b"GET /healthz HTTP/1.1\r\nHost: x";
        assert!(matches!(parse_request(buf), ParseOutcome::Incomplete));
    }

    #[test]
    fn incomplete_on_partial_body() {
        let buf = b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel";
        assert!(matches!(parse_request(buf), ParseOutcome::Incomplete));
    }

    #[test]
    fn resumes_after_more_bytes_arrive() {
        let full = b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let partial = &full[..full.len() - 2];
        assert!(matches!(parse_request(partial), ParseOutcome::Incomplete));
        let (req, consumed) = expect_complete(parse_request(full));
        assert_eq!(req.body, b"hello");
        assert_eq!(consumed, full.len());
    }

    #[test]
    fn rejects_wrong_version() {
        let buf = b"GET / HTTP/1.0\r\n\r\n";
        assert!(matches!(
            parse_request(buf),
            ParseOutcome::Error(ErrorKind::UnsupportedVersion)
        ));
    }

    #[test]
    fn rejects_three_field_request_line() {
        let buf = b"GET / HTTP/1.1 extra\r\n\r\n";
        assert!(matches!(
            parse_request(buf),
            ParseOutcome::Error(ErrorKind::MalformedRequest)
        ));
    }

    #[test]
    fn request_line_too_long() {
        let long_path = vec![b'a'; limits::MAX_PATH_LEN + 1];
        let mut buf = Vec::new();
        buf.extend_from_slice(b"GET /");
        buf.extend_from_slice(&long_path);
        buf.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        assert!(matches!(
            parse_request(&buf),
            ParseOutcome::Error(ErrorKind::RequestLineTooLong)
        ));
    }

    #[test]
    fn whole_line_at_cap_is_too_long() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"GET /");
        buf.extend_from_slice(&vec![b'a'; limits::MAX_REQUEST_LINE_LEN - 14]);
        buf.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        assert!(matches!(
            parse_request(&buf),
            ParseOutcome::Error(ErrorKind::RequestLineTooLong)
        ));
    }

    #[test]
    fn oversized_request_line_without_terminator_is_incomplete_not_an_error() {
        // The header terminator governs completeness; a line that keeps
        // growing past the length cap is not rejected until the header
        // block actually arrives.
        let mut buf = Vec::new();
        buf.extend_from_slice(b"GET /");
        buf.extend_from_slice(&vec![b'a'; limits::MAX_REQUEST_LINE_LEN + 1000]);
        assert!(matches!(parse_request(&buf), ParseOutcome::Incomplete));
    }

    #[test]
    fn duplicate_content_length_must_match() {
        let ok = b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\nContent-Length: 2\r\n\r\nhi";
        assert!(matches!(parse_request(ok), ParseOutcome::Complete { .. }));

        let conflicting = b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\nContent-Length: 3\r\n\r\nhix";
        assert!(matches!(
            parse_request(conflicting),
            ParseOutcome::Error(ErrorKind::MalformedRequest)
        ));
    }

    #[test]
    fn rejects_transfer_encoding() {
        let buf = b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        assert!(matches!(
            parse_request(buf),
            ParseOutcome::Error(ErrorKind::MalformedRequest)
        ));
    }

    #[test]
    fn content_length_over_cap_is_rejected() {
        let buf = format!(
            "POST /echo HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            limits::MAX_CONTENT_LENGTH + 1
        );
        assert!(matches!(
            parse_request(buf.as_bytes()),
            ParseOutcome::Error(ErrorKind::PayloadTooLarge)
        ));
    }

    #[test]
    fn too_many_headers_is_rejected() {
        let mut buf = String::from("GET / HTTP/1.1\r\n");
        for i in 0..limits::MAX_HEADERS + 1 {
            buf.push_str(&format!("X-H{i}: v\r\n"));
        }
        buf.push_str("\r\n");
        assert!(matches!(
            parse_request(buf.as_bytes()),
            ParseOutcome::Error(ErrorKind::HeaderTooLarge)
        ));
    }

    #[test]
    fn exactly_max_headers_is_accepted() {
        let mut buf = String::from("GET / HTTP/1.1\r\n");
        for i in 0..limits::MAX_HEADERS {
            buf.push_str(&format!("X-H{i}: v\r\n"));
        }
        buf.push_str("\r\n");
        assert!(matches!(parse_request(buf.as_bytes()), ParseOutcome::Complete { .. }));
    }

    #[test]
    fn connection_close_header_detected_case_insensitively() {
        let buf = b"GET / HTTP/1.1\r\nConnection: Close\r\n\r\n";
        let (req, _) = expect_complete(parse_request(buf));
        assert!(req.headers.connection_close);
    }

    #[test]
    fn missing_colon_in_header_is_malformed() {
        let buf = b"GET / HTTP/1.1\r\nnotaheader\r\n\r\n";
        assert!(matches!(
            parse_request(buf),
            ParseOutcome::Error(ErrorKind::MalformedRequest)
        ));
    }
}
