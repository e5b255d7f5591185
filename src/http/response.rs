//! Response assembler: turns a status/content-type/body triple into the
//! fixed-layout wire bytes described in SPEC_FULL.md §4.2, and tracks how
//! much of them has been flushed to the socket so far.

use std::io;

use tokio::fs::File;

use crate::http::types::StatusCode;
use crate::limits;

/// The body half of a response: at most one of "inline bytes" or "file
/// region" is ever present, enforced here by construction rather than by
/// a `file_fd == -1` sentinel the way the reference implementation does
/// it.
pub(crate) enum Body {
    Empty,
    Inline {
        bytes: Box<[u8]>,
        len: usize,
        sent: usize,
    },
    File {
        file: File,
        offset: u64,
        remaining: u64,
    },
}

impl Body {
    fn inline(data: &[u8]) -> Self {
        let mut bytes = vec![0u8; data.len()].into_boxed_slice();
        bytes.copy_from_slice(data);
        let len = data.len();
        Body::Inline { bytes, len, sent: 0 }
    }
}

/// One in-flight reply. See SPEC_FULL.md §3 for the field-level invariants
/// this type upholds.
pub(crate) struct Response {
    /// True from the moment a response is prepared until it has been
    /// fully flushed.
    pub(crate) active: bool,
    pub(crate) close_after_send: bool,
    head: Box<[u8; limits::RESPONSE_HEAD_CAP]>,
    head_len: usize,
    head_sent: usize,
    body: Body,
}

/// Failure preparing a response head — always propagated as a `500` with
/// close, per SPEC_FULL.md §4.2 ("Server preparation failure").
pub(crate) struct HeadTooLarge;

impl Response {
    pub(crate) fn new() -> Self {
        Self {
            active: false,
            close_after_send: false,
            head: Box::new([0u8; limits::RESPONSE_HEAD_CAP]),
            head_len: 0,
            head_sent: 0,
            body: Body::Empty,
        }
    }

    /// Drop any open file handle and return to the "nothing prepared"
    /// state. Safe to call unconditionally; dropping `Body::File` closes
    /// the underlying fd exactly once.
    pub(crate) fn reset(&mut self) {
        self.active = false;
        self.close_after_send = false;
        self.head_len = 0;
        self.head_sent = 0;
        self.body = Body::Empty;
    }

    fn write_head(
        &mut self,
        status: StatusCode,
        content_type: &str,
        content_length: usize,
        close_after_send: bool,
    ) -> Result<(), HeadTooLarge> {
        use std::io::Write;

        let mut cursor = &mut self.head[..];
        let written = {
            let start_len = cursor.len();
            let connection = if close_after_send { "close" } else { "keep-alive" };
            let result = write!(
                cursor,
                "{}Content-Length: {}\r\nContent-Type: {}\r\nConnection: {}\r\n\r\n",
                std::str::from_utf8(status.status_line()).unwrap(),
                content_length,
                content_type,
                connection,
            );
            if result.is_err() {
                return Err(HeadTooLarge);
            }
            start_len - cursor.len()
        };

        self.head_len = written;
        self.head_sent = 0;
        self.active = true;
        self.close_after_send = close_after_send;
        Ok(())
    }

    /// Prepare a response whose body fits in memory (≤
    /// [`limits::RESPONSE_BODY_CAP`]). Used by `/healthz`, `/metrics`,
    /// `/echo`, and every canned error body.
    pub(crate) fn prepare_memory(
        &mut self,
        status: StatusCode,
        content_type: &str,
        body: &[u8],
        close_after_send: bool,
    ) -> Result<(), HeadTooLarge> {
        debug_assert!(body.len() <= limits::RESPONSE_BODY_CAP);
        self.write_head(status, content_type, body.len(), close_after_send)?;
        self.body = Body::inline(body);
        Ok(())
    }

    /// Prepare a response whose body streams from an open file handle —
    /// used by `/static/<rel>`. `size` was observed via `stat` at
    /// preparation time and is not re-checked during flush.
    pub(crate) fn prepare_file(
        &mut self,
        status: StatusCode,
        content_type: &str,
        file: File,
        size: u64,
        close_after_send: bool,
    ) -> Result<(), HeadTooLarge> {
        self.write_head(status, content_type, size as usize, close_after_send)?;
        self.body = Body::File {
            file,
            offset: 0,
            remaining: size,
        };
        Ok(())
    }

    /// The not-yet-sent tail of the head buffer. On a freshly prepared
    /// response (before any flush) this is the whole head.
    pub(crate) fn head_remaining(&self) -> &[u8] {
        &self.head[self.head_sent..self.head_len]
    }

    fn head_done(&self) -> bool {
        self.head_sent >= self.head_len
    }

    /// Drive one non-blocking flush attempt against `stream`. Returns
    /// `Ok(true)` once the response (head + body) has been fully written,
    /// `Ok(false)` if the socket reported "would block" before that, and
    /// `Err` on any other I/O error (the caller closes the connection).
    ///
    /// Mirrors `flush_response`'s ordering in the reference
    /// implementation: head, then inline body, then file region, each
    /// drained until would-block or completion.
    pub(crate) async fn flush(
        &mut self,
        stream: &tokio::net::TcpStream,
        bytes_out: &crate::metrics::Metrics,
    ) -> io::Result<bool> {
        while !self.head_done() {
            match stream.try_write(self.head_remaining()) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.head_sent += n;
                    bytes_out.add_bytes_out(n as u64);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        loop {
            match &mut self.body {
                Body::Empty => break,
                Body::Inline { bytes, len, sent } => {
                    if *sent >= *len {
                        break;
                    }
                    match stream.try_write(&bytes[*sent..*len]) {
                        Ok(0) => return Ok(false),
                        Ok(n) => {
                            *sent += n;
                            bytes_out.add_bytes_out(n as u64);
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }
                Body::File { remaining, .. } if *remaining == 0 => break,
                Body::File { .. } => match self.try_send_file_chunk(stream).await {
                    Ok(true) => continue,
                    Ok(false) => return Ok(false),
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(true)
    }

    /// Zero-copy-in-spirit file chunk send: read a bounded chunk from the
    /// file and write it to the socket, advancing offset/remaining. True
    /// `sendfile(2)` is a Linux-only syscall with no safe stable binding
    /// in the crates this workspace already depends on; this keeps the
    /// same state machine (offset/remaining updated per successful
    /// write, would-block leaves state untouched) described as the
    /// portable fallback in SPEC_FULL.md's zero-copy design note.
    async fn try_send_file_chunk(&mut self, stream: &tokio::net::TcpStream) -> io::Result<bool> {
        use tokio::io::AsyncSeekExt;

        const CHUNK: usize = 64 * 1024;
        let Body::File {
            file,
            offset,
            remaining,
        } = &mut self.body
        else {
            unreachable!("called only when body is Body::File");
        };

        let want = (*remaining).min(CHUNK as u64) as usize;
        let mut buf = vec![0u8; want];
        file.seek(io::SeekFrom::Start(*offset)).await?;
        let read = tokio::io::AsyncReadExt::read(file, &mut buf).await?;
        if read == 0 {
            *remaining = 0;
            return Ok(true);
        }

        match stream.try_write(&buf[..read]) {
            Ok(0) => Ok(false),
            Ok(n) => {
                *offset += n as u64;
                *remaining -= n as u64;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(true),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_memory_builds_expected_head() {
        let mut resp = Response::new();
        resp.prepare_memory(StatusCode::Ok, "text/plain", b"ok", false)
            .unwrap();
        assert!(resp.active);
        assert!(!resp.close_after_send);
        let head = String::from_utf8(resp.head[..resp.head_len].to_vec()).unwrap();
        assert_eq!(
            head,
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nContent-Type: text/plain\r\nConnection: keep-alive\r\n\r\n"
        );
    }

    #[test]
    fn close_after_send_reflected_in_connection_header() {
        let mut resp = Response::new();
        resp.prepare_memory(StatusCode::BadRequest, "text/plain", b"bad request\n", true)
            .unwrap();
        let head = String::from_utf8(resp.head[..resp.head_len].to_vec()).unwrap();
        assert!(head.contains("Connection: close\r\n"));
    }

    #[test]
    fn reset_clears_active_and_body() {
        let mut resp = Response::new();
        resp.prepare_memory(StatusCode::Ok, "text/plain", b"ok", false)
            .unwrap();
        resp.reset();
        assert!(!resp.active);
        assert!(matches!(resp.body, Body::Empty));
    }
}
