//! Fixed resource caps for one connection.
//!
//! These numbers are load-bearing: every buffer in the connection and
//! response path is sized from them exactly once, never re-derived from a
//! runtime configuration value. Keeping them as `const`s (rather than a
//! configurable struct, unlike the knobs in [`crate::config`]) is what lets
//! the rest of the crate allocate fixed-size buffers instead of `Vec`s that
//! grow under load.

/// Maximum bytes buffered from a client before the connection is rejected
/// with `413` and drained.
pub const INPUT_BUFFER_CAP: usize = 256 * 1024;

/// Maximum size of an inline (non-file) response body.
pub const RESPONSE_BODY_CAP: usize = 128 * 1024;

/// Maximum size of a serialized response head (status line + headers + blank line).
pub const RESPONSE_HEAD_CAP: usize = 2048;

/// Maximum accepted `Content-Length`. Tied to [`RESPONSE_BODY_CAP`] so the
/// `/echo` endpoint's cap and the parser's cap can never drift apart (see
/// SPEC_FULL.md open question 3).
pub const MAX_CONTENT_LENGTH: usize = RESPONSE_BODY_CAP;

/// Maximum length of the request line (method + SP + path + SP + version),
/// measured before any per-field cap is applied.
pub const MAX_REQUEST_LINE_LEN: usize = 4096;

pub const MAX_METHOD_LEN: usize = 15;
pub const MAX_PATH_LEN: usize = 2047;
pub const MAX_VERSION_LEN: usize = 15;

pub const MAX_HEADER_NAME_LEN: usize = 63;
pub const MAX_HEADER_VALUE_LEN: usize = 1023;
pub const MAX_HEADERS: usize = 64;

/// Scratch buffer size used to discard overflow bytes once a connection's
/// input buffer is full and no response is active yet (see the read path
/// in SPEC_FULL.md §4.3).
pub const OVERFLOW_SCRATCH_LEN: usize = 4096;

/// Upper bound on the `-s`/`--static-root` CLI value, in bytes.
pub const MAX_STATIC_ROOT_LEN: usize = 1024;
