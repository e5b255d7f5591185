//! Core HTTP/1.1 protocol types.
//!
//! This server only ever speaks one wire version and answers with a closed
//! set of status codes, so the enums below are deliberately small — a
//! general-purpose HTTP library would keep the full IANA status registry
//! and an open `Method`, but nothing here ever needs either.

use crate::limits;

/// HTTP/1.1, the only version this server accepts on the request line.
///
/// The request line's version field is checked against this exactly
/// (`HTTP/1.0` and anything else is a `505`); there is no `Version` enum
/// because there is only ever one accepted value.
pub(crate) const SUPPORTED_VERSION: &[u8] = b"HTTP/1.1";

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes this server is able to emit.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            /// The numeric code, e.g. `404`.
            pub const fn as_u16(&self) -> u16 {
                match self { $( StatusCode::$name => $num, )+ }
            }

            /// The reason phrase, e.g. `"Not Found"`.
            pub const fn reason(&self) -> &'static str {
                match self { $( StatusCode::$name => $str, )+ }
            }

            /// The status line, e.g. `b"HTTP/1.1 404 Not Found\r\n"`.
            pub(crate) const fn status_line(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC9110, Section 15.5.14](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.14)]
    PayloadTooLarge = (413, "Payload Too Large");
    /// [[RFC9110, Section 15.5.15](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.15)]
    UriTooLong = (414, "URI Too Long");
    /// [[RFC6585, Section 5](https://datatracker.ietf.org/doc/html/rfc6585#section-5)]
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");
    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.6)]
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

/// A header name/value pair, borrowed from the connection's input buffer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Header<'a> {
    pub(crate) name: &'a [u8],
    pub(crate) value: &'a [u8],
}

/// The headers of one parsed request, plus the two fields the parser gives
/// special treatment (`Content-Length`, `Connection: close`).
#[derive(Debug, Clone)]
pub(crate) struct HeaderList<'a> {
    pub(crate) headers: Vec<Header<'a>>,
    pub(crate) content_length: usize,
    pub(crate) connection_close: bool,
}

impl<'a> HeaderList<'a> {
    pub(crate) fn new() -> Self {
        Self {
            headers: Vec::with_capacity(limits::MAX_HEADERS),
            content_length: 0,
            connection_close: false,
        }
    }

    /// Case-insensitive lookup, first match wins — mirrors
    /// `util_ascii_casecmp` comparisons in the reference router.
    pub(crate) fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value)
    }
}
