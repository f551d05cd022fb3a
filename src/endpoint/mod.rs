//! Component-compilation endpoint.
//!
//! Browsers fetch client modules from `GET <client_module_path>?c=<componentId>`.
//! [`ClientModuleEndpoint`] answers such a request for whatever HTTP layer
//! hosts it: it decodes the query, rejects ids that could escape the project
//! root before any path is built, and compiles the component for the client.
//!
//! | Outcome                               | Status |
//! |---------------------------------------|--------|
//! | module compiled                       | 200    |
//! | `c` missing, or id invalid            | 400    |
//! | component file does not exist         | 404    |
//! | parse, compile or other failure       | 500    |

use tracing::{debug, warn};

use crate::constants::CLIENT_MODULE_QUERY_PARAM;
use crate::engine::Engine;

/// Content type of a successful response.
pub const JAVASCRIPT_CONTENT_TYPE: &str = "text/javascript; charset=utf-8";
/// Content type of an error response.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// What the HTTP layer should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header value
    pub content_type: &'static str,
    /// Response body
    pub body: String,
}

impl EndpointResponse {
    fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT_CONTENT_TYPE,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Serves client modules for one [`Engine`].
#[derive(Debug, Clone, Copy)]
pub struct ClientModuleEndpoint<'a> {
    engine: &'a Engine,
}

impl<'a> ClientModuleEndpoint<'a> {
    /// Serve modules compiled by `engine`.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
        }
    }

    /// Answer a request whose query string is `query`.
    ///
    /// `query` may be the bare query (`c=pages%2Findex`), start with `?`, or be
    /// the whole request target (`/_islet/module?c=pages%2Findex`).
    pub async fn handle(&self, query: &str) -> EndpointResponse {
        let query = query.split_once('?').map_or(query, |(_, q)| q);
        let Some(id) = query_param(query, CLIENT_MODULE_QUERY_PARAM) else {
            return EndpointResponse::error(
                400,
                format!("missing '{CLIENT_MODULE_QUERY_PARAM}' query parameter"),
            );
        };

        match self.engine.compile_for_client(&id).await {
            Ok(body) => {
                debug!(target: "islet::endpoint", "served client module for '{}'", id);
                EndpointResponse {
                    status: 200,
                    content_type: JAVASCRIPT_CONTENT_TYPE,
                    body,
                }
            }
            Err(e) => {
                let status = e.status_code();
                warn!(target: "islet::endpoint", "client module for '{}' failed ({}): {}", id, status, e);
                EndpointResponse::error(status, e.to_string())
            }
        }
    }
}

/// URL the browser fetches the client module of component `id` from.
#[must_use]
pub fn module_url(client_module_path: &str, id: &str) -> String {
    format!("{client_module_path}?{CLIENT_MODULE_QUERY_PARAM}={}", percent_encode(id))
}

/// Value of the first `name` parameter of `query`, decoded.
#[must_use]
pub fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key) == name).then(|| percent_decode(value))
        })
        .next()
}

/// Percent-encode everything but RFC 3986 unreserved characters.
#[must_use]
pub fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Decode `%XX` escapes and `+` as space. Malformed escapes are kept as
/// written; invalid UTF-8 is replaced.
#[must_use]
pub fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok());
                if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(value);
                    i += 3;
                    continue;
                }
                out.push(b'%');
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
