//! Request logic attached to pages.
//!
//! A page may come with logic that runs before it renders and fills the
//! request's [`AssignmentStore`]. Logic is either a plain async function
//! ([`PageLogic::Function`]) or an object implementing [`PageHandler`]
//! ([`PageLogic::Object`]); both run the same way.
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use islet::page::PageLogic;
//!
//! let logic = PageLogic::function(|request, store| {
//!     async move {
//!         store.assign("title", format!("Hello from {}", request.path));
//!         Ok(())
//!     }
//!     .boxed()
//! });
//! ```

use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::render::document::escape_html;
use crate::store::AssignmentStore;

/// Content type of every page response.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// What the router knows about the request being served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Parameters captured by the route (`/users/[id]` → `id`)
    pub params: BTreeMap<String, String>,
    /// Decoded query parameters
    pub query: BTreeMap<String, String>,
}

impl RequestContext {
    /// A `GET` request for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a route parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

/// Page logic written as an object with a `handle` method.
pub trait PageHandler: Send + Sync {
    /// Populate `store` for `request`.
    fn handle<'a>(
        &'a self,
        request: &'a RequestContext,
        store: &'a mut AssignmentStore,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Signature of function-style page logic.
pub type HandlerFn = dyn for<'a> Fn(&'a RequestContext, &'a mut AssignmentStore) -> BoxFuture<'a, anyhow::Result<()>>
    + Send
    + Sync;

/// Logic that runs before a page renders.
pub enum PageLogic {
    /// A plain async function
    Function(Box<HandlerFn>),
    /// An object implementing [`PageHandler`]
    Object(Arc<dyn PageHandler>),
}

impl fmt::Debug for PageLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("PageLogic::Function"),
            Self::Object(_) => f.write_str("PageLogic::Object"),
        }
    }
}

impl PageLogic {
    /// Wrap an async function.
    pub fn function<F>(handler: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext, &'a mut AssignmentStore) -> BoxFuture<'a, anyhow::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self::Function(Box::new(handler))
    }

    /// Wrap a handler object.
    pub fn object(handler: impl PageHandler + 'static) -> Self {
        Self::Object(Arc::new(handler))
    }

    /// Run the logic.
    ///
    /// # Errors
    ///
    /// Whatever the logic returns.
    pub async fn run(&self, request: &RequestContext, store: &mut AssignmentStore) -> anyhow::Result<()> {
        match self {
            Self::Function(handler) => handler(request, store).await,
            Self::Object(handler) => handler.handle(request, store).await,
        }
    }
}

/// A finished page: status and HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header value
    pub content_type: &'static str,
    /// HTML body
    pub body: String,
}

impl PageResponse {
    /// A 200 response.
    #[must_use]
    pub fn ok(body: String) -> Self {
        Self {
            status: 200,
            content_type: HTML_CONTENT_TYPE,
            body,
        }
    }

    /// An error page for `status` showing `message`.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: HTML_CONTENT_TYPE,
            body: error_page(status, message),
        }
    }
}

/// Reason phrase for the statuses the engine produces.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

/// The HTML document shown when a page fails.
#[must_use]
pub fn error_page(status: u16, message: &str) -> String {
    let reason = reason_phrase(status);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{status} {reason}</title>\n</head>\n<body>\n<h1>{status} {reason}</h1>\n<pre>{}</pre>\n</body>\n</html>\n",
        escape_html(message)
    )
}
