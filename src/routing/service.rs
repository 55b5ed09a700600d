//! Route declaration surface.
//!
//! Services describe their routes with a builder instead of annotations:
//!
//! ```
//! use rpc_dispatch::binding::{BasicType, Param};
//! use rpc_dispatch::dispatch::Reply;
//! use rpc_dispatch::routing::{Route, Service};
//!
//! let service = Service::new("/test").route(
//!     Route::post("/invoke")
//!         .param(Param::body(BasicType::Text))
//!         .handler(|call| {
//!             let sql: String = call.arg(0)?;
//!             Ok(Reply::text(sql))
//!         }),
//! );
//! assert_eq!(service.routes().len(), 1);
//! ```

use http::Method;
use mime::Mime;
use std::sync::Arc;

use crate::binding::Param;
use crate::dispatch::{Call, Reply};

/// Handler invoked with the bound arguments of one request.
///
/// Returning a `WebFault` (through `anyhow`) sends its status and message;
/// any other error becomes a generic 500.
pub type Handler = Arc<dyn Fn(&mut Call<'_>) -> anyhow::Result<Reply> + Send + Sync>;

/// A group of routes sharing a base path.
pub struct Service {
    base_path: String,
    routes: Vec<Route>,
}

impl Service {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            routes: Vec::new(),
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Route>) {
        (self.base_path, self.routes)
    }
}

/// One handler method: verbs, path suffix, output media type and parameters.
pub struct Route {
    pub(crate) methods: Vec<Method>,
    pub(crate) path: String,
    pub(crate) produces: Option<Mime>,
    pub(crate) params: Vec<Param>,
    pub(crate) handler: Option<Handler>,
}

impl Route {
    /// `path` is appended to the service base path; it may be empty.
    pub fn new(methods: impl IntoIterator<Item = Method>, path: impl Into<String>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            path: path.into(),
            produces: None,
            params: Vec::new(),
            handler: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new([Method::GET], path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new([Method::POST], path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new([Method::PUT], path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new([Method::DELETE], path)
    }

    /// Also respond to `method`.
    pub fn also(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn produces(mut self, media_type: Mime) -> Self {
        self.produces = Some(media_type);
        self
    }

    /// Declare the next positional parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}
