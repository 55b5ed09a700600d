//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Combine base path, route suffix and verbs into route keys
//! - Build the binder list of every route
//! - Look up the action for a request
//!
//! # Design Decisions
//! - Immutable after construction (shared across requests without locks)
//! - O(1) lookup via HashMap keyed on (path, verb)
//! - Configuration mistakes fail `build()`, never a request
//! - Duplicate keys are an error unless overriding is explicitly allowed

use http::Method;
use mime::Mime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::matcher::{normalize, RouteMatching};
use super::service::{Handler, Service};
use crate::binding::{binder_for, BindingSource, DirectKind, ParameterBinder};
use crate::error::BuildError;

/// The `(path, verb)` pair selecting an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    path: String,
    method: Method,
}

impl RouteKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// How one positional argument is produced.
pub enum Slot {
    Bind(ParameterBinder),
    Direct(DirectKind),
}

/// Everything needed to serve one route: binders, output type and handler.
pub struct Action {
    path: String,
    slots: Vec<Slot>,
    produces: Option<Mime>,
    handler: Handler,
}

impl Action {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn produces(&self) -> Option<&Mime> {
        self.produces.as_ref()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Immutable mapping from route key to action.
pub struct RouteTable {
    routes: HashMap<RouteKey, Arc<Action>>,
    matching: RouteMatching,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// The key a request resolves to.
    pub fn key_for(&self, method: &Method, path: &str) -> RouteKey {
        RouteKey::new(method.clone(), self.matching.key_path(path))
    }

    pub fn get(&self, key: &RouteKey) -> Option<&Arc<Action>> {
        self.routes.get(key)
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Option<&Arc<Action>> {
        self.get(&self.key_for(method, path))
    }

    /// Registered keys sorted by path, then verb.
    pub fn routes(&self) -> Vec<&RouteKey> {
        let mut keys: Vec<&RouteKey> = self.routes.keys().collect();
        keys.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });
        keys
    }

    pub fn matching(&self) -> RouteMatching {
        self.matching
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects services, then produces a `RouteTable` once.
#[derive(Default)]
pub struct RouteTableBuilder {
    matching: RouteMatching,
    allow_override: bool,
    services: Vec<Service>,
}

impl RouteTableBuilder {
    pub fn matching(mut self, matching: RouteMatching) -> Self {
        self.matching = matching;
        self
    }

    /// Let a later registration replace an earlier one with the same key.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn services(mut self, services: impl IntoIterator<Item = Service>) -> Self {
        self.services.extend(services);
        self
    }

    pub fn build(self) -> Result<RouteTable, BuildError> {
        let mut routes: HashMap<RouteKey, Arc<Action>> = HashMap::new();

        for service in self.services {
            let (base_path, service_routes) = service.into_parts();
            check_path(&base_path, false)?;

            for route in service_routes {
                check_path(&route.path, true)?;
                let path = normalize(&format!("{}{}", base_path, route.path));

                if route.methods.is_empty() {
                    return Err(BuildError::NoVerbs { path });
                }
                let Some(handler) = route.handler else {
                    return Err(BuildError::MissingHandler { path });
                };

                let mut slots = Vec::with_capacity(route.params.len());
                for (index, param) in route.params.iter().enumerate() {
                    let slot = match param.source() {
                        BindingSource::Direct(kind) => Slot::Direct(*kind),
                        _ => Slot::Bind(binder_for(param).map_err(|e| {
                            BuildError::UnsupportedParameter {
                                route: path.clone(),
                                index,
                                reason: e.to_string(),
                            }
                        })?),
                    };
                    slots.push(slot);
                }

                let action = Arc::new(Action {
                    path: path.clone(),
                    slots,
                    produces: route.produces,
                    handler,
                });

                let mut methods: Vec<Method> = Vec::with_capacity(route.methods.len());
                for method in route.methods {
                    if !methods.contains(&method) {
                        methods.push(method);
                    }
                }

                for method in methods {
                    if !self.matching.can_match(&path) {
                        return Err(BuildError::UnreachableRoute { method, path });
                    }
                    let key = RouteKey::new(method, path.clone());
                    if routes.contains_key(&key) {
                        if !self.allow_override {
                            return Err(BuildError::DuplicateRoute {
                                method: key.method,
                                path: key.path,
                            });
                        }
                        tracing::warn!(
                            route = %key,
                            "Route registered twice, keeping the later one"
                        );
                    }
                    tracing::debug!(route = %key, params = action.slots.len(), "Route registered");
                    routes.insert(key, Arc::clone(&action));
                }
            }
        }

        tracing::info!(routes = routes.len(), matching = ?self.matching, "Route table built");
        Ok(RouteTable {
            routes,
            matching: self.matching,
        })
    }
}

/// Base paths must start with `/`; route suffixes may also be empty.
fn check_path(path: &str, allow_empty: bool) -> Result<(), BuildError> {
    if path.is_empty() && allow_empty {
        return Ok(());
    }
    if !path.starts_with('/') {
        return Err(BuildError::InvalidPath {
            path: path.to_string(),
            reason: "must start with `/`",
        });
    }
    if path.contains(['?', '#']) {
        return Err(BuildError::InvalidPath {
            path: path.to_string(),
            reason: "must not contain a query or fragment",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BasicType, Param, ParamType};
    use crate::dispatch::Reply;
    use crate::routing::Route;

    fn ok_route(route: Route) -> Route {
        route.handler(|_| Ok(Reply::Empty))
    }

    #[test]
    fn test_base_and_suffix_are_combined() {
        let table = RouteTable::builder()
            .service(
                Service::new("/test")
                    .route(ok_route(Route::post("/invoke")))
                    .route(ok_route(Route::get(""))),
            )
            .build()
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.resolve(&Method::POST, "/test/invoke").is_some());
        assert!(table.resolve(&Method::GET, "/test").is_some());
        assert!(table.resolve(&Method::GET, "/test/invoke").is_none());
    }

    #[test]
    fn test_one_route_many_verbs_shares_action() {
        let table = RouteTable::builder()
            .service(Service::new("/items").route(ok_route(
                Route::new([Method::PUT, Method::POST, Method::PUT], "/save"),
            )))
            .build()
            .unwrap();

        assert_eq!(table.len(), 2);
        let put = table.resolve(&Method::PUT, "/items/save").unwrap();
        let post = table.resolve(&Method::POST, "/items/save").unwrap();
        assert!(Arc::ptr_eq(put, post));
    }

    #[test]
    fn test_duplicate_route_fails() {
        let result = RouteTable::builder()
            .service(Service::new("/a").route(ok_route(Route::get("/b"))))
            .service(Service::new("/a/b").route(ok_route(Route::get(""))))
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateRoute { .. })));
    }

    #[test]
    fn test_duplicate_route_can_override() {
        let table = RouteTable::builder()
            .allow_override(true)
            .service(Service::new("/a").route(ok_route(Route::get("/b"))))
            .service(
                Service::new("/a").route(
                    Route::get("/b")
                        .param(Param::request())
                        .handler(|_| Ok(Reply::Empty)),
                ),
            )
            .build()
            .unwrap();
        let action = table.resolve(&Method::GET, "/a/b").unwrap();
        assert_eq!(action.slots().len(), 1);
    }

    #[test]
    fn test_deep_route_rejected_under_segment_matching() {
        let service = || Service::new("/a").route(ok_route(Route::get("/b/c")));

        let result = RouteTable::builder().service(service()).build();
        assert!(matches!(result, Err(BuildError::UnreachableRoute { .. })));

        let table = RouteTable::builder()
            .matching(RouteMatching::Full)
            .service(service())
            .build()
            .unwrap();
        assert!(table.resolve(&Method::GET, "/a/b/c").is_some());
        assert!(table.resolve(&Method::GET, "/a/b").is_none());
    }

    #[test]
    fn test_unsupported_parameter_fails_build() {
        #[derive(serde::Deserialize)]
        struct Filter {}

        let result = RouteTable::builder()
            .service(Service::new("/a").route(ok_route(
                Route::get("/b")
                    .param(Param::query("q", BasicType::Text))
                    .param(Param::query("filter", ParamType::structured::<Filter>())),
            )))
            .build();
        match result {
            Err(BuildError::UnsupportedParameter { route, index, .. }) => {
                assert_eq!(route, "/a/b");
                assert_eq!(index, 1);
            }
            _ => panic!("expected UnsupportedParameter"),
        }
    }

    #[test]
    fn test_invalid_declarations() {
        let no_handler = RouteTable::builder()
            .service(Service::new("/a").route(Route::get("/b")))
            .build();
        assert!(matches!(no_handler, Err(BuildError::MissingHandler { .. })));

        let no_verbs = RouteTable::builder()
            .service(Service::new("/a").route(ok_route(Route::new(Vec::<Method>::new(), "/b"))))
            .build();
        assert!(matches!(no_verbs, Err(BuildError::NoVerbs { .. })));

        let bad_base = RouteTable::builder()
            .service(Service::new("a").route(ok_route(Route::get("/b"))))
            .build();
        assert!(matches!(bad_base, Err(BuildError::InvalidPath { .. })));

        let bad_suffix = RouteTable::builder()
            .service(Service::new("/a").route(ok_route(Route::get("b"))))
            .build();
        assert!(matches!(bad_suffix, Err(BuildError::InvalidPath { .. })));
    }

    #[test]
    fn test_binder_count_matches_params() {
        let table = RouteTable::builder()
            .service(Service::new("/a").route(ok_route(
                Route::post("/b")
                    .param(Param::header("x-id", BasicType::Long))
                    .param(Param::response())
                    .param(Param::body(BasicType::Text)),
            )))
            .build()
            .unwrap();
        let action = table.resolve(&Method::POST, "/a/b").unwrap();
        assert_eq!(action.slots().len(), 3);
        assert!(matches!(action.slots()[1], Slot::Direct(DirectKind::Response)));
    }

    #[test]
    fn test_routes_are_listed_sorted() {
        let table = RouteTable::builder()
            .service(
                Service::new("/z")
                    .route(ok_route(Route::get("")))
                    .route(ok_route(Route::post(""))),
            )
            .service(Service::new("/a").route(ok_route(Route::get(""))))
            .build()
            .unwrap();
        let listed: Vec<String> = table.routes().iter().map(|k| k.to_string()).collect();
        assert_eq!(listed, vec!["GET /a", "GET /z", "POST /z"]);
    }
}
