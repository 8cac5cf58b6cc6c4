//! Tower middleware measuring every request of an HTTP service.
//!
//! Requests to the report endpoint path are answered by
//! [`ProfilerEndpoint`] and never reach the inner service. Every other
//! request is measured as
//! `Operation { route: route key, owner: service name, operation: method }`
//! when it has a route key and the eligibility rules accept it. The inner
//! service's result is returned unchanged; only `Err` counts as a failed
//! call.
//!
//! # Route keys
//!
//! The store keeps one entry per route, so the key must come from a bounded
//! set. By default it is the [`MatchedRoute`] request extension, the route
//! template a router puts on the request before it reaches this layer.
//! Requests without one are not measured. [`ProfilerLayer::route_with`]
//! installs any other extractor, and [`ProfilerLayer::raw_path_routes`]
//! opts into using the literal request path, which is only safe when the
//! service has no path parameters.

use crate::endpoint::ProfilerEndpoint;
use crate::profiler::Profiler;
use bytes::Bytes;
use callprof_core::{Eligibility, Operation};
use http::request::Parts;
use http::{Request, Response};
use http_body_util::{Either, Full};
use std::future::Future;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Layer;
use tower_service::Service;

/// Response body of a [`ProfilerService`]: the report, or the inner
/// service's own body.
pub type ProfiledBody<B> = Either<Full<Bytes>, B>;

/// Route template of a request, such as `/users/{id}`.
///
/// Inserted into the request extensions by whatever matched the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(String);

impl MatchedRoute {
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

type RouteKeyFn = dyn Fn(&Parts) -> Option<String> + Send + Sync;

/// How a request is turned into the route it is aggregated under.
#[derive(Clone)]
enum RouteKey {
    Matched,
    RawPath,
    Custom(Arc<RouteKeyFn>),
}

impl RouteKey {
    fn extract(&self, parts: &Parts) -> Option<String> {
        match self {
            RouteKey::Matched => parts
                .extensions
                .get::<MatchedRoute>()
                .map(|route| route.as_str().to_string()),
            RouteKey::RawPath => Some(parts.uri.path().to_string()),
            RouteKey::Custom(extract) => extract(parts),
        }
    }
}

impl fmt::Debug for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKey::Matched => f.write_str("Matched"),
            RouteKey::RawPath => f.write_str("RawPath"),
            RouteKey::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Layer producing [`ProfilerService`].
///
/// ```ignore
/// use callprof_extras::{Profiler, ProfilerConfig};
/// use tower::ServiceBuilder;
///
/// let profiler = Profiler::new(ProfilerConfig::new().service_name("shop"))?;
/// let service = ServiceBuilder::new()
///     .layer(profiler.layer())
///     .service(app);
/// ```
#[derive(Debug, Clone)]
pub struct ProfilerLayer {
    profiler: Profiler,
    endpoint: ProfilerEndpoint,
    route_key: RouteKey,
}

impl ProfilerLayer {
    /// Layer measuring with `profiler`, keyed by [`MatchedRoute`].
    pub fn new(profiler: Profiler) -> Self {
        let endpoint = profiler.endpoint();
        Self {
            profiler,
            endpoint,
            route_key: RouteKey::Matched,
        }
    }

    /// Derive the route key with `extract`. Requests it returns `None` for
    /// are not measured.
    ///
    /// ```ignore
    /// let layer = profiler.layer().route_with(|parts| {
    ///     parts.uri.path().strip_prefix("/api").map(str::to_string)
    /// });
    /// ```
    pub fn route_with<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Parts) -> Option<String> + Send + Sync + 'static,
    {
        self.route_key = RouteKey::Custom(Arc::new(extract));
        self
    }

    /// Use the literal request path as the route key.
    ///
    /// Every distinct path gets its own store entry, so only use this for
    /// services whose paths carry no identifiers.
    pub fn raw_path_routes(mut self) -> Self {
        self.route_key = RouteKey::RawPath;
        self
    }

    /// The profiler requests are measured with.
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

impl<S> Layer<S> for ProfilerLayer {
    type Service = ProfilerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProfilerService {
            inner,
            profiler: self.profiler.clone(),
            endpoint: self.endpoint.clone(),
            route_key: self.route_key.clone(),
        }
    }
}

/// Service wrapped by [`ProfilerLayer`].
#[derive(Debug, Clone)]
pub struct ProfilerService<S> {
    inner: S,
    profiler: Profiler,
    endpoint: ProfilerEndpoint,
    route_key: RouteKey,
}

impl<S> ProfilerService<S> {
    fn operation(&self, parts: &Parts) -> Option<Operation> {
        let route = self.route_key.extract(parts)?;
        let operation = Operation::new(
            route,
            self.profiler.config().service(),
            parts.method.as_str(),
        );
        self.profiler
            .rules()
            .is_eligible(&operation)
            .then_some(operation)
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ProfilerService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ProfiledBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        if self.endpoint.matches(&request) {
            let response = self.endpoint.respond(&request).map(Either::Left);
            return Box::pin(async move { Ok(response) });
        }

        let (parts, body) = request.into_parts();
        let operation = self.operation(&parts);
        let request = Request::from_parts(parts, body);
        let gate = self.profiler.gate().clone();

        // The ready service is the one that must handle this request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let future = inner.call(request);

        Box::pin(async move {
            let response = match operation {
                Some(operation) => gate.call_async(&operation, future).await?,
                None => future.await?,
            };
            Ok(response.map(Either::Right))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfilerConfig;
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::{service_fn, ServiceExt};

    async fn hello(_: Request<()>) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(Response::new(Full::new(Bytes::from_static(b"hello"))))
    }

    async fn drained(profiler: &Profiler) {
        let queue = profiler.queue().clone();
        assert!(
            tokio::task::spawn_blocking(move || queue.wait_idle(Duration::from_secs(10)))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_requests_are_measured() {
        let profiler = Profiler::new(ProfilerConfig::new().service_name("shop")).unwrap();
        let service = profiler.layer().layer(service_fn(hello));

        let request = Request::get("/users/1")
            .extension(MatchedRoute::new("/users/{id}"))
            .body(())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);

        drained(&profiler).await;
        let stats = profiler.store().route("/users/{id}").unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.handlers.contains("shop::GET"));
        profiler.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_distinct_paths_share_matched_route() {
        let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
        let service = profiler.layer().layer(service_fn(hello));

        for id in 0..5000 {
            let request = Request::get(format!("/users/{}", id))
                .extension(MatchedRoute::new("/users/{id}"))
                .body(())
                .unwrap();
            service.clone().oneshot(request).await.unwrap();
        }

        drained(&profiler).await;
        assert_eq!(profiler.store().route_count(), 1);
        assert_eq!(profiler.store().route("/users/{id}").unwrap().count, 5000);
        profiler.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_request_without_route_key_is_not_measured() {
        let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
        let service = profiler.layer().layer(service_fn(hello));

        let response = service
            .oneshot(Request::get("/users/1").body(()).unwrap())
            .await
            .unwrap();
        assert!(matches!(response.body(), Either::Right(_)));
        assert_eq!(profiler.queue().runs_started(), 0);
        assert_eq!(profiler.store().route_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_and_raw_path_route_keys() {
        let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
        let by_prefix = profiler.layer().route_with(|parts| {
            parts
                .uri
                .path()
                .split('/')
                .nth(1)
                .map(|segment| format!("/{}/*", segment))
        });
        let raw = profiler.layer().raw_path_routes();

        for path in ["/orders/1", "/orders/2"] {
            let request = Request::get(path).body(()).unwrap();
            by_prefix.layer(service_fn(hello)).oneshot(request).await.unwrap();
        }
        let request = Request::get("/health").body(()).unwrap();
        raw.layer(service_fn(hello)).oneshot(request).await.unwrap();

        drained(&profiler).await;
        assert_eq!(profiler.store().route("/orders/*").unwrap().count, 2);
        assert_eq!(profiler.store().route("/health").unwrap().count, 1);
        assert_eq!(profiler.store().route_count(), 2);
        profiler.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_endpoint_is_intercepted_and_not_measured() {
        let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
        let service = profiler.layer().layer(service_fn(hello));

        let request = Request::get("/profiler").body(()).unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert!(matches!(response.body(), Either::Left(_)));

        assert_eq!(profiler.queue().runs_started(), 0);
        assert_eq!(profiler.store().route_count(), 0);
    }

    #[tokio::test]
    async fn test_ineligible_service_is_not_measured() {
        let profiler = Profiler::new(
            ProfilerConfig::new()
                .service_name("internal")
                .disable_owner("internal"),
        )
        .unwrap();
        let service = profiler.layer().layer(service_fn(hello));

        let request = Request::get("/anything")
            .extension(MatchedRoute::new("/anything"))
            .body(())
            .unwrap();
        let response = service
            .oneshot(request)
            .await
            .unwrap();
        assert!(matches!(response.body(), Either::Right(_)));
        assert_eq!(profiler.queue().runs_started(), 0);
    }
}
