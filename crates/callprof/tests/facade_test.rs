//! Integration tests for the callprof facade
//!
//! These go through the re-exported API only, the way an application would.

use callprof::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, PartialEq)]
enum OrderError {
    NotFound,
}

#[test]
fn test_instrumented_service_reports_per_route() {
    let profiler = Profiler::new(ProfilerConfig::new().base_prefix("orders::")).unwrap();

    let find = profiler.instrument(
        Operation::new("/orders/{id}", "orders::OrderController", "find"),
        |id: u32| {
            if id == 0 {
                Err(OrderError::NotFound)
            } else {
                Ok(id)
            }
        },
    );
    let audit = profiler.instrument(
        Operation::new("/audit", "audit::Trail", "append"),
        |_: &str| (),
    );

    assert_eq!(find.call(1), Ok(1));
    assert_eq!(find.call(0), Err(OrderError::NotFound));
    audit.call("ignored");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        profiler.gate().call(
            &Operation::new("/orders/{id}", "orders::OrderController", "find"),
            || -> Result<(), ()> { panic!("lost connection") },
        )
    }));
    assert!(outcome.is_err());

    assert!(profiler.queue().wait_idle(WAIT));
    let report = profiler.snapshot();

    let orders = report.route("/orders/{id}").unwrap();
    assert_eq!(orders.count, 3);
    assert_eq!(orders.failures, 2);
    assert!(report.route("/audit").is_none());

    profiler.shutdown().unwrap();
}

#[test]
fn test_stop_and_restart_keeps_aggregates() {
    let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
    let ping = profiler.instrument(Operation::new("/ping", "Health", "ping"), |_: ()| ());

    ping.call(());
    assert!(profiler.queue().wait_idle(WAIT));
    profiler.shutdown().unwrap();
    assert!(!profiler.queue().is_running());

    ping.call(());
    assert!(profiler.queue().wait_idle(WAIT));

    assert_eq!(profiler.queue().runs_started(), 2);
    assert_eq!(profiler.snapshot().route("/ping").unwrap().count, 2);
    profiler.shutdown().unwrap();
}

#[cfg(feature = "layer")]
#[tokio::test]
async fn test_layer_through_facade() {
    use bytes::Bytes;
    use http::{Request, Response, StatusCode};
    use http_body_util::{BodyExt, Full};
    use std::convert::Infallible;
    use tower::{service_fn, Layer, ServiceExt};

    let profiler = Profiler::new(ProfilerConfig::new().service_name("catalog")).unwrap();
    let service = profiler.layer().layer(service_fn(|_: Request<()>| async {
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"[]"))))
    }));

    let response = service
        .clone()
        .oneshot(
            Request::get("/products?page=2")
                .extension(MatchedRoute::new("/products"))
                .body(())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let queue = profiler.queue().clone();
    assert!(tokio::task::spawn_blocking(move || queue.wait_idle(WAIT))
        .await
        .unwrap());

    let report = service
        .oneshot(Request::get("/profiler").body(()).unwrap())
        .await
        .unwrap();
    let body = report.into_body().collect().await.unwrap().to_bytes();
    let snapshot: ProfileSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot.route("/products").unwrap().count, 1);

    profiler.shutdown().unwrap();
}
