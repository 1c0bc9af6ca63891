//! End-to-end observation of exchanges through the HTTP server.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use request_observer::config::parse_config;
use request_observer::observation::{
    KeyValues, ObservationRegistry, PathExclusionPredicate, ReceiverContext, ReceiverConvention,
    SamplingPredicate,
};
use request_observer::{HttpServer, RequestObservationAdapter};
use tower::ServiceExt;

use common::{server, spawn_server, StopLog, CONFIG};

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_sync_route_is_observed_once() {
    let log = StopLog::default();
    let response = server(&log).router().oneshot(get("/orders/17")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stopped = log.stopped();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].uri.as_deref(), Some("/orders/{id}"));
    assert_eq!(stopped[0].status, Some(StatusCode::OK));
    assert_eq!(stopped[0].outcome.as_deref(), Some("SUCCESS"));
    assert_eq!(log.started(), vec![stopped[0].id]);
}

#[tokio::test]
async fn test_suspended_route_stops_after_body() {
    let log = StopLog::default();
    let response = server(&log).router().oneshot(get("/orders/17/report")).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(log.started().len(), 1);
    assert!(log.stopped().is_empty());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"report");

    let stopped = log.stopped();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].id, log.started()[0]);
    assert_eq!(stopped[0].uri.as_deref(), Some("/orders/{id}/report"));
    assert_eq!(stopped[0].error_kind, None);
}

#[tokio::test]
async fn test_abandoned_suspended_body_still_stops() {
    let log = StopLog::default();
    let response = server(&log).router().oneshot(get("/orders/17/report")).await.unwrap();
    drop(response);

    let stopped = log.stopped();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].error_kind.as_deref(), Some("abandoned"));
}

#[tokio::test]
async fn test_unmatched_request_is_tagged_not_found() {
    let log = StopLog::default();
    let response = server(&log).router().oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let stopped = log.stopped();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].uri.as_deref(), Some("NOT_FOUND"));
    assert_eq!(stopped[0].outcome.as_deref(), Some("CLIENT_ERROR"));
}

#[tokio::test]
async fn test_method_mismatch_falls_through_to_404() {
    let log = StopLog::default();
    let request = Request::builder()
        .method("POST")
        .uri("/orders/17")
        .body(Body::empty())
        .unwrap();

    let response = server(&log).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_excluded_path_is_not_observed() {
    let log = StopLog::default();
    let registry = ObservationRegistry::builder()
        .handler(log.clone())
        .predicate(PathExclusionPredicate::new(["/health"]))
        .build();
    let router = HttpServer::new(parse_config(CONFIG).unwrap(), registry).router();

    let response = router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(log.started().is_empty());

    router.oneshot(get("/orders/1")).await.unwrap();
    assert_eq!(log.stopped().len(), 1);
}

#[tokio::test]
async fn test_zero_sampling_observes_nothing() {
    let log = StopLog::default();
    let registry = ObservationRegistry::builder()
        .handler(log.clone())
        .predicate(SamplingPredicate::new(0.0))
        .build();
    let router = HttpServer::new(parse_config(CONFIG).unwrap(), registry).router();

    for _ in 0..5 {
        let response = router.clone().oneshot(get("/orders/17/report")).await.unwrap();
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    }
    assert!(log.started().is_empty());
    assert!(log.stopped().is_empty());
}

struct TeamConvention;

impl ReceiverConvention for TeamConvention {
    fn name(&self) -> &str {
        "team.requests"
    }

    fn contextual_name(&self, ctx: &ReceiverContext) -> String {
        format!("team {}", ctx.request().path())
    }

    fn low_cardinality_key_values(&self, ctx: &ReceiverContext) -> KeyValues {
        KeyValues::empty().and("uri", ctx.route().unwrap_or("unrouted"))
    }

    fn high_cardinality_key_values(&self, _ctx: &ReceiverContext) -> KeyValues {
        KeyValues::empty()
    }
}

#[tokio::test]
async fn test_custom_convention_names_the_observation() {
    let log = StopLog::default();
    let adapter = RequestObservationAdapter::with_convention(
        log.registry(),
        Some(Arc::new(TeamConvention)),
    );
    let router = HttpServer::with_adapter(parse_config(CONFIG).unwrap(), adapter).router();

    router.oneshot(get("/nowhere")).await.unwrap();

    let stopped = log.stopped();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].uri.as_deref(), Some("unrouted"));
    assert_eq!(stopped[0].outcome, None);
}

#[tokio::test]
async fn test_concurrent_exchanges_stop_their_own_observation() {
    let log = StopLog::default();
    let router = server(&log).router();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let router = router.clone();
        let path = if i % 2 == 0 {
            format!("/orders/{i}")
        } else {
            format!("/orders/{i}/report")
        };
        tasks.push(tokio::spawn(async move {
            let response = router.oneshot(get(&path)).await.unwrap();
            axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let started: HashSet<_> = log.started().into_iter().collect();
    let stopped: Vec<_> = log.stopped().into_iter().map(|s| s.id).collect();
    assert_eq!(started.len(), 20);
    assert_eq!(stopped.len(), 20);
    assert_eq!(stopped.into_iter().collect::<HashSet<_>>(), started);
}

#[tokio::test]
async fn test_real_listener_round_trip() {
    let log = StopLog::default();
    let (addr, shutdown) = spawn_server(server(&log)).await;
    let client = reqwest::Client::new();

    let sync = client
        .get(format!("http://{addr}/orders/5"))
        .send()
        .await
        .unwrap();
    assert_eq!(sync.status(), 200);
    assert!(sync.headers().contains_key("x-request-id"));
    assert_eq!(sync.text().await.unwrap(), "order");

    let suspended = client
        .get(format!("http://{addr}/orders/5/report"))
        .send()
        .await
        .unwrap();
    assert_eq!(suspended.status(), 202);
    assert_eq!(suspended.text().await.unwrap(), "report");

    let stopped = log.wait_for_stops(2).await;
    assert_eq!(stopped.len(), 2);
    assert!(stopped.iter().all(|s| s.error_kind.is_none()));

    shutdown.trigger();
}

#[tokio::test]
async fn test_head_on_suspended_route_completes_over_listener() {
    let log = StopLog::default();
    let (addr, shutdown) = spawn_server(server(&log)).await;

    let response = reqwest::Client::new()
        .head(format!("http://{addr}/orders/5/report"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let stopped = log.wait_for_stops(1).await;
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].uri.as_deref(), Some("/orders/{id}/report"));
    assert_eq!(stopped[0].outcome.as_deref(), Some("SUCCESS"));
    assert_eq!(stopped[0].error_kind, None);

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_content_suspended_route_completes_over_listener() {
    let log = StopLog::default();
    let (addr, shutdown) = spawn_server(server(&log)).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/orders/5/ack"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let stopped = log.wait_for_stops(1).await;
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].status, Some(StatusCode::NO_CONTENT));
    assert_eq!(stopped[0].error_kind, None);

    shutdown.trigger();
}
