//! Admin HTTP endpoints against an in-memory store

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use lcr_core::{Carrier, CarrierId, LcrConfig, MemoryRouteStore, Route, RoutingService};
use lcr_server::admin::create_router;

fn service() -> Arc<RoutingService> {
    let store = MemoryRouteStore::new();
    store.insert_carrier(Carrier::new(CarrierId(1), "one").with_trunk_group("tg1", "10.0.0.1", 5060, 1));
    store.insert_route(Route::new(1, CarrierId(1), "1416", 0.01));
    Arc::new(RoutingService::new(LcrConfig::default(), Arc::new(store)).unwrap())
}

async fn call(service: &Arc<RoutingService>, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = create_router(Arc::clone(service))
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let service = service();
    let (status, body) = call(&service, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["platform"], "METASWITCH");
}

#[tokio::test]
async fn test_cache_stats_and_reset() {
    let service = service();
    service.resolver().resolve("14165551234", None).await.unwrap();
    service.caches().carrier(CarrierId(1)).await.unwrap();

    let (status, body) = call(&service, "GET", "/caches").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["caches"][0]["name"], "carriers");
    assert_eq!(body["caches"][0]["entries"], 1);
    assert_eq!(body["caches"][1]["name"], "routes");
    assert_eq!(body["caches"][1]["entries"], 1);

    let (status, body) = call(&service, "POST", "/caches/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], true);

    let (_, body) = call(&service, "GET", "/caches").await;
    assert_eq!(body["caches"].as_array().map(Vec::len), Some(4));
    assert_eq!(service.caches().routes("14165551234").await.unwrap().len(), 1);
}
