use crate::middleware::*;
use crate::policy::WindowPolicy;
use actix_web::http::StatusCode;
use actix_web::test::{read_body, TestRequest};
use actix_web::{get, test, App, HttpResponse, Responder};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[get("/orders")]
async fn route_orders() -> impl Responder {
    HttpResponse::Ok().body("orders")
}

#[get("/a")]
async fn route_a() -> impl Responder {
    HttpResponse::Ok().body("a")
}

#[get("/ab")]
async fn route_ab() -> impl Responder {
    HttpResponse::Ok().body("ab")
}

/// Counts requests per bucket key in process memory, so the tests can assert
/// on exactly which keys the middleware derived.
#[derive(Clone)]
struct MockStrategy {
    policy: WindowPolicy,
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl MockStrategy {
    fn new(policy: WindowPolicy) -> Self {
        Self {
            policy,
            counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn count(&self, key: &str) -> u64 {
        self.counts.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl crate::strategy::Strategy for MockStrategy {
    fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    async fn has_limit_exceeded(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.to_owned()).or_insert(0);
        *count += 1;
        *count > self.policy.max_requests()
    }
}

fn policy(max_requests: u64) -> WindowPolicy {
    WindowPolicy::new(Duration::from_secs(60), max_requests).unwrap()
}

#[actix_web::test]
async fn test_allow_deny() {
    let strategy = MockStrategy::new(policy(3));
    let limiter = RateLimiter::builder(strategy.clone()).build();
    let app = test::init_service(App::new().service(route_orders).wrap(limiter)).await;
    // First 3 should be allowed
    for _ in 0..3 {
        let response =
            test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    // Fourth should be denied, and still counted
    let response = test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(strategy.count("/orders"), 4);
}

#[actix_web::test]
async fn test_rejection_body() {
    let strategy = MockStrategy::new(policy(1));
    let limiter = RateLimiter::builder(strategy).build();
    let app = test::init_service(App::new().service(route_orders).wrap(limiter)).await;
    test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
    let response = test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value =
        serde_json::from_slice(&read_body(response).await).unwrap();
    // No resourceID unless opted in
    assert_eq!(body, serde_json::json!({ "message": "Too many requests" }));
}

#[actix_web::test]
async fn test_rejection_body_with_resource_id() {
    let strategy = MockStrategy::new(policy(1));
    let limiter = RateLimiter::builder(strategy)
        .include_resource_id(true)
        .build();
    let app = test::init_service(App::new().service(route_orders).wrap(limiter)).await;
    test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
    let response = test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value =
        serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "message": "Too many requests", "resourceID": "/orders" })
    );
}

#[actix_web::test]
async fn test_routes_have_independent_quotas() {
    let strategy = MockStrategy::new(policy(1));
    let limiter = RateLimiter::builder(strategy.clone()).build();
    let app = test::init_service(
        App::new()
            .service(route_a)
            .service(route_ab)
            .wrap(limiter),
    )
    .await;
    // Exhaust the quota for "/a"
    let response = test::call_service(&app, TestRequest::get().uri("/a").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = test::call_service(&app, TestRequest::get().uri("/a").to_request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    // The string-adjacent route "/ab" is unaffected
    let response = test::call_service(&app, TestRequest::get().uri("/ab").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(strategy.count("/a"), 2);
    assert_eq!(strategy.count("/ab"), 1);
}

#[actix_web::test]
async fn test_origin_addresses_have_independent_quotas() {
    let strategy = MockStrategy::new(policy(3).with_origin_address(true));
    let limiter = RateLimiter::builder(strategy.clone()).build();
    let app = test::init_service(App::new().service(route_orders).wrap(limiter)).await;
    let request = |address: &str| {
        TestRequest::get()
            .uri("/orders")
            .peer_addr(format!("{address}:9000").parse().unwrap())
            .to_request()
    };
    // Address A uses up its quota of 3
    for _ in 0..3 {
        let response = test::call_service(&app, request("10.0.0.1")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = test::call_service(&app, request("10.0.0.1")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    // Address B still has its own quota within the same window
    for _ in 0..3 {
        let response = test::call_service(&app, request("10.0.0.2")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(strategy.count("/orders:10.0.0.1"), 4);
    assert_eq!(strategy.count("/orders:10.0.0.2"), 3);
}

#[actix_web::test]
async fn test_origin_ignored_when_disabled() {
    let strategy = MockStrategy::new(policy(1));
    let limiter = RateLimiter::builder(strategy.clone()).build();
    let app = test::init_service(App::new().service(route_orders).wrap(limiter)).await;
    let request = |address: &str| {
        TestRequest::get()
            .uri("/orders")
            .peer_addr(format!("{address}:9000").parse().unwrap())
            .to_request()
    };
    test::call_service(&app, request("10.0.0.1")).await;
    // A different caller shares the same bucket when origin limiting is off
    let response = test::call_service(&app, request("10.0.0.2")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(strategy.count("/orders"), 2);
}
