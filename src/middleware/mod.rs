pub mod builder;
#[cfg(test)]
mod tests;

use crate::key::derive_key;
use crate::strategy::Strategy;
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::HttpResponse;
use builder::RateLimiterBuilder;
use futures::future::{ok, LocalBoxFuture, Ready};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

const DENIED_MESSAGE: &str = "Too many requests";

/// Body returned with a 429 response when a request exceeds its quota.
///
/// The message is fixed; it never carries storage errors, bucket keys, or
/// counts. The route being limited is included only when
/// [RateLimiterBuilder::include_resource_id] is enabled.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitRejection {
    pub message: String,
    #[serde(rename = "resourceID", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Rate limit middleware.
///
/// Wraps the inner service: each request is counted under its bucket key and
/// either forwarded untouched, or answered with 429 and a
/// [RateLimitRejection] body without ever reaching the inner service. The
/// wrapper holds no per-request state of its own.
#[derive(Clone)]
pub struct RateLimiter<T> {
    strategy: T,
    include_resource_id: bool,
}

impl<T: Strategy> RateLimiter<T> {
    /// # Arguments
    ///
    /// * `strategy`: A rate limiting algorithm and counter store implementation.
    pub fn builder(strategy: T) -> RateLimiterBuilder<T> {
        RateLimiterBuilder::new(strategy)
    }
}

impl<S, B, T> Transform<S, ServiceRequest> for RateLimiter<T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
    T: Strategy + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = RateLimiterMiddleware<S, T>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimiterMiddleware {
            service: Rc::new(RefCell::new(service)),
            strategy: self.strategy.clone(),
            include_resource_id: self.include_resource_id,
        })
    }
}

pub struct RateLimiterMiddleware<S, T> {
    service: Rc<RefCell<S>>,
    strategy: T,
    include_resource_id: bool,
}

impl<S, B, T> Service<ServiceRequest> for RateLimiterMiddleware<S, T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
    T: Strategy + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let strategy = self.strategy.clone();

        let origin = if strategy.policy().use_origin_address() {
            req.connection_info()
                .realip_remote_addr()
                .map(ToOwned::to_owned)
        } else {
            None
        };
        let key = derive_key(req.path(), origin.as_deref());
        let resource_id = self
            .include_resource_id
            .then(|| req.path().to_owned());

        Box::pin(async move {
            if strategy.has_limit_exceeded(&key).await {
                log::debug!("Rate limit exceeded for {key}, rejecting the request");
                let response = HttpResponse::TooManyRequests().json(RateLimitRejection {
                    message: DENIED_MESSAGE.to_owned(),
                    resource_id,
                });
                return Ok(req.into_response(response).map_into_right_body());
            }
            let service_response = service.call(req).await?;
            Ok(service_response.map_into_left_body())
        })
    }
}
