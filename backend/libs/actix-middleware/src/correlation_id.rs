//! Request correlation IDs
//!
//! Reuses an inbound `X-Correlation-ID` header or generates a UUID v4, stores it
//! in request extensions and echoes it on the response.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const MAX_CORRELATION_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

#[derive(Clone, Default)]
pub struct CorrelationIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CorrelationIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CorrelationIdMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationIdMiddlewareService { service }))
    }
}

pub struct CorrelationIdMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Inbound values must be valid header values so they can be echoed back.
        let header_value = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .filter(|h| !h.is_empty() && h.len() <= MAX_CORRELATION_ID_LEN)
            .and_then(|h| h.to_str().ok().map(|s| (s.to_string(), h.clone())));

        let (correlation_id, header_value) = match header_value {
            Some(pair) => pair,
            None => {
                let id = Uuid::new_v4().to_string();
                match HeaderValue::from_str(&id) {
                    Ok(value) => (id, value),
                    Err(_) => return Box::pin(self.service.call(req)),
                }
            }
        };

        req.extensions_mut()
            .insert(CorrelationId(correlation_id));

        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;
            res.headers_mut()
                .insert(HeaderName::from_static(CORRELATION_ID_HEADER), header_value);
            Ok(res)
        })
    }
}

/// Correlation ID of the current request, if the middleware ran.
pub fn get_correlation_id(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<CorrelationId>().map(|c| c.0.clone())
}
