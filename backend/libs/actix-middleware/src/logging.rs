//! Request logging middleware
//!
//! One structured line per completed request. Register it inside
//! `CorrelationIdMiddleware` so the correlation id is available.

use crate::client_ip::client_address;
use crate::correlation_id::CorrelationId;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;

#[derive(Clone, Default)]
pub struct Logging;

impl<S, B> Transform<S, ServiceRequest> for Logging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggingService { service }))
    }
}

pub struct LoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for LoggingService<S>
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
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();
        let client = client_address(&req);
        let correlation_id = req
            .extensions()
            .get::<CorrelationId>()
            .map(|c| c.0.clone())
            .unwrap_or_default();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &res {
                Ok(res) => {
                    let status = res.status().as_u16();
                    if status >= 500 {
                        tracing::error!(
                            method = %method,
                            path = %path,
                            client = %client,
                            correlation_id = %correlation_id,
                            status,
                            duration_ms,
                            "HTTP request failed"
                        );
                    } else {
                        tracing::info!(
                            method = %method,
                            path = %path,
                            client = %client,
                            correlation_id = %correlation_id,
                            status,
                            duration_ms,
                            "HTTP request completed"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        method = %method,
                        path = %path,
                        client = %client,
                        correlation_id = %correlation_id,
                        error = %e,
                        duration_ms,
                        "HTTP request errored"
                    );
                }
            }

            res
        })
    }
}
