//! Prometheus metrics
//!
//! Metrics live on an owned `Registry` built at startup; `/metrics` renders it.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, Ready};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

pub struct HttpMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    authz_decisions_total: IntCounterVec,
}

impl HttpMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency").buckets(
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            ),
            &["method", "path", "status"],
        )?;
        let authz_decisions_total = IntCounterVec::new(
            Opts::new(
                "authz_decisions_total",
                "Authorization pipeline decisions by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(authz_decisions_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            authz_decisions_total,
        })
    }

    /// Count one pipeline decision (`granted`, `denied`, `unauthenticated`, `rate_limited`).
    pub fn record_decision(&self, outcome: &str) {
        self.authz_decisions_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn decision_count(&self, outcome: &str) -> u64 {
        self.authz_decisions_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Render all metrics in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub struct MetricsMiddleware {
    metrics: Arc<HttpMetrics>,
}

impl MetricsMiddleware {
    pub fn new(metrics: Arc<HttpMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = MetricsMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
    metrics: Arc<HttpMetrics>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let metrics = self.metrics.clone();
        let start = Instant::now();
        let method = req.method().to_string();
        // Route pattern keeps label cardinality bounded.
        let path = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());

        Box::pin(async move {
            let res = service.call(req).await?;
            let status = res.status().as_u16().to_string();
            let duration = start.elapsed().as_secs_f64();

            metrics
                .requests_total
                .with_label_values(&[&method, &path, &status])
                .inc();
            metrics
                .request_duration_seconds
                .with_label_values(&[&method, &path, &status])
                .observe(duration);

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions_are_counted_and_rendered() {
        let metrics = HttpMetrics::new().unwrap();
        metrics.record_decision("granted");
        metrics.record_decision("granted");
        metrics.record_decision("denied");

        assert_eq!(metrics.decision_count("granted"), 2);
        assert_eq!(metrics.decision_count("denied"), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("authz_decisions_total"));
    }
}
