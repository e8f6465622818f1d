//! HTTP metrics middleware for Prometheus

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::{HTTP_IN_FLIGHT, HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL};

/// Keeps the in-flight gauge right when a request future is dropped mid-way,
/// e.g. by a client disconnect.
struct InFlight {
    labels: [String; 2],
}

impl InFlight {
    fn start(method: &str, route: &str) -> Self {
        let labels = [method.to_string(), route.to_string()];
        HTTP_IN_FLIGHT.with_label_values(&[&labels[0], &labels[1]]).inc();
        Self { labels }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        HTTP_IN_FLIGHT
            .with_label_values(&[&self.labels[0], &self.labels[1]])
            .dec();
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

pub async fn http_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    // Scrapes would otherwise count themselves
    if route == "/metrics" {
        return next.run(req).await;
    }

    let _in_flight = InFlight::start(&method, &route);
    let start = Instant::now();
    let response = next.run(req).await;

    let class = status_class(response.status().as_u16());
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), route.as_str(), class])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), route.as_str(), class])
        .observe(start.elapsed().as_secs_f64());

    response
}
