use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::services::metrics;

/// Label used for requests no route matched.
pub const UNMATCHED_PATH: &str = "unmatched";

/// Route template of the request, never the raw path.
fn path_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = path_label(&req);

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    if let Some(m) = metrics::metrics() {
        m.http_requests_total
            .with_label_values(&[&method, &path, &status])
            .inc();
        m.http_request_duration_seconds
            .with_label_values(&[&method, &path, &status])
            .observe(duration);
    }

    response
}
