use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static SERVER_ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn increment_request_count() {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Counts a response with status >= 400; 5xx also feed `http_server_errors_total`.
pub fn record_error_status(status: u16) {
    if status >= 400 {
        ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }
    if status >= 500 {
        SERVER_ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub http_server_errors_total: u64,
}

pub fn snapshot() -> MetricsResponse {
    MetricsResponse {
        http_requests_total: REQUEST_COUNT.load(Ordering::Relaxed),
        http_errors_total: ERROR_COUNT.load(Ordering::Relaxed),
        http_server_errors_total: SERVER_ERROR_COUNT.load(Ordering::Relaxed),
    }
}

fn render_prometheus(metrics: &MetricsResponse) -> String {
    format!(
        "# HELP http_requests_total Total number of HTTP requests\n\
         # TYPE http_requests_total counter\n\
         http_requests_total {}\n\
         \n\
         # HELP http_errors_total Total number of HTTP responses with status >= 400\n\
         # TYPE http_errors_total counter\n\
         http_errors_total {}\n\
         \n\
         # HELP http_server_errors_total Total number of HTTP responses with status >= 500\n\
         # TYPE http_server_errors_total counter\n\
         http_server_errors_total {}\n",
        metrics.http_requests_total, metrics.http_errors_total, metrics.http_server_errors_total
    )
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Prometheus counters", content_type = "text/plain")
    )
)]
pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render_prometheus(&snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_format() {
        let text = render_prometheus(&MetricsResponse {
            http_requests_total: 12,
            http_errors_total: 3,
            http_server_errors_total: 1,
        });

        assert!(text.contains("# TYPE http_requests_total counter\nhttp_requests_total 12\n"));
        assert!(text.contains("http_errors_total 3\n"));
        assert!(text.ends_with("http_server_errors_total 1\n"));
    }

    #[test]
    fn test_counters_only_grow() {
        let before = snapshot();
        increment_request_count();
        record_error_status(404);
        record_error_status(502);
        record_error_status(200);
        let after = snapshot();

        assert!(after.http_requests_total >= before.http_requests_total + 1);
        assert!(after.http_errors_total >= before.http_errors_total + 2);
        assert!(after.http_server_errors_total >= before.http_server_errors_total + 1);
    }
}
