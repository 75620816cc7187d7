//! Request logging middleware configuration

use http::{Request, Response};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, MakeSpan, OnFailure, OnRequest, OnResponse, TraceLayer,
};
use tracing::{info_span, Span};
use uuid::Uuid;

/// Opens the per-request span and logs the start of each request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "http_request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
            query = ?request.uri().query(),
        )
    }
}

impl<B> OnRequest<B> for RequestSpan {
    fn on_request(&mut self, request: &Request<B>, _span: &Span) {
        tracing::debug!(
            "started processing request {} {}",
            request.method(),
            request.uri().path()
        );
    }
}

/// Logs response status and latency at a level matching the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseLog;

impl<B> OnResponse<B> for ResponseLog {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis() as u64;

        if status.is_success() {
            tracing::info!(status = status.as_u16(), latency_ms, "request completed");
        } else if status.as_u16() == 422 {
            tracing::info!(status = status.as_u16(), latency_ms, "request failed validation");
        } else if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), latency_ms, "client error response");
        } else {
            tracing::error!(status = status.as_u16(), latency_ms, "server error response");
        }
    }
}

impl OnFailure<ServerErrorsFailureClass> for ResponseLog {
    fn on_failure(&mut self, error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        tracing::error!(
            latency_ms = latency.as_millis() as u64,
            error = ?error,
            "request failed"
        );
    }
}

pub type LoggingLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    RequestSpan,
    ResponseLog,
    DefaultOnBodyChunk,
    DefaultOnEos,
    ResponseLog,
>;

pub fn logging_layer() -> LoggingLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(RequestSpan)
        .on_response(ResponseLog)
        .on_failure(ResponseLog)
}
