//! HTTP endpoint dispatcher.
//!
//! Routes are built from a handler table, one entry per endpoint. The
//! dispatcher enforces the HTTP method (wrong known method answers 405 with
//! an `Allow` header, an unknown method answers 400), applies the
//! per-request deadline, records request metrics, and frames errors as
//! one-line ASCII bodies.

pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use tokio::time::timeout;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dns::DnsVerifier;
use crate::domain::Endpoint;
use crate::infra::TreeBackend;
use crate::metrics::{metric_names, Labels, MetricsRegistry};
use crate::state::StateSource;

use error::ApiError;
use handlers::HandlerFn;

/// Largest accepted request body. Every request type is a handful of short
/// lines; this is a backstop, not a tuning knob.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn TreeBackend>,
    pub dns: Arc<dyn DnsVerifier>,
    pub state: Arc<dyn StateSource>,
    pub metrics: Arc<MetricsRegistry>,
}

/// One endpoint's routing entry.
#[derive(Clone)]
pub struct HandlerSpec {
    pub endpoint: Endpoint,
    pub method: Method,
    pub call: HandlerFn,
}

/// The eight public endpoints of a primary node.
pub fn primary_handlers() -> Vec<HandlerSpec> {
    vec![
        HandlerSpec {
            endpoint: Endpoint::AddLeaf,
            method: Method::POST,
            call: handlers::add_leaf,
        },
        HandlerSpec {
            endpoint: Endpoint::AddCosignature,
            method: Method::POST,
            call: handlers::add_cosignature,
        },
        HandlerSpec {
            endpoint: Endpoint::GetTreeHeadToSign,
            method: Method::GET,
            call: handlers::get_tree_head_to_sign,
        },
        HandlerSpec {
            endpoint: Endpoint::GetTreeHeadCosigned,
            method: Method::GET,
            call: handlers::get_tree_head_cosigned,
        },
        HandlerSpec {
            endpoint: Endpoint::GetTreeHeadLatest,
            method: Method::GET,
            call: handlers::get_tree_head_latest,
        },
        HandlerSpec {
            endpoint: Endpoint::GetConsistencyProof,
            method: Method::POST,
            call: handlers::get_consistency_proof,
        },
        HandlerSpec {
            endpoint: Endpoint::GetProofByHash,
            method: Method::POST,
            call: handlers::get_proof_by_hash,
        },
        HandlerSpec {
            endpoint: Endpoint::GetLeaves,
            method: Method::POST,
            call: handlers::get_leaves,
        },
    ]
}

/// The endpoints a secondary node serves: its to-sign tree head, plus the
/// leaves needed for a failover to bootstrap clients.
pub fn secondary_handlers() -> Vec<HandlerSpec> {
    vec![
        HandlerSpec {
            endpoint: Endpoint::GetTreeHeadToSign,
            method: Method::GET,
            call: handlers::get_tree_head_to_sign,
        },
        HandlerSpec {
            endpoint: Endpoint::GetLeaves,
            method: Method::POST,
            call: handlers::get_leaves,
        },
    ]
}

/// Build the router for a node: the handler table under the configured
/// prefix, plus `/metrics` at the root.
pub fn router(state: AppState, specs: Vec<HandlerSpec>) -> Router {
    let mut router = Router::new();
    for spec in specs {
        let path = spec.endpoint.path(&state.config.prefix);
        let dispatch_state = state.clone();
        router = router.route(
            &path,
            any(move |request: Request| {
                let dispatch_state = dispatch_state.clone();
                let spec = spec.clone();
                async move { dispatch(dispatch_state, spec, request).await }
            }),
        );
    }

    let metrics = state.metrics.clone();
    router
        .route(
            "/metrics",
            get(move || {
                let metrics = metrics.clone();
                async move { metrics.to_prometheus().await }
            }),
        )
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(state: AppState, spec: HandlerSpec, request: Request) -> Response {
    let labels = Labels::new()
        .log(&state.config.log_id)
        .endpoint(spec.endpoint.name());
    state
        .metrics
        .inc_counter(metric_names::HTTP_REQ, labels.clone())
        .await;
    let started = Instant::now();

    let response = match handle(state.clone(), &spec, request).await {
        Ok(body) => ok_response(body),
        Err(e) => {
            tracing::warn!(endpoint = %spec.endpoint, error = ?e, "request failed");
            e.into_response()
        }
    };

    let status = response.status().as_u16();
    state
        .metrics
        .inc_counter(metric_names::HTTP_RSP, labels.clone().status(status))
        .await;
    state
        .metrics
        .observe_histogram(
            metric_names::HTTP_LATENCY,
            labels.status(status),
            started.elapsed().as_secs_f64(),
        )
        .await;
    response
}

async fn handle(
    state: AppState,
    spec: &HandlerSpec,
    request: Request,
) -> Result<String, ApiError> {
    if *request.method() != spec.method {
        return Err(if is_known_method(request.method()) {
            ApiError::method_not_allowed(spec.method.clone())
        } else {
            ApiError::bad_request("unknown HTTP method")
        });
    }

    let deadline = state.config.deadline;
    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::bad_request(format!("failed reading body: {e}")))?;

    match timeout(deadline, (spec.call)(state, body)).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::internal("request deadline exceeded")),
    }
}

fn is_known_method(method: &Method) -> bool {
    const KNOWN: [Method; 9] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
        Method::CONNECT,
        Method::PATCH,
        Method::TRACE,
    ];
    KNOWN.contains(method)
}

fn ok_response(body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    debug_assert_eq!(response.status(), StatusCode::OK);
    response
}
