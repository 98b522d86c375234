//! Request dispatcher for the greeting API
//!
//! ## Endpoints
//! - GET /api/hello/{name} - Greet the name in the path
//! - GET /api/hello?name=... - Greet the name in the query string
//!
//! Both answer with a JSON `HelloResponse`, or a JSON `ErrorResponse`
//! (400 for a blank name, 500 for any other service failure).

use crate::api::{ErrorResponse, HelloRequest, HelloResponse};
use crate::service::{Service, ServiceError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Build the API router around a service
///
/// The router is built once and handed to the supervisor, which owns it
/// from then on.
pub fn build_router<S>(service: Arc<S>) -> Router
where
    S: Service + 'static,
{
    Router::new()
        .route("/api/hello/{name}", get(hello_path::<S>))
        .route("/api/hello", get(hello_query::<S>))
        .with_state(service)
}

async fn hello_path<S: Service>(State(service): State<Arc<S>>, Path(name): Path<String>) -> Response {
    say_hello(service.as_ref(), HelloRequest { name })
}

async fn hello_query<S: Service>(
    State(service): State<Arc<S>>,
    Query(request): Query<HelloRequest>,
) -> Response {
    say_hello(service.as_ref(), request)
}

/// `SayHello`: map the request onto the service and the result onto HTTP
pub fn say_hello<S: Service + ?Sized>(service: &S, request: HelloRequest) -> Response {
    match service.hello(&request.name) {
        Ok(msg) => {
            debug!(name = %request.name, "Greeting sent");
            (
                StatusCode::OK,
                Json(HelloResponse {
                    message: msg.message,
                }),
            )
                .into_response()
        }
        Err(e) => {
            let status = match e {
                ServiceError::EmptyName => StatusCode::BAD_REQUEST,
                ServiceError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(error = %e, status = %status, "Hello request failed");
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
