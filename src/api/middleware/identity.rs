//! Caller identity middleware.
//!
//! Authentication happens upstream; this layer only requires that the
//! asserted identity is present and well-formed, then injects
//! `CallerIdentity` into request extensions for downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{CallerIdentity, IDENTITY_HEADER};
use crate::models::Identity;

pub async fn require_identity(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let identity = req
        .headers()
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Identity::parse(v).ok());

    match identity {
        Some(identity) => {
            req.extensions_mut().insert(CallerIdentity(identity));
            next.run(req).await
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "Request without valid identity");
            ApiError::Unauthorized.into_response()
        }
    }
}
