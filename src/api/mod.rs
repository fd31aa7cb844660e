//! HTTP surface for the ingestion pipeline.
//!
//! Routes are nested under `/api/`. Everything except `/api/health`
//! requires the caller identity asserted by the upstream authenticator in
//! the `X-Intake-Identity` header.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
