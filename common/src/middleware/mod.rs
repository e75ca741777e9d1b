//! Middleware components for all services.

pub mod auth;
pub mod request_id;

pub use auth::{AuthorizationContext, TokenClaims, SUBJECT_AND_APP_TOKEN_PREFIX};
pub use request_id::{request_id_middleware, RequestId, CLIENT_REQUEST_ID_HEADER, REQUEST_ID_HEADER};
