mod auth;
mod handlers;
mod metrics;
mod openapi;
mod request_id;
mod routes;

pub use auth::{BearerToken, load_tokens};
pub use handlers::{ErrorResponse, TestReceiverRequest, TestReceiverResponse};
pub use openapi::ApiDoc;
pub use routes::*;
