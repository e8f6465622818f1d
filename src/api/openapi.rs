use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{
    AlertPayload, ErrorResponse, IntegrationPayload, PublicHealthResponse, TestReceiverRequest,
    TestReceiverResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "rcvtest API",
        version = "1.0.0",
        description = "Send synthetic test alerts through alert notification integrations",
        license(name = "MIT"),
        contact(name = "rcvtest")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        super::handlers::health,
        super::handlers::test_receiver,
    ),
    components(
        schemas(
            PublicHealthResponse,
            ErrorResponse,
            AlertPayload,
            IntegrationPayload,
            TestReceiverRequest,
            TestReceiverResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health and status endpoints"),
        (name = "receivers", description = "Receiver integration testing"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
