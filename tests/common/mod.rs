#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use rcvtest::AppState;
use rcvtest::api::{BearerToken, create_router};
use rcvtest::config::Settings;
use rcvtest::db::{MockReceiverStore, ReceiverStore};
use rcvtest::domain::{Caller, Integration, Permission, Receiver};
use rcvtest::notifier::{MockDispatcher, MultiOrgDispatcher};
use rcvtest::observability::AuditLogWriter;
use rcvtest::schema::SchemaRegistry;
use rcvtest::secrets::{MockSecrets, SecretsService, seal_field};
use rcvtest::testing::ReceiverTestingService;

pub const OPS_TOKEN: &str = "ops-token";
pub const VIEWER_TOKEN: &str = "viewer-token";
pub const OTHER_ORG_TOKEN: &str = "other-org-token";

pub fn test_settings(auth_mode: &str, request_timeout_seconds: u64) -> Settings {
    let yaml = format!(
        "http:\n  listen: \"127.0.0.1:0\"\n  request_timeout_seconds: {}\n  auth:\n    mode: {}\nstorage:\n  driver: memory\nobservability:\n  log_format: pretty\n",
        request_timeout_seconds, auth_mode
    );
    serde_yaml::from_str(&yaml).expect("test settings parse")
}

pub fn ops() -> Caller {
    Caller::new("ops", 1, vec![Permission::ReceiversTest])
}

fn test_tokens() -> Vec<BearerToken> {
    vec![
        BearerToken::new(OPS_TOKEN, ops()),
        BearerToken::new(
            VIEWER_TOKEN,
            Caller::new("viewer", 1, vec![Permission::ReceiversRead]),
        ),
        BearerToken::new(
            OTHER_ORG_TOKEN,
            Caller::new("other", 2, vec![Permission::NotificationsWrite]),
        ),
    ]
}

/// Service wired to in-memory collaborators, with a dispatcher for org 1 only.
pub struct TestContext {
    pub state: Arc<AppState>,
    pub store: Arc<MockReceiverStore>,
    pub dispatcher: Arc<MockDispatcher>,
    pub secrets: Arc<MockSecrets>,
}

pub struct TestContextBuilder {
    settings: Settings,
    store: MockReceiverStore,
    dispatcher: MockDispatcher,
    audit_log: Option<AuditLogWriter>,
}

impl TestContextBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(mut self, store: MockReceiverStore) -> Self {
        self.store = store;
        self
    }

    pub fn dispatcher(mut self, dispatcher: MockDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn audit_log(mut self, writer: AuditLogWriter) -> Self {
        self.audit_log = Some(writer);
        self
    }

    pub async fn build(self) -> TestContext {
        let secrets = Arc::new(MockSecrets::new());
        let store = Arc::new(
            self.store
                .with_secrets(Arc::clone(&secrets) as Arc<dyn SecretsService>),
        );
        let dispatcher = Arc::new(self.dispatcher);
        let dispatchers = Arc::new(MultiOrgDispatcher::new());
        dispatchers.register(1, Arc::clone(&dispatcher) as _).await;

        let service = ReceiverTestingService::new(
            Arc::clone(&store) as Arc<dyn ReceiverStore>,
            dispatchers,
            Arc::clone(&secrets) as Arc<dyn SecretsService>,
            Arc::new(SchemaRegistry::builtin()),
        );

        let mut state = AppState::new(self.settings, service).with_tokens(test_tokens());
        if let Some(writer) = self.audit_log {
            state = state.with_audit_log(writer);
        }

        TestContext {
            state: state.into_shared(),
            store,
            dispatcher,
            secrets,
        }
    }
}

impl TestContext {
    pub fn builder() -> TestContextBuilder {
        TestContextBuilder {
            settings: test_settings("bearer", 30),
            store: MockReceiverStore::new(),
            dispatcher: MockDispatcher::new(),
            audit_log: None,
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn seal(&self, org_id: i64, plaintext: &str) -> String {
        seal_field(self.secrets.as_ref(), org_id, plaintext)
            .await
            .expect("seal")
    }

    /// Store receiver `r1` in org 1 with a slack integration `i-slack` whose
    /// token is sealed, and a webhook `i-hook` using a sealed bearer credential.
    pub async fn seed_ops_receiver(&self) {
        let token = self.seal(1, "xoxb-stored").await;
        let credentials = self.seal(1, "stored-credential").await;
        self.store.insert(
            1,
            Receiver {
                uid: "r1".to_string(),
                name: "ops".to_string(),
                integrations: vec![
                    Integration::new("slack", "v1")
                        .with_uid("i-slack")
                        .with_setting("recipient", "#ops")
                        .with_secure_setting("token", token),
                    Integration::new("webhook", "v1")
                        .with_uid("i-hook")
                        .with_setting("url", "https://hooks.example.com/ops")
                        .with_setting("authorization_scheme", "Bearer")
                        .with_secure_setting("authorization_credentials", credentials),
                ],
            },
        );
    }
}

pub fn post_test(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/receivers/test")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn latency(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
