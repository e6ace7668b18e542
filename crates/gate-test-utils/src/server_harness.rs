//! Test server harness for E2E testing
//!
//! Provides `TestGateServer`, a real Bearer Gate server bound to a random
//! port, paired with a wiremock server standing in for the JWKS endpoint.

use bearer_gate::config::Config;
use bearer_gate::observability::metrics::detached_metrics_handle;
use bearer_gate::routes::{self, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the JWKS document is served at on the mock server.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Test harness for spawning a Bearer Gate server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_protected_flow() -> Result<()> {
///     let key = primary_keypair();
///     let server = TestGateServer::spawn(jwks_json(&[&key])).await?;
///     let token = TestTokenBuilder::new().sign_with(&key)?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/protected", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    jwks_server: MockServer,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a server whose JWKS endpoint serves `jwks`.
    pub async fn spawn(jwks: Value) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(jwks, HashMap::new()).await
    }

    /// Spawn a server with extra environment-style settings
    /// (e.g. `JWT_VERIFY_AUDIENCE`). `JWKS_URI` is filled in unless given.
    pub async fn spawn_with_vars(
        jwks: Value,
        vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&jwks_server)
            .await;

        let mut vars = vars;
        vars.entry("JWKS_URI".to_string())
            .or_insert_with(|| format!("{}{}", jwks_server.uri(), JWKS_PATH));

        Self::start(jwks_server, vars).await
    }

    /// Spawn a server with no `JWKS_URI` configured.
    ///
    /// The mock JWKS server still runs so tests can assert it is never hit.
    pub async fn spawn_without_jwks_uri() -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        Self::start(jwks_server, HashMap::new()).await
    }

    async fn start(
        jwks_server: MockServer,
        mut vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        vars.entry("BIND_ADDRESS".to_string())
            .or_insert_with(|| "127.0.0.1:0".to_string());

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::from_config(config.clone()));

        // A global recorder can only be installed once per process
        let metrics_handle = detached_metrics_handle()
            .map_err(|e| anyhow::anyhow!("Failed to create metrics handle: {}", e))?;

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            jwks_server,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock JWKS endpoint.
    pub fn jwks_server(&self) -> &MockServer {
        &self.jwks_server
    }

    /// Number of requests the JWKS endpoint has received so far.
    pub async fn jwks_request_count(&self) -> usize {
        self.jwks_server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so it does not outlive the test
        self._handle.abort();
    }
}
