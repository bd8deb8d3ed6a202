//! HTTP transport for daemon RPC
//!
//! Handles the session-token dance (409 + `X-Transmission-Session-Id`) and
//! HTTP basic auth on 401. Every call either yields a successful
//! [`RpcResponse`] or a [`ClientError`]; nothing here panics or retries
//! beyond the single 409 reissue.

use parking_lot::RwLock;
use reqwest::{header::HeaderValue, Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use super::request::{RpcRequest, RpcResponse};
use crate::config::ClientConfig;
use crate::error::{AuthErrorKind, ClientError, NetworkErrorKind, ProtocolErrorKind, Result};

/// Header carrying the CSRF session token
pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

/// Token sent before the daemon has issued one
pub const INITIAL_SESSION_ID: &str = "0";

/// Basic auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both fields must be non-empty to be usable
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            None
        } else {
            Some(Self { username, password })
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// RPC transport bound to one daemon endpoint
pub struct RpcTransport {
    http: Client,
    endpoint: RwLock<Url>,
    session_id: RwLock<String>,
    credentials: RwLock<Option<Credentials>>,
    /// Set once the daemon has asked for auth; later requests send it up front
    auth_challenged: AtomicBool,
}

impl RpcTransport {
    /// Create a transport from configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = config.rpc_url()?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.http.connect_timeout))
            .read_timeout(Duration::from_secs(config.http.read_timeout))
            .user_agent(config.http.user_agent.clone())
            .danger_accept_invalid_certs(config.http.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("RPC endpoint: {}", endpoint);

        Ok(Self {
            http,
            endpoint: RwLock::new(endpoint),
            session_id: RwLock::new(INITIAL_SESSION_ID.to_string()),
            credentials: RwLock::new(Credentials::new(&config.username, &config.password)),
            auth_challenged: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> Url {
        self.endpoint.read().clone()
    }

    /// Point at another daemon. The old session token is meaningless there.
    pub fn set_endpoint(&self, endpoint: Url) {
        tracing::info!("RPC endpoint changed to {}", endpoint);
        *self.endpoint.write() = endpoint;
        *self.session_id.write() = INITIAL_SESSION_ID.to_string();
        self.auth_challenged.store(false, Ordering::SeqCst);
    }

    /// Currently held session token
    pub fn session_id(&self) -> String {
        self.session_id.read().clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.read().is_some()
    }

    /// Replace credentials; the next 401 may try them again
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.write() = credentials;
        self.auth_challenged.store(false, Ordering::SeqCst);
    }

    /// Perform one RPC call
    pub async fn call(&self, request: &RpcRequest) -> Result<RpcResponse> {
        let body = request.to_body()?;
        tracing::debug!(
            "RPC request {}: {}",
            request.method,
            String::from_utf8_lossy(&body)
        );

        let mut conflict_retried = false;
        let mut auth_sent = self.auth_challenged.load(Ordering::SeqCst);

        loop {
            let credentials = if auth_sent {
                self.credentials.read().clone()
            } else {
                None
            };
            let response = self.send(body.clone(), credentials.as_ref()).await?;
            let status = response.status();

            if status == StatusCode::CONFLICT {
                if conflict_retried {
                    tracing::warn!("Session conflict persisted for {}", request.method);
                    return Err(ClientError::protocol(
                        ProtocolErrorKind::SessionConflict,
                        format!("Repeated 409 for {}", request.method),
                    ));
                }
                let token = Self::session_token(response.headers().get(SESSION_ID_HEADER))?;
                tracing::debug!("Session id updated: {}", token);
                *self.session_id.write() = token;
                conflict_retried = true;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED {
                if !self.has_credentials() {
                    tracing::warn!("Daemon requires authentication for {}", request.method);
                    return Err(ClientError::auth(
                        AuthErrorKind::Required,
                        "Daemon requires a username and password",
                    ));
                }
                if auth_sent {
                    tracing::warn!("Credentials rejected for {}", request.method);
                    return Err(ClientError::auth(
                        AuthErrorKind::Rejected,
                        "Username or password rejected",
                    ));
                }
                self.auth_challenged.store(true, Ordering::SeqCst);
                auth_sent = true;
                continue;
            }

            if !status.is_success() {
                tracing::warn!("RPC {} returned HTTP {}", request.method, status);
                return Err(ClientError::network(
                    NetworkErrorKind::HttpStatus(status.as_u16()),
                    format!("HTTP {} for {}", status, request.method),
                ));
            }

            let bytes = response.bytes().await?;
            tracing::debug!(
                "RPC response {}: {}",
                request.method,
                String::from_utf8_lossy(&bytes)
            );

            let parsed: RpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
                ClientError::protocol(
                    ProtocolErrorKind::InvalidResponse,
                    format!("Unparseable response to {}: {}", request.method, e),
                )
            })?;

            if !parsed.is_success() {
                tracing::warn!("RPC {} failed: {}", request.method, parsed.result);
            }
            return parsed.into_result();
        }
    }

    async fn send(
        &self,
        body: Vec<u8>,
        credentials: Option<&Credentials>,
    ) -> Result<reqwest::Response> {
        let endpoint = self.endpoint();
        let session_id = self.session_id();

        let mut builder = self
            .http
            .post(endpoint)
            .header(SESSION_ID_HEADER, session_id)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(creds) = credentials {
            builder = builder.basic_auth(&creds.username, Some(&creds.password));
        }

        Ok(builder.send().await?)
    }

    fn session_token(header: Option<&HeaderValue>) -> Result<String> {
        header
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::protocol(
                    ProtocolErrorKind::MissingSessionId,
                    "409 response without a session id",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport_for(server: &MockServer, config: ClientConfig) -> RpcTransport {
        let transport = RpcTransport::new(&config).unwrap();
        let url = Url::parse(&format!("{}/transmission/rpc", server.uri())).unwrap();
        transport.set_endpoint(url);
        transport
    }

    fn success() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"result": "success", "arguments": {}}))
    }

    #[test]
    fn test_credentials_need_both_fields() {
        assert!(Credentials::new("user", "").is_none());
        assert!(Credentials::new("", "pw").is_none());
        assert!(Credentials::new("user", "pw").is_some());
        let creds = Credentials::new("user", "secret").unwrap();
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_initial_session_id() {
        let transport = RpcTransport::new(&ClientConfig::default()).unwrap();
        assert_eq!(transport.session_id(), "0");
        assert_eq!(
            transport.endpoint().as_str(),
            "http://localhost:9091/transmission/rpc"
        );
    }

    #[tokio::test]
    async fn test_conflict_retries_once_with_new_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .and(header(SESSION_ID_HEADER, "0"))
            .respond_with(ResponseTemplate::new(409).insert_header(SESSION_ID_HEADER, "abc"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .and(header(SESSION_ID_HEADER, "abc"))
            .respond_with(success())
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let resp = transport.call(&RpcRequest::new("session-get")).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(transport.session_id(), "abc");
    }

    #[tokio::test]
    async fn test_second_conflict_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .respond_with(ResponseTemplate::new(409).insert_header(SESSION_ID_HEADER, "again"))
            .expect(2)
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let err = transport
            .call(&RpcRequest::new("session-get"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol {
                kind: ProtocolErrorKind::SessionConflict,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_conflict_without_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let err = transport
            .call(&RpcRequest::new("session-get"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol {
                kind: ProtocolErrorKind::MissingSessionId,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_without_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let err = transport
            .call(&RpcRequest::new("session-get"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Auth {
                kind: AuthErrorKind::Required,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_answers_challenge() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(basic_auth("user", "pw"))
            .respond_with(success())
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::default().credentials("user", "pw");
        let transport = transport_for(&server, config).await;
        transport.call(&RpcRequest::new("session-get")).await.unwrap();
        // Credentials are sent up front once challenged
        transport.call(&RpcRequest::new("session-get")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let config = ClientConfig::default().credentials("user", "wrong");
        let transport = transport_for(&server, config).await;
        let err = transport
            .call(&RpcRequest::new("session-get"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Auth {
                kind: AuthErrorKind::Rejected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let err = transport
            .call(&RpcRequest::new("torrent-get"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Network {
                kind: NetworkErrorKind::HttpStatus(500),
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let err = transport
            .call(&RpcRequest::new("torrent-get"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol {
                kind: ProtocolErrorKind::InvalidResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_application_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": "invalid or corrupt torrent file"})),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        let err = transport
            .call(&RpcRequest::new("torrent-add"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ClientError::Rpc { ref result } if result == "invalid or corrupt torrent file")
        );
    }

    #[tokio::test]
    async fn test_set_endpoint_resets_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header(SESSION_ID_HEADER, "0"))
            .respond_with(ResponseTemplate::new(409).insert_header(SESSION_ID_HEADER, "tok"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header(SESSION_ID_HEADER, "tok"))
            .respond_with(success())
            .mount(&server)
            .await;

        let transport = transport_for(&server, ClientConfig::default()).await;
        transport.call(&RpcRequest::new("session-get")).await.unwrap();
        assert_eq!(transport.session_id(), "tok");

        transport.set_endpoint(transport.endpoint());
        assert_eq!(transport.session_id(), "0");
    }
}
