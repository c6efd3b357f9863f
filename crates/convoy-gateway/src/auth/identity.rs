//! Identity service client
//!
//! Token verification and credential login are delegated to an external
//! service. `HttpIdentityService` talks to it over HTTP; tests substitute their
//! own `IdentityService`.

use super::claims::subject_from_body;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Identity service failures
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The service answered and refused the token or credentials
    #[error("Rejected by identity service: {0}")]
    Rejected(String),

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something other than accept or reject
    #[error("Identity service error: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Verify a bearer token.
    ///
    /// `Ok(Some(subject))` when the service named the caller, `Ok(None)` when it
    /// accepted the token without saying who it belongs to.
    async fn verify(&self, token: &str) -> Result<Option<String>, IdentityError>;

    /// Exchange login credentials for a token, returning the service's JSON reply.
    async fn login(&self, body: Bytes) -> Result<serde_json::Value, IdentityError>;
}

/// Identity service reached over HTTP
#[derive(Clone)]
pub struct HttpIdentityService {
    client: Client,
    base_url: String,
}

impl HttpIdentityService {
    /// # Arguments
    /// * `base_url` - Service root, e.g. "http://auth:8080"
    /// * `timeout` - Upper bound on each call, connection included
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(err: reqwest::Error) -> IdentityError {
    if err.is_timeout() {
        IdentityError::Unavailable(format!("request timed out: {}", err))
    } else {
        IdentityError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn verify(&self, token: &str) -> Result<Option<String>, IdentityError> {
        let response = self
            .client
            .post(self.url("/validate"))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(format!(
                "validate returned {}",
                status
            )));
        }
        if status != StatusCode::OK {
            return Err(IdentityError::Rejected(format!(
                "validate returned {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        Ok(subject_from_body(&body))
    }

    async fn login(&self, body: Bytes) -> Result<serde_json::Value, IdentityError> {
        let response = self
            .client
            .post(self.url("/login"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response.json::<serde_json::Value>().await.map_err(|e| {
                IdentityError::Upstream(format!("login returned invalid JSON: {}", e))
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(IdentityError::Rejected("invalid credentials".to_string()))
            }
            status => Err(IdentityError::Upstream(format!(
                "login returned {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(server: &mockito::Server) -> HttpIdentityService {
        HttpIdentityService::new(server.url(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn verify_accepts_and_reads_subject() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/validate")
            .match_header("authorization", "Bearer good-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"email":"user@example.com"}"#)
            .create_async()
            .await;

        let subject = service(&server).verify("good-token").await.unwrap();
        assert_eq!(subject.as_deref(), Some("user@example.com"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn verify_accepts_without_claims() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/validate")
            .with_status(200)
            .create_async()
            .await;

        let subject = service(&server).verify("good-token").await.unwrap();
        assert_eq!(subject, None);
    }

    #[tokio::test]
    async fn verify_rejects_non_200() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/validate")
            .with_status(401)
            .create_async()
            .await;

        let err = service(&server).verify("expired").await.unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }

    #[tokio::test]
    async fn verify_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/validate")
            .with_status(503)
            .create_async()
            .await;

        let err = service(&server).verify("token").await.unwrap_err();
        assert!(matches!(err, IdentityError::Unavailable(_)));
    }

    #[tokio::test]
    async fn verify_unreachable_is_unavailable() {
        // Port 1 is reserved and never listening
        let identity =
            HttpIdentityService::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = identity.verify("token").await.unwrap_err();
        assert!(matches!(err, IdentityError::Unavailable(_)));
    }

    #[tokio::test]
    async fn login_passes_token_through() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/login")
            .match_header("content-type", "application/json")
            .match_body(r#"{"email":"a@b.c","password":"pw"}"#)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"jwt"}"#)
            .create_async()
            .await;

        let reply = service(&server)
            .login(Bytes::from_static(br#"{"email":"a@b.c","password":"pw"}"#))
            .await
            .unwrap();
        assert_eq!(reply["token"], "jwt");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_bad_credentials_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(401)
            .create_async()
            .await;

        let err = service(&server)
            .login(Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }

    #[tokio::test]
    async fn login_other_status_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(500)
            .create_async()
            .await;

        let err = service(&server)
            .login(Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Upstream(_)));
    }
}
