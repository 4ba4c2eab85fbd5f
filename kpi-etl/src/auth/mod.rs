//! Bearer token acquisition via the OAuth2 client-credentials flow

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AuthConfig;
use crate::pipeline::PipelineError;
use crate::secrets::SecretStore;

/// A short-lived bearer token, owned by the run that requested it
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token(***)")
    }
}

/// Produces the bearer token the fetcher authenticates with
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn resolve(&self) -> Result<Token, PipelineError>;
}

/// Token endpoint response; carries either a token or an error description
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Resolves the client secret from the configured store and exchanges it for
/// a bearer token at the identity provider
pub struct CredentialResolver {
    config: AuthConfig,
    secrets: Box<dyn SecretStore>,
    http: reqwest::Client,
}

impl CredentialResolver {
    pub fn new(config: AuthConfig, secrets: Box<dyn SecretStore>) -> Self {
        Self {
            config,
            secrets,
            http: reqwest::Client::new(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority.trim_end_matches('/'),
            self.config.tenant_id
        )
    }
}

#[async_trait]
impl TokenSource for CredentialResolver {
    async fn resolve(&self) -> Result<Token, PipelineError> {
        let service = &self.config.secret.service;
        let principal = &self.config.client_id;

        let secret = match self.secrets.resolve_secret(service, principal) {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                return Err(PipelineError::CredentialUnavailable {
                    service: service.clone(),
                    principal: principal.clone(),
                });
            }
            Err(e) => {
                // The store itself failed; the secret is just as unavailable
                log::error!("Secret store lookup failed: {e:#}");
                return Err(PipelineError::CredentialUnavailable {
                    service: service.clone(),
                    principal: principal.clone(),
                });
            }
        };

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret.expose()),
            ("scope", self.config.scope.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| PipelineError::AuthenticationFailed {
                detail: format!("token request failed: {e}"),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::AuthenticationFailed {
                detail: format!("token response unreadable: {e}"),
            })?;

        let token = parse_token_response(status, &body)?;
        log::info!("Access token acquired for client {}", principal);
        Ok(token)
    }
}

/// Extract the access token from the identity provider's JSON response
fn parse_token_response(status: u16, body: &str) -> Result<Token, PipelineError> {
    let parsed: TokenResponse =
        serde_json::from_str(body).map_err(|_| PipelineError::AuthenticationFailed {
            detail: format!("identity provider returned HTTP {status} with an undecodable body"),
        })?;

    if let Some(token) = parsed.access_token {
        return Ok(Token::new(token));
    }

    let detail = match (parsed.error, parsed.error_description) {
        (Some(error), Some(description)) => format!("{error}: {description}"),
        (Some(error), None) => error,
        _ => format!("identity provider returned HTTP {status} without an access token"),
    };
    Err(PipelineError::AuthenticationFailed { detail })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::config::SecretConfig;
    use crate::secrets::Secret;

    #[test]
    fn test_parse_token_response_success() {
        let token = parse_token_response(200, r#"{"access_token": "abc", "expires_in": 3599}"#)
            .unwrap();
        assert_eq!(token.as_str(), "abc");
    }

    #[test]
    fn test_parse_token_response_error_body() {
        let err = parse_token_response(
            401,
            r#"{"error": "invalid_client", "error_description": "AADSTS7000215"}"#,
        )
        .unwrap_err();
        match err {
            PipelineError::AuthenticationFailed { detail } => {
                assert_eq!(detail, "invalid_client: AADSTS7000215");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_token_response_missing_token() {
        let err = parse_token_response(200, "{}").unwrap_err();
        match err {
            PipelineError::AuthenticationFailed { detail } => {
                assert!(detail.contains("without an access token"), "{detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_token_response_garbage_body() {
        let err = parse_token_response(502, "<html>bad gateway</html>").unwrap_err();
        match err {
            PipelineError::AuthenticationFailed { detail } => {
                assert!(detail.contains("HTTP 502"), "{detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", Token::new("abc")), "Token(***)");
    }

    struct EmptyStore;

    impl SecretStore for EmptyStore {
        fn resolve_secret(&self, _service: &str, _principal: &str) -> Result<Option<Secret>> {
            Ok(None)
        }
    }

    fn auth_config() -> AuthConfig {
        AuthConfig {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            authority: "https://login.example.test".to_string(),
            scope: "https://graph.example.test/.default".to_string(),
            secret: SecretConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_secret_fails_before_any_request() {
        // The authority points nowhere routable; resolve must fail on the
        // secret lookup without ever building a request
        let resolver = CredentialResolver::new(auth_config(), Box::new(EmptyStore));
        let err = resolver.resolve().await.unwrap_err();
        match err {
            PipelineError::CredentialUnavailable { service, principal } => {
                assert_eq!(service, "kpi-etl");
                assert_eq!(principal, "client");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_token_url() {
        let resolver = CredentialResolver::new(auth_config(), Box::new(EmptyStore));
        assert_eq!(
            resolver.token_url(),
            "https://login.example.test/tenant/oauth2/v2.0/token"
        );
    }
}
