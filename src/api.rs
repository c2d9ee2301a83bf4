// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log::debug;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use url::Url;

use crate::{
    error::{self, Result},
    metadata,
    model::{Identity, Registration, TokenPair},
    session::Authenticator,
};

const TOKEN_PATH: &str = "api/token/";
const PROFILE_PATH: &str = "api/users/profile/";
const REGISTER_PATH: &str = "api/users/register/";

/// The endpoints of the task and team management API the session uses.
///
/// Every request made through an implementation carries whatever bearer
/// token is attached to its [`Authenticator`] at the time.
#[async_trait]
pub(crate) trait Api: Send + Sync {
    fn authenticator(&self) -> &Authenticator;

    /// Exchanges a username and password for an access and refresh token.
    async fn issue_token(&self, username: &str, password: &SecretString) -> Result<TokenPair>;

    /// Looks up the profile of whoever the attached token belongs to.
    async fn fetch_identity(&self) -> Result<Identity>;

    /// Creates a new account and returns the server's representation of it.
    async fn register(&self, registration: &Registration) -> Result<serde_json::Value>;
}

#[derive(Serialize)]
struct TokenRequest<'req> {
    username: &'req str,
    password: &'req str,
}

/// [`Api`] over HTTP.
pub(crate) struct HttpApi {
    base: Url,
    http: reqwest::Client,
    authenticator: Authenticator,
}

impl HttpApi {
    pub(crate) fn new(base: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(metadata::USER_AGENT.as_str())
            .build()?;
        Self::with_http_client(base, http)
    }

    /// Use a custom HTTP client, e.g. for connection pool reuse.
    pub(crate) fn with_http_client(mut base: Url, http: reqwest::Client) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(error::Api::InvalidBase(base).into());
        }

        // Endpoints are joined relative to the base, which only keeps the
        // last path segment if it ends in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            http,
            authenticator: Authenticator::new(),
        })
    }

    pub(crate) const fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Checks the HTTP response status; returns the response on success or an
    /// error carrying the body the server sent.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        debug!("{} returned HTTP status {}", operation, status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error::Api::Status {
            operation,
            status: status.as_u16(),
            body,
        }
        .into())
    }
}

#[async_trait]
impl Api for HttpApi {
    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    async fn issue_token(&self, username: &str, password: &SecretString) -> Result<TokenPair> {
        let req = self
            .authenticator
            .decorate(self.http.post(self.endpoint(TOKEN_PATH)?))
            .await
            .json(&TokenRequest {
                username,
                password: password.expose_secret(),
            });

        let response = Self::ensure_success(req.send().await?, "token request").await?;
        Ok(response.json::<TokenPair>().await?)
    }

    async fn fetch_identity(&self) -> Result<Identity> {
        let req = self
            .authenticator
            .decorate(self.http.get(self.endpoint(PROFILE_PATH)?))
            .await;

        let response = Self::ensure_success(req.send().await?, "profile request").await?;
        Ok(response.json::<Identity>().await?)
    }

    async fn register(&self, registration: &Registration) -> Result<serde_json::Value> {
        let req = self
            .authenticator
            .decorate(self.http.post(self.endpoint(REGISTER_PATH)?))
            .await
            .json(registration);

        let response = Self::ensure_success(req.send().await?, "registration").await?;
        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn api_for(server: &MockServer) -> Result<HttpApi> {
        HttpApi::new(server.uri().parse()?)
    }

    #[test]
    fn base_gets_trailing_slash() -> Result<()> {
        let api = HttpApi::with_http_client(
            "https://tasks.example.com/backend".parse()?,
            reqwest::Client::new(),
        )?;
        assert_eq!(api.base().as_str(), "https://tasks.example.com/backend/");
        assert_eq!(
            api.endpoint(TOKEN_PATH)?.as_str(),
            "https://tasks.example.com/backend/api/token/"
        );
        Ok(())
    }

    #[test]
    fn rejects_non_base_urls() -> Result<()> {
        let result = HttpApi::with_http_client(
            "mailto:admin@example.com".parse()?,
            reqwest::Client::new(),
        );
        assert!(matches!(
            result,
            Err(error::Error::Api(error::Api::InvalidBase(_)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn issue_token_posts_credentials() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .and(body_json(json!({"username": "alice", "password": "correct"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access": "A", "refresh": "R"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server)?;
        let tokens = api
            .issue_token("alice", &SecretString::new("correct".to_owned()))
            .await?;
        assert_eq!(tokens.access.expose_secret(), "A");
        assert_eq!(tokens.refresh.expose_secret(), "R");
        Ok(())
    }

    #[tokio::test]
    async fn issue_token_reports_rejection() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                json!({"detail": "No active account found with the given credentials"}),
            ))
            .mount(&server)
            .await;

        let api = api_for(&server)?;
        let err = match api
            .issue_token("alice", &SecretString::new("wrong".to_owned()))
            .await
        {
            Ok(_) => panic!("token request unexpectedly succeeded"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            error::Error::Api(error::Api::Status {
                operation: "token request",
                status: 401,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_identity_sends_attached_bearer() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/profile/"))
            .and(header("Authorization", "Bearer A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": 1, "username": "alice"},
                "position": "Engineer",
            })))
            .mount(&server)
            .await;

        let api = api_for(&server)?;
        api.authenticator()
            .attach(&SecretString::new("A".to_owned()))
            .await;

        let identity = api.fetch_identity().await?;
        assert_eq!(identity.user.username, "alice");
        assert_eq!(identity.position.as_deref(), Some("Engineer"));
        Ok(())
    }

    #[tokio::test]
    async fn detached_requests_carry_no_authorization() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/profile/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let api = api_for(&server)?;
        api.authenticator()
            .attach(&SecretString::new("A".to_owned()))
            .await;
        api.authenticator().detach().await;

        let err = match api.fetch_identity().await {
            Ok(_) => panic!("profile request unexpectedly succeeded"),
            Err(err) => err,
        };
        assert!(err.is_unauthorized());

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn register_returns_validation_body() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/register/"))
            .and(body_json(json!({
                "username": "alice",
                "password": "hunter2",
                "password2": "hunter2",
            })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "username": ["A user with that username already exists."],
            })))
            .mount(&server)
            .await;

        let api = api_for(&server)?;
        let registration = Registration {
            username: "alice".to_owned(),
            email: None,
            password: SecretString::new("hunter2".to_owned()),
            password2: SecretString::new("hunter2".to_owned()),
            first_name: None,
            last_name: None,
        };

        match api.register(&registration).await {
            Err(error::Error::Api(error::Api::Status { status, body, .. })) => {
                assert_eq!(status, 400);
                assert_eq!(
                    serde_json::from_str::<serde_json::Value>(&body)?,
                    json!({"username": ["A user with that username already exists."]})
                );
            }
            other => panic!("unexpected registration result: {other:?}"),
        }
        Ok(())
    }
}
