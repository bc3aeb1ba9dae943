//! Authenticated sessions and the request envelope.
//!
//! A [`Session`] owns the account credentials (as a SHA-512 digest), the session
//! token issued at login and the HTTP transport. Every call made through
//! [`Session::send`] carries the token in an `Authorization: OAuth <token>` header.

use crate::client::ClientConfig;
use crate::config::ZStackConfig;
use crate::error::{decode_api_error, describe_failure, generic_failure};
use crate::poller::AsyncHandle;
use crate::types::{session_path, LogInByAccount, LoginRequest, LoginResponse, Tags, LOGIN_PATH};
use crate::uuid::AccountUuid;
use crate::{Error, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha512};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Authorization scheme the management server expects. Not `Bearer`.
pub const AUTHORIZATION_SCHEME: &str = "OAuth";

/// Hex-encoded SHA-512 digest of a password, as the login API expects it.
#[must_use]
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha512::digest(password.as_bytes()))
}

/// Authentication context for a ZStack management node.
#[derive(Debug)]
pub struct Session {
    config: ZStackConfig,
    endpoint: Url,
    account_name: String,
    password_digest: SecretString,
    token: Option<SecretString>,
    account_uuid: Option<AccountUuid>,
    http: Client,
}

impl Session {
    /// Create an unauthenticated session with the default transport settings.
    ///
    /// The password is hashed here and only the digest is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the transport cannot be built.
    pub fn new(
        config: ZStackConfig,
        account_name: impl Into<String>,
        password: &SecretString,
    ) -> Result<Self> {
        Self::with_client_config(config, &ClientConfig::default(), account_name, password)
    }

    /// Create an unauthenticated session with custom transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the transport cannot be built.
    pub fn with_client_config(
        config: ZStackConfig,
        client_config: &ClientConfig,
        account_name: impl Into<String>,
        password: &SecretString,
    ) -> Result<Self> {
        let endpoint = config.parse_endpoint()?;
        let http = client_config.build_http_client(&config)?;

        Ok(Self {
            config,
            endpoint,
            account_name: account_name.into(),
            password_digest: SecretString::from(password_digest(password.expose_secret())),
            token: None,
            account_uuid: None,
            http,
        })
    }

    /// Create a session and log in.
    ///
    /// Either returns an authenticated session or the login failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials, or any
    /// construction error from [`Session::new`].
    pub async fn login(
        config: ZStackConfig,
        account_name: impl Into<String>,
        password: &SecretString,
    ) -> Result<Self> {
        let mut session = Self::new(config, account_name, password)?;
        session.authenticate().await?;
        Ok(session)
    }

    /// Perform the login exchange and store the session token.
    ///
    /// No retries. On failure the token is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the server answers with a non-2xx status or
    /// an undecodable body, and [`Error::Transport`] when the request never
    /// received a response.
    pub async fn authenticate(&mut self) -> Result<()> {
        self.token = None;
        self.account_uuid = None;

        let url = self.endpoint_url(LOGIN_PATH)?;
        let request = LoginRequest {
            log_in_by_account: LogInByAccount {
                account_name: self.account_name.clone(),
                password: self.password_digest.expose_secret().to_string(),
            },
            tags: Tags::default(),
        };

        info!(account = %self.account_name, endpoint = %self.endpoint, "logging in");

        let response = self
            .http
            .put(url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| Error::transport("login", &url, &err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| Error::transport("login", &url, &err))?;

        if !status.is_success() {
            let message = match decode_api_error(&body) {
                Some(err) => err.summary(),
                None => generic_failure(status, &body),
            };
            warn!(account = %self.account_name, status = status.as_u16(), "login rejected");
            return Err(Error::Auth(message));
        }

        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|err| Error::Auth(format!("Failed to decode login response: {err}")))?;

        if login.inventory.uuid.is_empty() {
            return Err(Error::Auth(
                "login response carried no session token".to_string(),
            ));
        }

        self.token = Some(SecretString::from(login.inventory.uuid));
        self.account_uuid = login.inventory.account_uuid;
        debug!(account = %self.account_name, "session established");
        Ok(())
    }

    /// End the session on the server and forget the token.
    ///
    /// Does nothing if the session is not authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the server refuses, or a transport error.
    pub async fn logout(&mut self) -> Result<()> {
        let path = match &self.token {
            Some(token) => session_path(token.expose_secret()),
            None => return Ok(()),
        };

        let response = self.send::<()>(Method::DELETE, &path, None).await?;
        let status = response.status();
        if !status.is_success() {
            let url = response.url().clone();
            let body = response
                .text()
                .await
                .map_err(|err| Error::transport("logout", &url, &err))?;
            warn!(account = %self.account_name, status = status.as_u16(), "logout rejected");
            return Err(Error::Api {
                status: status.as_u16(),
                message: describe_failure(status, &body),
            });
        }

        info!(account = %self.account_name, "logged out");
        self.token = None;
        self.account_uuid = None;
        Ok(())
    }

    /// Send one authenticated request and return the raw response.
    ///
    /// `path` is appended to the endpoint. The status code is not interpreted:
    /// a 4xx or 5xx answer is still `Ok`. Identical calls are independent requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if no response was received and
    /// [`Error::InvalidEndpoint`] if the URL cannot be built.
    pub async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(path)?;
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, self.authorization_value());

        if let Some(payload) = body {
            request = request.json(payload);
        }

        debug!(%method, %url, "sending request");

        request
            .send()
            .await
            .map_err(|err| Error::transport(method.as_str(), &url, &err))
    }

    /// Resolve a `202 Accepted` response into the job's typed result.
    ///
    /// Shorthand for [`AsyncHandle::from_response`] followed by
    /// [`AsyncHandle::resolve`].
    ///
    /// # Errors
    ///
    /// See [`AsyncHandle::from_response`] and [`AsyncHandle::resolve`].
    pub async fn resolve<T>(&self, response: Response, timeout: Duration) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        AsyncHandle::from_response(self, response)
            .await?
            .resolve(timeout)
            .await
    }

    /// Resolve a `202 Accepted` response using the configured default deadline.
    ///
    /// Same as [`resolve`](Self::resolve) with
    /// [`ZStackConfig::poll_timeout`] as the timeout.
    ///
    /// # Errors
    ///
    /// See [`AsyncHandle::from_response`] and [`AsyncHandle::resolve`].
    pub async fn resolve_default<T>(&self, response: Response) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.resolve(response, self.config.poll_timeout()).await
    }

    /// Build an absolute URL from the endpoint and a relative path.
    ///
    /// The endpoint's own path, if any, is kept as a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the result is not a valid URL.
    pub fn endpoint_url(&self, path: &str) -> Result<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))
    }

    /// Account name the session logs in as.
    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Account UUID reported at login.
    #[must_use]
    pub const fn account_uuid(&self) -> Option<&AccountUuid> {
        self.account_uuid.as_ref()
    }

    /// Management node endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Configuration the session was built from.
    #[must_use]
    pub const fn config(&self) -> &ZStackConfig {
        &self.config
    }

    /// Returns true once a login has succeeded.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) const fn http(&self) -> &Client {
        &self.http
    }

    fn authorization_value(&self) -> String {
        match &self.token {
            Some(token) => format!("{AUTHORIZATION_SCHEME} {}", token.expose_secret()),
            None => {
                warn!(account = %self.account_name, "sending request without a session token");
                format!("{AUTHORIZATION_SCHEME} ")
            }
        }
    }
}
