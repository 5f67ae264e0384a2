//! OAuth2 credential management
//!
//! Owns the access/refresh token pair and the two exchange flows: interactive
//! authorization when no refresh token is on record, and the refresh exchange
//! when the held access token is absent or expired. A freshly issued refresh
//! token is persisted to the config file before control returns to the
//! caller; Google invalidates the oldest of a capped set of refresh tokens
//! per client, so losing one is a user-facing side effect, not routine.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::{Error, Result};

/// Authorization endpoint for the interactive flow
pub const OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Token exchange endpoint
pub const OAUTH_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";
/// Profile lookup endpoint, used to discover the login identity
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
/// Scopes for chat access plus email lookup
pub const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/googletalk \
                               https://www.googleapis.com/auth/userinfo.email";
/// Out-of-band redirect: the authorization code is shown to the user to paste
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// A usable access token with its exact expiry
///
/// Clock skew is not compensated; expiry is treated as exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Short-lived bearer token (lifetime ~3600s)
    pub access_token: String,

    /// Instant after which the token is no longer used
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the token has passed its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Supplies the out-of-band authorization code during the interactive flow
pub trait AuthPrompt: Send + Sync {
    /// Present the authorization URL and block for the user's code
    ///
    /// # Errors
    ///
    /// Returns an error if no code can be obtained.
    fn request_code(&self, authorization_url: &str) -> Result<String>;
}

/// Console prompt: print the URL, read the code from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl AuthPrompt for StdinPrompt {
    fn request_code(&self, authorization_url: &str) -> Result<String> {
        println!("{authorization_url}");
        print!("Enter auth code from the above link: ");
        std::io::stdout().flush()?;

        let mut code = String::new();
        std::io::stdin().read_line(&mut code)?;
        Ok(code.trim().to_string())
    }
}

/// Hands out a valid access token, refreshing it when needed
///
/// The chat session borrows tokens through this seam so tests can count
/// validity checks without a real token endpoint.
#[async_trait]
pub trait TokenProvider: Send {
    /// Return a currently-valid access token
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialExchange`] when a required exchange fails.
    async fn access_token(&mut self) -> Result<Credential>;
}

/// Owns the OAuth2 token lifecycle
pub struct CredentialManager {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    current: Option<Credential>,
    http: reqwest::Client,
    config_path: PathBuf,
    prompt: Box<dyn AuthPrompt>,
    token_url: String,
    userinfo_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

impl CredentialManager {
    /// Create a manager from loaded config
    ///
    /// `config_path` is where a newly issued refresh token is persisted.
    #[must_use]
    pub fn new(config: &Config, config_path: PathBuf, prompt: Box<dyn AuthPrompt>) -> Self {
        Self {
            client_id: config.auth.client_id.clone(),
            client_secret: config.auth.client_secret.clone(),
            refresh_token: config.auth.refresh_token.clone(),
            current: None,
            http: reqwest::Client::new(),
            config_path,
            prompt,
            token_url: OAUTH_TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Override the OAuth endpoints, for tests against a local server
    #[must_use]
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    /// The URL the user visits to grant access
    #[must_use]
    pub fn authorization_url(&self) -> String {
        format!(
            "{OAUTH_AUTH_URL}?client_id={}&scope={}&redirect_uri={}&response_type=code&access_type=offline",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(OOB_REDIRECT_URI),
        )
    }

    /// Ensure a valid access token, running whichever flow applies
    ///
    /// No refresh token on record starts interactive authorization and
    /// persists the new refresh token before returning. An expired or absent
    /// access token runs the refresh exchange. A still-valid token is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialExchange`] on any exchange failure and
    /// config errors if the refresh token cannot be persisted.
    pub async fn ensure_access_token(&mut self) -> Result<Credential> {
        if self.refresh_token.is_empty() {
            tracing::info!("no refresh token on record, starting interactive authorization");
            let code = self.prompt.request_code(&self.authorization_url())?;
            let grant = self.token_request(Some(&code)).await?;

            let refresh = grant.refresh_token.clone().ok_or_else(|| {
                Error::CredentialExchange("token response missing refresh_token".into())
            })?;
            self.refresh_token = refresh;
            // Losing a fresh refresh token is unrecoverable without repeating
            // interactive authorization, so persist before anything else.
            self.persist_refresh_token()?;

            let credential = install(grant)?;
            self.current = Some(credential.clone());
            return Ok(credential);
        }

        if let Some(current) = &self.current {
            if !current.is_expired(Utc::now()) {
                tracing::debug!("access token still valid");
                return Ok(current.clone());
            }
        }

        tracing::debug!("using refresh token to obtain a new access token");
        let grant = self.token_request(None).await?;
        let credential = install(grant)?;
        self.current = Some(credential.clone());
        Ok(credential)
    }

    /// Look up the account email for the chat login
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialExchange`] if the lookup fails or the
    /// response carries no email.
    pub async fn profile_email(&mut self) -> Result<String> {
        let credential = self.ensure_access_token().await?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .header("Authorization", format!("OAuth {}", credential.access_token))
            .send()
            .await
            .map_err(|e| Error::CredentialExchange(format!("userinfo request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::CredentialExchange(format!(
                "userinfo request failed: {status}"
            )));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| Error::CredentialExchange(format!("userinfo parse error: {e}")))?;

        info.email.ok_or_else(|| {
            Error::CredentialExchange("userinfo response missing email".into())
        })
    }

    /// Exchange either an authorization code or the stored refresh token
    async fn token_request(&self, auth_code: Option<&str>) -> Result<TokenResponse> {
        let mut form = vec![
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
        ];
        if let Some(code) = auth_code {
            form.push(("code", code.to_string()));
            form.push(("grant_type", "authorization_code".to_string()));
            form.push(("redirect_uri", OOB_REDIRECT_URI.to_string()));
            form.push(("access_type", "offline".to_string()));
        } else {
            form.push(("refresh_token", self.refresh_token.clone()));
            form.push(("grant_type", "refresh_token".to_string()));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::CredentialExchange(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CredentialExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::CredentialExchange(format!("token parse error: {e}")))
    }

    /// Write the refresh token back to the config file
    fn persist_refresh_token(&self) -> Result<()> {
        let mut config = Config::load(&self.config_path)?;
        config.auth.refresh_token.clone_from(&self.refresh_token);
        config.store(&self.config_path)?;
        tracing::info!(path = %self.config_path.display(), "refresh token persisted");
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for CredentialManager {
    async fn access_token(&mut self) -> Result<Credential> {
        self.ensure_access_token().await
    }
}

/// Turn a token response into a credential, validating required fields
fn install(grant: TokenResponse) -> Result<Credential> {
    let access_token = grant.access_token.ok_or_else(|| {
        Error::CredentialExchange("token response missing access_token".into())
    })?;
    let ttl = grant.expires_in.ok_or_else(|| {
        Error::CredentialExchange("token response missing expires_in".into())
    })?;

    let expires_at = Utc::now() + Duration::seconds(ttl);
    tracing::info!(expires_at = %expires_at.format("%Y/%m/%d %H:%M"), "access token obtained");

    Ok(Credential {
        access_token,
        expires_at,
    })
}
