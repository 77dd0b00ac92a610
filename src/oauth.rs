use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::OAuthCredentials;

pub const STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered {0}")]
    Status(u16),
    #[error("provider returned no email")]
    MissingEmail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Plain authorization-code client for Google sign-in.
#[derive(Clone)]
pub struct GoogleOAuth {
    creds: OAuthCredentials,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(creds: OAuthCredentials) -> Self {
        Self { creds, http: reqwest::Client::new() }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.creds.redirect_uri
    }

    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=online&state={}",
            self.creds.auth_url,
            urlencoding::encode(&self.creds.client_id),
            urlencoding::encode(&self.creds.redirect_uri),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state)
        )
    }

    /// Trade the callback code for the user's email and display name.
    pub async fn exchange_code(&self, code: &str) -> Result<(String, String), OAuthError> {
        let resp = self
            .http
            .post(&self.creds.token_url)
            .form(&[
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.creds.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Status(resp.status().as_u16()));
        }
        let token: TokenResponse = resp.json().await?;

        let resp = self.http.get(&self.creds.userinfo_url).bearer_auth(&token.access_token).send().await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Status(resp.status().as_u16()));
        }
        let profile: GoogleProfile = resp.json().await?;
        let email = profile.email.filter(|e| !e.is_empty()).ok_or(OAuthError::MissingEmail)?;
        let name = profile.name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        Ok((email, name))
    }
}

/// Outstanding login `state` values; each is accepted once within the TTL.
#[derive(Clone)]
pub struct OAuthStateStore {
    states: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for OAuthStateStore {
    fn default() -> Self { Self::new(STATE_TTL) }
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self { states: Arc::new(DashMap::new()), ttl }
    }

    pub fn issue(&self) -> String {
        let ttl = self.ttl;
        self.states.retain(|_, issued| issued.elapsed() < ttl);
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.states.insert(state.clone(), Instant::now());
        state
    }

    pub fn consume(&self, state: &str) -> bool {
        match self.states.remove(state) {
            Some((_, issued)) => issued.elapsed() < self.ttl,
            None => false,
        }
    }
}
