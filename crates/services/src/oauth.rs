//! Google sign-in via the OAuth 2.0 authorization-code flow.

use reqwest::Client;
use serde::Deserialize;
use training_core::model::{UserId, UserProfile};
use url::Url;

use crate::error::AuthError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Path the provider redirects back to, relative to the public base URL.
pub const CALLBACK_PATH: &str = "/api/auth/callback/google";

#[derive(Clone, Debug)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl GoogleOAuthConfig {
    /// Google endpoints with the callback mounted under `base_url`.
    /// Returns `None` when the client credentials are blank.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, base_url: &str) -> Option<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return None;
        }
        Some(Self {
            client_id,
            client_secret,
            redirect_url: format!("{}{CALLBACK_PATH}", base_url.trim_end_matches('/')),
            auth_url: GOOGLE_AUTH_URL.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            userinfo_url: GOOGLE_USERINFO_URL.into(),
        })
    }
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    client: Client,
    config: Option<GoogleOAuthConfig>,
}

impl GoogleOAuthClient {
    #[must_use]
    pub fn new(config: Option<GoogleOAuthConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Provider consent URL carrying `state` for the callback to verify.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotConfigured` without credentials and
    /// `AuthError::Url` for a malformed authorization endpoint.
    pub fn authorize_url(&self, state: &str) -> Result<Url, AuthError> {
        let config = self.config.as_ref().ok_or(AuthError::NotConfigured)?;
        let url = Url::parse_with_params(
            &config.auth_url,
            [
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )?;
        Ok(url)
    }

    /// Exchange an authorization code for the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when the client is not configured, a request
    /// fails, or the provider omits the subject or a verified email.
    pub async fn exchange_code(&self, code: &str) -> Result<UserProfile, AuthError> {
        let config = self.config.as_ref().ok_or(AuthError::NotConfigured)?;

        let response = self
            .client
            .post(&config.token_url)
            .form(&[
                ("code", code),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("redirect_uri", config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::HttpStatus(response.status()));
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .client
            .get(&config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::HttpStatus(response.status()));
        }
        let claims: UserInfo = response.json().await?;
        claims.into_profile()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

impl UserInfo {
    fn into_profile(self) -> Result<UserProfile, AuthError> {
        let sub = self
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(AuthError::MissingClaim("sub"))?;
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(AuthError::MissingClaim("email"))?;
        if self.email_verified == Some(false) {
            return Err(AuthError::MissingClaim("email_verified"));
        }
        Ok(UserProfile {
            id: UserId::new(sub),
            email,
            first_name: self.given_name,
            last_name: self.family_name,
            profile_image_url: self.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GoogleOAuthConfig {
        GoogleOAuthConfig::new("client-1".into(), "secret".into(), "https://learn.corp.test/")
            .unwrap()
    }

    #[test]
    fn blank_credentials_disable_sign_in() {
        assert!(GoogleOAuthConfig::new(String::new(), "secret".into(), "http://x").is_none());
        let client = GoogleOAuthClient::new(None);
        assert!(!client.enabled());
        assert!(matches!(
            client.authorize_url("s"),
            Err(AuthError::NotConfigured)
        ));
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let client = GoogleOAuthClient::new(Some(config()));
        let url = client.authorize_url("abc123").unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["state"], "abc123");
        assert_eq!(
            params["redirect_uri"],
            "https://learn.corp.test/api/auth/callback/google"
        );
        assert_eq!(params["response_type"], "code");
    }

    #[test]
    fn userinfo_maps_to_profile() {
        let claims: UserInfo = serde_json::from_str(
            r#"{"sub":"1089","email":"ada@corp.test","email_verified":true,
                "given_name":"Ada","family_name":"Lovelace","picture":"https://img/ada"}"#,
        )
        .unwrap();
        let profile = claims.into_profile().unwrap();
        assert_eq!(profile.id, UserId::new("1089"));
        assert_eq!(profile.last_name.as_deref(), Some("Lovelace"));
    }

    #[test]
    fn userinfo_without_verified_email_is_refused() {
        let claims: UserInfo =
            serde_json::from_str(r#"{"sub":"1089","email":"ada@corp.test","email_verified":false}"#)
                .unwrap();
        assert!(matches!(
            claims.into_profile(),
            Err(AuthError::MissingClaim("email_verified"))
        ));
        let claims: UserInfo = serde_json::from_str(r#"{"email":"ada@corp.test"}"#).unwrap();
        assert!(matches!(claims.into_profile(), Err(AuthError::MissingClaim("sub"))));
    }
}
