//! Sign-in against the hosted auth API, and the saved session.

use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::local::{load_json, remove_file, save_json};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email and password are required")]
    MissingCredentials,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("auth request failed: {0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
    #[error("failed to store session: {0}")]
    Io(#[from] io::Error),
}

/// The signed-in user's tokens and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
}

impl Session {
    pub fn load(path: &Path) -> Option<Session> {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_json(self, path)
    }

    pub fn clear(path: &Path) -> io::Result<()> {
        remove_file(path)
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Token response; signup returns no tokens when the address needs confirming.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl TokenResponse {
    fn into_session(self, email: &str) -> Option<Session> {
        let user = self.user?;
        Some(Session {
            access_token: self.access_token?,
            refresh_token: self.refresh_token.unwrap_or_default(),
            user_id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

fn rejection(status: StatusCode, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {status}"));
    AuthError::Rejected(message)
}

fn check_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(())
}

/// Check the sign-up form before anything is sent.
pub fn check_sign_up(email: &str, password: &str, confirm: &str) -> Result<(), AuthError> {
    check_credentials(email, password)?;
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(AuthClient {
            client,
            base: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        })
    }

    async fn post(&self, path: &str, bearer: &str, body: serde_json::Value) -> Result<String, AuthError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(rejection(status, &text));
        }
        Ok(text)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        check_credentials(email, password)?;
        let text = self
            .post(
                "/token?grant_type=password",
                &self.anon_key,
                json!({ "email": email.trim(), "password": password }),
            )
            .await?;
        let response: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Rejected(format!("unreadable session: {e}")))?;
        let session = response
            .into_session(email.trim())
            .ok_or_else(|| AuthError::Rejected("sign-in returned no session".into()))?;
        tracing::info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    /// Register a new user. Returns no session when the address must be confirmed
    /// before signing in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        check_credentials(email, password)?;
        let text = self
            .post(
                "/signup",
                &self.anon_key,
                json!({ "email": email.trim(), "password": password }),
            )
            .await?;
        let response: TokenResponse = serde_json::from_str(&text).unwrap_or(TokenResponse {
            access_token: None,
            refresh_token: None,
            user: None,
        });
        Ok(response.into_session(email.trim()))
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.post("/logout", &session.access_token, json!({})).await?;
        tracing::info!(user_id = %session.user_id, "signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_checks_run_locally() {
        assert!(matches!(check_sign_up(" ", "pw", "pw"), Err(AuthError::MissingCredentials)));
        assert!(matches!(check_sign_up("a@b.c", "pw", "pW"), Err(AuthError::PasswordMismatch)));
        assert!(check_sign_up("a@b.c", "pw", "pw").is_ok());
    }

    #[test]
    fn token_response_becomes_session() {
        let body = r#"{"access_token":"at","refresh_token":"rt","user":{"id":"u1","email":"ada@example.com"}}"#;
        let response: TokenResponse = serde_json::from_str(body).unwrap();
        let session = response.into_session("other@example.com").unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.email, "ada@example.com");

        let unconfirmed: TokenResponse = serde_json::from_str(r#"{"user":{"id":"u2"}}"#).unwrap();
        assert!(unconfirmed.into_session("x@example.com").is_none());
    }

    #[test]
    fn rejection_prefers_the_description() {
        let err = rejection(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(rejection(StatusCode::BAD_GATEWAY, "").to_string(), "HTTP 502 Bad Gateway");
    }

    #[test]
    fn session_file_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert_eq!(Session::load(&path), None);
        let session = Session {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            user_id: "u1".into(),
            email: "ada@example.com".into(),
        };
        session.save(&path).unwrap();
        assert_eq!(Session::load(&path), Some(session));
        Session::clear(&path).unwrap();
        assert_eq!(Session::load(&path), None);
    }
}
