use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Response;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::api;
use crate::error::FeedError;

pub const SESSION_COOKIE: &str = "next-auth.session-token";
pub const SECURE_SESSION_COOKIE: &str = "__Secure-next-auth.session-token";
const CSRF_COOKIE: &str = "next-auth.csrf-token";
const SECURE_CSRF_COOKIE: &str = "__Host-next-auth.csrf-token";
const VERIFICATION_TOKEN_BYTES: usize = 32;
const DEFAULT_SESSION_DAYS: i64 = 30;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Signed-in identity handed explicitly to everything that needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub cookie: SessionCookie,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub message: String,
    pub requires_verification: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfBody {
    csrf_token: String,
}

#[derive(Deserialize)]
struct CallbackBody {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct SessionBody {
    #[serde(default)]
    user: Option<SessionUser>,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct SessionUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    requires_verification: bool,
}

/// Credentials flow against the service's session endpoints.
pub struct Flow {
    client: Arc<api::Client>,
}

impl Flow {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        validate_email(email).map_err(anyhow::Error::new)?;
        if password.is_empty() {
            bail!("auth: password is required");
        }

        let csrf_url = self.client.endpoint("/api/auth/csrf")?;
        let response = self.client.send(self.client.http().get(csrf_url), None)?;
        let csrf_cookie = find_cookie(response.headers(), &[CSRF_COOKIE, SECURE_CSRF_COOKIE]);
        let csrf: CsrfBody = response.json().context("auth: decode csrf token")?;

        let callback_url = self.client.endpoint("/api/auth/callback/credentials")?;
        let mut request = self.client.http().post(callback_url).form(&[
            ("csrfToken", csrf.csrf_token.as_str()),
            ("email", email),
            ("password", password),
            ("json", "true"),
        ]);
        if let Some(cookie) = &csrf_cookie {
            request = request.header(COOKIE, cookie.header_value());
        }
        let response = self
            .client
            .send(request, None)
            .context("auth: credentials callback")?;
        let cookie = find_cookie(response.headers(), &[SESSION_COOKIE, SECURE_SESSION_COOKIE]);
        let body: CallbackBody = response.json().unwrap_or(CallbackBody { url: None });
        if let Some(error) = body.url.as_deref().and_then(callback_error) {
            bail!("auth: sign-in rejected: {error}");
        }
        let cookie = cookie.ok_or_else(|| anyhow!("auth: sign-in rejected: no session issued"))?;

        let session = self.resume(cookie)?;
        info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    /// Rebuilds a session from a stored cookie, failing when the service no longer accepts it.
    pub fn resume(&self, cookie: SessionCookie) -> Result<Session> {
        let url = self.client.endpoint("/api/auth/session")?;
        let response = self
            .client
            .http()
            .get(url)
            .header(COOKIE, cookie.header_value());
        let body: SessionBody = self
            .client
            .send(response, None)?
            .json()
            .context("auth: decode session")?;
        let user = body
            .user
            .ok_or_else(|| anyhow!(FeedError::Unauthorized))
            .context("auth: session expired")?;
        let email = user.email.unwrap_or_default();
        let user_id = user
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        if user_id.is_empty() {
            bail!("auth: session is missing a user id");
        }
        let expires_at = body
            .expires
            .unwrap_or_else(|| Utc::now() + ChronoDuration::days(DEFAULT_SESSION_DAYS));
        debug!(%user_id, %expires_at, "session resumed");
        Ok(Session {
            user_id,
            email,
            cookie,
            expires_at,
        })
    }

    pub fn register(&self, email: &str, password: &str) -> Result<Registration> {
        let email = email.trim();
        validate_email(email).map_err(anyhow::Error::new)?;
        if password.is_empty() {
            return Err(FeedError::Validation("password is required".into()).into());
        }
        let url = self.client.endpoint("/api/auth/register")?;
        let response = self.client.send(
            self.client
                .http()
                .post(url)
                .json(&json!({ "email": email, "password": password })),
            None,
        )?;
        let body: RegisterBody = read_json(response).context("auth: decode registration")?;
        Ok(Registration {
            message: body.message,
            requires_verification: body.requires_verification,
        })
    }

    pub fn verify_email(&self, token: &str) -> Result<String> {
        let token = validate_verification_token(token).map_err(anyhow::Error::new)?;
        let url = self.client.endpoint("/api/auth/verify-email")?;
        let response = self.client.send(
            self.client
                .http()
                .post(url)
                .json(&json!({ "token": token })),
            None,
        )?;
        let body: serde_json::Value = read_json(response)?;
        Ok(body
            .get("message")
            .and_then(|value| value.as_str())
            .unwrap_or("Email verified")
            .to_string())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response.json::<T>().context("auth: decode response body")
}

pub fn validate_email(email: &str) -> Result<(), FeedError> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(FeedError::Validation(format!("{email:?} is not an email address")))
    }
}

/// Verification tokens are 32 random bytes, hex encoded.
pub fn validate_verification_token(token: &str) -> Result<String, FeedError> {
    let token = token.trim();
    match hex::decode(token) {
        Ok(bytes) if bytes.len() == VERIFICATION_TOKEN_BYTES => Ok(token.to_ascii_lowercase()),
        _ => Err(FeedError::Validation(
            "verification token must be 64 hex characters".into(),
        )),
    }
}

fn find_cookie(headers: &HeaderMap, names: &[&str]) -> Option<SessionCookie> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .find(|cookie| names.contains(&cookie.name.as_str()) && !cookie.value.is_empty())
}

fn parse_set_cookie(raw: &str) -> Option<SessionCookie> {
    let pair = raw.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    Some(SessionCookie {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
    })
}

fn callback_error(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(url)))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "error")
        .map(|(_, value)| value.into_owned())
}
