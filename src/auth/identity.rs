//! Authorization-code exchange against an OpenID Connect provider.

use crate::config::Config;
use crate::error::{BookingError, BookingResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";

/// Profile returned by the provider after a successful code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthUser {
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default, rename = "hd")]
    pub hosted_domain: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl OAuthUser {
    pub fn fullname(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

pub trait IdentityProvider {
    fn authorization_url(&self, callback: &str) -> BookingResult<String>;
    fn exchange(&self, code: &str, callback: &str) -> BookingResult<OAuthUser>;
}

#[derive(Debug, Clone)]
pub enum HostedDomainPolicy {
    /// Accept any verified email.
    Ignore,
    /// The profile must carry one of these hosted domains.
    Require(Vec<String>),
}

impl HostedDomainPolicy {
    /// An empty allowlist means the deployment did not configure one.
    pub fn require(domains: impl IntoIterator<Item = Option<String>>) -> Self {
        let domains: Vec<String> = domains.into_iter().flatten().collect();
        if domains.is_empty() {
            HostedDomainPolicy::Ignore
        } else {
            HostedDomainPolicy::Require(domains)
        }
    }
}

pub fn verify_identity(
    provider: &dyn IdentityProvider,
    code: &str,
    callback: &str,
    policy: &HostedDomainPolicy,
) -> BookingResult<OAuthUser> {
    if code.trim().is_empty() {
        return Err(BookingError::validation("code", "missing oauth token"));
    }
    let user = provider.exchange(code, callback)?;
    if !user.email_verified {
        return Err(BookingError::Identity(
            "user email not available or not verified by the provider".to_string(),
        ));
    }
    if let HostedDomainPolicy::Require(allowed) = policy {
        let Some(hd) = user.hosted_domain.as_deref() else {
            return Err(BookingError::Identity(
                "email is not on a hosted domain, please use your school email".to_string(),
            ));
        };
        if !allowed.iter().any(|d| d.eq_ignore_ascii_case(hd)) {
            return Err(BookingError::Identity(format!(
                "this system requires a {} account, but you logged in with {}",
                allowed.join(" or "),
                hd
            )));
        }
    }
    Ok(user)
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleProvider {
    client: reqwest::blocking::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    app_url: String,
}

impl GoogleProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            app_url: config.app_url.trim_end_matches('/').to_string(),
        }
    }

    fn credentials(&self) -> BookingResult<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(BookingError::Provider(
                "google client credentials are not configured".to_string(),
            )),
        }
    }

    fn discovery(&self) -> BookingResult<DiscoveryDocument> {
        Ok(self
            .client
            .get(GOOGLE_DISCOVERY_URL)
            .send()?
            .error_for_status()?
            .json()?)
    }
}

impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, callback: &str) -> BookingResult<String> {
        let (client_id, _) = self.credentials()?;
        let doc = self.discovery()?;
        let redirect = format!("{}{}", self.app_url, callback);
        let url = reqwest::Url::parse_with_params(
            &doc.authorization_endpoint,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect.as_str()),
                ("scope", "openid email profile"),
            ],
        )
        .map_err(|e| BookingError::Provider(e.to_string()))?;
        Ok(url.to_string())
    }

    fn exchange(&self, code: &str, callback: &str) -> BookingResult<OAuthUser> {
        let (client_id, client_secret) = self.credentials()?;
        let doc = self.discovery()?;
        let redirect = format!("{}{}", self.app_url, callback);
        let token: TokenResponse = self
            .client
            .post(&doc.token_endpoint)
            .basic_auth(client_id, Some(client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect.as_str()),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(self
            .client
            .get(&doc.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()?
            .error_for_status()?
            .json()?)
    }
}

/// Serves canned profiles keyed by authorization code. Used for local development
/// and the integration tests.
pub struct FixtureProvider {
    profiles: HashMap<String, OAuthUser>,
}

impl FixtureProvider {
    pub fn new(profiles: HashMap<String, OAuthUser>) -> Self {
        Self { profiles }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&raw)?))
    }
}

impl IdentityProvider for FixtureProvider {
    fn authorization_url(&self, callback: &str) -> BookingResult<String> {
        Ok(format!("fixture://authorize?redirect_uri={}", callback))
    }

    fn exchange(&self, code: &str, _callback: &str) -> BookingResult<OAuthUser> {
        self.profiles
            .get(code)
            .cloned()
            .ok_or_else(|| BookingError::Identity("unknown authorization code".to_string()))
    }
}

pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn IdentityProvider>> {
    match config.identity_fixtures.as_deref() {
        Some(path) => {
            tracing::warn!(path = %path.display(), "using fixture identity provider");
            Ok(Box::new(FixtureProvider::load(path)?))
        }
        None => Ok(Box::new(GoogleProvider::new(config))),
    }
}
