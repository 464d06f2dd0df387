//! Log in to an OpenStack identity service.
//!
//! Swift stores, including Rackspace Cloud Files, hand out access via
//! the identity (Keystone) v2.0 API: the client posts its credentials
//! and gets back a token plus a catalog of service endpoints, one per
//! region. This module implements just enough of that API to find the
//! object store endpoint of one region.

use log::{debug, info};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;

const OBJECT_STORE: &str = "object-store";

/// How to prove who we are.
#[derive(Clone)]
pub enum Credentials {
    /// Rackspace API key.
    ApiKey {
        /// Account user name.
        username: String,
        /// API key of the user.
        api_key: String,
    },

    /// Plain Keystone password.
    Password {
        /// Account user name.
        username: String,
        /// Password of the user.
        password: String,
        /// Tenant (project) to scope the token to, if any.
        tenant_name: Option<String>,
    },
}

impl Credentials {
    fn request_body(&self) -> serde_json::Value {
        match self {
            Self::ApiKey { username, api_key } => json!({
                "auth": {
                    "RAX-KSKEY:apiKeyCredentials": {
                        "username": username,
                        "apiKey": api_key,
                    }
                }
            }),
            Self::Password {
                username,
                password,
                tenant_name,
            } => {
                let mut body = json!({
                    "auth": {
                        "passwordCredentials": {
                            "username": username,
                            "password": password,
                        }
                    }
                });
                if let Some(tenant) = tenant_name {
                    body["auth"]["tenantName"] = json!(tenant);
                }
                body
            }
        }
    }

    fn username(&self) -> &str {
        match self {
            Self::ApiKey { username, .. } | Self::Password { username, .. } => username,
        }
    }
}

impl fmt::Debug for Credentials {
    /// Format credentials without revealing secrets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey { username, .. } => f
                .debug_struct("ApiKey")
                .field("username", username)
                .field("api_key", &"***")
                .finish(),
            Self::Password {
                username,
                tenant_name,
                ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .field("tenant_name", tenant_name)
                .finish(),
        }
    }
}

/// A logged in session with the object store.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Value for the `X-Auth-Token` header.
    pub token: String,
    /// Base URL of the object store account.
    pub storage_url: Url,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("storage_url", &self.storage_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<Service>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: Option<String>,
    #[serde(rename = "internalURL")]
    internal_url: Option<String>,
}

/// Log in and find the object store endpoint for a region.
pub fn authenticate(
    client: &reqwest::blocking::Client,
    auth_url: &str,
    credentials: &Credentials,
    region: &str,
    internal: bool,
) -> Result<Session, IdentityError> {
    let url = format!("{}/tokens", auth_url.trim_end_matches('/'));
    info!("authenticating as {} at {}", credentials.username(), url);

    let res = client
        .post(&url)
        .json(&credentials.request_body())
        .send()
        .map_err(IdentityError::ReqwestError)?;
    let status = res.status();
    if !status.is_success() {
        return Err(IdentityError::Rejected(status));
    }
    let body = res.bytes().map_err(IdentityError::ReqwestError)?;
    let session = parse_response(&body, region, internal)?;
    debug!("authenticated: {:?}", session);
    Ok(session)
}

fn parse_response(body: &[u8], region: &str, internal: bool) -> Result<Session, IdentityError> {
    let response: AuthResponse = serde_json::from_slice(body).map_err(IdentityError::JsonParse)?;
    let access = response.access;

    let service = access
        .service_catalog
        .iter()
        .find(|service| service.kind == OBJECT_STORE)
        .ok_or(IdentityError::NoObjectStore)?;

    let endpoint = service
        .endpoints
        .iter()
        .find(|endpoint| {
            endpoint
                .region
                .as_deref()
                .map(|r| r.eq_ignore_ascii_case(region))
                .unwrap_or(false)
        })
        .ok_or_else(|| IdentityError::NoEndpoint(region.to_string()))?;

    let url = if internal {
        endpoint.internal_url.as_ref()
    } else {
        endpoint.public_url.as_ref()
    };
    let url = url
        .ok_or_else(|| IdentityError::NoEndpoint(region.to_string()))?
        .trim_end_matches('/');
    let storage_url = match Url::parse(url) {
        Ok(parsed) if !parsed.cannot_be_a_base() => parsed,
        _ => return Err(IdentityError::BadStorageUrl(url.to_string())),
    };

    Ok(Session {
        token: access.token.id,
        storage_url,
    })
}

/// Possible errors from logging in.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The identity service said no.
    #[error("identity service refused credentials: HTTP status {0}")]
    Rejected(StatusCode),

    /// The service catalog has no object store at all.
    #[error("service catalog has no object-store service")]
    NoObjectStore,

    /// The object store has no endpoint in the requested region.
    #[error("object store has no endpoint in region {0}")]
    NoEndpoint(String),

    /// The object store endpoint is not a usable URL.
    #[error("object store endpoint is not a valid URL: {0}")]
    BadStorageUrl(String),

    /// An error from the HTTP library.
    #[error("error from reqwest library: {0}")]
    ReqwestError(reqwest::Error),

    /// Error parsing JSON.
    #[error("failed to parse identity response: {0}")]
    JsonParse(serde_json::Error),
}

impl IdentityError {
    /// Might logging in work if tried again?
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ReqwestError(_) => true,
            Self::Rejected(status) => status.is_server_error(),
            _ => false,
        }
    }
}
