//! Endpoint addressing and request headers.
//!
//! An [`Endpoint`] is the pair of base address and optional bearer credential that every request
//! is issued against.  The helpers here are pure: they build URLs and header maps and never touch
//! the network.

use std::env;
use std::fmt;

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::error::{Error, Result};

/// Base address of a locally running server.
pub const LOCAL_BASE_URL: &str = "http://localhost:11434";

/// Base address of the hosted service.
pub const CLOUD_BASE_URL: &str = "https://ollama.com";

/// Environment variable consulted for the default base address.
pub const BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

/// Environment variable consulted for the default credential.
pub const API_KEY_ENV: &str = "OLLAMA_API_KEY";

/// Address and credential of a service.
///
/// Equality and hashing cover both fields, so two endpoints that differ only in credential are
/// distinct; the model catalog relies on this to keep their results apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    base_url: String,
    api_key: Option<String>,
}

impl Endpoint {
    /// Creates an endpoint.  An empty credential is the same as no credential.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    /// The local server at [`LOCAL_BASE_URL`].
    pub fn local() -> Self {
        Self::new(LOCAL_BASE_URL, None)
    }

    /// The hosted service at [`CLOUD_BASE_URL`].
    pub fn cloud() -> Self {
        Self::new(CLOUD_BASE_URL, None)
    }

    /// A user-supplied address.  The address must parse as an absolute http(s) URL.
    pub fn custom(base_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(base_url.trim())?;
        match parsed.scheme() {
            "http" | "https" => Ok(Self::new(base_url.trim(), None)),
            scheme => Err(Error::validation(
                format!("unsupported URL scheme {scheme:?}"),
                Some("endpoint".to_string()),
            )),
        }
    }

    /// Resolves an endpoint choice: `local`, `cloud`, or a custom URL.
    pub fn from_choice(choice: &str) -> Result<Self> {
        match choice.trim().to_lowercase().as_str() {
            "local" => Ok(Self::local()),
            "cloud" => Ok(Self::cloud()),
            _ => Self::custom(choice),
        }
    }

    /// The endpoint described by `OLLAMA_BASE_URL` and `OLLAMA_API_KEY`, falling back to the
    /// hosted service without a credential.
    pub fn from_env() -> Self {
        let base_url = env::var(BASE_URL_ENV).unwrap_or_else(|_| CLOUD_BASE_URL.to_string());
        let api_key = env::var(API_KEY_ENV).ok();
        Self::new(base_url, api_key)
    }

    /// Returns this endpoint with the credential replaced.
    pub fn with_api_key(self, api_key: Option<String>) -> Self {
        Self::new(self.base_url, api_key)
    }

    /// The base address as configured.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The bearer credential, if one is configured.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Fully qualified URL for `path` on this endpoint.
    pub fn url(&self, path: &str) -> String {
        api_url(&self.base_url, path)
    }

    /// Headers for a request against this endpoint.
    pub fn headers(&self) -> Result<HeaderMap> {
        auth_headers(self.api_key())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::from_env()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

/// Joins `base_url` and `path` with exactly one separating slash.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Request headers for an optional credential.
///
/// Always declares a JSON content type.  Adds a bearer authorization header only when the
/// credential is present and non-empty.
pub fn auth_headers(api_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(key) = api_key.filter(|key| !key.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
            Error::validation(
                "API key contains characters not allowed in a header",
                Some("api_key".to_string()),
            )
        })?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_ignores_trailing_slash() {
        for base in ["http://localhost:11434", "https://ollama.com/proxy"] {
            assert_eq!(
                api_url(base, "/api/tags"),
                api_url(&format!("{base}/"), "/api/tags")
            );
        }
        assert_eq!(
            api_url("http://localhost:11434/", "/api/chat"),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(
            api_url("http://localhost:11434", "api/chat"),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn headers_without_key() {
        for key in [None, Some("")] {
            let headers = auth_headers(key).unwrap();
            assert_eq!(headers[header::CONTENT_TYPE], "application/json");
            assert!(!headers.contains_key(header::AUTHORIZATION));
        }
    }

    #[test]
    fn headers_with_key() {
        let headers = auth_headers(Some("sk-123")).unwrap();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer sk-123");
    }

    #[test]
    fn headers_reject_bad_key() {
        let err = auth_headers(Some("bad\nkey")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn empty_key_is_no_key() {
        let a = Endpoint::new(LOCAL_BASE_URL, Some(String::new()));
        assert_eq!(a, Endpoint::local());
        assert!(a.api_key().is_none());
    }

    #[test]
    fn endpoint_identity_includes_key() {
        let a = Endpoint::cloud();
        let b = Endpoint::cloud().with_api_key(Some("secret".to_string()));
        assert_ne!(a, b);
    }

    #[test]
    fn endpoint_choices() {
        assert_eq!(Endpoint::from_choice("local").unwrap(), Endpoint::local());
        assert_eq!(Endpoint::from_choice("Cloud").unwrap(), Endpoint::cloud());
        let custom = Endpoint::from_choice("http://gpu-box:11434/").unwrap();
        assert_eq!(custom.url("/api/tags"), "http://gpu-box:11434/api/tags");
        assert!(Endpoint::from_choice("not a url").is_err());
        assert!(Endpoint::from_choice("ftp://gpu-box").unwrap_err().is_validation());
    }
}
