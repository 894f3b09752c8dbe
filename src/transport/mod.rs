//! HTTP transport shared by all network sources.
//!
//! Each upstream API is described by a [`SourceProfile`] (base URL, auth scheme,
//! accept header, body decoding). One [`HttpTransport`] per profile performs the
//! "authenticated GET + decode JSON" step; sources never touch reqwest directly.

pub mod http;

pub use http::{build_client, decode_body, HttpSettings, HttpTransport};

use std::fmt;

/// How a source authenticates its requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: token <t>` (GitHub personal tokens)
    Token(String),
    /// `Authorization: Bearer <t>`
    Bearer(String),
    /// HTTP basic auth
    Basic { user: String, password: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print credentials.
        match self {
            Auth::Token(_) => f.write_str("Token(***)"),
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
            Auth::Basic { user, .. } => write!(f, "Basic({}:***)", user),
        }
    }
}

/// How response bodies are turned into bytes before JSON decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyDecoding {
    /// Bodies are used as-is.
    Plain,
    /// Bodies carrying a gzip `Content-Encoding` are gunzipped first.
    GzipAware,
}

/// Everything needed to talk to one upstream API.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub name: &'static str,
    pub base_url: String,
    pub accept: String,
    pub auth: Auth,
    pub decoding: BodyDecoding,
}

pub const GITHUB_API: &str = "https://api.github.com";
pub const HEROKU_API: &str = "https://api.heroku.com";
pub const SNAPCI_API: &str = "https://api.snap-ci.com";

impl SourceProfile {
    pub fn github(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: "github",
            base_url: base_url.into(),
            accept: "application/vnd.github.v3+json".to_string(),
            auth: Auth::Token(token.into()),
            decoding: BodyDecoding::Plain,
        }
    }

    pub fn heroku(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: "heroku",
            base_url: base_url.into(),
            accept: "application/vnd.heroku+json; version=3".to_string(),
            auth: Auth::Bearer(token.into()),
            decoding: BodyDecoding::GzipAware,
        }
    }

    pub fn snapci(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            name: "snapci",
            base_url: base_url.into(),
            accept: "application/vnd.snap-ci.com.v1+json".to_string(),
            auth: Auth::Basic {
                user: user.into(),
                password: token.into(),
            },
            decoding: BodyDecoding::Plain,
        }
    }

    /// Absolute URL for a path below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Transport error: {0}")]
    Other(String),
}
