use super::{Auth, BodyDecoding, SourceProfile, TransportError};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_ENCODING};
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use std::env;
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Client tuning shared by every source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("birdseye/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpSettings {
    /// Defaults with env overrides (`BIRDSEYE_HTTP_TIMEOUT_SECS`, `BIRDSEYE_HTTP_POOL_IDLE_TIMEOUT_SECS`).
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(secs) = env_secs("BIRDSEYE_HTTP_TIMEOUT_SECS") {
            settings.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_secs("BIRDSEYE_HTTP_POOL_IDLE_TIMEOUT_SECS") {
            settings.pool_idle_timeout = Duration::from_secs(secs);
        }
        settings
    }
}

fn env_secs(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}

/// Build the reqwest client used by all transports.
///
/// Redirects are not followed: the CI API hands out redirect links in the body
/// and those are resolved explicitly.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.timeout)
        .pool_idle_timeout(Some(settings.pool_idle_timeout))
        .redirect(Policy::none())
        .user_agent(settings.user_agent.clone())
        .build()
        .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))
}

/// Authenticated JSON GETs against one upstream API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    profile: SourceProfile,
}

impl HttpTransport {
    pub fn new(profile: SourceProfile, settings: &HttpSettings) -> Result<Self> {
        Ok(Self::with_client(build_client(settings)?, profile))
    }

    pub fn with_client(client: reqwest::Client, profile: SourceProfile) -> Self {
        Self { client, profile }
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    /// GET a path below the profile's base URL.
    pub async fn get_path<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json(&self.profile.endpoint(path)).await
    }

    /// GET an absolute URL and decode the JSON body.
    ///
    /// Anything but a 200 is an error, as is a body that does not decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let parsed = url::Url::parse(url).map_err(|e| {
            Error::Transport(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })?;

        let start = Instant::now();
        let mut request = self
            .client
            .get(parsed)
            .header(ACCEPT, self.profile.accept.as_str());
        request = match &self.profile.auth {
            Auth::Token(token) => request.header(AUTHORIZATION, format!("token {}", token)),
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status().as_u16();
        debug!(
            source = self.profile.name,
            http_status = status,
            url,
            duration_ms = start.elapsed().as_millis() as u64,
            "upstream response"
        );
        if status != 200 {
            return Err(Error::Remote {
                status,
                url: url.to_string(),
            });
        }

        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let raw = decode_body(self.profile.decoding, encoding.as_deref(), body)?;
        serde_json::from_slice(&raw).map_err(|e| {
            Error::decode_with_context(
                e.to_string(),
                ErrorContext::new()
                    .with_details(url.to_string())
                    .with_source(self.profile.name),
            )
        })
    }
}

/// Turn a raw response body into JSON bytes according to the profile's decoding.
pub fn decode_body(
    decoding: BodyDecoding,
    content_encoding: Option<&str>,
    body: Bytes,
) -> Result<Bytes> {
    let encoding = match (decoding, content_encoding) {
        (BodyDecoding::Plain, _) | (_, None) => return Ok(body),
        (BodyDecoding::GzipAware, Some(enc)) => enc.trim().to_ascii_lowercase(),
    };

    match encoding.as_str() {
        "" | "identity" => Ok(body),
        "gzip" | "x-gzip" => {
            let mut out = Vec::with_capacity(body.len() * 4);
            GzDecoder::new(body.as_ref())
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompress(e.to_string()))?;
            Ok(Bytes::from(out))
        }
        other => Err(Error::Decompress(format!(
            "unsupported content-encoding '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Bytes {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        Bytes::from(enc.finish().unwrap())
    }

    #[test]
    fn test_gzip_body_is_inflated() {
        let body = gzip(br#"[{"state":"up"}]"#);
        let out = decode_body(BodyDecoding::GzipAware, Some("gzip"), body).unwrap();
        assert_eq!(out.as_ref(), br#"[{"state":"up"}]"#);
    }

    #[test]
    fn test_missing_header_passes_body_through() {
        let out = decode_body(BodyDecoding::GzipAware, None, Bytes::from_static(b"[]")).unwrap();
        assert_eq!(out.as_ref(), b"[]");
    }

    #[test]
    fn test_plain_profile_ignores_encoding_header() {
        let out = decode_body(BodyDecoding::Plain, Some("gzip"), Bytes::from_static(b"{}")).unwrap();
        assert_eq!(out.as_ref(), b"{}");
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let err = decode_body(
            BodyDecoding::GzipAware,
            Some("gzip"),
            Bytes::from_static(b"not gzip at all"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decompress(_)));
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let err = decode_body(BodyDecoding::GzipAware, Some("br"), Bytes::from_static(b"x"))
            .unwrap_err();
        assert!(err.to_string().contains("br"));
    }

    #[test]
    fn test_settings_default_timeout() {
        let s = HttpSettings::default();
        assert_eq!(s.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(s.user_agent.starts_with("birdseye/"));
    }
}
