// Shared transport configuration for building reqwest::Client instances.
//
// The reservation client and the SSE adapter share TLS, timeout, header and
// cookie settings through this module. The WebSocket adapter reuses the
// same auth headers on its upgrade request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (development backends with self-signed certs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Connect timeout for every request, and total timeout for
    /// request/response calls such as the reservation handshake.
    /// Streaming responses are never cut off by it.
    pub timeout: Duration,
    /// Sent as `Authorization: Bearer <token>` on every request.
    pub bearer_token: Option<SecretString>,
    /// Extra headers sent on every request (including the WebSocket upgrade).
    pub headers: Vec<(String, String)>,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            bearer_token: None,
            headers: Vec::new(),
            cookie_jar: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Only a connect timeout is set on the client; callers doing plain
    /// request/response apply [`timeout`](Self::timeout) per request.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .user_agent(concat!("livewire/", env!("CARGO_PKG_VERSION")))
            .default_headers(self.default_headers()?);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Headers for a WebSocket upgrade request to `url`.
    ///
    /// Mirrors what [`build_client`](Self::build_client) sends: the bearer
    /// token, extra headers, and any session cookies held for the URL's
    /// HTTP origin.
    pub fn upgrade_headers(&self, url: &Url) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.headers.len() + 2);

        if let Some(ref token) = self.bearer_token {
            headers.push((
                AUTHORIZATION.as_str().to_owned(),
                format!("Bearer {}", token.expose_secret()),
            ));
        }
        headers.extend(self.headers.iter().cloned());

        if let Some(cookie) = self.cookie_header(url) {
            headers.push(("Cookie".to_owned(), cookie));
        }

        headers
    }

    /// Create a config with a fresh cookie jar (for session-cookie auth).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }

    /// Create a config that authenticates with a bearer token.
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }

    fn default_headers(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::new();

        if let Some(ref token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| Error::InvalidHeader("bearer token is not a valid header value".into()))?;
            value.set_sensitive(true);
            map.insert(AUTHORIZATION, value);
        }

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidHeader(format!("bad name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidHeader(format!("bad value for '{name}': {e}")))?;
            map.insert(name, value);
        }

        Ok(map)
    }

    /// The `Cookie` header value the jar holds for `url`, if any.
    ///
    /// WebSocket URLs are looked up under their HTTP origin, since that is
    /// where the cookies were set.
    fn cookie_header(&self, url: &Url) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let mut origin = url.clone();
        let http_scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other,
        }
        .to_owned();
        origin.set_scheme(&http_scheme).ok()?;
        let cookies = jar.cookies(&origin)?;
        cookies.to_str().ok().map(String::from)
    }
}
