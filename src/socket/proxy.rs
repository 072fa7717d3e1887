use url::Url;
use zeroize::Zeroizing;

use crate::base::Target;

/// HTTP proxy configuration.
///
/// When a factory is configured with proxy settings, the raw connect goes
/// to the proxy and an HTTP CONNECT handshaker tunnels through it to the
/// real target. Only HTTP proxies are supported.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Proxy URL (e.g., `http://proxy.internal:3128`)
    pub url: Url,
    /// Proxy username for authentication
    pub username: Option<String>,
    /// Proxy password (zeroized on drop)
    pub password: Option<Zeroizing<String>>,
}

impl ProxySettings {
    /// Create proxy settings from a URL string.
    pub fn new(url_str: &str) -> Option<Self> {
        let url = Url::parse(url_str).ok()?;
        url.host_str()?;
        Some(Self { url, username: None, password: None })
    }

    /// Create proxy settings from environment variables.
    ///
    /// Checks `HTTPS_PROXY`/`https_proxy` and `HTTP_PROXY`/`http_proxy`.
    /// The result is consumed through explicit factory configuration; the
    /// environment is read once, here, never at connect time.
    pub fn from_env() -> Option<Self> {
        let url_str = std::env::var("HTTPS_PROXY")
            .or_else(|_| std::env::var("https_proxy"))
            .or_else(|_| std::env::var("HTTP_PROXY"))
            .or_else(|_| std::env::var("http_proxy"))
            .ok()?;
        Self::new(&url_str)
    }

    /// Add authentication credentials.
    pub fn with_auth(mut self, user: &str, pass: &str) -> Self {
        self.username = Some(user.to_string());
        self.password = Some(Zeroizing::new(pass.to_string()));
        self
    }

    /// The proxy endpoint the raw connect should dial.
    pub fn target(&self) -> Target {
        // new() guarantees a host; 80 matches the http scheme default.
        let host = self.url.host_str().unwrap_or_default();
        let port = self.url.port_or_known_default().unwrap_or(80);
        Target::new(host, port)
    }

    /// Get the `Proxy-Authorization` header value, if credentials are set.
    pub fn auth_header(&self) -> Option<String> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            use base64::{engine::general_purpose, Engine as _};
            let creds = format!("{}:{}", u, p.as_str());
            let encoded = general_purpose::STANDARD.encode(creds);
            Some(format!("Basic {}", encoded))
        } else {
            None
        }
    }
}
