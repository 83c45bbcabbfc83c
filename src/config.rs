use crate::error::{ProxifyError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiServerConfig,
    /// Tor control and SOCKS endpoints
    pub tor: TorConfig,
    /// Headless browser configuration
    pub browser: BrowserSettings,
    /// Cache backend configuration
    pub cache: CacheConfig,
    /// Retry loop configuration
    pub scrape: ScrapeConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 8987)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Static bearer token required on /scrape
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct TorConfig {
    /// Control port host (default: 127.0.0.1)
    pub control_host: String,
    /// Control port (default: 9051)
    pub control_port: u16,
    /// Password for HASHEDPASSWORD authentication
    pub control_password: Option<String>,
    /// Overrides the cookie file advertised by PROTOCOLINFO
    pub cookie_path: Option<PathBuf>,
    /// SOCKS proxy host (default: 127.0.0.1)
    pub socks_host: String,
    /// SOCKS proxy port (default: 9050)
    pub socks_port: u16,
    /// Lower bound of the post-NEWNYM wait, in seconds
    pub circuit_wait_min: u64,
    /// Upper bound of the post-NEWNYM wait, in seconds
    pub circuit_wait_max: u64,
}

impl TorConfig {
    /// Control port address
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control_host, self.control_port)
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Chromium executable; auto-detected when unset
    pub executable: Option<PathBuf>,
    /// Extra command line switches passed to Chromium
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// `redis://...` or `memory://`
    pub url: String,
    /// Expiry applied to freshly fetched pages, in seconds
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Maximum fetch attempts per request, 0 = unbounded
    pub max_attempts: u32,
    /// Pause after a blocked response, in milliseconds
    pub block_delay_ms: u64,
    /// IP echo endpoint probed after a successful fetch
    pub ip_echo_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let tor = TorConfig {
            control_host: get_env_or("TOR_CONTROL_HOST", "127.0.0.1"),
            control_port: parse_env("TOR_CONTROL_PORT", "9051", "a valid port number")?,
            control_password: get_env_opt("TOR_CONTROL_PASSWORD"),
            cookie_path: get_env_opt("TOR_COOKIE_PATH").map(PathBuf::from),
            socks_host: get_env_or("TOR_SOCKS_HOST", "127.0.0.1"),
            socks_port: parse_env("TOR_SOCKS_PORT", "9050", "a valid port number")?,
            circuit_wait_min: parse_env("TOR_CIRCUIT_WAIT_MIN", "10", "a number of seconds")?,
            circuit_wait_max: parse_env("TOR_CIRCUIT_WAIT_MAX", "15", "a number of seconds")?,
        };

        if tor.circuit_wait_min > tor.circuit_wait_max {
            return Err(ProxifyError::InvalidConfig(
                "TOR_CIRCUIT_WAIT_MIN must not exceed TOR_CIRCUIT_WAIT_MAX".into(),
            ));
        }

        let cache_url = get_env_or("CACHE_URL", "redis://127.0.0.1:6379/0");
        validate_cache_url(&cache_url)?;

        Ok(Config {
            api: ApiServerConfig {
                port: parse_env("API_PORT", "8987", "a valid port number")?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                token: get_env_or("API_TOKEN", "abc"),
            },
            tor,
            browser: BrowserSettings {
                executable: get_env_opt("BROWSER_EXECUTABLE").map(PathBuf::from),
                extra_args: get_env_or("BROWSER_ARGS", "")
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            },
            cache: CacheConfig {
                url: cache_url,
                ttl_secs: parse_env("CACHE_TTL_SECS", "172800", "a number of seconds")?,
            },
            scrape: ScrapeConfig {
                max_attempts: parse_env("SCRAPE_MAX_ATTEMPTS", "10", "a valid number")?,
                block_delay_ms: parse_env("SCRAPE_BLOCK_DELAY_MS", "1000", "a number of milliseconds")?,
                ip_echo_url: match env::var("IP_ECHO_URL") {
                    Ok(v) if v.trim().is_empty() => None,
                    Ok(v) => Some(v.trim().to_string()),
                    Err(_) => Some("http://httpbin.org/ip".to_string()),
                },
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Proxy URL handed to the browser
    pub fn socks_proxy_url(&self) -> String {
        format!("socks5://{}:{}", self.tor.socks_host, self.tor.socks_port)
    }

    /// TTL applied to cache writes; zero disables expiry
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.cache.ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn validate_cache_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| ProxifyError::InvalidConfig(format!("CACHE_URL must be a valid URL: {}", e)))?;

    match url.scheme() {
        "redis" | "rediss" | "memory" => Ok(()),
        other => Err(ProxifyError::InvalidConfig(format!(
            "CACHE_URL has unsupported scheme: {}",
            other
        ))),
    }
}

/// Parse an environment variable, falling back to a default
fn parse_env<T: FromStr>(key: &str, default: &str, expected: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| ProxifyError::InvalidConfig(format!("{} must be {}", key, expected)))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
