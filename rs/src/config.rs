use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    // Used to rebuild htu behind proxies, e.g. https://api.example.com
    pub public_base_url: Option<String>,
    pub introspection_endpoint: String,
    pub introspection_client_id: String,
    pub introspection_client_secret: String,
    pub introspection_timeout: Duration,
    // DPoP proof window (seconds)
    pub dpop_max_age_seconds: i64,
    pub dpop_clock_skew_seconds: i64,
    pub dpop_replay_protection: bool,
    pub valkey_url: Option<String>,
    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("public_base_url", &self.public_base_url)
            .field("introspection_endpoint", &self.introspection_endpoint)
            .field("introspection_client_id", &self.introspection_client_id)
            .field("introspection_client_secret", &"[REDACTED]")
            .field("introspection_timeout", &self.introspection_timeout)
            .field("dpop_max_age_seconds", &self.dpop_max_age_seconds)
            .field("dpop_clock_skew_seconds", &self.dpop_clock_skew_seconds)
            .field("dpop_replay_protection", &self.dpop_replay_protection)
            .field("valkey_url", &self.valkey_url.as_ref().map(|_| "[set]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = parse_or(var("PORT"), "PORT", 8080)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let public_base_url = match var("PUBLIC_BASE_URL") {
            Some(raw) => {
                let url = url::Url::parse(raw.trim())
                    .map_err(|_| ConfigError::Invalid("PUBLIC_BASE_URL"))?;
                if !url.has_host() {
                    return Err(ConfigError::Invalid("PUBLIC_BASE_URL"));
                }
                Some(raw.trim().trim_end_matches('/').to_string())
            }
            None => None,
        };

        let introspection_endpoint = var("INTROSPECTION_ENDPOINT")
            .ok_or(ConfigError::Missing("INTROSPECTION_ENDPOINT"))?;
        url::Url::parse(&introspection_endpoint)
            .map_err(|_| ConfigError::Invalid("INTROSPECTION_ENDPOINT"))?;
        let introspection_client_id = var("INTROSPECTION_CLIENT_ID")
            .ok_or(ConfigError::Missing("INTROSPECTION_CLIENT_ID"))?;
        let introspection_client_secret = var("INTROSPECTION_CLIENT_SECRET")
            .ok_or(ConfigError::Missing("INTROSPECTION_CLIENT_SECRET"))?;

        let timeout_ms: u64 = parse_or(
            var("INTROSPECTION_TIMEOUT_MS"),
            "INTROSPECTION_TIMEOUT_MS",
            5_000,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid("INTROSPECTION_TIMEOUT_MS"));
        }

        let dpop_max_age_seconds: i64 =
            parse_or(var("DPOP_MAX_AGE_SECONDS"), "DPOP_MAX_AGE_SECONDS", 60)?;
        if dpop_max_age_seconds <= 0 {
            return Err(ConfigError::Invalid("DPOP_MAX_AGE_SECONDS"));
        }
        let dpop_clock_skew_seconds: i64 =
            parse_or(var("DPOP_CLOCK_SKEW_SECONDS"), "DPOP_CLOCK_SKEW_SECONDS", 5)?;
        if dpop_clock_skew_seconds < 0 {
            return Err(ConfigError::Invalid("DPOP_CLOCK_SKEW_SECONDS"));
        }

        let dpop_replay_protection = match var("DPOP_REPLAY_PROTECTION") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("DPOP_REPLAY_PROTECTION"))?,
            None => false,
        };

        let valkey_url = var("VALKEY_URL");

        let request_timeout_seconds: u64 =
            parse_or(var("REQUEST_TIMEOUT_SECONDS"), "REQUEST_TIMEOUT_SECONDS", 30)?;

        Ok(Config {
            addr,
            app_env,
            public_base_url,
            introspection_endpoint,
            introspection_client_id,
            introspection_client_secret,
            introspection_timeout: Duration::from_millis(timeout_ms),
            dpop_max_age_seconds,
            dpop_clock_skew_seconds,
            dpop_replay_protection,
            valkey_url,
            request_timeout: Duration::from_secs(request_timeout_seconds),
        })
    }
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let mut vars: HashMap<String, String> = [
            ("INTROSPECTION_ENDPOINT", "https://as.example.com/introspect"),
            ("INTROSPECTION_CLIENT_ID", "rs"),
            ("INTROSPECTION_CLIENT_SECRET", "s3cr3t-value"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.public_base_url, None);
        assert_eq!(config.introspection_timeout, Duration::from_millis(5_000));
        assert_eq!(config.dpop_max_age_seconds, 60);
        assert_eq!(config.dpop_clock_skew_seconds, 5);
        assert!(!config.dpop_replay_protection);
        assert_eq!(config.valkey_url, None);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("PORT", "9000"),
            ("APP_ENV", "PROD"),
            ("PUBLIC_BASE_URL", "https://rs.example.com/"),
            ("INTROSPECTION_TIMEOUT_MS", "250"),
            ("DPOP_REPLAY_PROTECTION", "true"),
            ("VALKEY_URL", "redis://127.0.0.1:6379"),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert!(config.app_env.is_production());
        assert_eq!(config.public_base_url.as_deref(), Some("https://rs.example.com"));
        assert_eq!(config.introspection_timeout, Duration::from_millis(250));
        assert!(config.dpop_replay_protection);
        assert!(config.valkey_url.is_some());
    }

    #[test]
    fn public_base_url_may_carry_a_path_prefix() {
        let config = config(&[("PUBLIC_BASE_URL", "https://api.example.com/rs/")]).unwrap();
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://api.example.com/rs")
        );
    }

    #[test]
    fn missing_required() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::Missing("INTROSPECTION_ENDPOINT"));

        let err = config(&[("INTROSPECTION_CLIENT_SECRET", " ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("INTROSPECTION_CLIENT_SECRET"));
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            config(&[("PORT", "http")]).unwrap_err(),
            ConfigError::Invalid("PORT")
        );
        assert_eq!(
            config(&[("PUBLIC_BASE_URL", "not a url")]).unwrap_err(),
            ConfigError::Invalid("PUBLIC_BASE_URL")
        );
        assert_eq!(
            config(&[("DPOP_MAX_AGE_SECONDS", "0")]).unwrap_err(),
            ConfigError::Invalid("DPOP_MAX_AGE_SECONDS")
        );
        assert_eq!(
            config(&[("DPOP_REPLAY_PROTECTION", "maybe")]).unwrap_err(),
            ConfigError::Invalid("DPOP_REPLAY_PROTECTION")
        );
    }

    #[test]
    fn debug_hides_secret() {
        let printed = format!("{:?}", config(&[]).unwrap());
        assert!(!printed.contains("s3cr3t-value"));
        assert!(printed.contains("[REDACTED]"));
    }
}
