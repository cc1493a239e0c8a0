use std::env;
use std::time::Duration;

/// Token value shipped in `.env.example`; treated the same as an unset token.
pub const PLACEHOLDER_TOKEN: &str = "your_access_token_here";
pub const DEFAULT_API_URL: &str = "https://api.nature.global";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("NATURE_API_TOKEN is not set; copy .env.example to .env and add your access token from home.nature.global")]
    MissingToken,
    #[error("NATURE_API_URL is not a valid URL: {0}")]
    InvalidUrl(String),
}

/// Runtime configuration for the Nature API client.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub api_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment.
    ///
    /// Env vars:
    /// - NATURE_API_TOKEN [required]
    /// - NATURE_API_URL (default: https://api.nature.global)
    /// - NATURE_HTTP_TIMEOUT_SECS (default: 30)
    /// - NATURE_POLL_INTERVAL_SECS (default: 60, minimum 1)
    /// - NATURE_USER_AGENT (default: power-monitor/<version>)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("NATURE_API_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != PLACEHOLDER_TOKEN)
            .ok_or(ConfigError::MissingToken)?;

        let api_url = lookup("NATURE_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&api_url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        let api_url = api_url.trim_end_matches('/').to_string();

        let timeout_secs = lookup("NATURE_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let poll_interval_secs = lookup("NATURE_POLL_INTERVAL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60)
            .max(1);
        let user_agent = lookup("NATURE_USER_AGENT")
            .unwrap_or_else(|| format!("power-monitor/{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            token,
            api_url,
            user_agent,
            timeout_secs,
            poll_interval_secs,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn missing_token_is_an_error() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::MissingToken);
        assert_eq!(
            load(&[("NATURE_API_TOKEN", "  ")]).unwrap_err(),
            ConfigError::MissingToken
        );
        assert_eq!(
            load(&[("NATURE_API_TOKEN", PLACEHOLDER_TOKEN)]).unwrap_err(),
            ConfigError::MissingToken
        );
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("NATURE_API_TOKEN", "tok")]).unwrap();
        assert_eq!(cfg.token, "tok");
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert!(cfg.user_agent.starts_with("power-monitor/"));
    }

    #[test]
    fn overrides_and_clamping() {
        let cfg = load(&[
            ("NATURE_API_TOKEN", "tok"),
            ("NATURE_API_URL", "http://127.0.0.1:8080/"),
            ("NATURE_HTTP_TIMEOUT_SECS", "5"),
            ("NATURE_POLL_INTERVAL_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.api_url, "http://127.0.0.1:8080");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.poll_interval_secs, 1);
    }

    #[test]
    fn invalid_url_rejected() {
        let err = load(&[("NATURE_API_TOKEN", "tok"), ("NATURE_API_URL", "not a url")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }
}
