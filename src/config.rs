use std::{env, time::Duration};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub port: u16,
    pub http_timeout: Duration,
    pub cookie_secure: bool,
    pub static_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            port: 8080,
            http_timeout: Duration::from_secs(30),
            cookie_secure: false,
            static_dir: "./static".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset or unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            api_base_url: value("API_BASE_URL").unwrap_or(defaults.api_base_url),
            port: value("PORT")
                .and_then(|port| port.trim().parse().ok())
                .unwrap_or(defaults.port),
            http_timeout: value("HTTP_TIMEOUT_SECS")
                .and_then(|secs| secs.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            cookie_secure: value("COOKIE_SECURE")
                .map(|flag| matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.cookie_secure),
            static_dir: value("STATIC_DIR").unwrap_or(defaults.static_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_overrides_and_keeps_defaults() {
        let vars: HashMap<&str, &str> = [
            ("API_BASE_URL", "http://gateway:5000"),
            ("PORT", "not-a-port"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("COOKIE_SECURE", "TRUE"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(config.api_base_url, "http://gateway:5000");
        assert_eq!(config.port, 8080);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(config.cookie_secure);
        assert_eq!(config.static_dir, "./static");
    }
}
