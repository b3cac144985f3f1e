use std::time::Duration;

use url::Url;

use crate::engine::router::RouterMode;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "gemma2-9b-it";
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 15_000;
const LLM_TIMEOUT_BOUNDS_MS: (u64, u64) = (500, 120_000);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid {var}='{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Url,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub router_mode: RouterMode,
    pub llm: LlmConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError {
                var: "PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let router_mode = match get("HCP_ROUTER_MODE") {
            Some(raw) => RouterMode::parse(&raw).ok_or_else(|| ConfigError {
                var: "HCP_ROUTER_MODE",
                value: raw.clone(),
                reason: "expected 'direct' or 'intelligent'".to_string(),
            })?,
            None => RouterMode::Direct,
        };

        let base_url_raw = get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        let base_url = Url::parse(&base_url_raw).map_err(|e| ConfigError {
            var: "LLM_BASE_URL",
            value: base_url_raw.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError {
                var: "LLM_BASE_URL",
                value: base_url_raw,
                reason: "scheme must be http or https".to_string(),
            });
        }

        let timeout_ms = match get("LLM_TIMEOUT_MS") {
            Some(raw) => {
                let ms = raw.parse::<u64>().map_err(|e| ConfigError {
                    var: "LLM_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                let (min, max) = LLM_TIMEOUT_BOUNDS_MS;
                if !(min..=max).contains(&ms) {
                    return Err(ConfigError {
                        var: "LLM_TIMEOUT_MS",
                        value: raw,
                        reason: format!("must be between {min} and {max}"),
                    });
                }
                ms
            }
            None => DEFAULT_LLM_TIMEOUT_MS,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            port,
            router_mode,
            llm: LlmConfig {
                api_key: get("LLM_API_KEY").or_else(|| get("GROQ_API_KEY")),
                base_url,
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| env.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.router_mode, RouterMode::Direct);
        assert!(config.database_url.is_none());
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm.timeout, Duration::from_millis(DEFAULT_LLM_TIMEOUT_MS));
    }

    #[test]
    fn groq_key_is_accepted_as_fallback() {
        let config = config(&[("GROQ_API_KEY", "gsk-1"), ("HCP_ROUTER_MODE", "Intelligent")])
            .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk-1"));
        assert_eq!(config.router_mode, RouterMode::Intelligent);
    }

    #[test]
    fn timeout_is_bounded() {
        let err = config(&[("LLM_TIMEOUT_MS", "10")]).unwrap_err();
        assert_eq!(err.var, "LLM_TIMEOUT_MS");
        assert!(config(&[("LLM_TIMEOUT_MS", "2500")]).is_ok());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(config(&[("PORT", "http")]).unwrap_err().var, "PORT");
        assert_eq!(
            config(&[("HCP_ROUTER_MODE", "psychic")]).unwrap_err().var,
            "HCP_ROUTER_MODE"
        );
        assert_eq!(
            config(&[("LLM_BASE_URL", "ftp://models.example")]).unwrap_err().var,
            "LLM_BASE_URL"
        );
    }
}
