use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub retry_attempts: u32,
    pub timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            retry_attempts: 3,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentConfig {
    pub fixture_file: Option<PathBuf>,
    pub catalog: CatalogConfig,
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var,
            expected: "an integer",
            value: raw,
        }),
    }
}

pub fn load_from_env() -> Result<ConsentConfig, ConfigError> {
    let fixture_file = non_empty("CONSENT_FIXTURE_FILE").map(PathBuf::from);

    let url = non_empty("CONSENT_CATALOG_URL");
    if let Some(ref u) = url {
        if !u.starts_with("http://") && !u.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "CONSENT_CATALOG_URL",
                expected: "an http:// or https:// URL",
                value: u.clone(),
            });
        }
    }

    let defaults = CatalogConfig::default();
    let retry_attempts = parse_number("CONSENT_CATALOG_RETRY_ATTEMPTS", defaults.retry_attempts)?;
    if retry_attempts == 0 {
        return Err(ConfigError::InvalidValue {
            var: "CONSENT_CATALOG_RETRY_ATTEMPTS",
            expected: "at least 1",
            value: "0".to_string(),
        });
    }
    let timeout_seconds =
        parse_number("CONSENT_CATALOG_TIMEOUT_SECONDS", defaults.timeout_seconds)?;

    Ok(ConsentConfig {
        fixture_file,
        catalog: CatalogConfig {
            url,
            token: non_empty("CONSENT_CATALOG_TOKEN"),
            retry_attempts,
            timeout_seconds,
        },
    })
}
