use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CatalogConfig;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid catalog response format: {message}")]
    InvalidResponse { message: String },

    #[error("Catalog configuration error: {message}")]
    ConfigError { message: String },
}

/// Catalog service seam: program membership and catalog containment.
pub trait CatalogClient: Send + Sync {
    /// Course keys belonging to a program; empty when the program is unknown.
    fn program_course_keys(&self, program_uuid: &Uuid) -> Result<Vec<String>, CatalogError>;

    fn catalog_contains_course(
        &self,
        catalog_uuid: &Uuid,
        course_id: &str,
    ) -> Result<bool, CatalogError>;
}

/// Catalog answered from in-memory maps, usually loaded from a fixture.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    programs: HashMap<Uuid, Vec<String>>,
    catalogs: HashMap<Uuid, Vec<String>>,
}

impl StaticCatalog {
    pub fn new(
        programs: BTreeMap<Uuid, Vec<String>>,
        catalogs: BTreeMap<Uuid, Vec<String>>,
    ) -> Self {
        Self {
            programs: programs.into_iter().collect(),
            catalogs: catalogs.into_iter().collect(),
        }
    }

    pub fn with_program(mut self, program_uuid: Uuid, course_ids: &[&str]) -> Self {
        self.programs
            .insert(program_uuid, course_ids.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_catalog(mut self, catalog_uuid: Uuid, course_ids: &[&str]) -> Self {
        self.catalogs
            .insert(catalog_uuid, course_ids.iter().map(|c| c.to_string()).collect());
        self
    }
}

impl CatalogClient for StaticCatalog {
    fn program_course_keys(&self, program_uuid: &Uuid) -> Result<Vec<String>, CatalogError> {
        Ok(self.programs.get(program_uuid).cloned().unwrap_or_default())
    }

    fn catalog_contains_course(
        &self,
        catalog_uuid: &Uuid,
        course_id: &str,
    ) -> Result<bool, CatalogError> {
        Ok(self
            .catalogs
            .get(catalog_uuid)
            .map(|courses| courses.iter().any(|c| c == course_id))
            .unwrap_or(false))
    }
}

#[derive(Debug, Deserialize)]
struct ProgramResponse {
    #[serde(default)]
    courses: Vec<ProgramCourse>,
}

#[derive(Debug, Deserialize)]
struct ProgramCourse {
    key: String,
}

#[derive(Debug, Deserialize)]
struct ContainsResponse {
    #[serde(default)]
    courses: HashMap<String, bool>,
}

/// Blocking HTTP client for the course discovery service
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let url = config.url.as_deref().ok_or_else(|| CatalogError::ConfigError {
            message: "catalog URL is required for the HTTP catalog client".to_string(),
        })?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CatalogError::ConfigError {
                message: format!(
                    "Invalid catalog URL format: {}. Must start with http:// or https://",
                    url
                ),
            });
        }
        if config.retry_attempts == 0 {
            return Err(CatalogError::ConfigError {
                message: "retry attempts must be at least 1".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CatalogError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            max_retries: config.retry_attempts,
        })
    }

    fn build_headers(&self) -> Result<HeaderMap, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                CatalogError::ConfigError {
                    message: format!("Invalid catalog token: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn retry_with_backoff<F, T>(&self, mut operation: F) -> Result<T, CatalogError>
    where
        F: FnMut() -> Result<T, Attempt>,
    {
        let mut last_error = None;
        let mut backoff_ms = 100;

        for attempt in 0..self.max_retries {
            match operation() {
                Ok(result) => return Ok(result),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    last_error = Some(e);
                    if attempt < self.max_retries - 1 {
                        warn!(
                            "Catalog attempt {} failed, retrying in {}ms",
                            attempt + 1,
                            backoff_ms
                        );
                        std::thread::sleep(Duration::from_millis(backoff_ms));
                        backoff_ms *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CatalogError::RequestFailed {
            message: "All retry attempts exhausted".to_string(),
        }))
    }

    /// GET a JSON document; `Ok(None)` on 404.
    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, CatalogError> {
        let headers = self.build_headers()?;
        self.retry_with_backoff(|| {
            let response = self
                .client
                .get(url)
                .headers(headers.clone())
                .query(query)
                .send()
                .map_err(|e| {
                    Attempt::Retry(CatalogError::RequestFailed {
                        message: e.to_string(),
                    })
                })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status.is_client_error() {
                return Err(Attempt::Fatal(CatalogError::RequestFailed {
                    message: format!("{} returned {}", url, status),
                }));
            }
            if !status.is_success() {
                return Err(Attempt::Retry(CatalogError::RequestFailed {
                    message: format!("{} returned {}", url, status),
                }));
            }

            response.json::<T>().map(Some).map_err(|e| {
                Attempt::Fatal(CatalogError::InvalidResponse {
                    message: e.to_string(),
                })
            })
        })
    }
}

enum Attempt {
    Retry(CatalogError),
    Fatal(CatalogError),
}

impl CatalogClient for HttpCatalogClient {
    fn program_course_keys(&self, program_uuid: &Uuid) -> Result<Vec<String>, CatalogError> {
        let url = format!("{}/api/v1/programs/{}/", self.base_url, program_uuid);
        debug!("Fetching program courses: {}", url);
        let program: Option<ProgramResponse> = self.get_json(&url, &[])?;
        Ok(program
            .map(|p| p.courses.into_iter().map(|c| c.key).collect())
            .unwrap_or_default())
    }

    fn catalog_contains_course(
        &self,
        catalog_uuid: &Uuid,
        course_id: &str,
    ) -> Result<bool, CatalogError> {
        let url = format!("{}/api/v1/catalogs/{}/contains/", self.base_url, catalog_uuid);
        debug!("Checking catalog {} for course {}", catalog_uuid, course_id);
        let contains: Option<ContainsResponse> = self.get_json(&url, &[("course_id", course_id)])?;
        Ok(contains
            .and_then(|c| c.courses.get(course_id).copied())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> CatalogConfig {
        CatalogConfig {
            url: Some(url.to_string()),
            token: None,
            retry_attempts: 3,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn rejects_url_without_scheme() {
        let err = HttpCatalogClient::new(&config("discovery.local")).err().unwrap();
        assert!(matches!(err, CatalogError::ConfigError { .. }));
    }

    #[test]
    fn trims_trailing_slash() {
        let client = HttpCatalogClient::new(&config("http://discovery.local/")).unwrap();
        assert_eq!(client.base_url, "http://discovery.local");
    }

    #[test]
    fn static_catalog_unknown_entries_are_empty() {
        let catalog = StaticCatalog::default();
        assert!(catalog.program_course_keys(&Uuid::new_v4()).unwrap().is_empty());
        assert!(!catalog.catalog_contains_course(&Uuid::new_v4(), "c1").unwrap());
    }
}
