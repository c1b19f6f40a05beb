//! Wires the consent policy from environment config and CLI overrides

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use clap::Args;
use consent::config::load_from_env;
use consent::{CatalogClient, ConsentPolicy, Fixture, HttpCatalogClient, MemoryStore, StaticCatalog};
use tracing::debug;

/// Where consent data and the catalog come from; each flag overrides its env var
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// JSON fixture holding customers, consents, programs and catalogs
    #[arg(long, global = true, value_name = "FILE", env = "CONSENT_FIXTURE_FILE")]
    pub fixture: Option<PathBuf>,

    /// Base URL of the catalog service; the fixture catalog is used when unset
    #[arg(long, global = true, env = "CONSENT_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// Bearer token for the catalog service
    #[arg(long, global = true, env = "CONSENT_CATALOG_TOKEN", hide_env_values = true)]
    pub catalog_token: Option<String>,

    /// Catalog request attempts before giving up
    #[arg(
        long,
        global = true,
        env = "CONSENT_CATALOG_RETRY_ATTEMPTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub catalog_retry_attempts: Option<u32>,

    /// Catalog request timeout in seconds
    #[arg(long, global = true, env = "CONSENT_CATALOG_TIMEOUT_SECONDS")]
    pub catalog_timeout_seconds: Option<u64>,
}

pub struct Context {
    pub policy: ConsentPolicy,
    store: Arc<MemoryStore>,
    fixture: Fixture,
    fixture_path: Option<PathBuf>,
}

impl Context {
    pub fn load(source: &SourceArgs) -> Result<Self> {
        let mut cfg = load_from_env().context("invalid consent configuration")?;
        if source.fixture.is_some() {
            cfg.fixture_file = source.fixture.clone();
        }
        if source.catalog_url.is_some() {
            cfg.catalog.url = source.catalog_url.clone();
        }
        if source.catalog_token.is_some() {
            cfg.catalog.token = source.catalog_token.clone();
        }
        if let Some(attempts) = source.catalog_retry_attempts {
            cfg.catalog.retry_attempts = attempts;
        }
        if let Some(timeout) = source.catalog_timeout_seconds {
            cfg.catalog.timeout_seconds = timeout;
        }

        let fixture = match cfg.fixture_file {
            Some(ref path) => Fixture::load(path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?,
            None => Fixture::default(),
        };
        let store = Arc::new(MemoryStore::from_fixture(&fixture));

        let catalog: Arc<dyn CatalogClient> = match cfg.catalog.url {
            Some(ref url) => {
                debug!("Using catalog service at {}", url);
                Arc::new(HttpCatalogClient::new(&cfg.catalog)?)
            }
            None => Arc::new(StaticCatalog::new(
                fixture.programs.clone(),
                fixture.catalogs.clone(),
            )),
        };

        Ok(Self {
            policy: ConsentPolicy::with_memory_store(store.clone(), catalog),
            store,
            fixture,
            fixture_path: cfg.fixture_file,
        })
    }

    /// Write the current consent rows back to the fixture file.
    pub fn persist(&self) -> Result<()> {
        let path = self
            .fixture_path
            .as_ref()
            .ok_or_else(|| anyhow!("--fixture or CONSENT_FIXTURE_FILE is required to record consent"))?;
        let fixture = Fixture {
            consents: self.store.consents()?,
            ..self.fixture.clone()
        };
        fixture
            .save(path)
            .with_context(|| format!("failed to write fixture {}", path.display()))
    }
}
