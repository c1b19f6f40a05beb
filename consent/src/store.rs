use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::model::{ConsentRecord, EnterpriseCustomer};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access fixture file: {path} - {message}")]
    FixtureFile { path: String, message: String },

    #[error("Failed to parse fixture file: {message}")]
    FixtureParse { message: String },

    #[error("Failed to serialize fixture: {message}")]
    FixtureSerialize { message: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Persistence seam for consent records keyed by (username, customer, course).
pub trait ConsentStore: Send + Sync {
    fn get(
        &self,
        username: &str,
        enterprise_customer: &Uuid,
        course_id: &str,
    ) -> Result<Option<ConsentRecord>, StoreError>;

    /// Insert or replace the stored row; the returned record always exists.
    fn save(&self, record: ConsentRecord) -> Result<ConsentRecord, StoreError>;
}

/// Lookup seam for enterprise customer policy.
pub trait CustomerStore: Send + Sync {
    fn get_customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, StoreError>;
}

/// On-disk snapshot of customers, consents and catalog data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub customers: Vec<EnterpriseCustomer>,
    #[serde(default)]
    pub consents: Vec<ConsentRecord>,
    #[serde(default)]
    pub programs: BTreeMap<Uuid, Vec<String>>,
    #[serde(default)]
    pub catalogs: BTreeMap<Uuid, Vec<String>>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        debug!("Loading consent fixture from: {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| StoreError::FixtureFile {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        serde_json::from_str(content).map_err(|e| StoreError::FixtureParse {
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::FixtureSerialize {
                message: e.to_string(),
            })?;
        fs::write(path, content).map_err(|e| StoreError::FixtureFile {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })
    }
}

type ConsentKey = (String, Uuid, String);

fn consent_key(username: &str, enterprise_customer: &Uuid, course_id: &str) -> ConsentKey {
    (username.to_string(), *enterprise_customer, course_id.to_string())
}

/// In-memory consent and customer store
#[derive(Default)]
pub struct MemoryStore {
    customers: RwLock<HashMap<Uuid, EnterpriseCustomer>>,
    consents: RwLock<HashMap<ConsentKey, ConsentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        let customers = fixture
            .customers
            .iter()
            .map(|c| (c.uuid, c.clone()))
            .collect();
        let consents = fixture
            .consents
            .iter()
            .map(|r| {
                let key = consent_key(&r.username, &r.enterprise_customer, &r.course_id);
                (key, ConsentRecord { exists: true, ..r.clone() })
            })
            .collect();
        Self {
            customers: RwLock::new(customers),
            consents: RwLock::new(consents),
        }
    }

    pub fn insert_customer(&self, customer: EnterpriseCustomer) -> Result<(), StoreError> {
        let mut customers = self.customers.write().map_err(|_| StoreError::Poisoned)?;
        customers.insert(customer.uuid, customer);
        Ok(())
    }

    /// Stored consent rows, ordered by username, customer and course.
    pub fn consents(&self) -> Result<Vec<ConsentRecord>, StoreError> {
        let consents = self.consents.read().map_err(|_| StoreError::Poisoned)?;
        let mut rows: Vec<ConsentRecord> = consents.values().cloned().collect();
        rows.sort_by(|a, b| {
            (&a.username, a.enterprise_customer, &a.course_id).cmp(&(
                &b.username,
                b.enterprise_customer,
                &b.course_id,
            ))
        });
        Ok(rows)
    }
}

impl ConsentStore for MemoryStore {
    fn get(
        &self,
        username: &str,
        enterprise_customer: &Uuid,
        course_id: &str,
    ) -> Result<Option<ConsentRecord>, StoreError> {
        let consents = self.consents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(consents
            .get(&consent_key(username, enterprise_customer, course_id))
            .cloned())
    }

    fn save(&self, record: ConsentRecord) -> Result<ConsentRecord, StoreError> {
        let record = ConsentRecord {
            exists: true,
            ..record
        };
        let key = consent_key(&record.username, &record.enterprise_customer, &record.course_id);
        let mut consents = self.consents.write().map_err(|_| StoreError::Poisoned)?;
        consents.insert(key, record.clone());
        Ok(record)
    }
}

impl CustomerStore for MemoryStore {
    fn get_customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, StoreError> {
        let customers = self.customers.read().map_err(|_| StoreError::Poisoned)?;
        Ok(customers.get(uuid).cloned())
    }
}
