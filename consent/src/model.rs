use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConsentError;

/// Where an enterprise customer enforces data sharing consent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentEnforcement {
    #[default]
    AtEnrollment,
    ExternallyManaged,
}

impl std::fmt::Display for ConsentEnforcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsentEnforcement::AtEnrollment => write!(f, "at_enrollment"),
            ConsentEnforcement::ExternallyManaged => write!(f, "externally_managed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseCustomer {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enable_data_sharing_consent: bool,
    #[serde(default)]
    pub enforce_data_sharing_consent: ConsentEnforcement,
    #[serde(default)]
    pub catalogs: Vec<Uuid>,
}

impl EnterpriseCustomer {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            enable_data_sharing_consent: false,
            enforce_data_sharing_consent: ConsentEnforcement::default(),
            catalogs: Vec::new(),
        }
    }

    /// Consent is requested unless it is disabled or handled outside the platform.
    pub fn requests_data_sharing_consent(&self) -> bool {
        self.enable_data_sharing_consent
            && self.enforce_data_sharing_consent != ConsentEnforcement::ExternallyManaged
    }

    pub fn enforces_data_sharing_consent(&self, location: ConsentEnforcement) -> bool {
        self.requests_data_sharing_consent() && self.enforce_data_sharing_consent == location
    }
}

fn stored() -> bool {
    true
}

/// Consent of one learner to one enterprise customer for one course.
///
/// `exists` is false for proxy records synthesized when the store has no row;
/// such records are never granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub username: String,
    pub enterprise_customer: Uuid,
    pub course_id: String,
    #[serde(default)]
    pub granted: bool,
    #[serde(default = "stored")]
    pub exists: bool,
}

impl ConsentRecord {
    pub fn proxy(username: &str, enterprise_customer: Uuid, course_id: &str) -> Self {
        Self {
            username: username.to_string(),
            enterprise_customer,
            course_id: course_id.to_string(),
            granted: false,
            exists: false,
        }
    }
}

/// Derived consent for a program, built from the records of its courses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramConsentRecord {
    pub username: String,
    pub enterprise_customer: Uuid,
    pub program_uuid: Uuid,
    pub granted: bool,
    pub exists: bool,
    pub child_consents: Vec<ConsentRecord>,
}

impl ProgramConsentRecord {
    /// Aggregate course records into a program record.
    ///
    /// Returns `Ok(None)` when there are no children or any child is missing.
    /// Granted only if every child is granted; exists if any child exists.
    pub fn from_children(
        program_uuid: Uuid,
        children: Vec<Option<ConsentRecord>>,
    ) -> Result<Option<Self>, ConsentError> {
        if children.is_empty() || children.iter().any(Option::is_none) {
            return Ok(None);
        }
        let children: Vec<ConsentRecord> = children.into_iter().flatten().collect();

        let usernames: BTreeSet<&str> = children.iter().map(|c| c.username.as_str()).collect();
        let customers: BTreeSet<Uuid> = children.iter().map(|c| c.enterprise_customer).collect();
        if usernames.len() != 1 || customers.len() != 1 {
            return Err(ConsentError::InvalidProxyConsent {
                message: format!(
                    "children of program {} must share a single username and enterprise customer",
                    program_uuid
                ),
            });
        }

        let first = &children[0];
        Ok(Some(Self {
            username: first.username.clone(),
            enterprise_customer: first.enterprise_customer,
            program_uuid,
            granted: children.iter().all(|c| c.granted),
            exists: children.iter().any(|c| c.exists),
            child_consents: children,
        }))
    }
}

/// A consent lookup result, scoped to a course or a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Consent {
    Course(ConsentRecord),
    Program(ProgramConsentRecord),
}

impl Consent {
    pub fn granted(&self) -> bool {
        match self {
            Consent::Course(r) => r.granted,
            Consent::Program(p) => p.granted,
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            Consent::Course(r) => r.exists,
            Consent::Program(p) => p.exists,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Consent::Course(r) => &r.username,
            Consent::Program(p) => &p.username,
        }
    }

    pub fn enterprise_customer(&self) -> Uuid {
        match self {
            Consent::Course(r) => r.enterprise_customer,
            Consent::Program(p) => p.enterprise_customer,
        }
    }
}
