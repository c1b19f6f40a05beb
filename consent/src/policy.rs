use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::catalog::CatalogClient;
use crate::error::ConsentError;
use crate::model::{
    Consent, ConsentEnforcement, ConsentRecord, EnterpriseCustomer, ProgramConsentRecord,
};
use crate::store::{ConsentStore, CustomerStore, MemoryStore};

/// Evaluates data sharing consent for learners of enterprise customers.
///
/// An unknown customer is never an error here: lookups return `None` and
/// predicates return `false`. Errors only come from the store or catalog.
pub struct ConsentPolicy {
    consents: Arc<dyn ConsentStore>,
    customers: Arc<dyn CustomerStore>,
    catalog: Arc<dyn CatalogClient>,
}

impl ConsentPolicy {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        customers: Arc<dyn CustomerStore>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Self {
        Self {
            consents,
            customers,
            catalog,
        }
    }

    pub fn with_memory_store(store: Arc<MemoryStore>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self::new(store.clone(), store, catalog)
    }

    fn customer(&self, uuid: &Uuid) -> Result<EnterpriseCustomer, ConsentError> {
        self.customers
            .get_customer(uuid)?
            .ok_or(ConsentError::CustomerNotFound { customer: *uuid })
    }

    /// Whether `username` has granted consent to the customer for a course.
    #[instrument(skip(self))]
    pub fn is_granted(
        &self,
        username: &str,
        course_id: &str,
        enterprise_customer: &Uuid,
    ) -> Result<bool, ConsentError> {
        let consent =
            self.get_consent_record(username, enterprise_customer, Some(course_id), None)?;
        Ok(consent.map(|c| c.granted()).unwrap_or(false))
    }

    /// Whether the customer requires consent from `username` before enrolling in a course.
    #[instrument(skip(self))]
    pub fn is_required(
        &self,
        username: &str,
        course_id: &str,
        enterprise_customer: &Uuid,
    ) -> Result<bool, ConsentError> {
        if self.is_granted(username, course_id, enterprise_customer)? {
            return Ok(false);
        }

        let customer = match self.customers.get_customer(enterprise_customer)? {
            Some(customer) => customer,
            None => return Ok(false),
        };
        if !customer.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment) {
            debug!(
                "customer {} does not enforce consent at enrollment ({})",
                customer.uuid, customer.enforce_data_sharing_consent
            );
            return Ok(false);
        }
        self.catalog_contains_course(&customer, course_id)
    }

    /// Whether any of the customer's catalogs contains the course.
    pub fn catalog_contains_course(
        &self,
        customer: &EnterpriseCustomer,
        course_id: &str,
    ) -> Result<bool, ConsentError> {
        for catalog in &customer.catalogs {
            if self.catalog.catalog_contains_course(catalog, course_id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Consent for a course when `course_id` is non-empty, otherwise for the program.
    ///
    /// Returns `None` when the customer does not exist or no scope is given.
    #[instrument(skip(self))]
    pub fn get_consent_record(
        &self,
        username: &str,
        enterprise_customer: &Uuid,
        course_id: Option<&str>,
        program_uuid: Option<&Uuid>,
    ) -> Result<Option<Consent>, ConsentError> {
        let result = match (course_id.filter(|c| !c.is_empty()), program_uuid) {
            (Some(course_id), _) => self
                .get_course_consent_record(username, course_id, enterprise_customer)
                .map(|r| Some(Consent::Course(r))),
            (None, Some(program_uuid)) => self
                .get_program_consent_record(username, program_uuid, enterprise_customer)
                .map(|p| p.map(Consent::Program)),
            (None, None) => Ok(None),
        };
        absorb_missing_customer(result)
    }

    /// The stored record, or an unsaved proxy when the learner has none yet.
    pub fn get_course_consent_record(
        &self,
        username: &str,
        course_id: &str,
        enterprise_customer: &Uuid,
    ) -> Result<ConsentRecord, ConsentError> {
        self.customer(enterprise_customer)?;
        let record = self
            .consents
            .get(username, enterprise_customer, course_id)?
            .unwrap_or_else(|| ConsentRecord::proxy(username, *enterprise_customer, course_id));
        debug!(
            "consent for {} on {}: granted={} exists={}",
            username, course_id, record.granted, record.exists
        );
        Ok(record)
    }

    /// Aggregate consent over every course the catalog lists for the program.
    ///
    /// Fails with `CustomerNotFound` before the catalog is consulted.
    pub fn get_program_consent_record(
        &self,
        username: &str,
        program_uuid: &Uuid,
        enterprise_customer: &Uuid,
    ) -> Result<Option<ProgramConsentRecord>, ConsentError> {
        self.customer(enterprise_customer)?;
        let course_ids = self.catalog.program_course_keys(program_uuid)?;
        debug!("program {} has {} courses", program_uuid, course_ids.len());

        let children = course_ids
            .iter()
            .map(|course_id| {
                self.get_consent_record(username, enterprise_customer, Some(course_id), None)
                    .map(course_record)
            })
            .collect::<Result<Vec<_>, _>>()?;
        ProgramConsentRecord::from_children(*program_uuid, children)
    }

    /// Grant or revoke consent; a program scope writes every child course.
    ///
    /// Returns the updated consent, or `None` when the customer does not exist,
    /// no scope is given, or the program has no courses.
    #[instrument(skip(self))]
    pub fn record_consent(
        &self,
        username: &str,
        enterprise_customer: &Uuid,
        course_id: Option<&str>,
        program_uuid: Option<&Uuid>,
        granted: bool,
    ) -> Result<Option<Consent>, ConsentError> {
        let current = self.get_consent_record(username, enterprise_customer, course_id, program_uuid)?;
        let updated = match current {
            None => None,
            Some(Consent::Course(record)) => Some(Consent::Course(self.save(record, granted)?)),
            Some(Consent::Program(program)) => {
                let children = program
                    .child_consents
                    .into_iter()
                    .map(|child| self.save(child, granted).map(Some))
                    .collect::<Result<Vec<_>, _>>()?;
                ProgramConsentRecord::from_children(program.program_uuid, children)?
                    .map(Consent::Program)
            }
        };
        if let Some(ref consent) = updated {
            info!(
                "recorded consent granted={} for {} to customer {}",
                consent.granted(),
                consent.username(),
                consent.enterprise_customer()
            );
        }
        Ok(updated)
    }

    fn save(&self, record: ConsentRecord, granted: bool) -> Result<ConsentRecord, ConsentError> {
        Ok(self.consents.save(ConsentRecord { granted, ..record })?)
    }
}

fn course_record(consent: Option<Consent>) -> Option<ConsentRecord> {
    match consent {
        Some(Consent::Course(record)) => Some(record),
        _ => None,
    }
}

fn absorb_missing_customer<T>(result: Result<Option<T>, ConsentError>) -> Result<Option<T>, ConsentError> {
    match result {
        Err(e) if e.is_customer_not_found() => {
            debug!("{}", e);
            Ok(None)
        }
        other => other,
    }
}
