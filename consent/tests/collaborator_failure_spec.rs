use std::sync::Arc;

use consent::catalog::{CatalogClient, CatalogError};
use consent::{
    ConsentError, ConsentPolicy, ConsentRecord, ConsentStore, CustomerStore, EnterpriseCustomer,
    MemoryStore, StoreError,
};
use uuid::Uuid;

const COURSE: &str = "course-v1:edX+DemoX+Demo_Course";

/// Catalog service that is always unreachable
struct UnreachableCatalog;

impl CatalogClient for UnreachableCatalog {
    fn program_course_keys(&self, _program_uuid: &Uuid) -> Result<Vec<String>, CatalogError> {
        Err(CatalogError::RequestFailed {
            message: "connection refused".to_string(),
        })
    }

    fn catalog_contains_course(
        &self,
        _catalog_uuid: &Uuid,
        _course_id: &str,
    ) -> Result<bool, CatalogError> {
        Err(CatalogError::RequestFailed {
            message: "connection refused".to_string(),
        })
    }
}

/// Consent store whose backend is gone
struct BrokenConsentStore;

impl ConsentStore for BrokenConsentStore {
    fn get(&self, _: &str, _: &Uuid, _: &str) -> Result<Option<ConsentRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn save(&self, _: ConsentRecord) -> Result<ConsentRecord, StoreError> {
        Err(StoreError::Poisoned)
    }
}

fn enforcing_customer(store: &MemoryStore) -> Uuid {
    let customer = Uuid::new_v4();
    let mut ec = EnterpriseCustomer::new(customer, "Acme Corp");
    ec.enable_data_sharing_consent = true;
    ec.catalogs = vec![Uuid::new_v4()];
    store.insert_customer(ec).unwrap();
    customer
}

fn unreachable_catalog_policy() -> (ConsentPolicy, Arc<MemoryStore>, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let customer = enforcing_customer(&store);
    let policy = ConsentPolicy::with_memory_store(store.clone(), Arc::new(UnreachableCatalog));
    (policy, store, customer)
}

#[test]
fn catalog_outage_surfaces_for_known_customer_program() {
    let (policy, _, customer) = unreachable_catalog_policy();
    let err = policy
        .get_consent_record("bob", &customer, None, Some(&Uuid::new_v4()))
        .unwrap_err();
    assert!(matches!(err, ConsentError::Catalog(CatalogError::RequestFailed { .. })));
}

#[test]
fn catalog_outage_surfaces_when_checking_requirement() {
    let (policy, _, customer) = unreachable_catalog_policy();
    let err = policy.is_required("bob", COURSE, &customer).unwrap_err();
    assert!(matches!(err, ConsentError::Catalog(_)));
}

#[test]
fn unknown_customer_program_is_none_even_when_catalog_is_down() {
    let (policy, store, _) = unreachable_catalog_policy();
    let unknown = Uuid::new_v4();
    let program = Uuid::new_v4();

    assert!(policy
        .get_consent_record("bob", &unknown, None, Some(&program))
        .unwrap()
        .is_none());
    assert!(policy
        .record_consent("bob", &unknown, None, Some(&program), true)
        .unwrap()
        .is_none());
    assert!(store.consents().unwrap().is_empty());
}

#[test]
fn record_consent_without_scope_writes_nothing() {
    let (policy, store, customer) = unreachable_catalog_policy();
    assert!(policy
        .record_consent("bob", &customer, None, None, true)
        .unwrap()
        .is_none());
    assert!(policy
        .record_consent("bob", &customer, Some(""), None, true)
        .unwrap()
        .is_none());
    assert!(store.consents().unwrap().is_empty());
}

#[test]
fn store_failure_surfaces_for_known_customer() {
    let customers = Arc::new(MemoryStore::new());
    let customer = enforcing_customer(&customers);
    let customer_store: Arc<dyn CustomerStore> = customers;
    let policy = ConsentPolicy::new(
        Arc::new(BrokenConsentStore),
        customer_store,
        Arc::new(UnreachableCatalog),
    );

    let err = policy.is_granted("bob", COURSE, &customer).unwrap_err();
    assert!(matches!(err, ConsentError::Store(StoreError::Poisoned)));

    assert!(!policy.is_granted("bob", COURSE, &Uuid::new_v4()).unwrap());
}
