use std::sync::Arc;

use consent::{
    ConsentEnforcement, ConsentPolicy, ConsentRecord, ConsentStore, EnterpriseCustomer,
    MemoryStore, StaticCatalog,
};
use uuid::Uuid;

const COURSE: &str = "course-v1:edX+DemoX+Demo_Course";
const OTHER_COURSE: &str = "course-v1:edX+Other+2024";

struct Setup {
    policy: ConsentPolicy,
    store: Arc<MemoryStore>,
    customer: Uuid,
}

fn setup(enable: bool, enforce: ConsentEnforcement) -> Setup {
    let customer = Uuid::new_v4();
    let catalog_uuid = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store
        .insert_customer(EnterpriseCustomer {
            uuid: customer,
            name: "Acme Corp".into(),
            enable_data_sharing_consent: enable,
            enforce_data_sharing_consent: enforce,
            catalogs: vec![catalog_uuid],
        })
        .unwrap();
    let catalog = StaticCatalog::default().with_catalog(catalog_uuid, &[COURSE]);
    Setup {
        policy: ConsentPolicy::with_memory_store(store.clone(), Arc::new(catalog)),
        store,
        customer,
    }
}

fn grant(store: &MemoryStore, user: &str, customer: Uuid, course: &str, granted: bool) {
    store
        .save(ConsentRecord {
            username: user.into(),
            enterprise_customer: customer,
            course_id: course.into(),
            granted,
            exists: true,
        })
        .unwrap();
}

#[test]
fn granted_record_means_not_required_regardless_of_policy() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    grant(&s.store, "bob", s.customer, COURSE, true);

    assert!(s.policy.is_granted("bob", COURSE, &s.customer).unwrap());
    assert!(!s.policy.is_required("bob", COURSE, &s.customer).unwrap());
}

#[test]
fn missing_customer_is_neither_granted_nor_required() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    let unknown = Uuid::new_v4();

    assert!(!s.policy.is_granted("bob", COURSE, &unknown).unwrap());
    assert!(!s.policy.is_required("bob", COURSE, &unknown).unwrap());
    assert!(s
        .policy
        .get_consent_record("bob", &unknown, Some(COURSE), None)
        .unwrap()
        .is_none());
}

#[test]
fn enforced_policy_with_course_in_catalog_and_no_record_requires_consent() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);

    assert!(!s.policy.is_granted("bob", COURSE, &s.customer).unwrap());
    assert!(s.policy.is_required("bob", COURSE, &s.customer).unwrap());
}

#[test]
fn declined_record_still_requires_consent() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    grant(&s.store, "bob", s.customer, COURSE, false);

    assert!(s.policy.is_required("bob", COURSE, &s.customer).unwrap());
}

#[test]
fn course_outside_catalog_does_not_require_consent() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    assert!(!s.policy.is_required("bob", OTHER_COURSE, &s.customer).unwrap());
}

#[test]
fn disabled_or_externally_managed_consent_is_not_required() {
    let disabled = setup(false, ConsentEnforcement::AtEnrollment);
    assert!(!disabled.policy.is_required("bob", COURSE, &disabled.customer).unwrap());

    let external = setup(true, ConsentEnforcement::ExternallyManaged);
    assert!(!external.policy.is_required("bob", COURSE, &external.customer).unwrap());
}

#[test]
fn customer_without_catalogs_contains_nothing() {
    let customer = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let mut ec = EnterpriseCustomer::new(customer, "No Catalog Inc");
    ec.enable_data_sharing_consent = true;
    store.insert_customer(ec).unwrap();
    let policy = ConsentPolicy::with_memory_store(store, Arc::new(StaticCatalog::default()));

    assert!(!policy.is_required("bob", COURSE, &customer).unwrap());
}

#[test]
fn consent_is_scoped_per_learner_and_customer() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    grant(&s.store, "bob", s.customer, COURSE, true);
    grant(&s.store, "alice", Uuid::new_v4(), COURSE, true);

    assert!(!s.policy.is_granted("alice", COURSE, &s.customer).unwrap());
    assert!(s.policy.is_required("alice", COURSE, &s.customer).unwrap());
}

#[test]
fn record_consent_for_course_then_not_required() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    let consent = s
        .policy
        .record_consent("bob", &s.customer, Some(COURSE), None, true)
        .unwrap()
        .unwrap();
    assert!(consent.granted());
    assert!(consent.exists());
    assert!(!s.policy.is_required("bob", COURSE, &s.customer).unwrap());

    let revoked = s
        .policy
        .record_consent("bob", &s.customer, Some(COURSE), None, false)
        .unwrap()
        .unwrap();
    assert!(!revoked.granted());
    assert!(s.policy.is_required("bob", COURSE, &s.customer).unwrap());
}

#[test]
fn record_consent_for_unknown_customer_writes_nothing() {
    let s = setup(true, ConsentEnforcement::AtEnrollment);
    let unknown = Uuid::new_v4();
    assert!(s
        .policy
        .record_consent("bob", &unknown, Some(COURSE), None, true)
        .unwrap()
        .is_none());
    assert!(s.store.consents().unwrap().is_empty());
}
