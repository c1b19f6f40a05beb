//! Data sharing consent policy for enterprise customers.
//!
//! [`policy::ConsentPolicy`] answers whether a learner has granted consent to
//! an enterprise customer for a course or program, and whether consent is
//! required at all. Records, customers and catalog lookups come from the
//! collaborator traits in [`store`] and [`catalog`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod store;

pub use catalog::{CatalogClient, CatalogError, HttpCatalogClient, StaticCatalog};
pub use error::ConsentError;
pub use model::{Consent, ConsentEnforcement, ConsentRecord, EnterpriseCustomer, ProgramConsentRecord};
pub use policy::ConsentPolicy;
pub use store::{ConsentStore, CustomerStore, Fixture, MemoryStore, StoreError};
