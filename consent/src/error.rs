use thiserror::Error;
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("Enterprise customer not found: {customer}")]
    CustomerNotFound { customer: Uuid },

    #[error("Invalid program consent: {message}")]
    InvalidProxyConsent { message: String },

    #[error("Catalog lookup failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Consent store failed: {0}")]
    Store(#[from] StoreError),
}

impl ConsentError {
    pub fn is_customer_not_found(&self) -> bool {
        matches!(self, ConsentError::CustomerNotFound { .. })
    }
}
