pub mod catalog;
pub mod identity;
pub mod payment;
pub mod pii;
pub mod repository;

pub use catalog::{Product, ProductSummary};
pub use identity::{Identity, Role};
pub use payment::{GatewayError, Payment, PaymentGateway, PaymentRedirect, PaymentStatus, PreferenceItem};
pub use pii::Masked;
pub use repository::ProductRepository;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
