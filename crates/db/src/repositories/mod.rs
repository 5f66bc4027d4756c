use async_trait::async_trait;
use thiserror::Error;

use clientele_core::domain::address::{Address, AddressId};
use clientele_core::domain::customer::{Customer, CustomerDraft, CustomerId};
use clientele_core::domain::user::UserId;
use clientele_core::errors::ApplicationError;

pub mod address;
pub mod customer;
pub mod memory;

pub use address::SqlAddressRepository;
pub use customer::SqlCustomerRepository;
pub use memory::InMemoryCustomerStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    MissingRecord(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Customers together with their addresses. `save` inserts or updates the
/// customer and every address in the draft as one unit and returns the stored
/// result with generated ids. Addresses absent from the draft are kept.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Customer>, RepositoryError>;
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Option<Customer>, RepositoryError>;
    async fn save(&self, draft: CustomerDraft) -> Result<Customer, RepositoryError>;
    async fn delete_by_id(&self, id: CustomerId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn find_by_id(&self, id: AddressId) -> Result<Option<Address>, RepositoryError>;
    async fn find_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Address>, RepositoryError>;
    async fn save(&self, address: Address) -> Result<Address, RepositoryError>;
    async fn delete_by_id(&self, id: AddressId) -> Result<(), RepositoryError>;
}
