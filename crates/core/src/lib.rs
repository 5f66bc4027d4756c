pub mod config;
pub mod domain;
pub mod errors;
pub mod identity;
pub mod saga;
pub mod validation;

pub use domain::address::{Address, AddressFields, AddressId, AddressPatch};
pub use domain::customer::{
    AddressDraft, AddressUpdate, Customer, CustomerDraft, CustomerId, CustomerPatch, NewCustomer,
};
pub use domain::user::{ProfileId, UserDraft, UserId, UserProfile, UserRecord};
pub use domain::view::CustomerView;
pub use errors::{ApplicationError, DomainError, FieldViolation, InterfaceError};
pub use identity::{IdentityClient, IdentityError, IdentityOperation, InMemoryIdentityClient};
pub use saga::{CompensationReport, Saga};
