use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use clientele_core::domain::address::{Address, AddressId};
use clientele_core::domain::customer::{Customer, CustomerDraft, CustomerId};
use clientele_core::domain::user::UserId;

use super::{AddressRepository, CustomerRepository, RepositoryError};

#[derive(Clone, Debug)]
struct StoredCustomer {
    user_id: UserId,
    birth_date: String,
}

#[derive(Debug, Default)]
struct StoreState {
    last_customer_id: i64,
    last_address_id: i64,
    customers: BTreeMap<CustomerId, StoredCustomer>,
    addresses: BTreeMap<AddressId, Address>,
}

impl StoreState {
    fn assemble(&self, id: CustomerId) -> Option<Customer> {
        let stored = self.customers.get(&id)?;
        Some(Customer {
            id,
            user_id: stored.user_id,
            birth_date: stored.birth_date.clone(),
            addresses: self
                .addresses
                .values()
                .filter(|address| address.customer_id == id)
                .cloned()
                .collect(),
        })
    }
}

/// Customer and address store held in memory. Implements both repository
/// traits over one shared state so an `Arc` of it can back both seams.
#[derive(Debug, Default)]
pub struct InMemoryCustomerStore {
    state: RwLock<StoreState>,
    fail_next_save: AtomicBool,
    fail_next_delete: AtomicBool,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next customer save fail without touching the state.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Same for the next customer delete.
    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerStore {
    async fn find_all(&self) -> Result<Vec<Customer>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.customers.keys().filter_map(|id| state.assemble(*id)).collect())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.assemble(id))
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Option<Customer>, RepositoryError> {
        let state = self.state.read().await;
        let id = state
            .customers
            .iter()
            .find(|(_, stored)| stored.user_id == user_id)
            .map(|(id, _)| *id);
        Ok(id.and_then(|id| state.assemble(id)))
    }

    async fn save(&self, draft: CustomerDraft) -> Result<Customer, RepositoryError> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut state = self.state.write().await;

        if let Some(id) = draft.id {
            if !state.customers.contains_key(&id) {
                return Err(RepositoryError::MissingRecord(format!("customer {id}")));
            }
        }
        for address_id in draft.addresses.iter().filter_map(|address| address.id) {
            let owned = state
                .addresses
                .get(&address_id)
                .map(|address| Some(address.customer_id) == draft.id)
                .unwrap_or(false);
            if !owned {
                return Err(RepositoryError::MissingRecord(format!("address {address_id}")));
            }
        }

        let id = match draft.id {
            Some(id) => id,
            None => {
                state.last_customer_id += 1;
                CustomerId(state.last_customer_id)
            }
        };
        state
            .customers
            .insert(id, StoredCustomer { user_id: draft.user_id, birth_date: draft.birth_date });

        for address in draft.addresses {
            let address_id = match address.id {
                Some(address_id) => address_id,
                None => {
                    state.last_address_id += 1;
                    AddressId(state.last_address_id)
                }
            };
            state
                .addresses
                .insert(address_id, Address { id: address_id, customer_id: id, fields: address.fields });
        }

        state.assemble(id).ok_or_else(|| RepositoryError::MissingRecord(format!("customer {id}")))
    }

    async fn delete_by_id(&self, id: CustomerId) -> Result<(), RepositoryError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut state = self.state.write().await;
        state.customers.remove(&id);
        state.addresses.retain(|_, address| address.customer_id != id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AddressRepository for InMemoryCustomerStore {
    async fn find_by_id(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.addresses.get(&id).cloned())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Address>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.addresses.values().filter(|a| a.customer_id == customer_id).cloned().collect())
    }

    async fn save(&self, address: Address) -> Result<Address, RepositoryError> {
        let mut state = self.state.write().await;
        match state.addresses.get_mut(&address.id) {
            Some(stored) if stored.customer_id == address.customer_id => {
                stored.fields = address.fields;
                Ok(stored.clone())
            }
            _ => Err(RepositoryError::MissingRecord(format!("address {}", address.id))),
        }
    }

    async fn delete_by_id(&self, id: AddressId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.addresses.remove(&id);
        Ok(())
    }
}
