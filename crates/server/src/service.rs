use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use clientele_core::domain::address::{find_duplicate, Address, AddressFields, AddressId, AddressPatch};
use clientele_core::domain::customer::{
    AddressDraft, AddressUpdate, Customer, CustomerDraft, CustomerId, CustomerPatch, NewCustomer,
};
use clientele_core::domain::user::{ProfileId, UserProfile};
use clientele_core::domain::view::CustomerView;
use clientele_core::errors::{ApplicationError, DomainError};
use clientele_core::identity::IdentityClient;
use clientele_core::saga::Saga;
use clientele_core::validation;
use clientele_db::repositories::{AddressRepository, CustomerRepository};

/// Sequences every customer operation across the local store and the remote
/// identity service.
#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerRepository>,
    addresses: Arc<dyn AddressRepository>,
    identity: Arc<dyn IdentityClient>,
    default_profile: ProfileId,
}

fn ensure_unique<'a, I>(addresses: I) -> Result<(), DomainError>
where
    I: IntoIterator<Item = &'a AddressFields>,
{
    match find_duplicate(addresses) {
        Some(_) => Err(DomainError::DuplicateAddress),
        None => Ok(()),
    }
}

impl CustomerService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        addresses: Arc<dyn AddressRepository>,
        identity: Arc<dyn IdentityClient>,
        default_profile: ProfileId,
    ) -> Self {
        Self { customers, addresses, identity, default_profile }
    }

    async fn load_customer(&self, id: CustomerId) -> Result<Customer, ApplicationError> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::customer_not_found(id).into())
    }

    async fn merged_view(&self, customer: &Customer) -> Result<CustomerView, ApplicationError> {
        match self.identity.get_user(customer.user_id).await {
            Ok(user) => Ok(CustomerView::merge(customer, &user)),
            Err(cause) => {
                warn!(
                    event_name = "customer.read.user_unavailable",
                    customer_id = %customer.id,
                    user_id = %customer.user_id,
                    error = %cause,
                    "identity record could not be resolved for customer"
                );
                Err(DomainError::user_unavailable(customer.user_id).into())
            }
        }
    }

    pub async fn list_customers(&self) -> Result<Vec<CustomerView>, ApplicationError> {
        let customers = self.customers.find_all().await?;
        if customers.is_empty() {
            return Err(DomainError::no_customers().into());
        }

        let mut views = Vec::with_capacity(customers.len());
        for customer in &customers {
            views.push(self.merged_view(customer).await?);
        }
        Ok(views)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<CustomerView, ApplicationError> {
        let customer = self.load_customer(id).await?;
        self.merged_view(&customer).await
    }

    pub async fn create_customer(&self, payload: NewCustomer) -> Result<CustomerView, ApplicationError> {
        info!(
            event_name = "customer.create.started",
            address_count = payload.addresses.len(),
            "creating customer"
        );
        validation::validate_new_customer(&payload)?;
        ensure_unique(&payload.addresses)?;

        let profile = self
            .identity
            .get_profile(self.default_profile)
            .await
            .map_err(ApplicationError::create_failed)?;
        let user = self
            .identity
            .create_user(&payload.user_draft(profile))
            .await
            .map_err(ApplicationError::create_failed)?;
        info!(
            event_name = "customer.create.user_created",
            user_id = %user.id,
            "identity user created"
        );

        let mut saga = Saga::new();
        let identity = Arc::clone(&self.identity);
        let user_id = user.id;
        saga.record("identity.delete_user", move || async move {
            identity.delete_user(user_id).await.map_err(|error| error.to_string())
        });

        let draft = CustomerDraft::new(user.id, payload.birth_date, payload.addresses);
        match self.customers.save(draft).await {
            Ok(customer) => {
                saga.commit();
                info!(
                    event_name = "customer.create.completed",
                    customer_id = %customer.id,
                    user_id = %user.id,
                    "customer created"
                );
                Ok(CustomerView::merge(&customer, &user))
            }
            Err(cause) => {
                warn!(
                    event_name = "customer.create.compensating",
                    user_id = %user.id,
                    error = %cause,
                    "local save failed, deleting identity user"
                );
                let (error, report) = saga.compensate(cause.into()).await;
                if report.is_clean() {
                    warn!(
                        event_name = "customer.create.compensated",
                        user_id = %user.id,
                        "identity user removed after failed create"
                    );
                    Err(ApplicationError::create_failed(error))
                } else {
                    error!(
                        event_name = "customer.create.compensation_failed",
                        user_id = %user.id,
                        failures = ?report.failures,
                        "identity user left orphaned after failed create"
                    );
                    Err(error)
                }
            }
        }
    }

    /// Resolves an update's address list against the stored addresses.
    /// Stored addresses the list does not mention are kept as they are.
    async fn merge_addresses(
        &self,
        customer: &Customer,
        updates: Vec<AddressUpdate>,
    ) -> Result<Vec<AddressDraft>, ApplicationError> {
        let mut merged: Vec<AddressDraft> = customer
            .addresses
            .iter()
            .map(|address| AddressDraft { id: Some(address.id), fields: address.fields.clone() })
            .collect();
        let mut violations = Vec::new();

        for (index, update) in updates.into_iter().enumerate() {
            let prefix = validation::indexed_prefix(index);
            match update.id {
                Some(address_id) => {
                    let stored = self
                        .addresses
                        .find_by_id(address_id)
                        .await?
                        .ok_or_else(|| DomainError::address_not_found(address_id))?;
                    if stored.customer_id != customer.id {
                        return Err(DomainError::address_not_owned().into());
                    }
                    let mut fields = stored.fields;
                    fields.apply(&update.patch);
                    violations.extend(validation::address_violations(&fields, &prefix));
                    if let Some(slot) = merged.iter_mut().find(|draft| draft.id == Some(address_id)) {
                        slot.fields = fields;
                    }
                }
                None => {
                    let fields = update.patch.into_fields();
                    violations.extend(validation::address_violations(&fields, &prefix));
                    merged.push(AddressDraft::new(fields));
                }
            }
        }

        validation::into_result(violations)?;
        ensure_unique(merged.iter().map(|draft| &draft.fields))?;
        Ok(merged)
    }

    pub async fn update_customer(
        &self,
        id: CustomerId,
        mut patch: CustomerPatch,
    ) -> Result<CustomerView, ApplicationError> {
        let customer = self.load_customer(id).await?;
        let current = self
            .identity
            .get_user(customer.user_id)
            .await
            .map_err(|_| DomainError::user_unavailable(customer.user_id))?;

        validation::into_result(validation::customer_patch_violations(&patch))?;
        let addresses = match patch.addresses.take() {
            Some(updates) => Some(self.merge_addresses(&customer, updates).await?),
            None => None,
        };

        let profile = UserProfile::with_id(current.profile_id.unwrap_or(self.default_profile));
        self.identity.update_user(customer.user_id, &patch.user_draft(&current, profile)).await?;
        info!(
            event_name = "customer.update.user_updated",
            customer_id = %id,
            user_id = %customer.user_id,
            "identity user updated"
        );

        let mut draft = customer.to_draft();
        if let Some(birth_date) = patch.birth_date.take() {
            draft.birth_date = birth_date;
        }
        if let Some(addresses) = addresses {
            draft.addresses = addresses;
        }
        if let Err(cause) = self.customers.save(draft).await {
            error!(
                event_name = "customer.update.local_save_failed",
                customer_id = %id,
                user_id = %customer.user_id,
                error = %cause,
                "identity user updated but local customer save failed"
            );
            return Err(cause.into());
        }

        self.get_customer(id).await
    }

    pub async fn delete_customer(&self, id: CustomerId) -> Result<(), ApplicationError> {
        let customer = self.load_customer(id).await?;
        let user = self.identity.get_user(customer.user_id).await?;

        self.customers.delete_by_id(id).await?;

        if let Err(cause) = self.identity.delete_user(user.id).await {
            error!(
                event_name = "customer.delete.orphaned_user",
                customer_id = %id,
                user_id = %user.id,
                error = %cause,
                "customer deleted locally but identity user could not be deleted"
            );
            return Err(cause.into());
        }

        info!(event_name = "customer.delete.completed", customer_id = %id, user_id = %user.id, "customer deleted");
        Ok(())
    }

    pub async fn list_addresses(&self, customer_id: CustomerId) -> Result<Vec<Address>, ApplicationError> {
        let customer = self.load_customer(customer_id).await?;
        Ok(self.addresses.find_by_customer_id(customer.id).await?)
    }

    pub async fn get_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<Address, ApplicationError> {
        let customer = self.load_customer(customer_id).await?;
        customer
            .address(address_id)
            .cloned()
            .ok_or_else(|| DomainError::address_not_found(address_id).into())
    }

    pub async fn add_address(
        &self,
        customer_id: CustomerId,
        fields: AddressFields,
    ) -> Result<Address, ApplicationError> {
        let customer = self.load_customer(customer_id).await?;
        validation::validate_address(&fields)?;
        ensure_unique(customer.addresses.iter().map(|address| &address.fields).chain([&fields]))?;

        let known: HashSet<AddressId> = customer.addresses.iter().map(|address| address.id).collect();
        let mut draft = customer.to_draft();
        draft.addresses.push(AddressDraft::new(fields));
        let saved = self.customers.save(draft).await?;

        let added = saved
            .addresses
            .into_iter()
            .find(|address| !known.contains(&address.id))
            .ok_or_else(|| ApplicationError::Internal("stored customer lost the new address".to_string()))?;
        info!(
            event_name = "customer.address.added",
            customer_id = %customer_id,
            address_id = %added.id,
            "address added"
        );
        Ok(added)
    }

    /// Patches an address looked up by its own id. The resulting address must
    /// still be valid and distinct from the owner's other addresses.
    pub async fn update_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        patch: AddressPatch,
    ) -> Result<Address, ApplicationError> {
        let mut address = self
            .addresses
            .find_by_id(address_id)
            .await?
            .ok_or_else(|| DomainError::address_not_found(address_id))?;
        address.fields.apply(&patch);
        validation::validate_address(&address.fields)?;

        let siblings = self.addresses.find_by_customer_id(address.customer_id).await?;
        ensure_unique(
            siblings
                .iter()
                .filter(|sibling| sibling.id != address_id)
                .map(|sibling| &sibling.fields)
                .chain([&address.fields]),
        )?;

        let saved = self.addresses.save(address).await?;
        info!(
            event_name = "customer.address.updated",
            customer_id = %customer_id,
            owner_id = %saved.customer_id,
            address_id = %address_id,
            "address updated"
        );
        Ok(saved)
    }

    pub async fn delete_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<(), ApplicationError> {
        let customer = self.load_customer(customer_id).await?;
        self.addresses
            .find_by_id(address_id)
            .await?
            .ok_or_else(|| DomainError::address_not_found(address_id))?;
        if !customer.owns(address_id) {
            return Err(DomainError::address_not_owned().into());
        }

        self.addresses.delete_by_id(address_id).await?;
        let mut draft = customer.to_draft();
        draft.addresses.retain(|address| address.id != Some(address_id));
        self.customers.save(draft).await?;

        info!(
            event_name = "customer.address.deleted",
            customer_id = %customer_id,
            address_id = %address_id,
            "address deleted"
        );
        Ok(())
    }
}
