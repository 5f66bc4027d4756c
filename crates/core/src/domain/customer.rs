use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::{Address, AddressFields, AddressId, AddressPatch};
use super::user::{UserDraft, UserId, UserProfile, UserRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub i64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The locally stored part of a customer. Everything personal lives in the
/// identity service and is joined in at read time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub user_id: UserId,
    pub birth_date: String,
    pub addresses: Vec<Address>,
}

impl Customer {
    pub fn address(&self, id: AddressId) -> Option<&Address> {
        self.addresses.iter().find(|address| address.id == id)
    }

    pub fn owns(&self, id: AddressId) -> bool {
        self.address(id).is_some()
    }

    pub fn to_draft(&self) -> CustomerDraft {
        CustomerDraft {
            id: Some(self.id),
            user_id: self.user_id,
            birth_date: self.birth_date.clone(),
            addresses: self
                .addresses
                .iter()
                .map(|address| AddressDraft {
                    id: Some(address.id),
                    fields: address.fields.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressDraft {
    pub id: Option<AddressId>,
    pub fields: AddressFields,
}

impl AddressDraft {
    pub fn new(fields: AddressFields) -> Self {
        Self { id: None, fields }
    }
}

/// Input to a store save: rows without an id are inserted, the rest updated.
/// Addresses missing from the draft are left as they are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerDraft {
    pub id: Option<CustomerId>,
    pub user_id: UserId,
    pub birth_date: String,
    pub addresses: Vec<AddressDraft>,
}

impl CustomerDraft {
    pub fn new(user_id: UserId, birth_date: String, addresses: Vec<AddressFields>) -> Self {
        Self {
            id: None,
            user_id,
            birth_date,
            addresses: addresses.into_iter().map(AddressDraft::new).collect(),
        }
    }
}

/// Payload accepted when registering a customer. Missing strings default to
/// blank so that validation, not deserialization, reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewCustomer {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    pub phone: String,
    pub password: String,
    pub status: Option<bool>,
    pub birth_date: String,
    pub addresses: Vec<AddressFields>,
}

impl NewCustomer {
    pub fn user_draft(&self, profile: UserProfile) -> UserDraft {
        UserDraft {
            name: self.name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            cpf: self.cpf.clone(),
            phone: self.phone.clone(),
            password: Some(self.password.clone()),
            status: self.status,
            profile,
        }
    }
}

/// One entry of an update's address list: with an id it patches a stored
/// address, without one it describes a new address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressUpdate {
    pub id: Option<AddressId>,
    #[serde(flatten)]
    pub patch: AddressPatch,
}

/// Partial customer update. `cpf` and the profile are not client settable
/// and are therefore absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub status: Option<bool>,
    pub birth_date: Option<String>,
    pub addresses: Option<Vec<AddressUpdate>>,
}

impl CustomerPatch {
    /// Builds the full update request for the identity service, carrying
    /// over every value the patch leaves unset.
    pub fn user_draft(&self, current: &UserRecord, profile: UserProfile) -> UserDraft {
        UserDraft {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            last_name: self.last_name.clone().unwrap_or_else(|| current.last_name.clone()),
            email: self.email.clone().unwrap_or_else(|| current.email.clone()),
            cpf: current.cpf.clone(),
            phone: self.phone.clone().unwrap_or_else(|| current.phone.clone()),
            password: self.password.clone().or_else(|| current.password.clone()),
            status: self.status.or(current.status),
            profile,
        }
    }
}
