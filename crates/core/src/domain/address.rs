use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(pub i64);

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive part of an address, shared by stored rows, drafts and payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressFields {
    pub zip_code: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    #[serde(rename = "type")]
    pub address_type: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Fields compared when deciding whether two addresses are the same place.
/// `type` is not one of them.
type DedupKey<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, &'a str, &'a str, &'a str);

impl AddressFields {
    fn dedup_key(&self) -> DedupKey<'_> {
        (
            &self.street,
            &self.number,
            &self.zip_code,
            &self.neighborhood,
            &self.city,
            &self.state,
            &self.country,
            &self.complement,
        )
    }

    pub fn is_duplicate_of(&self, other: &AddressFields) -> bool {
        self.dedup_key() == other.dedup_key()
    }

    /// Overwrites every field the patch carries, leaving the rest untouched.
    pub fn apply(&mut self, patch: &AddressPatch) {
        let targets = [
            (&mut self.zip_code, &patch.zip_code),
            (&mut self.street, &patch.street),
            (&mut self.number, &patch.number),
            (&mut self.complement, &patch.complement),
            (&mut self.neighborhood, &patch.neighborhood),
            (&mut self.address_type, &patch.address_type),
            (&mut self.city, &patch.city),
            (&mut self.state, &patch.state),
            (&mut self.country, &patch.country),
        ];
        for (target, value) in targets {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }
    }
}

/// Returns the positions of the first pair of duplicate addresses, if any.
pub fn find_duplicate<'a, I>(addresses: I) -> Option<(usize, usize)>
where
    I: IntoIterator<Item = &'a AddressFields>,
{
    let mut seen: HashMap<DedupKey<'a>, usize> = HashMap::new();
    for (index, address) in addresses.into_iter().enumerate() {
        if let Some(first) = seen.insert(address.dedup_key(), index) {
            return Some((first, index));
        }
    }
    None
}

/// A stored address. The owning customer is a plain key, never a live
/// reference, and is not part of the outward representation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(skip_serializing)]
    pub customer_id: CustomerId,
    #[serde(flatten)]
    pub fields: AddressFields,
}

/// Partial address update: only present fields are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressPatch {
    pub zip_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    #[serde(rename = "type")]
    pub address_type: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl AddressPatch {
    /// Builds a brand new address from the patch; absent fields stay blank
    /// and are caught by validation.
    pub fn into_fields(self) -> AddressFields {
        let mut fields = AddressFields::default();
        fields.apply(&self);
        fields
    }
}

impl From<AddressFields> for AddressPatch {
    fn from(fields: AddressFields) -> Self {
        Self {
            zip_code: Some(fields.zip_code),
            street: Some(fields.street),
            number: Some(fields.number),
            complement: Some(fields.complement),
            neighborhood: Some(fields.neighborhood),
            address_type: Some(fields.address_type),
            city: Some(fields.city),
            state: Some(fields.state),
            country: Some(fields.country),
        }
    }
}
