use chrono::NaiveDateTime;
use serde::Serialize;

use super::address::Address;
use super::customer::{Customer, CustomerId};
use super::user::{ProfileId, UserId, UserRecord};

/// Customer as returned to callers: the local row joined with the current
/// identity record. Assembled on every read and never stored. The password
/// stays with the identity service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub id: CustomerId,
    pub user_id: UserId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    pub phone: String,
    pub status: Option<bool>,
    pub profile: Option<ProfileId>,
    pub birth_date: String,
    pub addresses: Vec<Address>,
    pub creation_date: Option<NaiveDateTime>,
    pub update_date: Option<NaiveDateTime>,
    pub last_login_date: Option<NaiveDateTime>,
    pub password_update_date: Option<NaiveDateTime>,
}

impl CustomerView {
    pub fn merge(customer: &Customer, user: &UserRecord) -> Self {
        Self {
            id: customer.id,
            user_id: customer.user_id,
            name: user.name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            cpf: user.cpf.clone(),
            phone: user.phone.clone(),
            status: user.status,
            profile: user.profile_id,
            birth_date: customer.birth_date.clone(),
            addresses: customer.addresses.clone(),
            creation_date: user.creation_date,
            update_date: user.update_date,
            last_login_date: user.last_login_date,
            password_update_date: user.password_update_date,
        }
    }
}
