//! Contract with the remote identity service that owns every personal field of
//! a customer, plus an in-process implementation for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::domain::user::{ProfileId, UserDraft, UserId, UserProfile, UserRecord};
use crate::errors::ApplicationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity resource not found: {0}")]
    NotFound(String),
    #[error("identity service rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("identity service unreachable: {0}")]
    Transport(String),
    #[error("identity response could not be decoded: {0}")]
    Decode(String),
}

impl IdentityError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotFound(message) | Self::Transport(message) | Self::Decode(message) => {
                message.clone()
            }
            Self::Rejected { message, .. } => message.clone(),
        }
    }
}

impl From<IdentityError> for ApplicationError {
    fn from(error: IdentityError) -> Self {
        ApplicationError::Remote { status: error.status(), message: error.message() }
    }
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn create_user(&self, draft: &UserDraft) -> Result<UserRecord, IdentityError>;
    async fn get_user(&self, id: UserId) -> Result<UserRecord, IdentityError>;
    async fn update_user(&self, id: UserId, draft: &UserDraft) -> Result<UserRecord, IdentityError>;
    async fn delete_user(&self, id: UserId) -> Result<(), IdentityError>;
    async fn get_profile(&self, id: ProfileId) -> Result<UserProfile, IdentityError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityOperation {
    CreateUser,
    GetUser,
    UpdateUser,
    DeleteUser,
    GetProfile,
}

#[derive(Debug, Default)]
struct IdentityState {
    next_id: i64,
    users: BTreeMap<UserId, UserRecord>,
    profiles: BTreeMap<ProfileId, UserProfile>,
    failures: HashMap<IdentityOperation, IdentityError>,
    calls: Vec<IdentityOperation>,
}

/// Identity service kept in memory. Rejects duplicate cpf or email with a 400
/// the way the real service does, and can be told to fail the next call of a
/// given operation.
#[derive(Debug, Default)]
pub struct InMemoryIdentityClient {
    state: Mutex<IdentityState>,
}

impl InMemoryIdentityClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: UserProfile) -> Self {
        self.lock().profiles.insert(profile.id, profile);
        self
    }

    pub fn fail_next(&self, operation: IdentityOperation, error: IdentityError) {
        self.lock().failures.insert(operation, error);
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn user(&self, id: UserId) -> Option<UserRecord> {
        self.lock().users.get(&id).cloned()
    }

    pub fn calls(&self) -> Vec<IdentityOperation> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, operation: IdentityOperation) -> Result<MutexGuard<'_, IdentityState>, IdentityError> {
        let mut state = self.lock();
        state.calls.push(operation);
        match state.failures.remove(&operation) {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn ensure_unique(state: &IdentityState, draft: &UserDraft, skip: Option<UserId>) -> Result<(), IdentityError> {
    for user in state.users.values().filter(|user| Some(user.id) != skip) {
        if user.cpf == draft.cpf {
            return Err(IdentityError::Rejected { status: 400, message: "CPF already registered".to_string() });
        }
        if user.email == draft.email {
            return Err(IdentityError::Rejected { status: 400, message: "Email already registered".to_string() });
        }
    }
    Ok(())
}

#[async_trait]
impl IdentityClient for InMemoryIdentityClient {
    async fn create_user(&self, draft: &UserDraft) -> Result<UserRecord, IdentityError> {
        let mut state = self.begin(IdentityOperation::CreateUser)?;
        ensure_unique(&state, draft, None)?;

        state.next_id += 1;
        let now = Utc::now().naive_utc();
        let record = UserRecord {
            id: UserId(state.next_id),
            name: draft.name.clone(),
            last_name: draft.last_name.clone(),
            email: draft.email.clone(),
            cpf: draft.cpf.clone(),
            phone: draft.phone.clone(),
            password: draft.password.clone(),
            status: draft.status,
            profile_id: Some(draft.profile.id),
            creation_date: Some(now),
            update_date: Some(now),
            last_login_date: None,
            password_update_date: Some(now),
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> Result<UserRecord, IdentityError> {
        let state = self.begin(IdentityOperation::GetUser)?;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(format!("User not found with id: {id}")))
    }

    async fn update_user(&self, id: UserId, draft: &UserDraft) -> Result<UserRecord, IdentityError> {
        let mut state = self.begin(IdentityOperation::UpdateUser)?;
        ensure_unique(&state, draft, Some(id))?;

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| IdentityError::NotFound(format!("User not found with id: {id}")))?;
        let now = Utc::now().naive_utc();
        if draft.password != user.password {
            user.password_update_date = Some(now);
        }
        user.name.clone_from(&draft.name);
        user.last_name.clone_from(&draft.last_name);
        user.email.clone_from(&draft.email);
        user.cpf.clone_from(&draft.cpf);
        user.phone.clone_from(&draft.phone);
        user.password.clone_from(&draft.password);
        user.status = draft.status;
        user.profile_id = Some(draft.profile.id);
        user.update_date = Some(now);
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), IdentityError> {
        let mut state = self.begin(IdentityOperation::DeleteUser)?;
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| IdentityError::NotFound(format!("User not found with id: {id}")))
    }

    async fn get_profile(&self, id: ProfileId) -> Result<UserProfile, IdentityError> {
        let state = self.begin(IdentityOperation::GetProfile)?;
        state
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(format!("Profile not found with id: {id}")))
    }
}
