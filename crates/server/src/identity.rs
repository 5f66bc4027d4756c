use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use clientele_core::config::IdentityConfig;
use clientele_core::domain::user::{ProfileId, UserDraft, UserId, UserProfile, UserRecord};
use clientele_core::identity::{IdentityClient, IdentityError};

/// Identity service reached over HTTP/JSON.
#[derive(Clone)]
pub struct HttpIdentityClient {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpIdentityClient {
    pub fn new(
        base_url: &str,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| IdentityError::Transport(error.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_token })
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        Self::new(&config.base_url, config.api_token.clone(), config.timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IdentityError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| IdentityError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = upstream_message(&body).unwrap_or_else(|| status_text(status));
        debug!(
            event_name = "identity.request.rejected",
            status = status.as_u16(),
            message = %message,
            "identity service returned a non-success status"
        );
        if status == StatusCode::NOT_FOUND {
            Err(IdentityError::NotFound(message))
        } else {
            Err(IdentityError::Rejected { status: status.as_u16(), message })
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, IdentityError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|error| IdentityError::Decode(error.to_string()))
    }
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().map(str::to_string).unwrap_or_else(|| status.to_string())
}

/// Pulls the human readable part out of an error body: `details` first, as a
/// string or a list of strings, then `message`.
fn upstream_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    let details = match payload.get("details") {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    };
    details.or_else(|| {
        payload
            .get("message")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    })
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn create_user(&self, draft: &UserDraft) -> Result<UserRecord, IdentityError> {
        self.send_json(self.client.post(self.url("/api/users")).json(draft)).await
    }

    async fn get_user(&self, id: UserId) -> Result<UserRecord, IdentityError> {
        self.send_json(self.client.get(self.url(&format!("/api/users/{id}")))).await
    }

    async fn update_user(&self, id: UserId, draft: &UserDraft) -> Result<UserRecord, IdentityError> {
        self.send_json(self.client.put(self.url(&format!("/api/users/{id}"))).json(draft)).await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), IdentityError> {
        self.send(self.client.delete(self.url(&format!("/api/users/{id}")))).await.map(|_| ())
    }

    async fn get_profile(&self, id: ProfileId) -> Result<UserProfile, IdentityError> {
        self.send_json(self.client.get(self.url(&format!("/api/user-profiles/{id}")))).await
    }
}
