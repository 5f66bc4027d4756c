use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use clientele_core::domain::user::ProfileId;
use clientele_core::identity::IdentityClient;
use clientele_db::DbPool;
use serde::Serialize;
use tracing::warn;

/// Everything a customer request depends on: the local store and the
/// identity service holding the default profile new customers are given.
#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub identity: Arc<dyn IdentityClient>,
    pub default_profile: ProfileId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    pub status: Readiness,
    pub detail: String,
}

impl DependencyCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: Readiness::Ready, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: Readiness::Degraded, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: Readiness,
    pub database: DependencyCheck,
    pub identity: DependencyCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// 200 only while both dependencies answer; 503 otherwise.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let (database, identity) =
        tokio::join!(database_check(&state.db_pool), identity_check(&state));

    let status = if database.status == Readiness::Ready && identity.status == Readiness::Ready {
        Readiness::Ready
    } else {
        Readiness::Degraded
    };
    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(HealthReport { status, database, identity, checked_at: Utc::now().to_rfc3339() }))
}

async fn database_check(pool: &DbPool) -> DependencyCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customer").fetch_one(pool).await {
        Ok(customers) => DependencyCheck::ready(format!("customer store holds {customers} row(s)")),
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "customer store unavailable"
            );
            DependencyCheck::degraded(format!("customer store query failed: {error}"))
        }
    }
}

async fn identity_check(state: &HealthState) -> DependencyCheck {
    match state.identity.get_profile(state.default_profile).await {
        Ok(profile) => DependencyCheck::ready(format!("default profile {} resolved", profile.id)),
        Err(error) => {
            warn!(
                event_name = "system.health.identity_degraded",
                correlation_id = "health",
                profile_id = %state.default_profile,
                error = %error,
                "identity service unavailable"
            );
            DependencyCheck::degraded(format!("default profile lookup failed: {error}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use clientele_core::domain::user::{ProfileId, UserProfile};
    use clientele_core::identity::{IdentityError, IdentityOperation, InMemoryIdentityClient};
    use clientele_db::{connect_with_settings, migrations, DbPool};

    use super::{health, HealthState, Readiness};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn state(db_pool: DbPool, identity: InMemoryIdentityClient) -> HealthState {
        HealthState { db_pool, identity: Arc::new(identity), default_profile: ProfileId(4) }
    }

    fn identity() -> InMemoryIdentityClient {
        InMemoryIdentityClient::new()
            .with_profile(UserProfile { id: ProfileId(4), name: Some("CUSTOMER".to_string()) })
    }

    #[tokio::test]
    async fn ready_when_store_and_identity_answer() {
        let pool = migrated_pool().await;

        let (status, Json(report)) = health(State(state(pool.clone(), identity()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, Readiness::Ready);
        assert_eq!(report.database.detail, "customer store holds 0 row(s)");
        assert_eq!(report.identity.detail, "default profile 4 resolved");
        pool.close().await;
    }

    #[tokio::test]
    async fn unavailable_when_the_store_is_closed() {
        let pool = migrated_pool().await;
        pool.close().await;

        let (status, Json(report)) = health(State(state(pool, identity()))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, Readiness::Degraded);
        assert_eq!(report.database.status, Readiness::Degraded);
        assert_eq!(report.identity.status, Readiness::Ready);
    }

    #[tokio::test]
    async fn unavailable_when_the_default_profile_cannot_be_fetched() {
        let pool = migrated_pool().await;
        let identity = identity();
        identity.fail_next(
            IdentityOperation::GetProfile,
            IdentityError::Transport("connection refused".to_string()),
        );

        let (status, Json(report)) = health(State(state(pool.clone(), identity))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.database.status, Readiness::Ready);
        assert_eq!(report.identity.status, Readiness::Degraded);
        assert!(report.identity.detail.contains("connection refused"));
        pool.close().await;
    }
}
