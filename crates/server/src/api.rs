//! JSON routes for customers and their addresses.
//!
//! - `GET    /api/customers`
//! - `POST   /api/customers`
//! - `GET    /api/customers/{id}`
//! - `PUT    /api/customers/{id}`
//! - `DELETE /api/customers/{id}`
//! - `GET    /api/customers/{id}/addresses`
//! - `POST   /api/customers/{id}/addresses`
//! - `GET    /api/customers/{id}/addresses/{address_id}`
//! - `PUT    /api/customers/{id}/addresses/{address_id}`
//! - `DELETE /api/customers/{id}/addresses/{address_id}`

use std::convert::Infallible;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path, State,
    },
    http::{request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info_span, warn, Instrument, Span};
use uuid::Uuid;

use clientele_core::domain::address::{Address, AddressFields, AddressId, AddressPatch};
use clientele_core::domain::customer::{CustomerId, CustomerPatch, NewCustomer};
use clientele_core::domain::view::CustomerView;
use clientele_core::errors::{ApplicationError, InterfaceError};

use crate::service::CustomerService;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct ApiState {
    service: CustomerService,
}

pub fn router(service: CustomerService) -> Router {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/api/customers/{id}/addresses", get(list_addresses).post(add_address))
        .route(
            "/api/customers/{id}/addresses/{address_id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .with_state(ApiState { service })
}

/// Request correlation id: the caller's `x-request-id` when it sent one,
/// otherwise a fresh v4 uuid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        Ok(Self(supplied.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string())))
    }
}

impl CorrelationId {
    fn span(&self, operation: &'static str) -> Span {
        info_span!("request", correlation_id = %self.0, operation)
    }

    fn fail(&self, error: ApplicationError) -> ApiError {
        ApiError(error.into_interface(self.0.clone()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    pub hint: &'static str,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.0.user_message();
        let correlation_id = self.0.correlation_id().to_string();
        let (status, error, message, details) = match self.0 {
            InterfaceError::BadRequest { message, details, .. } => {
                (StatusCode::BAD_REQUEST, "Bad Request", message, details)
            }
            InterfaceError::NotFound { message, .. } => {
                (StatusCode::NOT_FOUND, "Resource Not Found", message, Vec::new())
            }
            InterfaceError::BadGateway { message, .. } => {
                (StatusCode::BAD_GATEWAY, "Bad Gateway", message, Vec::new())
            }
            InterfaceError::Internal { message, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", message, Vec::new())
            }
        };

        if status.is_server_error() {
            error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                message = %message,
                "request failed"
            );
        } else {
            warn!(
                event_name = "http.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                message = %message,
                "request rejected"
            );
        }

        let header = HeaderValue::from_str(&correlation_id).ok();
        let body = ErrorBody { error, message, details, hint, correlation_id };
        let mut response = (status, Json(body)).into_response();
        if let Some(header) = header {
            response.headers_mut().insert(REQUEST_ID_HEADER, header);
        }
        response
    }
}

fn bad_request(correlation: &CorrelationId, message: &str, detail: String) -> ApiError {
    ApiError(InterfaceError::BadRequest {
        message: message.to_string(),
        details: vec![detail],
        correlation_id: correlation.0.clone(),
    })
}

fn malformed(correlation: &CorrelationId, rejection: JsonRejection) -> ApiError {
    bad_request(correlation, "Malformed request body", rejection.body_text())
}

fn bad_path(correlation: &CorrelationId, rejection: PathRejection) -> ApiError {
    bad_request(correlation, "Invalid path parameter", rejection.body_text())
}

type ApiResult<T> = Result<T, ApiError>;

async fn list_customers(
    State(state): State<ApiState>,
    correlation: CorrelationId,
) -> ApiResult<Json<Vec<CustomerView>>> {
    state
        .service
        .list_customers()
        .instrument(correlation.span("customers.list"))
        .await
        .map(Json)
        .map_err(|error| correlation.fail(error))
}

async fn create_customer(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    payload: Result<Json<NewCustomer>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CustomerView>)> {
    let Json(payload) = payload.map_err(|rejection| malformed(&correlation, rejection))?;
    state
        .service
        .create_customer(payload)
        .instrument(correlation.span("customers.create"))
        .await
        .map(|view| (StatusCode::CREATED, Json(view)))
        .map_err(|error| correlation.fail(error))
}

async fn get_customer(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<CustomerView>> {
    let Path(id) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    state
        .service
        .get_customer(CustomerId(id))
        .instrument(correlation.span("customers.get"))
        .await
        .map(Json)
        .map_err(|error| correlation.fail(error))
}

async fn update_customer(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CustomerPatch>, JsonRejection>,
) -> ApiResult<Json<CustomerView>> {
    let Path(id) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    let Json(patch) = payload.map_err(|rejection| malformed(&correlation, rejection))?;
    state
        .service
        .update_customer(CustomerId(id), patch)
        .instrument(correlation.span("customers.update"))
        .await
        .map(Json)
        .map_err(|error| correlation.fail(error))
}

async fn delete_customer(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    state
        .service
        .delete_customer(CustomerId(id))
        .instrument(correlation.span("customers.delete"))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|error| correlation.fail(error))
}

async fn list_addresses(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Address>>> {
    let Path(id) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    state
        .service
        .list_addresses(CustomerId(id))
        .instrument(correlation.span("addresses.list"))
        .await
        .map(Json)
        .map_err(|error| correlation.fail(error))
}

async fn add_address(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AddressFields>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Address>)> {
    let Path(id) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    let Json(fields) = payload.map_err(|rejection| malformed(&correlation, rejection))?;
    state
        .service
        .add_address(CustomerId(id), fields)
        .instrument(correlation.span("addresses.add"))
        .await
        .map(|address| (StatusCode::CREATED, Json(address)))
        .map_err(|error| correlation.fail(error))
}

async fn get_address(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<Json<Address>> {
    let Path((id, address_id)) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    state
        .service
        .get_address(CustomerId(id), AddressId(address_id))
        .instrument(correlation.span("addresses.get"))
        .await
        .map(Json)
        .map_err(|error| correlation.fail(error))
}

async fn update_address(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<(i64, i64)>, PathRejection>,
    payload: Result<Json<AddressPatch>, JsonRejection>,
) -> ApiResult<Json<Address>> {
    let Path((id, address_id)) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    let Json(patch) = payload.map_err(|rejection| malformed(&correlation, rejection))?;
    state
        .service
        .update_address(CustomerId(id), AddressId(address_id), patch)
        .instrument(correlation.span("addresses.update"))
        .await
        .map(Json)
        .map_err(|error| correlation.fail(error))
}

async fn delete_address(
    State(state): State<ApiState>,
    correlation: CorrelationId,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path((id, address_id)) = path.map_err(|rejection| bad_path(&correlation, rejection))?;
    state
        .service
        .delete_address(CustomerId(id), AddressId(address_id))
        .instrument(correlation.span("addresses.delete"))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|error| correlation.fail(error))
}
