//! System administration handlers.

use crate::apis::system::{
    LOGS_LIST, PASSWORD_CHANGE, PASSWORD_RESET, USERS_CREATE, USERS_DELETE, USERS_LIST, USERS_UPDATE,
};
use crate::config::ID_COLUMN;
use crate::error::AppError;
use crate::extractors::CallerId;
use crate::handlers::{dispatch, parse_body};
use crate::pipeline::Call;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
};

pub async fn list_users(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<ApiResponse, AppError> {
    dispatch(&state, USERS_LIST, Call::new(Method::GET).caller(caller).query(query)).await
}

pub async fn create_user(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let call = Call::new(Method::POST).caller(caller).body(parse_body(&body)?);
    dispatch(&state, USERS_CREATE, call).await
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let call = Call::new(Method::PATCH)
        .caller(caller)
        .body(parse_body(&body)?)
        .path_param(ID_COLUMN, id);
    dispatch(&state, USERS_UPDATE, call).await
}

pub async fn delete_users(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<ApiResponse, AppError> {
    dispatch(&state, USERS_DELETE, Call::new(Method::DELETE).caller(caller).query(query)).await
}

/// The caller changes their own password.
pub async fn change_password(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let call = Call::new(Method::PUT).caller(caller).body(parse_body(&body)?);
    dispatch(&state, PASSWORD_CHANGE, call).await
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let call = Call::new(Method::PUT)
        .caller(caller)
        .body(parse_body(&body)?)
        .path_param(ID_COLUMN, id);
    dispatch(&state, PASSWORD_RESET, call).await
}

pub async fn list_logs(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<ApiResponse, AppError> {
    dispatch(&state, LOGS_LIST, Call::new(Method::GET).caller(caller).query(query)).await
}
