//! Generic CRUD handlers: resolve the target table, then run the matching endpoint through the pipeline.

use crate::apis::crud::{endpoint_name, CrudOp};
use crate::config::{StoreKind, ID_COLUMN};
use crate::error::{AppError, RespCode};
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

/// Endpoint name for a CRUD operation on `target`. Unknown or analytical targets list the legal ones.
fn resolve(state: &AppState, target: &str, op: CrudOp) -> Result<String, AppError> {
    let registry = state.executor().registry();
    match registry.get(target) {
        Some(t) if t.store == StoreKind::Row => Ok(endpoint_name(t.name, op)),
        _ => Err(AppError::with_data(RespCode::ParamsRangeError, registry.legal_targets())),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Path(target): Path<String>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let name = resolve(&state, &target, CrudOp::Create)?;
    let call = Call::new(Method::POST).caller(caller).body(parse_body(&body)?);
    dispatch(&state, &name, call).await
}

pub async fn search(
    State(state): State<AppState>,
    Path(target): Path<String>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let name = resolve(&state, &target, CrudOp::Search)?;
    let call = Call::new(Method::POST).caller(caller).body(parse_body(&body)?);
    dispatch(&state, &name, call).await
}

pub async fn read(
    State(state): State<AppState>,
    Path((target, id)): Path<(String, String)>,
    CallerId(caller): CallerId,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<ApiResponse, AppError> {
    let name = resolve(&state, &target, CrudOp::Read)?;
    let call = Call::new(Method::GET)
        .caller(caller)
        .query(query)
        .path_param(ID_COLUMN, id);
    dispatch(&state, &name, call).await
}

pub async fn update(
    State(state): State<AppState>,
    Path((target, id)): Path<(String, String)>,
    CallerId(caller): CallerId,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let name = resolve(&state, &target, CrudOp::Update)?;
    let call = Call::new(Method::PATCH)
        .caller(caller)
        .body(parse_body(&body)?)
        .path_param(ID_COLUMN, id);
    dispatch(&state, &name, call).await
}

pub async fn delete(
    State(state): State<AppState>,
    Path(target): Path<String>,
    CallerId(caller): CallerId,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<ApiResponse, AppError> {
    let name = resolve(&state, &target, CrudOp::Delete)?;
    let call = Call::new(Method::DELETE).caller(caller).query(query);
    dispatch(&state, &name, call).await
}
