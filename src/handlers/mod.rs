//! Axum handlers: translate HTTP requests into pipeline calls.

pub mod crud;
pub mod system;

use crate::error::{AppError, RespCode};
use crate::pipeline::Call;
use crate::response::ApiResponse;
use crate::state::AppState;
use serde_json::Value;

/// Run a named endpoint through the pipeline.
pub(crate) async fn dispatch(state: &AppState, name: &str, call: Call) -> Result<ApiResponse, AppError> {
    let endpoint = state
        .endpoints
        .get(name)
        .ok_or_else(|| AppError::code(RespCode::NotFound))?;
    state.pipeline.run(endpoint, call).await
}

/// An empty body is no parameters; anything else must be JSON.
pub(crate) fn parse_body(body: &[u8]) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| AppError::with_message(RespCode::ParamsValueError, e.to_string()))
}
