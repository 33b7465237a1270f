//! Handler replies and the wire response built from them.

use crate::error::RespCode;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// What a handler produced: the status reached and the unprojected body.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub code: RespCode,
    pub body: Value,
    pub headers: HeaderMap,
}

impl Reply {
    pub fn new(code: RespCode, body: Value) -> Self {
        Reply {
            code,
            body,
            headers: HeaderMap::new(),
        }
    }

    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(RespCode::OK, body.into())
    }

    pub fn created(body: impl Into<Value>) -> Self {
        Self::new(RespCode::Created, body.into())
    }

    pub fn no_content() -> Self {
        Self::new(RespCode::NoContent, Value::Null)
    }
}

/// Projected response ready for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Option<Value>) -> Self {
        ApiResponse {
            status,
            body,
            headers: HeaderMap::new(),
        }
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, None)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}
