//! Typed errors, the response code vocabulary, and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Symbolic response codes surfaced to callers. Each carries an HTTP status and a default message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RespCode {
    OK,
    Created,
    NoContent,
    BadRequest,
    UnAuthorized,
    Forbidden,
    WrongPassword,
    NotFound,
    InvalidInput,
    KeyRepeat,
    ParamsMissed,
    ParamsValueError,
    ParamsRangeError,
    IllegalParams,
    InvalidAccount,
    InvalidPassword,
    InvalidUsername,
    InvalidPhone,
    InvalidEmail,
    Error,
    DBError,
}

impl RespCode {
    pub fn status(self) -> StatusCode {
        match self {
            RespCode::OK => StatusCode::OK,
            RespCode::Created => StatusCode::CREATED,
            RespCode::NoContent => StatusCode::NO_CONTENT,
            RespCode::BadRequest => StatusCode::BAD_REQUEST,
            RespCode::UnAuthorized => StatusCode::UNAUTHORIZED,
            RespCode::Forbidden | RespCode::WrongPassword => StatusCode::FORBIDDEN,
            RespCode::NotFound => StatusCode::NOT_FOUND,
            RespCode::InvalidInput
            | RespCode::KeyRepeat
            | RespCode::ParamsMissed
            | RespCode::ParamsValueError
            | RespCode::ParamsRangeError
            | RespCode::IllegalParams
            | RespCode::InvalidAccount
            | RespCode::InvalidPassword
            | RespCode::InvalidUsername
            | RespCode::InvalidPhone
            | RespCode::InvalidEmail => StatusCode::UNPROCESSABLE_ENTITY,
            RespCode::Error | RespCode::DBError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RespCode::OK => "OK",
            RespCode::Created => "Created",
            RespCode::NoContent => "NoContent",
            RespCode::BadRequest => "BadRequest",
            RespCode::UnAuthorized => "UnAuthorized",
            RespCode::Forbidden => "Forbidden",
            RespCode::WrongPassword => "WrongPassword",
            RespCode::NotFound => "NotFound",
            RespCode::InvalidInput => "InvalidInput",
            RespCode::KeyRepeat => "KeyRepeat",
            RespCode::ParamsMissed => "ParamsMissed",
            RespCode::ParamsValueError => "ParamsValueError",
            RespCode::ParamsRangeError => "ParamsRangeError",
            RespCode::IllegalParams => "IllegalParams",
            RespCode::InvalidAccount => "InvalidAccount",
            RespCode::InvalidPassword => "InvalidPassword",
            RespCode::InvalidUsername => "InvalidUsername",
            RespCode::InvalidPhone => "InvalidPhone",
            RespCode::InvalidEmail => "InvalidEmail",
            RespCode::Error => "Error",
            RespCode::DBError => "DBError",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            RespCode::OK | RespCode::NoContent => "request succeeded",
            RespCode::Created => "created",
            RespCode::BadRequest => "invalid request",
            RespCode::UnAuthorized => "authentication expired",
            RespCode::Forbidden => "not authorized for this operation",
            RespCode::WrongPassword => "wrong account or password",
            RespCode::NotFound => "resource not found",
            RespCode::InvalidInput => "invalid input",
            RespCode::KeyRepeat => "duplicate key",
            RespCode::ParamsMissed => "required parameter missing",
            RespCode::ParamsValueError => "parameter has the wrong type",
            RespCode::ParamsRangeError => "parameter out of range",
            RespCode::IllegalParams => "unsupported parameter",
            RespCode::InvalidAccount => "account must be 4-32 letters, digits or underscores",
            RespCode::InvalidPassword => "password must be 8-16 characters of at least two kinds",
            RespCode::InvalidUsername => "username must be 1-32 characters",
            RespCode::InvalidPhone => "invalid phone number",
            RespCode::InvalidEmail => "invalid email address",
            RespCode::Error => "server error",
            RespCode::DBError => "database error",
        }
    }

    pub fn is_success(self) -> bool {
        self.status().is_success()
    }
}

impl std::fmt::Display for RespCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    #[error("duplicate column: {table}.{column}")]
    DuplicateColumn { table: String, column: String },
    #[error("table {0} has no id column")]
    MissingId(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("settings: {0}")]
    Settings(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Typed failure from the vocabulary, optionally with diagnostic data.
    #[error("{code}{}", message_suffix(.message))]
    Api {
        code: RespCode,
        message: Option<String>,
        data: Option<Value>,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("analytical store: {0}")]
    Analytical(String),
}

impl AppError {
    pub fn code(code: RespCode) -> Self {
        AppError::Api {
            code,
            message: None,
            data: None,
        }
    }

    pub fn with_message(code: RespCode, message: impl Into<String>) -> Self {
        AppError::Api {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_data(code: RespCode, data: Value) -> Self {
        AppError::Api {
            code,
            message: None,
            data: Some(data),
        }
    }

    /// Vocabulary code this error is reported as.
    pub fn resp_code(&self) -> RespCode {
        match self {
            AppError::Api { code, .. } => *code,
            AppError::Config(_) => RespCode::Error,
            AppError::Db(sqlx::Error::RowNotFound) => RespCode::NotFound,
            AppError::Db(_) | AppError::Analytical(_) => RespCode::DBError,
        }
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default()
}

impl From<RespCode> for AppError {
    fn from(code: RespCode) -> Self {
        AppError::code(code)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Constraint violation reported by the row store (unique, foreign key, not null).
    Integrity,
    /// Statement not accepted by the target store; nothing was sent.
    Rejected,
    /// Any other driver or transport failure.
    Driver,
}

/// Store-level failure returned by the executor instead of propagating.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct ExecFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ExecFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        ExecFailure {
            kind,
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Integrity, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Driver, message)
    }

    /// Typed failure for callers that treat a failed statement as fatal.
    /// The driver message is logged, never returned.
    pub fn into_app_error(self) -> AppError {
        tracing::warn!(kind = ?self.kind, message = %self.message, "statement failed");
        match self.kind {
            FailureKind::Integrity => AppError::code(RespCode::KeyRepeat),
            FailureKind::Rejected | FailureKind::Driver => AppError::code(RespCode::DBError),
        }
    }
}

impl From<ExecFailure> for AppError {
    fn from(f: ExecFailure) -> Self {
        f.into_app_error()
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AppError {
    /// Body sent to the caller. Driver text is never exposed; only the code's default message.
    pub fn body(&self) -> ErrorBody {
        let code = self.resp_code();
        let (message, details) = match self {
            AppError::Api { message, data, .. } => (
                message.clone().unwrap_or_else(|| code.default_message().to_string()),
                data.clone(),
            ),
            _ => (code.default_message().to_string(), None),
        };
        ErrorBody {
            error: ErrorDetail {
                code: code.name().to_string(),
                message,
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Db(e) => tracing::error!(error = %e, "database failure"),
            AppError::Analytical(e) => tracing::error!(error = %e, "analytical store failure"),
            AppError::Config(e) => tracing::error!(error = %e, "configuration failure"),
            AppError::Api { .. } => {}
        }
        let status = self.resp_code().status();
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_codes_are_unprocessable() {
        for code in [
            RespCode::ParamsMissed,
            RespCode::ParamsValueError,
            RespCode::ParamsRangeError,
            RespCode::KeyRepeat,
        ] {
            assert_eq!(code.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
        assert_eq!(RespCode::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(RespCode::DBError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn driver_errors_hide_their_text() {
        let err = AppError::Analytical("Code: 62. Syntax error near 'DROP'".into());
        let body = err.body();
        assert_eq!(body.error.code, "DBError");
        assert_eq!(body.error.message, "database error");
        assert!(body.error.details.is_none());
    }

    #[test]
    fn api_error_keeps_diagnostic_data() {
        let err = AppError::with_data(RespCode::ParamsRangeError, serde_json::json!(["id", "name"]));
        let body = err.body();
        assert_eq!(body.error.code, "ParamsRangeError");
        assert_eq!(body.error.message, "parameter out of range");
        assert_eq!(body.error.details, Some(serde_json::json!(["id", "name"])));
    }
}
