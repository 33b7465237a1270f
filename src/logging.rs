//! Access logging: one `access_log` line per request plus an appended `api_request_logs` row.

use crate::extractors::caller::caller_from_headers;
use crate::models::request_log;
use crate::sql::{Insert, SqlValue};
use crate::state::AppState;
use crate::store::Executor;
use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::NaiveDateTime;
use std::net::SocketAddr;
use std::time::Instant;

/// One handled request as stored in the analytical log table.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestRecord {
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub method: String,
    pub blueprint: String,
    pub uri: String,
    pub status: u16,
    pub duration_ms: i64,
    pub source_ip: String,
}

impl RequestRecord {
    pub fn to_insert(&self) -> Insert {
        Insert::into_table(request_log::TABLE).values([
            ("user_id", SqlValue::from(self.user_id.clone())),
            ("created_at", SqlValue::DateTime(self.created_at)),
            ("method", SqlValue::from(self.method.as_str())),
            ("blueprint", SqlValue::from(self.blueprint.as_str())),
            ("uri", SqlValue::from(self.uri.as_str())),
            ("status", SqlValue::Int(i64::from(self.status))),
            ("duration", SqlValue::Int(self.duration_ms)),
            ("source_ip", SqlValue::from(self.source_ip.as_str())),
        ])
    }

    /// Append to the analytical store. Failures are logged, never returned.
    pub async fn append(self, executor: &Executor) {
        if let Err(e) = executor.insert(self.to_insert(), None).await {
            tracing::warn!(kind = ?e.kind, message = %e.message, uri = %self.uri, "request log append failed");
        }
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
fn source_ip(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "-".to_string())
}

/// Route-level middleware; `MatchedPath` is the blueprint.
pub async fn access_log(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let uri = req.uri().to_string();
    let blueprint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    let user_id = caller_from_headers(req.headers());
    let source_ip = source_ip(&req);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as i64;
    tracing::info!(
        target: "access_log",
        method = %method,
        uri = %uri,
        status,
        duration_ms,
        ip = %source_ip,
        "request"
    );

    let record = RequestRecord {
        user_id,
        created_at: chrono::Utc::now().naive_utc(),
        method,
        blueprint,
        uri,
        status,
        duration_ms,
        source_ip,
    };
    let executor = state.executor().clone();
    tokio::spawn(async move { record.append(&executor).await });
    response
}
