//! Append-only analytical store reached over the ClickHouse HTTP interface.
//! Statements arrive as literal SQL; there is no transaction to open or roll back.

use crate::config::Settings;
use crate::error::ExecFailure;
use crate::store::Row;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Shared, stateless client; safe for concurrent submission.
#[async_trait]
pub trait AnalyticalClient: Send + Sync {
    /// Run a read and return its rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ExecFailure>;

    /// Run a write. `body` carries batch rows when `sql` is an insert shell.
    async fn execute(&self, sql: &str, body: Option<String>) -> Result<(), ExecFailure>;
}

pub struct ClickHouseClient {
    http: reqwest::Client,
    url: String,
    database: String,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct CompactMeta {
    name: String,
}

#[derive(Deserialize)]
struct CompactResult {
    meta: Vec<CompactMeta>,
    data: Vec<Vec<Value>>,
}

impl ClickHouseClient {
    pub fn new(settings: &Settings) -> Result<Self, ExecFailure> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExecFailure::driver(format!("Failed to build HTTP client: {}", e)))?;
        Ok(ClickHouseClient {
            http,
            url: settings.olap_url.trim_end_matches('/').to_string(),
            database: settings.olap_database.clone(),
            user: settings.olap_user.clone(),
            password: settings.olap_password.clone(),
        })
    }

    fn request(&self, query: Option<&str>) -> reqwest::RequestBuilder {
        let mut params: Vec<(&str, &str)> = vec![
            ("database", self.database.as_str()),
            ("output_format_json_quote_64bit_integers", "0"),
        ];
        if let Some(q) = query {
            params.push(("query", q));
        }
        let mut req = self.http.post(&self.url).query(&params);
        if let Some(user) = &self.user {
            req = req.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.password {
            req = req.header("X-ClickHouse-Key", password);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String, ExecFailure> {
        let response = req
            .send()
            .await
            .map_err(|e| ExecFailure::driver(format!("analytical request failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<empty response>".to_string());
        if !status.is_success() {
            return Err(ExecFailure::driver(format!(
                "analytical store returned {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl AnalyticalClient for ClickHouseClient {
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ExecFailure> {
        tracing::debug!(sql = %sql, "analytical query");
        let body = self
            .send(self.request(None).body(format!("{} FORMAT JSONCompact", sql)))
            .await?;
        parse_compact(&body)
    }

    async fn execute(&self, sql: &str, body: Option<String>) -> Result<(), ExecFailure> {
        tracing::debug!(sql = %sql, batch = body.is_some(), "analytical execute");
        let req = match body {
            Some(rows) => self.request(Some(sql)).body(rows),
            None => self.request(None).body(sql.to_string()),
        };
        self.send(req).await.map(|_| ())
    }
}

/// Decode a `FORMAT JSONCompact` response into rows.
pub fn parse_compact(body: &str) -> Result<Vec<Row>, ExecFailure> {
    let result: CompactResult = serde_json::from_str(body)
        .map_err(|e| ExecFailure::driver(format!("unreadable analytical response: {}", e)))?;
    let columns: Vec<String> = result.meta.into_iter().map(|m| m.name).collect();
    Ok(result
        .data
        .into_iter()
        .map(|values| Row::new(columns.clone(), values))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_compact_rows() {
        let body = r#"{
            "meta": [{"name": "id", "type": "String"}, {"name": "status", "type": "Int32"}],
            "data": [["a", 200], ["b", 404]],
            "rows": 2
        }"#;
        let rows = parse_compact(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("status"), Some(&json!(404)));
        assert_eq!(rows[0].columns, vec!["id", "status"]);
    }

    #[test]
    fn garbage_is_a_driver_failure() {
        let err = parse_compact("Code: 62. DB::Exception").unwrap_err();
        assert_eq!(err.kind, crate::error::FailureKind::Driver);
    }
}
