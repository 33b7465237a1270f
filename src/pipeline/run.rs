//! Per-call state machine: open a work unit, authenticate, bind, handle, project, close.

use crate::error::{AppError, RespCode};
use crate::pipeline::{Endpoint, HandlerContext, IdentityResolver};
use crate::response::{ApiResponse, Reply};
use crate::schema::{bind, project, BoundMap, ParamSource};
use crate::store::{Executor, WorkUnit};
use axum::http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Opened,
    Authenticated,
    Bound,
    Handled,
    Projected,
    Closed,
}

/// One inbound call as seen by the pipeline, independent of the transport.
#[derive(Clone, Debug)]
pub struct Call {
    pub caller: Option<String>,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Value,
    pub path: HashMap<String, String>,
}

impl Call {
    pub fn new(method: Method) -> Self {
        Call {
            caller: None,
            method,
            query: Vec::new(),
            body: Value::Null,
            path: HashMap::new(),
        }
    }

    pub fn caller(mut self, caller: Option<String>) -> Self {
        self.caller = caller;
        self
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(key.into(), value.into());
        self
    }

    /// GET and DELETE read the query string; everything else reads the body.
    pub fn source(&self) -> ParamSource {
        if self.method == Method::GET || self.method == Method::DELETE {
            ParamSource::from_query_pairs(self.query.iter().cloned())
        } else {
            ParamSource::Body(self.body.clone())
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    executor: Arc<Executor>,
    identity: Arc<dyn IdentityResolver>,
}

impl Pipeline {
    pub fn new(executor: Arc<Executor>, identity: Arc<dyn IdentityResolver>) -> Self {
        Pipeline { executor, identity }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// Run one call. The work unit is closed exactly once, after rollback on any failure.
    pub async fn run(&self, endpoint: &Endpoint, call: Call) -> Result<ApiResponse, AppError> {
        let mut unit = self.executor.begin().await?;
        let mut stage = Stage::Opened;
        let outcome = self.drive(endpoint, call, unit.as_mut(), &mut stage).await;

        match outcome {
            Ok(response) => {
                if let Err(e) = unit.close().await {
                    tracing::error!(endpoint = %endpoint.name, message = %e.message, "commit failed");
                    return Err(AppError::code(RespCode::DBError));
                }
                tracing::debug!(endpoint = %endpoint.name, stage = ?Stage::Closed, status = %response.status, "call done");
                Ok(response)
            }
            Err(err) => {
                if !unit.rolled_back() {
                    unit.rollback().await;
                }
                if let Err(e) = unit.close().await {
                    tracing::warn!(endpoint = %endpoint.name, message = %e.message, "close after rollback failed");
                }
                let code = err.resp_code();
                if code.status().is_client_error() {
                    tracing::info!(endpoint = %endpoint.name, stage = ?stage, code = %code, "call rejected");
                } else {
                    tracing::warn!(endpoint = %endpoint.name, stage = ?stage, error = %err, "call failed");
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        endpoint: &Endpoint,
        call: Call,
        unit: &mut dyn WorkUnit,
        stage: &mut Stage,
    ) -> Result<ApiResponse, AppError> {
        let identity = self
            .identity
            .resolve(call.caller.as_deref(), &self.executor, &mut *unit)
            .await?;
        if let Some(roles) = &endpoint.permission {
            match &identity {
                Some(who) if roles.contains(&who.role) => {}
                _ => return Err(AppError::code(RespCode::Forbidden)),
            }
        }
        *stage = Stage::Authenticated;

        let params = match &endpoint.request {
            Some(schema) => bind(schema, &call.source())?,
            None => BoundMap::new(),
        };
        *stage = Stage::Bound;

        let mut ctx = HandlerContext {
            params,
            path: call.path,
            identity,
            executor: &self.executor,
            unit,
        };
        let reply = endpoint.handler.handle(&mut ctx).await?;
        *stage = Stage::Handled;

        let response = render(endpoint, reply);
        *stage = Stage::Projected;
        Ok(response)
    }
}

/// Project the reply through the schema declared for its status.
fn render(endpoint: &Endpoint, reply: Reply) -> ApiResponse {
    let mut response = match endpoint.response_schema(reply.code) {
        Some(schema) => ApiResponse::new(reply.code.status(), Some(project(schema, &reply.body))),
        None => ApiResponse::no_content(),
    };
    response.headers = reply.headers;
    response
}
