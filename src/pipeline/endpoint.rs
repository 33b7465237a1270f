//! Endpoint declarations: request schema, response schemas per status, permission, handler.

use crate::error::{AppError, RespCode};
use crate::pipeline::Identity;
use crate::response::Reply;
use crate::schema::{BoundMap, SchemaNode};
use crate::store::{Executor, WorkUnit};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Everything a handler sees for one call.
pub struct HandlerContext<'a> {
    pub params: BoundMap,
    pub path: HashMap<String, String>,
    pub identity: Option<Identity>,
    pub executor: &'a Executor,
    pub unit: &'a mut dyn WorkUnit,
}

impl HandlerContext<'_> {
    pub fn path_param(&self, key: &str) -> Result<&str, AppError> {
        self.path
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| AppError::code(RespCode::NotFound))
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError>;
}

#[derive(Clone)]
pub struct Endpoint {
    pub name: String,
    /// None: the endpoint takes no parameters and binding is skipped.
    pub request: Option<SchemaNode>,
    pub responses: Vec<(RespCode, SchemaNode)>,
    /// Roles allowed to call; None admits anyone, including anonymous callers.
    pub permission: Option<BTreeSet<String>>,
    pub handler: Arc<dyn Handler>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Endpoint {
            name: name.into(),
            request: None,
            responses: Vec::new(),
            permission: None,
            handler: Arc::new(handler),
        }
    }

    pub fn request(mut self, schema: SchemaNode) -> Self {
        self.request = Some(schema);
        self
    }

    pub fn response(mut self, code: RespCode, schema: SchemaNode) -> Self {
        self.responses.push((code, schema));
        self
    }

    pub fn permit<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permission = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn response_schema(&self, code: RespCode) -> Option<&SchemaNode> {
        self.responses.iter().find(|(c, _)| *c == code).map(|(_, s)| s)
    }
}

/// Endpoints by name, built once at startup.
#[derive(Clone, Default)]
pub struct EndpointSet {
    by_name: HashMap<String, Endpoint>,
}

impl EndpointSet {
    pub fn new() -> Self {
        EndpointSet::default()
    }

    pub fn add(&mut self, endpoint: Endpoint) {
        self.by_name.insert(endpoint.name.clone(), endpoint);
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
