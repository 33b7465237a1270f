//! Generic CRUD endpoints over every row-store table.

use crate::config::{StoreKind, TableDecl, TableRegistry, ID_COLUMN};
use crate::error::{AppError, RespCode};
use crate::models::user;
use crate::pipeline::{Endpoint, EndpointSet, Handler, HandlerContext};
use crate::response::Reply;
use crate::schema::common::{created, paginated, search_request};
use crate::schema::{field, BoundMap, BoundValue, SchemaNode};
use crate::service::{CrudService, PageRequest};
use async_trait::async_trait;

/// Columns never returned by the generic endpoints.
pub const HIDDEN_COLUMNS: &[&str] = &["password"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrudOp {
    Create,
    Search,
    Read,
    Update,
    Delete,
}

impl CrudOp {
    pub const ALL: [CrudOp; 5] = [CrudOp::Create, CrudOp::Search, CrudOp::Read, CrudOp::Update, CrudOp::Delete];

    fn as_str(self) -> &'static str {
        match self {
            CrudOp::Create => "create",
            CrudOp::Search => "search",
            CrudOp::Read => "read",
            CrudOp::Update => "update",
            CrudOp::Delete => "delete",
        }
    }
}

pub fn endpoint_name(table: &str, op: CrudOp) -> String {
    format!("crud.{}.{}", table, op.as_str())
}

/// Response shape of one row: declared columns minus hidden ones.
pub fn row_schema(table: &TableDecl) -> SchemaNode {
    SchemaNode::object(
        table
            .columns
            .iter()
            .filter(|c| !HIDDEN_COLUMNS.contains(&c.name))
            .map(|c| {
                let node = SchemaNode::primitive(c.type_.into());
                field(c.name, if c.name == ID_COLUMN { node.required() } else { node })
            })
            .collect(),
    )
}

fn visible_fields(table: &TableDecl, requested: Vec<String>) -> Vec<String> {
    if !requested.is_empty() {
        return requested;
    }
    table
        .column_names()
        .into_iter()
        .filter(|c| !HIDDEN_COLUMNS.contains(c))
        .map(String::from)
        .collect()
}

/// Replace raw secrets with their hash before they reach the store.
fn seal_secrets(values: &mut BoundMap) -> Result<(), AppError> {
    if let Some(raw) = values.get_str("password").map(String::from) {
        values.insert("password", BoundValue::Str(user::hash_password(&raw)?));
    }
    Ok(())
}

pub fn register(set: &mut EndpointSet, registry: &TableRegistry) {
    for table in registry.tables().filter(|t| t.store == StoreKind::Row) {
        for op in CrudOp::ALL {
            set.add(declare(table, op));
        }
    }
}

fn declare(table: &TableDecl, op: CrudOp) -> Endpoint {
    let handler = CrudHandler {
        table: table.clone(),
        op,
    };
    let endpoint = Endpoint::new(endpoint_name(table.name, op), handler).permit([user::ROLE_ADMIN]);
    match op {
        CrudOp::Create => endpoint
            .request(SchemaNode::record(table.clone()))
            .response(RespCode::Created, created()),
        CrudOp::Search => endpoint
            .request(search_request())
            .response(RespCode::OK, paginated(row_schema(table))),
        CrudOp::Read => endpoint
            .request(SchemaNode::object(vec![field("field", SchemaNode::list(SchemaNode::string()))]))
            .response(RespCode::OK, row_schema(table)),
        CrudOp::Update => endpoint.request(SchemaNode::record(table.clone())),
        CrudOp::Delete => endpoint.request(SchemaNode::object(vec![field(
            "id",
            SchemaNode::list(SchemaNode::string()).required(),
        )])),
    }
}

struct CrudHandler {
    table: TableDecl,
    op: CrudOp,
}

#[async_trait]
impl Handler for CrudHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let table = &self.table;
        let executor = ctx.executor;
        match self.op {
            CrudOp::Create => {
                let mut values = ctx.params.clone();
                seal_secrets(&mut values)?;
                CrudService::create(executor, table, &values, Some(&mut *ctx.unit)).await
            }
            CrudOp::Search => {
                let mut req = PageRequest::from_bound(&ctx.params)?;
                req.fields = visible_fields(table, req.fields);
                let page = CrudService::paginate(executor, table, &req, Some(&mut *ctx.unit)).await?;
                Ok(Reply::ok(page.to_json()))
            }
            CrudOp::Read => {
                let id = ctx.path_param(ID_COLUMN)?.to_string();
                let fields = visible_fields(
                    table,
                    ctx.params.get("field").map(|f| f.string_list()).unwrap_or_default(),
                );
                CrudService::read(executor, table, &id, &fields, Some(&mut *ctx.unit)).await
            }
            CrudOp::Update => {
                let id = ctx.path_param(ID_COLUMN)?.to_string();
                let mut values = ctx.params.clone();
                seal_secrets(&mut values)?;
                CrudService::update(executor, table, &id, &values, Some(&mut *ctx.unit)).await
            }
            CrudOp::Delete => {
                let ids = ctx.params.get("id").map(|v| v.string_list()).unwrap_or_default();
                CrudService::delete(executor, table, &ids, &mut *ctx.unit).await
            }
        }
    }
}
