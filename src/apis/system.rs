//! System administration endpoints: user accounts and the request log.

use crate::config::ID_COLUMN;
use crate::error::{AppError, RespCode};
use crate::models::{request_log, user};
use crate::pipeline::{Endpoint, EndpointSet, Handler, HandlerContext};
use crate::response::Reply;
use crate::schema::common::{created, paginate_fields, paginated};
use crate::schema::{field, BoundMap, BoundValue, Field, SchemaNode};
use crate::service::crud::UPDATED_AT;
use crate::service::{contains_pattern, paginate, safe_column, safe_columns, CrudService, Page, PageRequest};
use crate::sql::{CompareOp, Condition, Select, SqlValue, Update};
use crate::store::Row;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const USERS_LIST: &str = "system.users.list";
pub const USERS_CREATE: &str = "system.users.create";
pub const USERS_UPDATE: &str = "system.users.update";
pub const USERS_DELETE: &str = "system.users.delete";
pub const PASSWORD_CHANGE: &str = "system.users.password.change";
pub const PASSWORD_RESET: &str = "system.users.password.reset";
pub const LOGS_LIST: &str = "system.logs.list";

const USER_COLUMNS: &[&str] = &[
    "id", "role", "email", "phone", "username", "account", "valid", "created_at", "updated_at",
];

pub fn register(set: &mut EndpointSet) {
    set.add(users_list());
    set.add(users_create());
    set.add(users_update());
    set.add(users_delete());
    set.add(password_change());
    set.add(password_reset());
    set.add(logs_list());
}

fn text_check(f: fn(&str) -> bool) -> impl Fn(&BoundValue) -> bool + Send + Sync + 'static {
    move |v: &BoundValue| v.as_str().map_or(false, f)
}

fn password_field(name: &str) -> Field {
    field(
        name,
        SchemaNode::string()
            .required()
            .validate(text_check(user::valid_password), RespCode::InvalidPassword),
    )
}

/// Optional profile fields shared by create and update.
fn profile_fields() -> Vec<Field> {
    vec![
        field(
            "username",
            SchemaNode::string().validate(text_check(user::valid_username), RespCode::InvalidUsername),
        ),
        field(
            "phone",
            SchemaNode::string().validate(text_check(user::valid_phone), RespCode::InvalidPhone),
        ),
        field(
            "email",
            SchemaNode::string().validate(text_check(user::valid_email), RespCode::InvalidEmail),
        ),
    ]
}

fn user_view() -> SchemaNode {
    SchemaNode::object(vec![
        field("id", SchemaNode::string().required()),
        field("account", SchemaNode::string().required()),
        field("username", SchemaNode::string()),
        field("role", SchemaNode::enumeration(user::role_enum()).required()),
        field("email", SchemaNode::string()),
        field("phone", SchemaNode::string()),
        field("valid", SchemaNode::boolean().required()),
        field("created_at", SchemaNode::datetime().required()),
        field("updated_at", SchemaNode::datetime()),
    ])
}

fn users_list() -> Endpoint {
    let mut fields = paginate_fields();
    // matches account or username
    fields.push(field("keyword", SchemaNode::string()));
    Endpoint::new(USERS_LIST, UsersList)
        .permit([user::ROLE_ADMIN])
        .request(SchemaNode::object(fields))
        .response(RespCode::OK, paginated(user_view()))
}

struct UsersList;

#[async_trait]
impl Handler for UsersList {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let table = user::table();
        let mut select = Select::from(user::TABLE)
            .columns(USER_COLUMNS.iter().copied())
            .filter(Condition::eq("valid", true));
        if let Some(keyword) = ctx.params.get_str("keyword").filter(|k| !k.is_empty()) {
            let pattern = contains_pattern(keyword);
            select = select.filter(Condition::AnyOf(vec![
                Condition::like("account", pattern.clone()),
                Condition::like("username", pattern),
            ]));
        }
        let req = page_request(&ctx.params, "-updated_at")?;
        let page = paginate(ctx.executor, &table, select, &req, Some(&mut *ctx.unit)).await?;
        Ok(Reply::ok(page.map(|row| safe_columns(&table, row)).to_json()))
    }
}

/// Page controls from bound params, falling back to one default sort key.
fn page_request(params: &BoundMap, default_sort: &str) -> Result<PageRequest, AppError> {
    let page = params.get_i64("page").ok_or(RespCode::ParamsMissed)?;
    let size = params.get_i64("size").ok_or(RespCode::ParamsMissed)?;
    let sort = params.get("sort").map(|s| s.string_list()).unwrap_or_default();
    let req = PageRequest::new(page, size);
    Ok(if sort.is_empty() {
        req.sorted([default_sort])
    } else {
        req.sorted(sort)
    })
}

fn users_create() -> Endpoint {
    let mut fields = vec![
        field(
            "account",
            SchemaNode::string()
                .required()
                .validate(text_check(user::valid_account), RespCode::InvalidAccount),
        ),
        password_field("password"),
    ];
    fields.extend(profile_fields());
    fields.push(field(
        "role",
        SchemaNode::enumeration(user::role_enum()).default(json!(user::ROLE_USER)),
    ));
    Endpoint::new(USERS_CREATE, UsersCreate)
        .permit([user::ROLE_ADMIN])
        .request(SchemaNode::object(fields))
        .response(RespCode::Created, created())
}

struct UsersCreate;

#[async_trait]
impl Handler for UsersCreate {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let mut values = ctx.params.clone();
        if let Some(raw) = values.get_str("password").map(String::from) {
            values.insert("password", BoundValue::Str(user::hash_password(&raw)?));
        }
        values.insert("valid", BoundValue::Bool(true));
        CrudService::create(ctx.executor, &user::table(), &values, Some(&mut *ctx.unit)).await
    }
}

fn users_update() -> Endpoint {
    Endpoint::new(USERS_UPDATE, UsersUpdate)
        .permit([user::ROLE_ADMIN])
        .request(SchemaNode::object(profile_fields()))
}

struct UsersUpdate;

#[async_trait]
impl Handler for UsersUpdate {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let id = ctx.path_param(ID_COLUMN)?.to_string();
        CrudService::update(ctx.executor, &user::table(), &id, &ctx.params, Some(&mut *ctx.unit)).await
    }
}

fn users_delete() -> Endpoint {
    Endpoint::new(USERS_DELETE, UsersDelete)
        .permit([user::ROLE_ADMIN])
        .request(SchemaNode::object(vec![field(
            "id",
            SchemaNode::list(SchemaNode::string()).required(),
        )]))
}

struct UsersDelete;

/// Accounts are disabled rather than removed; administrators are never disabled here.
#[async_trait]
impl Handler for UsersDelete {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let ids = sql_list(&ctx.params, ID_COLUMN);
        if ids.is_empty() {
            return Err(AppError::code(RespCode::ParamsMissed));
        }
        let disable = Update::table(user::TABLE)
            .set("valid", false)
            .set(UPDATED_AT, chrono::Utc::now().naive_utc())
            .filter(Condition::is_in(ID_COLUMN, ids))
            .filter(Condition::compare("role", CompareOp::Ne, user::ROLE_ADMIN));
        let disabled = ctx.executor.modify(disable, Some(&mut *ctx.unit)).await?;
        tracing::info!(disabled, "users disabled");
        Ok(Reply::no_content())
    }
}

/// Hash `raw` and store it as the password of `id`.
async fn set_password(ctx: &mut HandlerContext<'_>, id: &str, raw: &str) -> Result<Reply, AppError> {
    let mut values = BoundMap::new();
    values.insert("password", BoundValue::Str(user::hash_password(raw)?));
    CrudService::update(ctx.executor, &user::table(), id, &values, Some(&mut *ctx.unit)).await
}

fn password_change() -> Endpoint {
    Endpoint::new(PASSWORD_CHANGE, PasswordChange)
        .permit([user::ROLE_ADMIN, user::ROLE_USER])
        .request(SchemaNode::object(vec![
            field("old", SchemaNode::string().required()),
            password_field("new"),
        ]))
}

struct PasswordChange;

#[async_trait]
impl Handler for PasswordChange {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let id = ctx.caller_id().ok_or(RespCode::UnAuthorized)?.to_string();
        let lookup = Select::from(user::TABLE)
            .columns(["password"])
            .filter(Condition::eq(ID_COLUMN, id.as_str()))
            .filter(Condition::eq("valid", true));
        let stored = ctx
            .executor
            .fetch_one(lookup, Some(&mut *ctx.unit))
            .await?
            .ok_or(RespCode::NotFound)?;
        let old = ctx.params.get_str("old").unwrap_or_default();
        if !user::verify_password(old, stored.get_str("password").unwrap_or_default()) {
            return Err(AppError::code(RespCode::WrongPassword));
        }
        let new = ctx.params.get_str("new").unwrap_or_default().to_string();
        set_password(ctx, &id, &new).await
    }
}

fn password_reset() -> Endpoint {
    Endpoint::new(PASSWORD_RESET, PasswordReset)
        .permit([user::ROLE_ADMIN])
        .request(SchemaNode::object(vec![password_field("password")]))
}

struct PasswordReset;

#[async_trait]
impl Handler for PasswordReset {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let id = ctx.path_param(ID_COLUMN)?.to_string();
        let raw = ctx.params.get_str("password").unwrap_or_default().to_string();
        set_password(ctx, &id, &raw).await
    }
}

fn log_view() -> SchemaNode {
    SchemaNode::object(vec![
        field("id", SchemaNode::string().required()),
        field("user_id", SchemaNode::string()),
        field("account", SchemaNode::string().required()),
        field("username", SchemaNode::string().required()),
        field("created_at", SchemaNode::datetime().required()),
        field("method", SchemaNode::enumeration(request_log::method_enum()).required()),
        field("blueprint", SchemaNode::string()),
        field("uri", SchemaNode::string().required()),
        field("status", SchemaNode::int().required()),
        // milliseconds
        field("duration", SchemaNode::int().required()),
        field("ip", SchemaNode::string().required().alias("source_ip")),
    ])
}

fn logs_list() -> Endpoint {
    let mut fields = paginate_fields();
    fields.extend([
        field("method", SchemaNode::list(SchemaNode::enumeration(request_log::method_enum()))),
        field("status", SchemaNode::list(SchemaNode::int())),
        field("created_at_start", SchemaNode::datetime()),
        field("created_at_end", SchemaNode::datetime()),
        // matches the end of the source address
        field("ip", SchemaNode::string()),
        // both match anywhere in the caller's account record
        field("account", SchemaNode::string()),
        field("username", SchemaNode::string()),
    ]);
    Endpoint::new(LOGS_LIST, LogsList)
        .permit([user::ROLE_ADMIN])
        .request(SchemaNode::object(fields))
        .response(RespCode::OK, paginated(log_view()))
}

struct LogsList;

fn sql_list(params: &BoundMap, key: &str) -> Vec<SqlValue> {
    params
        .get(key)
        .and_then(BoundValue::as_list)
        .map(|items| items.iter().map(BoundValue::to_sql).collect())
        .unwrap_or_default()
}

fn log_filters(params: &BoundMap) -> Vec<Condition> {
    let mut conditions = Vec::new();
    for column in ["method", "status"] {
        let values = sql_list(params, column);
        if !values.is_empty() {
            conditions.push(Condition::is_in(column, values));
        }
    }
    let start = params.get("created_at_start").and_then(BoundValue::as_datetime);
    let end = params.get("created_at_end").and_then(BoundValue::as_datetime);
    if start.is_some() || end.is_some() {
        conditions.push(Condition::range(
            "created_at",
            start.map(SqlValue::DateTime),
            end.map(SqlValue::DateTime),
        ));
    }
    if let Some(ip) = params.get_str("ip").filter(|ip| !ip.is_empty()) {
        conditions.push(Condition::like("source_ip", format!("%{}", ip)));
    }
    conditions
}

/// Substring conditions on the user table for the `account` and `username` log filters.
fn user_match(params: &BoundMap) -> Vec<Condition> {
    ["account", "username"]
        .into_iter()
        .filter_map(|column| {
            params
                .get_str(column)
                .filter(|v| !v.is_empty())
                .map(|v| Condition::like(column, contains_pattern(v)))
        })
        .collect()
}

#[async_trait]
impl Handler for LogsList {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<Reply, AppError> {
        let table = request_log::table();
        let mut select = Select::from(request_log::TABLE).columns(table.column_names());
        for condition in log_filters(&ctx.params) {
            select = select.filter(condition);
        }
        let req = page_request(&ctx.params, "-created_at")?;

        let by_user = user_match(&ctx.params);
        if !by_user.is_empty() {
            let mut lookup = Select::from(user::TABLE).columns([ID_COLUMN]);
            for condition in by_user {
                lookup = lookup.filter(condition);
            }
            let ids: Vec<SqlValue> = ctx
                .executor
                .fetch_all(lookup, Some(&mut *ctx.unit))
                .await?
                .iter()
                .filter_map(|r| r.get_str(ID_COLUMN))
                .map(SqlValue::from)
                .collect();
            if ids.is_empty() {
                req.window()?;
                return Ok(Reply::ok(Page::<Row> { total: 0, data: Vec::new() }.to_json()));
            }
            select = select.filter(Condition::is_in("user_id", ids));
        }

        // the log table lives in the analytical store, outside the call's work unit
        let page = paginate(ctx.executor, &table, select, &req, None).await?;

        let user_ids: Vec<SqlValue> = page
            .data
            .iter()
            .filter_map(|r| r.get_str("user_id"))
            .map(SqlValue::from)
            .collect();
        let mut accounts: BTreeMap<String, (Value, Value)> = BTreeMap::new();
        if !user_ids.is_empty() {
            let lookup = Select::from(user::TABLE)
                .columns([ID_COLUMN, "account", "username"])
                .filter(Condition::is_in(ID_COLUMN, user_ids));
            for row in ctx.executor.fetch_all(lookup, Some(&mut *ctx.unit)).await? {
                let id = row.get_str(ID_COLUMN).unwrap_or_default().to_string();
                let account = row.get("account").cloned().unwrap_or(Value::Null);
                let username = row.get("username").cloned().unwrap_or(Value::Null);
                accounts.insert(id, (account, username));
            }
        }

        let page = page.map(|row| with_account(row, &accounts));
        Ok(Reply::ok(page.to_json()))
    }
}

/// Append the caller's account and username to a log row, `-` when unknown.
fn with_account(mut row: Row, accounts: &BTreeMap<String, (Value, Value)>) -> Row {
    let (account, username) = row
        .get_str("user_id")
        .and_then(|id| accounts.get(id))
        .cloned()
        .unwrap_or((Value::Null, Value::Null));
    row.columns.push("account".into());
    row.values.push(account);
    row.columns.push("username".into());
    row.values.push(username);
    safe_column(&mut row, "account", "-");
    safe_column(&mut row, "username", "-");
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{bind, ParamSource};

    fn query(pairs: &[(&str, &str)]) -> ParamSource {
        ParamSource::from_query_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn log_filters_cover_lists_ranges_and_suffix() {
        let schema = logs_list().request.unwrap();
        let params = bind(
            &schema,
            &query(&[
                ("page", "1"),
                ("size", "10"),
                ("method", "GET"),
                ("method", "POST"),
                ("status", "500"),
                ("created_at_start", "2024-05-01 00:00:00"),
                ("ip", "10.0.0.7"),
            ]),
        )
        .unwrap();
        let conditions = log_filters(&params);
        assert_eq!(conditions.len(), 4);
        assert_eq!(
            conditions[0],
            Condition::is_in("method", vec![SqlValue::from("GET"), SqlValue::from("POST")])
        );
        assert_eq!(conditions[1], Condition::is_in("status", vec![SqlValue::Int(500)]));
        assert!(matches!(&conditions[2], Condition::Range { hi: None, .. }));
        assert_eq!(conditions[3], Condition::like("source_ip", "%10.0.0.7"));
    }

    #[test]
    fn default_sort_applies_only_without_explicit_sort() {
        let mut params = BoundMap::new();
        params.insert("page", BoundValue::Int(1));
        params.insert("size", BoundValue::Int(20));
        assert_eq!(page_request(&params, "-created_at").unwrap().sort, vec!["-created_at"]);
        params.insert("sort", BoundValue::List(vec![BoundValue::Str("status".into())]));
        assert_eq!(page_request(&params, "-created_at").unwrap().sort, vec!["status"]);
    }

    #[test]
    fn unknown_user_renders_placeholders() {
        let row = Row::new(vec!["id".into(), "user_id".into()], vec![json!("a"), Value::Null]);
        let row = with_account(row, &BTreeMap::new());
        assert_eq!(row.get("account"), Some(&json!("-")));
        assert_eq!(row.get("username"), Some(&json!("-")));
    }

    #[test]
    fn account_and_username_become_substring_matches() {
        let schema = logs_list().request.unwrap();
        let params = bind(
            &schema,
            &query(&[("page", "1"), ("size", "10"), ("account", "ops"), ("username", "")]),
        )
        .unwrap();
        assert_eq!(user_match(&params), vec![Condition::like("account", "%ops%")]);
        assert!(log_filters(&params).is_empty());
    }

    #[test]
    fn new_password_is_validated_but_old_is_not() {
        let schema = password_change().request.unwrap();
        let err = bind(&schema, &ParamSource::Body(json!({ "old": "x", "new": "short" }))).unwrap_err();
        assert_eq!(err.resp_code(), RespCode::InvalidPassword);
        let err = bind(&schema, &ParamSource::Body(json!({ "new": "n3wpass123" }))).unwrap_err();
        assert_eq!(err.resp_code(), RespCode::ParamsMissed);
        assert!(bind(&schema, &ParamSource::Body(json!({ "old": "x", "new": "n3wpass123" }))).is_ok());
    }

    #[test]
    fn profile_update_has_no_account_or_role() {
        let schema = users_update().request.unwrap();
        let names: Vec<&str> = schema.fields().unwrap().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["username", "phone", "email"]);
    }

    #[test]
    fn weak_password_reports_its_own_code() {
        let schema = users_create().request.unwrap();
        let err = bind(
            &schema,
            &ParamSource::Body(json!({ "account": "ops_admin", "password": "short" })),
        )
        .unwrap_err();
        assert_eq!(err.resp_code(), RespCode::InvalidPassword);

        let ok = bind(
            &schema,
            &ParamSource::Body(json!({ "account": "ops_admin", "password": "s3cretpass" })),
        )
        .unwrap();
        assert_eq!(ok.get_str("role"), Some(user::ROLE_USER));
    }
}
