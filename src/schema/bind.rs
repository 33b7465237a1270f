//! Request binding: walk a schema against raw parameters, coercing and validating each field.
//! Fields are visited in declaration order and the first violation fails the whole bind.

use crate::config::TableDecl;
use crate::error::{AppError, RespCode};
use crate::schema::{Field, NodeKind, Primitive, SchemaNode};
use crate::sql::{parse_datetime, SqlValue, DATETIME_FORMAT};
use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};

/// Raw parameters of one call.
#[derive(Clone, Debug)]
pub enum ParamSource {
    /// Query string; every key maps to all of its values in arrival order.
    Query(Vec<(String, Vec<String>)>),
    /// Parsed JSON body.
    Body(Value),
}

impl ParamSource {
    /// Group raw query pairs, keeping repeated keys together.
    pub fn from_query_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (k, v) in pairs {
            match grouped.iter_mut().find(|(key, _)| *key == k) {
                Some((_, values)) => values.push(v),
                None => grouped.push((k, vec![v])),
            }
        }
        ParamSource::Query(grouped)
    }

    pub fn is_query(&self) -> bool {
        matches!(self, ParamSource::Query(_))
    }

    fn root(&self) -> Result<Map<String, Value>, AppError> {
        match self {
            ParamSource::Query(pairs) => Ok(pairs
                .iter()
                .map(|(k, vs)| (k.clone(), Value::Array(vs.iter().cloned().map(Value::String).collect())))
                .collect()),
            ParamSource::Body(Value::Object(m)) => Ok(m.clone()),
            ParamSource::Body(Value::Null) => Ok(Map::new()),
            ParamSource::Body(_) => Err(fail(RespCode::ParamsValueError, "")),
        }
    }
}

/// Outcome of binding one field.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
    Enum { variant: &'static str, value: Value },
    /// Unconstrained value.
    Json(Value),
    List(Vec<BoundValue>),
    Object(BoundMap),
    Record { table: &'static str, values: BoundMap },
}

impl BoundValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoundValue::Str(s) => Some(s),
            BoundValue::Enum { variant, .. } => Some(variant),
            BoundValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BoundValue::Int(n) => Some(*n),
            BoundValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoundValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            BoundValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BoundValue]> {
        match self {
            BoundValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BoundMap> {
        match self {
            BoundValue::Object(m) | BoundValue::Record { values: m, .. } => Some(m),
            _ => None,
        }
    }

    /// Strings in a list, or a lone string as a one-element list.
    pub fn string_list(&self) -> Vec<String> {
        match self {
            BoundValue::List(items) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            other => other.as_str().map(|s| vec![s.to_string()]).unwrap_or_default(),
        }
    }

    /// Wire form: enums as their symbolic name, date-times in the wire format.
    pub fn to_json(&self) -> Value {
        match self {
            BoundValue::Null => Value::Null,
            BoundValue::Bool(b) => Value::Bool(*b),
            BoundValue::Int(n) => Value::from(*n),
            BoundValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            BoundValue::Str(s) => Value::String(s.clone()),
            BoundValue::DateTime(d) => Value::String(d.format(DATETIME_FORMAT).to_string()),
            BoundValue::Enum { variant, .. } => Value::String(variant.to_string()),
            BoundValue::Json(v) => v.clone(),
            BoundValue::List(items) => Value::Array(items.iter().map(BoundValue::to_json).collect()),
            BoundValue::Object(m) | BoundValue::Record { values: m, .. } => m.to_json(),
        }
    }

    /// Statement value. Enums persist by symbolic name; containers as JSON.
    pub fn to_sql(&self) -> SqlValue {
        match self {
            BoundValue::Null => SqlValue::Null,
            BoundValue::Bool(b) => SqlValue::Bool(*b),
            BoundValue::Int(n) => SqlValue::Int(*n),
            BoundValue::Float(f) => SqlValue::Float(*f),
            BoundValue::Str(s) => SqlValue::Text(s.clone()),
            BoundValue::DateTime(d) => SqlValue::DateTime(*d),
            BoundValue::Enum { variant, .. } => SqlValue::Text(variant.to_string()),
            BoundValue::Json(v) => SqlValue::from_json(v),
            other => SqlValue::Json(other.to_json()),
        }
    }
}

/// Bound fields in declaration order. Absent optional fields have no entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundMap {
    entries: Vec<(String, BoundValue)>,
}

impl BoundMap {
    pub fn new() -> Self {
        BoundMap::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: BoundValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&BoundValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<BoundValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(BoundValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(BoundValue::as_i64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }

    /// (column, value) pairs for statement construction.
    pub fn to_sql_pairs(&self) -> Vec<(String, SqlValue)> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.to_sql())).collect()
    }
}

fn fail(code: RespCode, path: &str) -> AppError {
    if path.is_empty() {
        AppError::code(code)
    } else {
        AppError::with_data(code, json!({ "field": path }))
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

/// Bind a call's raw parameters against an object- or record-shaped request schema.
/// A record root takes every key of the source as a column.
pub fn bind(schema: &SchemaNode, source: &ParamSource) -> Result<BoundMap, AppError> {
    let raw = source.root()?;
    match &schema.kind {
        NodeKind::Object(fields) => bind_fields(fields, &raw, source.is_query(), ""),
        NodeKind::Record(table) if !source.is_query() => build_record(table, &raw, ""),
        _ => Err(fail(RespCode::ParamsValueError, "")),
    }
}

fn bind_fields(
    fields: &[Field],
    raw: &Map<String, Value>,
    from_query: bool,
    path: &str,
) -> Result<BoundMap, AppError> {
    let mut out = BoundMap::new();
    for f in fields {
        let field_path = join(path, &f.name);
        if let Some(v) = bind_field(&f.node, raw.get(&f.name), from_query, &field_path)? {
            out.insert(f.name.clone(), v);
        }
    }
    Ok(out)
}

fn bind_field(
    node: &SchemaNode,
    raw: Option<&Value>,
    from_query: bool,
    path: &str,
) -> Result<Option<BoundValue>, AppError> {
    let raw = match raw {
        // query values arrive as lists; scalar fields take the lone element
        Some(Value::Array(items)) if from_query && !node.is_list() => match items.len() {
            0 => None,
            1 => Some(&items[0]),
            _ => return Err(fail(RespCode::ParamsValueError, path)),
        },
        Some(Value::Null) => None,
        other => other,
    };
    let Some(raw) = raw else {
        if let Some(default) = &node.default {
            return coerce(node, default, path).map(Some);
        }
        if node.required {
            return Err(fail(RespCode::ParamsMissed, path));
        }
        return Ok(None);
    };
    let value = coerce(node, raw, path)?;
    if let Some(valid) = &node.validator {
        let ok = match &value {
            BoundValue::List(items) => items.iter().all(|v| valid(v)),
            v => valid(v),
        };
        if !ok {
            return Err(fail(node.on_invalid.unwrap_or(RespCode::ParamsRangeError), path));
        }
    }
    Ok(Some(value))
}

fn coerce(node: &SchemaNode, raw: &Value, path: &str) -> Result<BoundValue, AppError> {
    match &node.kind {
        NodeKind::Primitive(p) => coerce_primitive(*p, raw).ok_or_else(|| fail(RespCode::ParamsValueError, path)),
        NodeKind::Enum(def) => def
            .resolve(raw)
            .map(|(variant, value)| BoundValue::Enum { variant, value })
            .ok_or_else(|| fail(RespCode::ParamsValueError, path)),
        NodeKind::Object(fields) => {
            let map = as_object(raw).ok_or_else(|| fail(RespCode::ParamsValueError, path))?;
            Ok(BoundValue::Object(bind_fields(fields, &map, false, path)?))
        }
        NodeKind::List(item) => {
            let Value::Array(items) = raw else {
                return Err(fail(RespCode::ParamsValueError, path));
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, elem) in items.iter().enumerate() {
                let elem_path = format!("{}[{}]", path, i);
                match bind_field(item, Some(elem), false, &elem_path)? {
                    Some(v) => out.push(v),
                    None => return Err(fail(RespCode::ParamsValueError, &elem_path)),
                }
            }
            Ok(BoundValue::List(out))
        }
        NodeKind::Record(table) => {
            let map = as_object(raw).ok_or_else(|| fail(RespCode::ParamsValueError, path))?;
            Ok(BoundValue::Record {
                table: table.name,
                values: build_record(table, &map, path)?,
            })
        }
    }
}

/// Objects may arrive as JSON text when sourced from a query string.
fn as_object(raw: &Value) -> Option<Map<String, Value>> {
    match raw {
        Value::Object(m) => Some(m.clone()),
        Value::String(s) => match serde_json::from_str(s) {
            Ok(Value::Object(m)) => Some(m),
            _ => None,
        },
        _ => None,
    }
}

fn build_record(table: &TableDecl, raw: &Map<String, Value>, path: &str) -> Result<BoundMap, AppError> {
    let mut out = BoundMap::new();
    for (key, value) in raw {
        let col = table.resolve_column(key)?;
        let bound = match value {
            Value::Null if col.nullable => BoundValue::Null,
            Value::Null => return Err(fail(RespCode::ParamsValueError, &join(path, key))),
            v => coerce_primitive(col.type_.into(), v)
                .ok_or_else(|| fail(RespCode::ParamsValueError, &join(path, key)))?,
        };
        out.insert(col.name, bound);
    }
    Ok(out)
}

/// Scalar coercion. Strings convert to numbers and booleans; anything else that does not fit is None.
pub fn coerce_primitive(p: Primitive, raw: &Value) -> Option<BoundValue> {
    match (p, raw) {
        (Primitive::Any, v) => Some(BoundValue::Json(v.clone())),
        (Primitive::Str, Value::String(s)) => Some(BoundValue::Str(s.clone())),
        (Primitive::Str, Value::Number(n)) => Some(BoundValue::Str(n.to_string())),
        (Primitive::Str, Value::Bool(b)) => Some(BoundValue::Str(b.to_string())),
        (Primitive::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(BoundValue::Int),
        (Primitive::Int, Value::String(s)) => s.trim().parse().ok().map(BoundValue::Int),
        (Primitive::Float, Value::Number(n)) => n.as_f64().map(BoundValue::Float),
        (Primitive::Float, Value::String(s)) => s.trim().parse().ok().map(BoundValue::Float),
        (Primitive::Bool, Value::Bool(b)) => Some(BoundValue::Bool(*b)),
        (Primitive::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(BoundValue::Bool(true)),
            "false" | "0" => Some(BoundValue::Bool(false)),
            _ => None,
        },
        (Primitive::Bool, Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(BoundValue::Bool(true)),
            Some(0) => Some(BoundValue::Bool(false)),
            _ => None,
        },
        (Primitive::DateTime, Value::String(s)) => parse_datetime(s).map(BoundValue::DateTime),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDecl, ColumnType, StoreKind};
    use crate::schema::{field, EnumDef};

    fn code_of(err: AppError) -> RespCode {
        err.resp_code()
    }

    fn query(pairs: &[(&str, &str)]) -> ParamSource {
        ParamSource::from_query_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn query_scalars_collapse_and_lists_keep_all_values() {
        let schema = SchemaNode::object(vec![
            field("page", SchemaNode::int().required()),
            field("id", SchemaNode::list(SchemaNode::string())),
        ]);
        let bound = bind(&schema, &query(&[("page", "2"), ("id", "a"), ("id", "b")])).unwrap();
        assert_eq!(bound.get_i64("page"), Some(2));
        assert_eq!(bound.get("id").unwrap().string_list(), vec!["a", "b"]);
    }

    #[test]
    fn repeated_query_key_for_scalar_is_value_error() {
        let schema = SchemaNode::object(vec![field("page", SchemaNode::int())]);
        let err = bind(&schema, &query(&[("page", "1"), ("page", "2")])).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsValueError);
    }

    #[test]
    fn missing_required_fails_and_optional_is_absent() {
        let schema = SchemaNode::object(vec![
            field("keyword", SchemaNode::string()),
            field("size", SchemaNode::int().required()),
        ]);
        let err = bind(&schema, &ParamSource::Body(json!({ "keyword": "x" }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsMissed);

        let ok = bind(&schema, &ParamSource::Body(json!({ "size": 10 }))).unwrap();
        assert!(!ok.contains("keyword"));
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn first_violation_in_declaration_order_wins() {
        let schema = SchemaNode::object(vec![
            field("a", SchemaNode::int()),
            field("b", SchemaNode::string().required()),
        ]);
        let err = bind(&schema, &ParamSource::Body(json!({ "a": "nope" }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsValueError);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let schema = SchemaNode::object(vec![field("sort", SchemaNode::list(SchemaNode::string()).default(json!(["-id"])))]);
        let bound = bind(&schema, &ParamSource::Body(json!({}))).unwrap();
        assert_eq!(bound.get("sort").unwrap().string_list(), vec!["-id"]);
    }

    #[test]
    fn validator_runs_on_coerced_value_with_declared_code() {
        let schema = SchemaNode::object(vec![
            field(
                "size",
                SchemaNode::int().check(|v| matches!(v.as_i64(), Some(n) if (0..=100).contains(&n))),
            ),
            field(
                "account",
                SchemaNode::string().validate(|v| v.as_str().map_or(false, |s| s.len() >= 4), RespCode::InvalidAccount),
            ),
        ]);
        let err = bind(&schema, &query(&[("size", "101")])).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsRangeError);
        let err = bind(&schema, &ParamSource::Body(json!({ "account": "ab" }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::InvalidAccount);
    }

    #[test]
    fn list_validator_applies_per_element() {
        let schema = SchemaNode::object(vec![field(
            "status",
            SchemaNode::list(SchemaNode::int()).check(|v| v.as_i64().map_or(false, |n| n >= 100)),
        )]);
        assert!(bind(&schema, &ParamSource::Body(json!({ "status": [200, 404] }))).is_ok());
        let err = bind(&schema, &ParamSource::Body(json!({ "status": [200, 4] }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsRangeError);
    }

    #[test]
    fn non_list_where_list_required_is_value_error() {
        let schema = SchemaNode::object(vec![field("ids", SchemaNode::list(SchemaNode::string()))]);
        let err = bind(&schema, &ParamSource::Body(json!({ "ids": "a" }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsValueError);
    }

    #[test]
    fn nested_objects_and_lists_of_objects_recurse() {
        let item = SchemaNode::object(vec![
            field("op", SchemaNode::string().required()),
            field("value", SchemaNode::any()),
        ]);
        let schema = SchemaNode::object(vec![field("filters", SchemaNode::list(item))]);
        let bound = bind(
            &schema,
            &ParamSource::Body(json!({ "filters": [{ "op": "in", "value": [1, 2] }] })),
        )
        .unwrap();
        let list = bound.get("filters").unwrap().as_list().unwrap();
        assert_eq!(list[0].as_map().unwrap().get_str("op"), Some("in"));

        let err = bind(&schema, &ParamSource::Body(json!({ "filters": [{ "value": 1 }] }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsMissed);
    }

    #[test]
    fn datetimes_enums_and_records_coerce() {
        let table = TableDecl::new(
            "widget",
            StoreKind::Row,
            vec![
                ColumnDecl::new("id", ColumnType::Text),
                ColumnDecl::new("weight", ColumnType::Int),
                ColumnDecl::nullable("note", ColumnType::Text),
            ],
        );
        let schema = SchemaNode::object(vec![
            field("at", SchemaNode::datetime()),
            field(
                "method",
                SchemaNode::enumeration(EnumDef::new("Method", vec![("GET", json!("GET")), ("POST", json!("POST"))])),
            ),
            field("widget", SchemaNode::record(table)),
        ]);
        let bound = bind(
            &schema,
            &ParamSource::Body(json!({
                "at": "2024-05-01 10:00:00",
                "method": "POST",
                "widget": { "weight": "12", "note": null }
            })),
        )
        .unwrap();
        assert!(bound.get("at").unwrap().as_datetime().is_some());
        assert_eq!(bound.get_str("method"), Some("POST"));
        let widget = bound.get("widget").unwrap().as_map().unwrap();
        assert_eq!(widget.get_i64("weight"), Some(12));
        assert_eq!(widget.get("note"), Some(&BoundValue::Null));

        let err = bind(&schema, &ParamSource::Body(json!({ "at": "yesterday" }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsValueError);
        let err = bind(&schema, &ParamSource::Body(json!({ "widget": { "colour": "red" } }))).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsRangeError);
    }

    #[test]
    fn record_root_takes_every_body_key_as_a_column() {
        let table = TableDecl::new(
            "widget",
            StoreKind::Row,
            vec![
                ColumnDecl::new("id", ColumnType::Text),
                ColumnDecl::new("weight", ColumnType::Int),
            ],
        );
        let schema = SchemaNode::record(table);
        let bound = bind(&schema, &ParamSource::Body(json!({ "weight": 3 }))).unwrap();
        assert_eq!(bound.get_i64("weight"), Some(3));
        assert_eq!(bound.len(), 1);

        let err = bind(&schema, &query(&[("weight", "3")])).unwrap_err();
        assert_eq!(code_of(err), RespCode::ParamsValueError);
    }
}
