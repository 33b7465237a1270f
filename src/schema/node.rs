//! Schema nodes: one recursive description per request shape and per response status.
//! Built once at startup and shared read-only.

use crate::config::{ColumnType, TableDecl};
use crate::error::RespCode;
use crate::schema::BoundValue;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Predicate run against a coerced value.
pub type Validator = Arc<dyn Fn(&BoundValue) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Accepted as-is, no coercion.
    Any,
    Str,
    Int,
    Float,
    Bool,
    DateTime,
}

impl From<ColumnType> for Primitive {
    fn from(t: ColumnType) -> Self {
        match t {
            ColumnType::Text => Primitive::Str,
            ColumnType::Int => Primitive::Int,
            ColumnType::Float => Primitive::Float,
            ColumnType::Bool => Primitive::Bool,
            ColumnType::DateTime => Primitive::DateTime,
            ColumnType::Json => Primitive::Any,
        }
    }
}

/// Closed set of symbolic names, each with an underlying wire value.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub name: &'static str,
    pub variants: Vec<(&'static str, Value)>,
}

impl EnumDef {
    pub fn new(name: &'static str, variants: Vec<(&'static str, Value)>) -> Self {
        EnumDef { name, variants }
    }

    /// Resolve a raw value, preferring a symbolic-name match over a value match.
    pub fn resolve(&self, raw: &Value) -> Option<(&'static str, Value)> {
        if let Value::String(s) = raw {
            if let Some((n, v)) = self.variants.iter().find(|(n, _)| n == s) {
                return Some((*n, v.clone()));
            }
        }
        self.variants
            .iter()
            .find(|(_, v)| v == raw || matches!(raw, Value::String(s) if *s == value_text(v)))
            .map(|(n, v)| (*n, v.clone()))
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub node: SchemaNode,
}

pub fn field(name: impl Into<String>, node: SchemaNode) -> Field {
    Field {
        name: name.into(),
        node,
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Primitive(Primitive),
    Enum(EnumDef),
    Object(Vec<Field>),
    List(Box<SchemaNode>),
    /// Persisted record built from a mapping keyed by declared columns.
    Record(TableDecl),
}

#[derive(Clone)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub required: bool,
    pub default: Option<Value>,
    pub validator: Option<Validator>,
    pub on_invalid: Option<RespCode>,
    /// Source key used when projecting; defaults to the field name.
    pub serialize_as: Option<String>,
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .field("on_invalid", &self.on_invalid)
            .field("serialize_as", &self.serialize_as)
            .finish()
    }
}

impl SchemaNode {
    fn of(kind: NodeKind) -> Self {
        SchemaNode {
            kind,
            required: false,
            default: None,
            validator: None,
            on_invalid: None,
            serialize_as: None,
        }
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::of(NodeKind::Primitive(p))
    }

    pub fn any() -> Self {
        Self::primitive(Primitive::Any)
    }

    pub fn string() -> Self {
        Self::primitive(Primitive::Str)
    }

    pub fn int() -> Self {
        Self::primitive(Primitive::Int)
    }

    pub fn float() -> Self {
        Self::primitive(Primitive::Float)
    }

    pub fn boolean() -> Self {
        Self::primitive(Primitive::Bool)
    }

    pub fn datetime() -> Self {
        Self::primitive(Primitive::DateTime)
    }

    pub fn enumeration(def: EnumDef) -> Self {
        Self::of(NodeKind::Enum(def))
    }

    pub fn object(fields: Vec<Field>) -> Self {
        Self::of(NodeKind::Object(fields))
    }

    pub fn list(item: SchemaNode) -> Self {
        Self::of(NodeKind::List(Box::new(item)))
    }

    pub fn record(table: TableDecl) -> Self {
        Self::of(NodeKind::Record(table))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Attach a validator; failures report `code`.
    pub fn validate<F>(mut self, f: F, code: RespCode) -> Self
    where
        F: Fn(&BoundValue) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self.on_invalid = Some(code);
        self
    }

    /// Attach a validator reporting the generic range error.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&BoundValue) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn alias(mut self, key: impl Into<String>) -> Self {
        self.serialize_as = Some(key.into());
        self
    }

    pub fn fields(&self) -> Option<&[Field]> {
        match &self.kind {
            NodeKind::Object(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, NodeKind::List(_))
    }
}
