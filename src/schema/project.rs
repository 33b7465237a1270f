//! Response projection: shape a handler's result through the declared response schema.

use crate::schema::{NodeKind, SchemaNode};
use serde_json::{Map, Value};

/// Project a value through a schema node.
///
/// Objects look each field up by its alias (or name) and emit it under the field name.
/// Required fields are always emitted, falling back to the default or null; optional
/// fields only when present and non-empty. Lists project element-wise.
pub fn project(node: &SchemaNode, value: &Value) -> Value {
    match &node.kind {
        NodeKind::Object(fields) => {
            let Value::Object(source) = value else {
                return Value::Null;
            };
            let mut out = Map::new();
            for f in fields {
                let key = f.node.serialize_as.as_deref().unwrap_or(&f.name);
                match source.get(key) {
                    Some(v) if !is_empty(v) => {
                        out.insert(f.name.clone(), project(&f.node, v));
                    }
                    found if f.node.required => {
                        let fallback = match (found, &f.node.default) {
                            (Some(v), _) if !v.is_null() => project(&f.node, v),
                            (_, Some(d)) => d.clone(),
                            _ => Value::Null,
                        };
                        out.insert(f.name.clone(), fallback);
                    }
                    _ => {}
                }
            }
            Value::Object(out)
        }
        NodeKind::List(item) => match value {
            Value::Array(items) => Value::Array(items.iter().map(|v| project(item, v)).collect()),
            Value::Null => Value::Array(Vec::new()),
            // a lone value projects as a one-element list
            other => Value::Array(vec![project(item, other)]),
        },
        NodeKind::Record(table) => match value {
            Value::Object(source) => Value::Object(
                table
                    .columns
                    .iter()
                    .filter_map(|c| source.get(c.name).map(|v| (c.name.to_string(), v.clone())))
                    .collect(),
            ),
            other => other.clone(),
        },
        NodeKind::Primitive(_) | NodeKind::Enum(_) => value.clone(),
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
