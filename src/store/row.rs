//! Row shape shared by both stores: ordered column names with JSON cell values.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    /// Build from a JSON object, keeping its key order.
    pub fn from_object(map: Map<String, Value>) -> Self {
        let (columns, values) = map.into_iter().unzip();
        Row { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// First cell; what a scalar read unwraps to.
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn into_first(self) -> Option<Value> {
        self.values.into_iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.columns
                .iter()
                .cloned()
                .zip(self.values.iter().cloned())
                .collect(),
        )
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (c, v) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(c, v)?;
        }
        map.end()
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        row.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_column_order_when_serialized() {
        let row = Row::new(vec!["b".into(), "a".into()], vec![json!(1), json!("x")]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"b":1,"a":"x"}"#);
        assert_eq!(row.get("a"), Some(&json!("x")));
        assert_eq!(row.first(), Some(&json!(1)));
    }
}
