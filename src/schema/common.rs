//! Shapes shared by many endpoints.

use crate::schema::{field, Field, SchemaNode};

/// Pagination controls common to every list/search request.
pub fn paginate_fields() -> Vec<Field> {
    vec![
        // 1-based
        field("page", SchemaNode::int().required()),
        // rows per page, 0 for all rows
        field("size", SchemaNode::int().required()),
        // columns, '-' prefix for descending
        field("sort", SchemaNode::list(SchemaNode::string())),
    ]
}

/// Generic search request: pagination plus field projection and a filter map.
pub fn search_request() -> SchemaNode {
    let mut fields = paginate_fields();
    fields.push(field("field", SchemaNode::list(SchemaNode::string())));
    // column -> {op, value}
    fields.push(field("query", SchemaNode::any()));
    SchemaNode::object(fields)
}

/// `{total, data: [item]}` envelope.
pub fn paginated(item: SchemaNode) -> SchemaNode {
    SchemaNode::object(vec![
        field("total", SchemaNode::int().required()),
        field("data", SchemaNode::list(item).required()),
    ])
}

/// Identifier (or identifiers) of created records.
pub fn created() -> SchemaNode {
    SchemaNode::object(vec![field("id", SchemaNode::any().required())])
}
