//! Schema-driven marshalling: node tree, request binding, response projection.

pub mod bind;
pub mod common;
pub mod node;
pub mod project;

pub use bind::{bind, BoundMap, BoundValue, ParamSource};
pub use node::*;
pub use project::project;
