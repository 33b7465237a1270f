//! Safe SQL: identifiers from declarations only, values as parameters or escaped literals.

pub mod builder;
pub mod literal;
pub mod params;
pub mod statement;

pub use builder::{quoted, render, QueryBuf};
pub use params::*;
pub use statement::*;
