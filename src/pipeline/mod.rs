//! Endpoint pipeline: declarations, caller identity and the per-call state machine.

pub mod endpoint;
pub mod identity;
pub mod run;

pub use endpoint::{Endpoint, EndpointSet, Handler, HandlerContext};
pub use identity::{Identity, IdentityResolver, UserLookup};
pub use run::{Call, Pipeline, Stage};
