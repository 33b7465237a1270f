//! Endpoint declarations served by the router.

pub mod crud;
pub mod system;

use crate::config::TableRegistry;
use crate::pipeline::EndpointSet;

/// Every endpoint: generic CRUD per row-store table plus the system endpoints.
pub fn endpoints(registry: &TableRegistry) -> EndpointSet {
    let mut set = EndpointSet::new();
    crud::register(&mut set, registry);
    system::register(&mut set);
    set
}
