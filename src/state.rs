//! Shared application state for all routes: the executor behind the pipeline and the endpoint set.

use crate::apis;
use crate::pipeline::{EndpointSet, IdentityResolver, Pipeline};
use crate::store::Executor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Built once from the table registry; read-only afterwards.
    pub endpoints: Arc<EndpointSet>,
}

impl AppState {
    pub fn new(executor: Arc<Executor>, identity: Arc<dyn IdentityResolver>) -> Self {
        let endpoints = Arc::new(apis::endpoints(executor.registry()));
        AppState {
            pipeline: Pipeline::new(executor, identity),
            endpoints,
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        self.pipeline.executor()
    }
}
