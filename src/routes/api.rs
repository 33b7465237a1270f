//! Versioned API routes: generic CRUD and system administration, behind the access log.

use crate::handlers::{crud, system};
use crate::logging::access_log;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

/// Routes mounted under `/api/v1`.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/crud/:target", post(crud::create).delete(crud::delete))
        .route("/crud/:target/search", post(crud::search))
        .route("/crud/:target/:id", get(crud::read).patch(crud::update))
        .route(
            "/system/users",
            get(system::list_users)
                .post(system::create_user)
                .delete(system::delete_users),
        )
        .route("/system/users/password", put(system::change_password))
        .route("/system/users/:id", patch(system::update_user))
        .route("/system/users/:id/password", put(system::reset_password))
        .route("/system/logs", get(system::list_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), access_log))
        .with_state(state)
}
