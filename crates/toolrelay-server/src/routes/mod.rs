pub mod compatible;
pub mod models;
pub mod stream;
pub mod tools;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(tools::routes(state.clone()))
        .merge(compatible::routes(state))
        .merge(models::routes())
}
