use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;

pub use repo::{PgUserStore, UserRepository};
pub use repo_types::User;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
