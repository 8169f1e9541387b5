use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::db::ConnectionPool;
use crate::users::{password::CredentialHasher, PgUserStore, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub hasher: CredentialHasher,
}

impl AppState {
    pub async fn init(database: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = ConnectionPool::connect_lazy(database);
        let users = Arc::new(PgUserStore::new(pool).await) as Arc<dyn UserRepository>;
        Ok(Self::from_parts(users))
    }

    pub fn from_parts(users: Arc<dyn UserRepository>) -> Self {
        Self {
            users,
            hasher: CredentialHasher::new(),
        }
    }
}
