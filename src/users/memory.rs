use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::StoreError,
    users::{repo::UserRepository, repo_types::User},
};

/// Test double keeping users in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    users: Arc<Mutex<Vec<User>>>,
    calls: Arc<AtomicUsize>,
    unavailable: bool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails as if the database were down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<User> {
        self.users.lock().await.clone()
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        self.enter()?;
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email: email.to_owned(),
            password_hash: password_hash.map(str::to_owned),
        };
        self.users.lock().await.push(user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<User, StoreError> {
        self.enter()?;
        self.users
            .lock()
            .await
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("User not found".into()))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        self.enter()?;
        Ok(self.users.lock().await.clone())
    }

    async fn update(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        self.enter()?;
        let mut users = self.users.lock().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::NotFound("User not found".into()))?;
        user.name = name.to_owned();
        user.email = email.to_owned();
        if let Some(hash) = password_hash {
            user.password_hash = Some(hash.to_owned());
        }
        Ok(user.clone())
    }
}
