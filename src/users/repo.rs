use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::ConnectionPool,
    error::StoreError,
    users::repo_types::{User, UserRow},
};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id       UUID PRIMARY KEY,
        name     VARCHAR(255) NOT NULL,
        email    VARCHAR(255) NOT NULL,
        password TEXT
    )
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (id, name, email, password)
    VALUES ($1, $2, $3, $4)
    RETURNING id, name, email, password
"#;

const SELECT_USER: &str = r#"
    SELECT id, name, email, password
    FROM users
    WHERE id = $1
"#;

const SELECT_ALL_USERS: &str = r#"
    SELECT id, name, email, password
    FROM users
"#;

// A NULL hash keeps the stored one.
const UPDATE_USER: &str = r#"
    UPDATE users
    SET name = $2, email = $3, password = COALESCE($4, password)
    WHERE id = $1
    RETURNING id, name, email, password
"#;

/// Persistence operations for user accounts. Every call is one round trip.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError>;

    async fn get(&self, id: Uuid) -> Result<User, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError>;
}

/// PostgreSQL-backed [`UserRepository`].
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: ConnectionPool,
}

impl PgUserStore {
    /// Builds the store and makes sure the `users` table exists. A failed
    /// bootstrap is logged and the store is returned anyway.
    pub async fn new(pool: ConnectionPool) -> Self {
        let store = Self { pool };
        if let Err(e) = store.bootstrap().await {
            warn!(error = %e, "users table bootstrap failed; continuing");
        }
        store
    }

    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        self.pool
            .run(|conn| {
                async move { sqlx::query(CREATE_TABLE).execute(&mut *conn).await.map(|_| ()) }
                    .boxed()
            })
            .await?;
        debug!("users table ready");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUserStore {
    #[instrument(skip(self, password_hash))]
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let (name, email) = (name.to_owned(), email.to_owned());
        let password_hash = password_hash.map(str::to_owned);
        let row = self
            .pool
            .run(move |conn| {
                async move {
                    sqlx::query_as::<_, UserRow>(INSERT_USER)
                        .bind(id)
                        .bind(name)
                        .bind(email)
                        .bind(password_hash)
                        .fetch_optional(&mut *conn)
                        .await
                }
                .boxed()
            })
            .await?;

        let user = User::from(row.ok_or(StoreError::InsertFailed)?);
        info!(user_id = %user.id, "user inserted");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<User, StoreError> {
        let row = self
            .pool
            .run(move |conn| {
                async move {
                    sqlx::query_as::<_, UserRow>(SELECT_USER)
                        .bind(id)
                        .fetch_optional(&mut *conn)
                        .await
                }
                .boxed()
            })
            .await?;

        row.map(User::from)
            .ok_or_else(|| StoreError::NotFound("User not found".into()))
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = self
            .pool
            .run(|conn| {
                async move {
                    sqlx::query_as::<_, UserRow>(SELECT_ALL_USERS)
                        .fetch_all(&mut *conn)
                        .await
                }
                .boxed()
            })
            .await?;

        debug!(count = rows.len(), "users listed");
        Ok(rows.into_iter().map(User::from).collect())
    }

    #[instrument(skip(self, password_hash))]
    async fn update(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        let (name, email) = (name.to_owned(), email.to_owned());
        let password_hash = password_hash.map(str::to_owned);
        let row = self
            .pool
            .run(move |conn| {
                async move {
                    sqlx::query_as::<_, UserRow>(UPDATE_USER)
                        .bind(id)
                        .bind(name)
                        .bind(email)
                        .bind(password_hash)
                        .fetch_optional(&mut *conn)
                        .await
                }
                .boxed()
            })
            .await?;

        let user = row
            .map(User::from)
            .ok_or_else(|| StoreError::NotFound("User not found".into()))?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }
}
