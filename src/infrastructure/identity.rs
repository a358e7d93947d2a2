//! Identity provider implementations.
//!
//! The production provider validates handshake JWTs and reads accounts
//! from PostgreSQL; the account system itself issues the tokens. A static
//! in-memory provider backs the test suites.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::entities::{Identity, IdentityProvider, Role};
use crate::shared::error::AppError;

/// JWT claims carried by handshake tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID as a string
    pub sub: String,
    /// Expiry (unix timestamp)
    pub exp: i64,
}

/// JWT-validating identity provider backed by the accounts table.
pub struct JwtIdentityProvider {
    pool: PgPool,
    decoding_key: DecodingKey,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    display_name: String,
    role: String,
}

impl JwtIdentityProvider {
    pub fn new(pool: PgPool, secret: &str) -> Self {
        Self {
            pool,
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserRow>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, display_name, role FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve_token(&self, token: &str) -> Result<Identity, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?
            .claims;

        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;

        let row = self
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown account".into()))?;

        Ok(Identity {
            user_id: row.id,
            display_name: row.display_name,
            role: Role::from_str(&row.role),
        })
    }

    async fn role_of(&self, user_id: i64) -> Result<Option<Role>, AppError> {
        Ok(self
            .fetch_user(user_id)
            .await?
            .map(|row| Role::from_str(&row.role)))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<i64>, AppError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE display_name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }
}

pub mod memory {
    //! Static identity provider for the test suites. Tokens are plain
    //! strings mapped directly to registered accounts.

    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::RwLock;

    use crate::domain::entities::{Identity, IdentityProvider, Role, User};
    use crate::shared::error::AppError;

    #[derive(Default)]
    pub struct StaticIdentityProvider {
        users: RwLock<HashMap<i64, User>>,
        tokens: RwLock<HashMap<String, i64>>,
    }

    impl StaticIdentityProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register an account and a token that resolves to it.
        pub fn add_user(&self, id: i64, display_name: &str, role: Role, token: &str) {
            self.users.write().insert(
                id,
                User {
                    id,
                    display_name: display_name.to_string(),
                    role,
                },
            );
            self.tokens.write().insert(token.to_string(), id);
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticIdentityProvider {
        async fn resolve_token(&self, token: &str) -> Result<Identity, AppError> {
            let user_id = self
                .tokens
                .read()
                .get(token)
                .copied()
                .ok_or_else(|| AppError::Unauthorized("Invalid token".into()))?;
            let users = self.users.read();
            let user = users
                .get(&user_id)
                .ok_or_else(|| AppError::Unauthorized("Unknown account".into()))?;
            Ok(Identity {
                user_id: user.id,
                display_name: user.display_name.clone(),
                role: user.role,
            })
        }

        async fn role_of(&self, user_id: i64) -> Result<Option<Role>, AppError> {
            Ok(self.users.read().get(&user_id).map(|u| u.role))
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<i64>, AppError> {
            Ok(self
                .users
                .read()
                .values()
                .find(|u| u.display_name == name)
                .map(|u| u.id))
        }
    }
}
