//! In-memory application fixture shared by the resolver and router tests.

use std::sync::Arc;

use async_graphql::{Request, Response};
use chrono::Utc;
use entity::{restaurants, users};
use platform_authn::{TokenCodec, hash_password};
use platform_authz::{Principal, Role};
use platform_db::{DbPool, bootstrap_schema, role_to_entity};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, Database};
use serde_json::Value;
use uuid::Uuid;

use crate::{config::AppConfig, graphql::RequestPrincipal, http::AppState};

pub const SECRET: &str = "fixture-secret-long-enough-for-hs256";
pub const PASSWORD: &str = "fixture-password";

pub struct Fixture {
    state: AppState,
    tokens: TokenCodec,
}

impl Fixture {
    pub async fn new() -> Self {
        let pool: DbPool = Database::connect("sqlite::memory:").await.unwrap();
        bootstrap_schema(&pool).await.unwrap();
        let config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        let tokens = TokenCodec::new(SECRET.as_bytes(), config.token_ttl);
        Self {
            state: AppState::new(pool, Arc::new(config)),
            tokens,
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub async fn execute(&self, query: &str, principal: Option<Principal>) -> Response {
        let request = Request::new(query).data(RequestPrincipal(principal));
        self.state.schema.execute(request).await
    }

    pub async fn resolve(&self, token: &str) -> Option<Principal> {
        self.state.gatekeeper.resolve(Some(token)).await
    }

    /// Data of a response that must have succeeded.
    pub fn json(response: Response) -> Value {
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        response.data.into_json().unwrap()
    }

    pub fn error_code(response: &Response) -> Option<String> {
        let error = response.errors.first()?;
        let code = error.extensions.as_ref()?.get("code")?;
        match code {
            async_graphql::Value::String(code) => Some(code.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Insert an account whose password is [`PASSWORD`].
    pub async fn user(&self, email: &str, role: Role) -> Principal {
        let now = Utc::now();
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password(PASSWORD).unwrap()),
            role: Set(role_to_entity(role)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.state.pool)
        .await
        .unwrap();
        Principal::new(user.id, role)
    }

    pub async fn restaurant(&self, owner: Principal, name: &str) -> Uuid {
        restaurants::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            address: Set("1 Test Lane".to_string()),
            cover_image: Set(None),
            owner_id: Set(owner.id),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.state.pool)
        .await
        .unwrap()
        .id
    }
}
