//! Bearer-token authentication.
//!
//! The router only knows the [`AuthProvider`] trait; ships with a static
//! pre-shared-token provider for small deployments and tests. Role checks
//! happen per handler, never in the core.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::config::StaticToken;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Vendedor,
}

impl Role {
    /// Admin and manager clear the elevated routes (inventory movements,
    /// transfers, cancellations).
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// The resolved caller. Inserted into request extensions by the
/// middleware; handlers pull it out with `Extension<Identity>`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub home_store_id: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolves a bearer token to an identity; `None` rejects the request.
    async fn resolve(&self, token: &str) -> Option<Identity>;
}

/// Pre-shared-token provider backed by the config file.
#[derive(Debug, Default)]
pub struct StaticAuthProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticAuthProvider {
    pub fn from_tokens(tokens: &[StaticToken]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Identity {
                        user_id: t.user_id.clone(),
                        role: t.role,
                        home_store_id: t.home_store_id.clone(),
                    },
                )
            })
            .collect();
        StaticAuthProvider { tokens }
    }

    pub fn with_token(mut self, token: &str, identity: Identity) -> Self {
        self.tokens.insert(token.to_string(), identity);
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).cloned()
    }
}

pub type SharedAuthProvider = Arc<dyn AuthProvider>;

/// Extracts and resolves the bearer token, rejecting with 401 otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let identity = state
        .auth
        .resolve(token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_resolves_known_tokens_only() {
        let provider = StaticAuthProvider::default().with_token(
            "t-1",
            Identity {
                user_id: "ana".to_string(),
                role: Role::Vendedor,
                home_store_id: Some("centro".to_string()),
            },
        );
        assert!(provider.resolve("t-1").await.is_some());
        assert!(provider.resolve("t-2").await.is_none());
    }

    #[test]
    fn role_gating() {
        assert!(Role::Admin.can_manage());
        assert!(Role::Manager.can_manage());
        assert!(!Role::Vendedor.can_manage());
    }
}
