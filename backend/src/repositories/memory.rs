use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::user::{RepositoryError, RepositoryResult, UserRepository};
use crate::{
    models::user::{User, UserRole},
    types::UserId,
};

/// Process-local credential store. Every operation takes the lock once, so
/// each mutation is atomic with respect to the others.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: UserId, apply: F) -> RepositoryResult<bool>
    where
        F: FnOnce(&mut User) -> bool + Send,
    {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        let changed = apply(user);
        if changed {
            user.updated_at = Utc::now();
        }
        Ok(changed)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> RepositoryResult<bool> {
        let password_hash = password_hash.to_string();
        self.update(id, move |user| {
            user.password_hash = password_hash;
            true
        })
        .await
    }

    async fn store_refresh_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let token = token.to_string();
        self.update(id, move |user| {
            user.refresh_token = Some(token);
            user.refresh_token_expiry_time = Some(expires_at);
            true
        })
        .await
    }

    async fn rotate_refresh_token(
        &self,
        id: UserId,
        current: &str,
        next: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let next = next.to_string();
        self.update(id, move |user| {
            if !user.has_valid_refresh_token(current, now) {
                return false;
            }
            user.refresh_token = Some(next);
            user.refresh_token_expiry_time = Some(expires_at);
            true
        })
        .await
    }

    async fn clear_refresh_token(&self, id: UserId) -> RepositoryResult<bool> {
        self.update(id, |user| {
            user.refresh_token = None;
            user.refresh_token_expiry_time = None;
            true
        })
        .await
    }

    async fn set_approved(&self, id: UserId) -> RepositoryResult<bool> {
        self.update(id, |user| {
            user.is_approved = true;
            true
        })
        .await
    }

    async fn delete(&self, id: UserId) -> RepositoryResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn count_by_role(&self, role: UserRole) -> RepositoryResult<i64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.role == role).count() as i64)
    }

    async fn list_pending_organizers(&self) -> RepositoryResult<Vec<User>> {
        let users = self.users.read().await;
        let mut pending: Vec<User> = users
            .values()
            .filter(|u| u.is_pending_approval())
            .cloned()
            .collect();
        pending.sort_by_key(|u| u.created_at);
        Ok(pending)
    }
}
