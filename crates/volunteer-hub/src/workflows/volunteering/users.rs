use std::sync::Arc;

use tracing::info;

use super::domain::{User, UserId};
use super::lifecycle::LifecycleError;
use super::repository::{RepositoryError, VolunteerStore};

const DEFAULT_ROLE: &str = "user";

/// Registry of applicants and administrators. Credentials live with the auth layer.
pub struct UserRegistry<S> {
    store: Arc<S>,
}

impl<S> UserRegistry<S>
where
    S: VolunteerStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a user under `role_name`, falling back to the `user` role when none is given.
    pub fn register(&self, username: &str, role_name: Option<&str>) -> Result<User, LifecycleError> {
        let role_name = role_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_ROLE);
        let role = self
            .store
            .role_by_name(role_name)?
            .ok_or_else(|| LifecycleError::RoleNotFound(role_name.to_string()))?;

        let username = username.trim();
        if username.is_empty() {
            return Err(LifecycleError::EmptyUsername);
        }
        let user = self
            .store
            .insert_user(role.role_id, username)
            .map_err(|err| match err {
                RepositoryError::Conflict => LifecycleError::UsernameTaken(username.to_string()),
                RepositoryError::NotFound => LifecycleError::RoleNotFound(role_name.to_string()),
                other => LifecycleError::Storage(other),
            })?;

        info!(user_id = user.user_id.0, role = role_name, "user registered");
        Ok(user)
    }

    pub fn get(&self, user_id: UserId) -> Result<User, LifecycleError> {
        self.store
            .user(user_id)?
            .ok_or(LifecycleError::UserNotFound(user_id))
    }
}
