//! User records and the user directory service.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::store::EntityStore;

/// A user record.
///
/// Serializes to exactly `{user_id, name, email}`, which is also the shape
/// of the `GetUser` reply on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    /// Creates a user record.
    pub fn new(user_id: u64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The users every directory instance starts with unless seeded otherwise.
pub fn demo_users() -> Vec<User> {
    vec![
        User::new(1, "Alice", "alice@example.com"),
        User::new(2, "Bob", "bob@example.com"),
        User::new(3, "Charlie", "charlie@example.com"),
    ]
}

/// Holds user records and answers lookup and email-update requests.
///
/// Records are seeded at startup, mutated only through [`update_email`],
/// and never deleted.
///
/// [`update_email`]: UserDirectory::update_email
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: EntityStore<UserId, User>,
}

impl UserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory seeded with the given users.
    ///
    /// Later duplicates of an id are ignored.
    pub async fn seeded(users: impl IntoIterator<Item = User>) -> Self {
        let directory = Self::new();
        for user in users {
            if !directory.users.insert_new(user.user_id, user.clone()).await {
                tracing::warn!(user_id = %user.user_id, "duplicate user id in seed ignored");
            }
        }
        directory
    }

    /// Creates a directory seeded with Alice, Bob and Charlie.
    pub async fn with_demo_users() -> Self {
        Self::seeded(demo_users()).await
    }

    /// Returns the user with the given id.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, user_id: UserId) -> Result<User, DomainError> {
        metrics::counter!("user_lookups_total").increment(1);
        self.users
            .get(&user_id)
            .await
            .ok_or(DomainError::UserNotFound(user_id))
    }

    /// Overwrites the user's email and returns the updated record.
    ///
    /// Only blank emails are rejected; no format validation is applied.
    #[tracing::instrument(skip(self, new_email))]
    pub async fn update_email(
        &self,
        user_id: UserId,
        new_email: impl Into<String>,
    ) -> Result<User, DomainError> {
        let new_email = new_email.into();
        if new_email.trim().is_empty() {
            return Err(DomainError::invalid_input("email must not be blank"));
        }

        let user = self
            .users
            .update(&user_id, |user| {
                user.email = new_email;
                Ok::<_, DomainError>(user.clone())
            })
            .await
            .ok_or(DomainError::UserNotFound(user_id))??;

        tracing::info!(%user_id, email = %user.email, "user email updated");
        Ok(user)
    }

    /// Returns the number of users in the directory.
    pub async fn user_count(&self) -> usize {
        self.users.len().await
    }
}
