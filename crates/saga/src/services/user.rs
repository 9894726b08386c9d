//! User service port.

use async_trait::async_trait;
use common::UserId;
use domain::{User, UserDirectory};

use super::ServiceError;

/// User lookup and update operations.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Returns the user with the given id.
    async fn get_user(&self, user_id: UserId) -> Result<User, ServiceError>;

    /// Overwrites the user's email and returns the updated record.
    async fn update_user(&self, user_id: UserId, new_email: String) -> Result<User, ServiceError>;
}

#[async_trait]
impl UserService for UserDirectory {
    async fn get_user(&self, user_id: UserId) -> Result<User, ServiceError> {
        Ok(UserDirectory::get_user(self, user_id).await?)
    }

    async fn update_user(&self, user_id: UserId, new_email: String) -> Result<User, ServiceError> {
        Ok(self.update_email(user_id, new_email).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn directory_serves_the_port() {
        let users: Arc<dyn UserService> = Arc::new(UserDirectory::with_demo_users().await);

        let alice = users.get_user(UserId::new(1)).await.unwrap();
        assert_eq!(alice.name, "Alice");

        let updated = users
            .update_user(UserId::new(1), "alice@new.example".to_string())
            .await
            .unwrap();
        assert_eq!(updated.email, "alice@new.example");

        assert!(matches!(
            users.get_user(UserId::new(999)).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
