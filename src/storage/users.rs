//! User persistence.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::Db;
use crate::error::ServiceError;
use crate::model::User;

const SELECT_BY_USERNAME_SQL: &str = "SELECT id, username FROM users WHERE username = ? LIMIT 1";
const LIST_USERS_SQL: &str = "SELECT id, username FROM users ORDER BY id";
const INSERT_USER_SQL: &str = "INSERT INTO users (username) VALUES (?) RETURNING id, username";
const RENAME_USER_SQL: &str = "UPDATE users SET username = ? WHERE id = ?";
const DELETE_USER_SQL: &str = "DELETE FROM users WHERE id = ?";

const USER_NOT_FOUND: &str = "user not found";
const USERNAME_TAKEN: &str = "username already exists";

/// User operations used by the request handlers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. The existence check and the insert share one
    /// transaction.
    ///
    /// The unique index on `username` still rejects the loser of a race, and
    /// that rejection is reported as [`ServiceError::Duplicate`] too.
    async fn create_user(&self, username: &str) -> Result<User, ServiceError>;

    /// All users in storage order.
    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;

    /// First user with that username. `None` is not an error.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError>;

    /// Renames `current` to `new_username` inside one transaction.
    async fn rename_user(&self, current: &str, new_username: &str) -> Result<User, ServiceError>;

    /// Looks the user up and deletes that one row inside one transaction.
    async fn delete_user_by_username(&self, username: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
pub struct SqlUserRepository {
    db: Db,
}

impl SqlUserRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SqlUserRepository {
    #[instrument(skip(self))]
    async fn create_user(&self, username: &str) -> Result<User, ServiceError> {
        let mut tx = self.db.begin().await?;

        let existing: Option<User> = sqlx::query_as(SELECT_BY_USERNAME_SQL)
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            debug!("Username taken");
            return Err(ServiceError::Duplicate(USERNAME_TAKEN.to_string()));
        }

        let user: User = sqlx::query_as(INSERT_USER_SQL)
            .bind(username)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ServiceError::from_sqlx(e, USER_NOT_FOUND, USERNAME_TAKEN))?;

        tx.commit().await?;

        info!(id = user.id, "User created");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let users: Vec<User> = sqlx::query_as(LIST_USERS_SQL)
            .fetch_all(self.db.pool())
            .await?;
        debug!(count = users.len(), "Users listed");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let user: Option<User> = sqlx::query_as(SELECT_BY_USERNAME_SQL)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        debug!(found = user.is_some(), "User lookup");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn rename_user(&self, current: &str, new_username: &str) -> Result<User, ServiceError> {
        let mut tx = self.db.begin().await?;

        let mut user: User = sqlx::query_as(SELECT_BY_USERNAME_SQL)
            .bind(current)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.to_string()))?;

        if user.username != new_username {
            let taken: Option<User> = sqlx::query_as(SELECT_BY_USERNAME_SQL)
                .bind(new_username)
                .fetch_optional(&mut *tx)
                .await?;
            if taken.is_some() {
                return Err(ServiceError::Duplicate(USERNAME_TAKEN.to_string()));
            }
        }

        sqlx::query(RENAME_USER_SQL)
            .bind(new_username)
            .bind(user.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ServiceError::from_sqlx(e, USER_NOT_FOUND, USERNAME_TAKEN))?;

        tx.commit().await?;

        user.username = new_username.to_string();
        info!(id = user.id, "User renamed");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete_user_by_username(&self, username: &str) -> Result<(), ServiceError> {
        let mut tx = self.db.begin().await?;

        let user: User = sqlx::query_as(SELECT_BY_USERNAME_SQL)
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.to_string()))?;

        sqlx::query(DELETE_USER_SQL)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = user.id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repository() -> SqlUserRepository {
        SqlUserRepository::new(Db::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let users = repository().await;
        let created = users.create_user("alice").await.unwrap();
        assert_eq!(created.username, "alice");
        assert!(created.id > 0);

        let found = users.find_user_by_username("alice").await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_missing_user_is_none() {
        let users = repository().await;
        assert_eq!(users.find_user_by_username("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let users = repository().await;
        users.create_user("alice").await.unwrap();

        let err = users.create_user("alice").await.unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));
        assert_eq!(users.list_users().await.unwrap().len(), 1);
    }

    /// The in-memory pool holds one connection, so a rejected create that
    /// kept its transaction open would block the next write.
    #[tokio::test]
    async fn test_rejected_create_rolls_back_and_frees_the_connection() {
        let users = repository().await;
        users.create_user("alice").await.unwrap();
        users.create_user("alice").await.unwrap_err();

        users.create_user("bob").await.unwrap();
        let names: Vec<String> = users
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_unique_index_catches_a_lost_race() {
        let users = repository().await;
        users.create_user("alice").await.unwrap();

        // Skip the pre-check and hit the constraint directly.
        let err = sqlx::query(INSERT_USER_SQL)
            .bind("alice")
            .execute(users.db.pool())
            .await
            .map_err(|e| ServiceError::from_sqlx(e, USER_NOT_FOUND, USERNAME_TAKEN))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(ref msg) if msg == USERNAME_TAKEN));
    }

    #[tokio::test]
    async fn test_list_users_in_insertion_order() {
        let users = repository().await;
        users.create_user("carol").await.unwrap();
        users.create_user("alice").await.unwrap();

        let names: Vec<String> = users
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["carol", "alice"]);
    }

    #[tokio::test]
    async fn test_rename_user() {
        let users = repository().await;
        let alice = users.create_user("alice").await.unwrap();

        let renamed = users.rename_user("alice", "alicia").await.unwrap();
        assert_eq!(renamed.id, alice.id);
        assert_eq!(renamed.username, "alicia");
        assert_eq!(users.find_user_by_username("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rename_onto_taken_username_rolls_back() {
        let users = repository().await;
        users.create_user("alice").await.unwrap();
        users.create_user("bob").await.unwrap();

        let err = users.rename_user("alice", "bob").await.unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));
        assert!(users.find_user_by_username("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rename_missing_user() {
        let users = repository().await;
        let err = users.rename_user("ghost", "casper").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_user() {
        let users = repository().await;
        users.create_user("alice").await.unwrap();
        users.create_user("bob").await.unwrap();

        users.delete_user_by_username("alice").await.unwrap();

        let remaining = users.list_users().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].username, "bob");
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let users = repository().await;
        let err = users.delete_user_by_username("ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref msg) if msg == USER_NOT_FOUND));
    }
}
