//! User patterns.

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::dispatch::{Handler, ServiceContext};
use crate::error::ServiceError;
use crate::model::{is_blank, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

/// `GET_USERBYNAME`: an unknown username is a success with `null` data.
pub struct GetUserByName;

#[async_trait]
impl Handler for GetUserByName {
    const PATTERN: &'static str = "GET_USERBYNAME";
    const SUCCESS_MESSAGE: &'static str = "User retrieved";
    const ERROR_MESSAGE: &'static str = "Error getting user";
    type Request = UsernameRequest;
    type Reply = Option<User>;

    async fn handle(&self, request: UsernameRequest, ctx: &ServiceContext) -> Result<Option<User>, ServiceError> {
        ctx.users.find_user_by_username(&request.username).await
    }

    fn success_message(reply: &Option<User>) -> &'static str {
        match reply {
            Some(_) => Self::SUCCESS_MESSAGE,
            None => "User not found",
        }
    }
}

/// `GET_USERS`: lists every user. The payload is ignored.
pub struct GetUsers;

#[async_trait]
impl Handler for GetUsers {
    const PATTERN: &'static str = "GET_USERS";
    const SUCCESS_MESSAGE: &'static str = "Users retrieved";
    const ERROR_MESSAGE: &'static str = "Error getting users";
    type Request = IgnoredAny;
    type Reply = Vec<User>;

    async fn handle(&self, _: IgnoredAny, ctx: &ServiceContext) -> Result<Vec<User>, ServiceError> {
        ctx.users.list_users().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditUserRequest {
    pub current_username: String,
    pub new_username: String,
}

/// `EDIT_USER`: renames a user. Replies with `null` data.
pub struct EditUser;

#[async_trait]
impl Handler for EditUser {
    const PATTERN: &'static str = "EDIT_USER";
    const SUCCESS_MESSAGE: &'static str = "User edited successfully";
    const ERROR_MESSAGE: &'static str = "Error editing user";
    type Request = EditUserRequest;
    type Reply = ();

    async fn handle(&self, request: EditUserRequest, ctx: &ServiceContext) -> Result<(), ServiceError> {
        if is_blank(&request.new_username) {
            return Err(ServiceError::Validation("username cannot be empty".to_string()));
        }
        ctx.users
            .rename_user(&request.current_username, &request.new_username)
            .await?;
        Ok(())
    }
}

pub struct CreateUser;

#[async_trait]
impl Handler for CreateUser {
    const PATTERN: &'static str = "CREATE_USER";
    const SUCCESS_MESSAGE: &'static str = "User created successfully";
    const ERROR_MESSAGE: &'static str = "Error creating user";
    type Request = UsernameRequest;
    type Reply = User;

    async fn handle(&self, request: UsernameRequest, ctx: &ServiceContext) -> Result<User, ServiceError> {
        if is_blank(&request.username) {
            return Err(ServiceError::Validation("username cannot be empty".to_string()));
        }
        ctx.users.create_user(&request.username).await
    }
}

/// `DELETE_USER`: replies with `null` data.
pub struct DeleteUser;

#[async_trait]
impl Handler for DeleteUser {
    const PATTERN: &'static str = "DELETE_USER";
    const SUCCESS_MESSAGE: &'static str = "User deleted successfully";
    const ERROR_MESSAGE: &'static str = "Error deleting user";
    type Request = UsernameRequest;
    type Reply = ();

    async fn handle(&self, request: UsernameRequest, ctx: &ServiceContext) -> Result<(), ServiceError> {
        ctx.users.delete_user_by_username(&request.username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::default_router;
    use crate::protocol::Status;
    use crate::storage::{MockProductStore, MockUserStore};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn context(users: MockUserStore) -> ServiceContext {
        ServiceContext::new(Arc::new(MockProductStore::new()), Arc::new(users))
    }

    #[tokio::test]
    async fn test_malformed_payload_never_reaches_storage() {
        // No expectations: any store call would panic.
        let ctx = context(MockUserStore::new());
        let router = default_router().unwrap();

        let reply = router.dispatch("CREATE_USER", json!("not-json"), &ctx).await;
        assert_eq!(reply.success, Status::Error);
        assert_eq!(reply.message, "Error decoding JSON");
        assert!(reply.data.is_string());
    }

    #[tokio::test]
    async fn test_empty_username_never_reaches_storage() {
        let ctx = context(MockUserStore::new());
        let err = CreateUser
            .handle(UsernameRequest { username: String::new() }, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_usernames_are_rejected() {
        let ctx = context(MockUserStore::new());
        let router = default_router().unwrap();

        let reply = router
            .dispatch("CREATE_USER", json!({"username": "  "}), &ctx)
            .await;
        assert_eq!(reply.message, "Error creating user");
        assert_eq!(reply.data, json!("username cannot be empty"));

        let reply = router
            .dispatch(
                "EDIT_USER",
                json!({"currentUsername": "alice", "newUsername": "\t"}),
                &ctx,
            )
            .await;
        assert_eq!(reply.message, "Error editing user");
        assert_eq!(reply.data, json!("username cannot be empty"));
    }

    #[tokio::test]
    async fn test_unknown_username_is_success_with_null() {
        let mut users = MockUserStore::new();
        users
            .expect_find_user_by_username()
            .withf(|name| name == "ghost")
            .times(1)
            .returning(|_| Ok(None));
        let ctx = context(users);
        let router = default_router().unwrap();

        let reply = router
            .dispatch("GET_USERBYNAME", json!({"username": "ghost"}), &ctx)
            .await;
        assert_eq!(reply.success, Status::Success);
        assert_eq!(reply.message, "User not found");
        assert_eq!(reply.data, Value::Null);
    }

    #[tokio::test]
    async fn test_edit_user_replies_with_null_data() {
        let mut users = MockUserStore::new();
        users
            .expect_rename_user()
            .withf(|current, new| current == "alice" && new == "alicia")
            .times(1)
            .returning(|_, new| Ok(User::new(1, new)));
        let ctx = context(users);
        let router = default_router().unwrap();

        let reply = router
            .dispatch(
                "EDIT_USER",
                json!({"currentUsername": "alice", "newUsername": "alicia"}),
                &ctx,
            )
            .await;
        assert_eq!(reply.success, Status::Success);
        assert_eq!(reply.message, "User edited successfully");
        assert_eq!(reply.data, Value::Null);
    }

    #[tokio::test]
    async fn test_storage_error_text_goes_into_data() {
        let mut users = MockUserStore::new();
        users
            .expect_delete_user_by_username()
            .times(1)
            .returning(|_| Err(ServiceError::NotFound("user not found".to_string())));
        let ctx = context(users);
        let router = default_router().unwrap();

        let reply = router
            .dispatch("DELETE_USER", json!({"username": "ghost"}), &ctx)
            .await;
        assert_eq!(reply.success, Status::Error);
        assert_eq!(reply.message, "Error deleting user");
        assert_eq!(reply.data, json!("user not found"));
    }
}
