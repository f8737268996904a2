use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::{Record, RecordKey, RecordType, User};
use crate::store::IndexedStore;

/// User lookup as the reservation engine sees it. Accounts themselves are
/// managed by the auth layer; the engine only needs to resolve ids.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when the user does not exist; `Err` when the lookup itself failed.
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ServiceError>;
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<IndexedStore>,
}

impl UserRepository {
    pub fn new(store: Arc<IndexedStore>) -> Self {
        Self { store }
    }

    /// Fails `Conflict` on an id collision or an email already registered.
    /// The store checks both under the user gate.
    pub async fn create(&self, user: User) -> Result<(), ServiceError> {
        let id = user.id.clone();
        self.store
            .put_if_absent(Record::User(user))
            .await
            .map_err(|e| {
                super::condition_or_internal("create user", e, || {
                    ServiceError::Conflict(format!("user id {id} already exists"))
                })
            })
    }

    pub fn get_by_id(&self, id: &str) -> Result<User, ServiceError> {
        self.store
            .get(&RecordKey::user(id))
            .and_then(Record::into_user)
            .ok_or_else(|| ServiceError::not_found("user", id))
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.store.user_with_email(email)
    }

    pub fn get_all(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .store
            .scan(RecordType::User)
            .into_iter()
            .filter_map(Record::into_user)
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        users
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<User, ServiceError> {
        let removed = self
            .store
            .delete_if_exists(&RecordKey::user(id))
            .await
            .map_err(|e| super::condition_or_internal("delete user", e, || ServiceError::not_found("user", id)))?;
        removed
            .into_user()
            .ok_or_else(|| ServiceError::Internal("delete user failed".into()))
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.store.get(&RecordKey::user(user_id)).and_then(Record::into_user))
    }
}
