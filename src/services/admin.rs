use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::dto::{DocumentDto, UserDto};
use crate::error::{AppError, AppResult};
use crate::repository::{DocumentRepository, UserRepository};

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserRepository>,
    documents: Arc<dyn DocumentRepository>,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserRepository>, documents: Arc<dyn DocumentRepository>) -> Self {
        Self { users, documents }
    }

    pub async fn list_users(&self) -> AppResult<Vec<UserDto>> {
        let users = self.users.list_users().await?;
        let user_ids: Vec<i64> = users.iter().map(|user| user.id).collect();

        let mut by_owner: HashMap<i64, Vec<DocumentDto>> = HashMap::new();
        for doc in self.documents.list_documents_for_users(&user_ids).await? {
            if let Some(owner) = doc.user_id {
                by_owner.entry(owner).or_default().push(DocumentDto::from(doc));
            }
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let documents = by_owner.remove(&user.id).unwrap_or_default();
                UserDto::new(user, documents)
            })
            .collect())
    }

    pub async fn get_user(&self, id: i64) -> AppResult<UserDto> {
        let user = self
            .users
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;

        let documents = self
            .documents
            .list_documents_for_users(&[id])
            .await?
            .into_iter()
            .map(DocumentDto::from)
            .collect();

        Ok(UserDto::new(user, documents))
    }

    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        if !self.users.delete_user(id).await? {
            return Err(AppError::not_found(format!("user {id} not found")));
        }
        info!(user_id = id, "user deleted");
        Ok(())
    }
}
