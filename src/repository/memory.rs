use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tokio::sync::Mutex;

use super::{DocumentRepository, StoreResult, UserRepository};
use crate::models::{
    Document, DocumentChangeset, DocumentShare, DocumentSummary, NewDocument, NewDocumentShare,
    NewUser, User,
};

/// Process-local store with the same observable behavior as [`super::PgStore`]:
/// sequential ids starting at 1, id-ordered listings, foreign keys from
/// documents to users and from shares to documents, and cascading deletes.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    documents: BTreeMap<i64, Document>,
    shares: BTreeMap<i64, DocumentShare>,
    last_user_id: i64,
    last_document_id: i64,
    last_share_id: i64,
}

impl Tables {
    fn drop_orphaned_shares(&mut self) {
        let documents = &self.documents;
        self.shares
            .retain(|_, share| documents.contains_key(&share.document_id));
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn document_count(&self) -> usize {
        self.tables.lock().await.documents.len()
    }
}

fn foreign_key_violation(detail: String) -> DieselError {
    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, Box::new(detail))
}

fn unique_violation(detail: String) -> DieselError {
    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, Box::new(detail))
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn insert_document(&self, document: NewDocument) -> StoreResult<DocumentSummary> {
        let mut tables = self.tables.lock().await;
        if let Some(user_id) = document.user_id {
            if !tables.users.contains_key(&user_id) {
                let detail = format!("user {user_id} does not exist");
                return Err(foreign_key_violation(detail).into());
            }
        }

        tables.last_document_id += 1;
        let now = Utc::now().naive_utc();
        let stored = Document {
            id: tables.last_document_id,
            user_id: document.user_id,
            file_name: document.file_name,
            file_type: document.file_type,
            category: document.category,
            file_size: document.file_size,
            file_data: document.file_data,
            uploaded_at: now,
            updated_at: now,
        };
        let summary = DocumentSummary::from(&stored);
        tables.documents.insert(stored.id, stored);
        Ok(summary)
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables.documents.values().map(DocumentSummary::from).collect())
    }

    async fn list_documents_by_category(
        &self,
        category: &str,
    ) -> StoreResult<Vec<DocumentSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .documents
            .values()
            .filter(|doc| doc.category == category)
            .map(DocumentSummary::from)
            .collect())
    }

    async fn list_documents_for_users(
        &self,
        user_ids: &[i64],
    ) -> StoreResult<Vec<DocumentSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .documents
            .values()
            .filter(|doc| doc.user_id.is_some_and(|owner| user_ids.contains(&owner)))
            .map(DocumentSummary::from)
            .collect())
    }

    async fn find_document(&self, id: i64) -> StoreResult<Option<Document>> {
        let tables = self.tables.lock().await;
        Ok(tables.documents.get(&id).cloned())
    }

    async fn find_document_summary(&self, id: i64) -> StoreResult<Option<DocumentSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables.documents.get(&id).map(DocumentSummary::from))
    }

    async fn update_document(&self, id: i64, changes: DocumentChangeset) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.documents.get_mut(&id) {
            Some(doc) => {
                changes.apply_to(doc);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_document(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.documents.remove(&id).is_none() {
            return Ok(false);
        }
        tables.drop_orphaned_shares();
        Ok(true)
    }

    async fn insert_share(&self, share: NewDocumentShare) -> StoreResult<DocumentShare> {
        let mut tables = self.tables.lock().await;
        if !tables.documents.contains_key(&share.document_id) {
            let detail = format!("document {} does not exist", share.document_id);
            return Err(foreign_key_violation(detail).into());
        }
        if tables.shares.values().any(|existing| existing.token == share.token) {
            return Err(unique_violation("share token already exists".to_string()).into());
        }

        tables.last_share_id += 1;
        let stored = DocumentShare {
            id: tables.last_share_id,
            token: share.token,
            document_id: share.document_id,
            expires_at: share.expires_at,
            max_views: share.max_views,
            view_count: 0,
            created_at: Utc::now().naive_utc(),
        };
        tables.shares.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn claim_share_view(
        &self,
        token: &str,
        now: NaiveDateTime,
    ) -> StoreResult<Option<Document>> {
        let mut tables = self.tables.lock().await;
        let Some(share) = tables
            .shares
            .values_mut()
            .find(|share| share.token == token)
            .filter(|share| share.is_open_at(now))
        else {
            return Ok(None);
        };
        share.view_count += 1;
        let document_id = share.document_id;
        Ok(tables.documents.get(&document_id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|existing| existing.username == user.username) {
            let detail = format!("username {} already exists", user.username);
            return Err(unique_violation(detail).into());
        }

        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            username: user.username,
            email: user.email,
            created_at: Utc::now().naive_utc(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().cloned().collect())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.documents.retain(|_, doc| doc.user_id != Some(id));
        tables.drop_orphaned_shares();
        Ok(true)
    }
}
