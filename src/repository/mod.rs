use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{
    Document, DocumentChangeset, DocumentShare, DocumentSummary, NewDocument, NewDocumentShare,
    NewUser, User,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of document rows. Listings are returned in id order and never
/// include the payload.
#[async_trait]
pub trait DocumentRepository: Send + Sync + 'static {
    async fn insert_document(&self, document: NewDocument) -> StoreResult<DocumentSummary>;

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>>;

    async fn list_documents_by_category(&self, category: &str)
        -> StoreResult<Vec<DocumentSummary>>;

    async fn list_documents_for_users(&self, user_ids: &[i64])
        -> StoreResult<Vec<DocumentSummary>>;

    async fn find_document(&self, id: i64) -> StoreResult<Option<Document>>;

    async fn find_document_summary(&self, id: i64) -> StoreResult<Option<DocumentSummary>>;

    /// Returns `false` when no row with `id` exists.
    async fn update_document(&self, id: i64, changes: DocumentChangeset) -> StoreResult<bool>;

    /// Returns `false` when no row with `id` exists. Share links to the
    /// document go with it.
    async fn delete_document(&self, id: i64) -> StoreResult<bool>;

    async fn insert_share(&self, share: NewDocumentShare) -> StoreResult<DocumentShare>;

    /// Counts one view against the share link `token` and returns the linked
    /// document. `None` when the token is unknown, expired at `now` or out of
    /// views; nothing is counted in that case.
    async fn claim_share_view(&self, token: &str, now: NaiveDateTime)
        -> StoreResult<Option<Document>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Removes the user together with the documents it owns. Returns `false`
    /// when no row with `id` exists.
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;
}
