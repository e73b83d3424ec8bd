use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::{pg::PgConnection, prelude::*};

use super::{DocumentRepository, StoreError, StoreResult, UserRepository};
use crate::db::PgPool;
use crate::models::{
    Document, DocumentChangeset, DocumentShare, DocumentSummary, NewDocument, NewDocumentShare,
    NewUser, User,
};
use crate::schema::{document_shares, documents, users};

/// Diesel-backed store. Every call checks a connection out of the pool and
/// runs on the blocking thread pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl DocumentRepository for PgStore {
    async fn insert_document(&self, document: NewDocument) -> StoreResult<DocumentSummary> {
        self.with_conn(move |conn| {
            let created: DocumentSummary = diesel::insert_into(documents::table)
                .values(&document)
                .returning(DocumentSummary::as_returning())
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>> {
        self.with_conn(|conn| {
            let rows: Vec<DocumentSummary> = documents::table
                .select(DocumentSummary::as_select())
                .order(documents::id.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn list_documents_by_category(
        &self,
        category: &str,
    ) -> StoreResult<Vec<DocumentSummary>> {
        let category = category.to_string();
        self.with_conn(move |conn| {
            let rows: Vec<DocumentSummary> = documents::table
                .filter(documents::category.eq(&category))
                .select(DocumentSummary::as_select())
                .order(documents::id.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn list_documents_for_users(
        &self,
        user_ids: &[i64],
    ) -> StoreResult<Vec<DocumentSummary>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let user_ids = user_ids.to_vec();
        self.with_conn(move |conn| {
            let rows: Vec<DocumentSummary> = documents::table
                .filter(documents::user_id.eq_any(user_ids))
                .select(DocumentSummary::as_select())
                .order(documents::id.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn find_document(&self, id: i64) -> StoreResult<Option<Document>> {
        self.with_conn(move |conn| {
            let doc: Option<Document> = documents::table
                .find(id)
                .select(Document::as_select())
                .first(conn)
                .optional()?;
            Ok(doc)
        })
        .await
    }

    async fn find_document_summary(&self, id: i64) -> StoreResult<Option<DocumentSummary>> {
        self.with_conn(move |conn| {
            let doc: Option<DocumentSummary> = documents::table
                .find(id)
                .select(DocumentSummary::as_select())
                .first(conn)
                .optional()?;
            Ok(doc)
        })
        .await
    }

    async fn update_document(&self, id: i64, changes: DocumentChangeset) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let updated = diesel::update(documents::table.find(id))
                .set(&changes)
                .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete_document(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            // document_shares.document_id cascades on delete
            let deleted = diesel::delete(documents::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn insert_share(&self, share: NewDocumentShare) -> StoreResult<DocumentShare> {
        self.with_conn(move |conn| {
            let created: DocumentShare = diesel::insert_into(document_shares::table)
                .values(&share)
                .returning(DocumentShare::as_returning())
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn claim_share_view(
        &self,
        token: &str,
        now: NaiveDateTime,
    ) -> StoreResult<Option<Document>> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let share: Option<DocumentShare> = document_shares::table
                    .filter(document_shares::token.eq(&token))
                    .select(DocumentShare::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?;
                let Some(share) = share.filter(|share| share.is_open_at(now)) else {
                    return Ok(None);
                };

                diesel::update(document_shares::table.find(share.id))
                    .set(document_shares::view_count.eq(document_shares::view_count + 1))
                    .execute(conn)?;

                let doc: Option<Document> = documents::table
                    .find(share.document_id)
                    .select(Document::as_select())
                    .first(conn)
                    .optional()?;
                Ok(doc)
            })
        })
        .await
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.with_conn(move |conn| {
            let created: User = diesel::insert_into(users::table)
                .values(&user)
                .returning(User::as_returning())
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            let rows: Vec<User> = users::table
                .select(User::as_select())
                .order(users::id.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| {
            let user: Option<User> = users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            // documents.user_id cascades on delete
            let deleted = diesel::delete(users::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }
}
