use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

/// A stored document row including its binary payload.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: i64,
    pub user_id: Option<i64>,
    pub file_name: String,
    pub file_type: Option<String>,
    pub category: String,
    pub file_size: i64,
    pub file_data: Vec<u8>,
    pub uploaded_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The same row without `file_data`, for listings that never touch the payload.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = documents)]
pub struct DocumentSummary {
    pub id: i64,
    pub user_id: Option<i64>,
    pub file_name: String,
    pub file_type: Option<String>,
    pub category: String,
    pub file_size: i64,
    pub uploaded_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            file_name: doc.file_name.clone(),
            file_type: doc.file_type.clone(),
            category: doc.category.clone(),
            file_size: doc.file_size,
            uploaded_at: doc.uploaded_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub user_id: Option<i64>,
    pub file_name: String,
    pub file_type: Option<String>,
    pub category: String,
    pub file_size: i64,
    pub file_data: Vec<u8>,
}

/// Partial update of a document row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = documents)]
pub struct DocumentChangeset {
    pub file_name: Option<String>,
    pub file_type: Option<Option<String>>,
    pub category: Option<String>,
    pub file_size: Option<i64>,
    pub file_data: Option<Vec<u8>>,
    pub updated_at: Option<NaiveDateTime>,
}

impl DocumentChangeset {
    pub fn apply_to(&self, doc: &mut Document) {
        if let Some(file_name) = &self.file_name {
            doc.file_name = file_name.clone();
        }
        if let Some(file_type) = &self.file_type {
            doc.file_type = file_type.clone();
        }
        if let Some(category) = &self.category {
            doc.category = category.clone();
        }
        if let Some(file_size) = self.file_size {
            doc.file_size = file_size;
        }
        if let Some(file_data) = &self.file_data {
            doc.file_data = file_data.clone();
        }
        if let Some(updated_at) = self.updated_at {
            doc.updated_at = updated_at;
        }
    }
}

/// A public link to one document. The link stops resolving once it expires
/// or has been opened `max_views` times.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = document_shares)]
pub struct DocumentShare {
    pub id: i64,
    pub token: String,
    pub document_id: i64,
    pub expires_at: Option<NaiveDateTime>,
    pub max_views: Option<i32>,
    pub view_count: i32,
    pub created_at: NaiveDateTime,
}

impl DocumentShare {
    pub fn is_open_at(&self, now: NaiveDateTime) -> bool {
        let unexpired = self.expires_at.map_or(true, |expires_at| now < expires_at);
        let views_left = self
            .max_views
            .map_or(true, |max_views| self.view_count < max_views);
        unexpired && views_left
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = document_shares)]
pub struct NewDocumentShare {
    pub token: String,
    pub document_id: i64,
    pub expires_at: Option<NaiveDateTime>,
    pub max_views: Option<i32>,
}
