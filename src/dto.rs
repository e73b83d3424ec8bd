//! Wire representations of stored rows. Field names follow the camelCase
//! contract the web clients consume.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DocumentShare, DocumentSummary, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: i64,
    pub file_name: String,
    pub file_type: Option<String>,
    pub category: String,
    pub file_size: i64,
    pub upload_date: String,
}

impl From<DocumentSummary> for DocumentDto {
    fn from(doc: DocumentSummary) -> Self {
        Self {
            id: doc.id,
            file_name: doc.file_name,
            file_type: doc.file_type,
            category: doc.category,
            file_size: doc.file_size,
            upload_date: to_iso(doc.uploaded_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub documents: Vec<DocumentDto>,
}

impl UserDto {
    pub fn new(user: User, documents: Vec<DocumentDto>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            documents,
        }
    }
}

/// A created share link. `shareUrl` is relative to the API host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDto {
    pub token: String,
    pub document_id: i64,
    pub share_url: String,
    pub expires_at: Option<String>,
    pub max_views: Option<i32>,
    pub view_count: i32,
}

impl From<DocumentShare> for ShareDto {
    fn from(share: DocumentShare) -> Self {
        Self {
            share_url: format!("/api/documents/share/{}", share.token),
            token: share.token,
            document_id: share.document_id,
            expires_at: share.expires_at.map(to_iso),
            max_views: share.max_views,
            view_count: share.view_count,
        }
    }
}

fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
