use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info, warn};

use crate::dto::{DocumentDto, ShareDto};
use crate::error::{AppError, AppResult};
use crate::models::{Document, DocumentChangeset, NewDocument, NewDocumentShare};
use crate::repository::{DocumentRepository, UserRepository};

pub const MAX_SHARE_EXPIRY_DAYS: i64 = 3650;

/// A file part taken from a multipart request.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// The declared content type, or a guess from the file name when the
    /// client sent none.
    pub fn resolved_content_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.original_name
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first_raw())
                    .map(str::to_string)
            })
    }
}

#[derive(Debug, Clone)]
pub struct UploadDocument {
    pub file: UploadedFile,
    pub category: String,
    pub filename: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDocument {
    pub file: Option<UploadedFile>,
    pub category: Option<String>,
    pub filename: Option<String>,
}

/// Payload plus the stored name and type, for serving a document inline.
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub file_name: String,
    pub file_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl From<Document> for DocumentContent {
    fn from(doc: Document) -> Self {
        Self {
            file_name: doc.file_name,
            file_type: doc.file_type,
            bytes: doc.file_data,
        }
    }
}

/// Options for a new share link. `None` limits are unbounded.
#[derive(Debug, Clone)]
pub struct ShareDocument {
    pub document_id: i64,
    pub is_public: bool,
    pub expiry_days: Option<i64>,
    pub max_views: Option<i32>,
}

#[derive(Clone)]
pub struct DocumentService {
    documents: Arc<dyn DocumentRepository>,
    users: Arc<dyn UserRepository>,
}

fn document_not_found(id: i64) -> AppError {
    AppError::not_found(format!("document {id} not found"))
}

fn generate_share_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl DocumentService {
    pub fn new(documents: Arc<dyn DocumentRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { documents, users }
    }

    pub async fn upload(&self, request: UploadDocument) -> AppResult<DocumentDto> {
        let UploadDocument {
            file,
            category,
            filename,
            user_id,
        } = request;

        if let Some(user_id) = user_id {
            if self.users.find_user(user_id).await?.is_none() {
                warn!(user_id, "upload rejected: unknown owner");
                return Err(AppError::bad_request(format!(
                    "user_id {user_id} does not reference an existing user"
                )));
            }
        }

        let file_name = filename
            .or_else(|| file.original_name.clone())
            .ok_or_else(|| AppError::bad_request("filename is required"))?;
        let file_type = file.resolved_content_type();
        let file_size = file.bytes.len() as i64;

        let created = self
            .documents
            .insert_document(NewDocument {
                user_id,
                file_name,
                file_type,
                category,
                file_size,
                file_data: file.bytes,
            })
            .await?;

        info!(
            document_id = created.id,
            file_name = %created.file_name,
            category = %created.category,
            file_size = created.file_size,
            "document uploaded"
        );
        Ok(DocumentDto::from(created))
    }

    pub async fn list(&self) -> AppResult<Vec<DocumentDto>> {
        let rows = self.documents.list_documents().await?;
        Ok(rows.into_iter().map(DocumentDto::from).collect())
    }

    pub async fn list_by_category(&self, category: &str) -> AppResult<Vec<DocumentDto>> {
        let rows = self.documents.list_documents_by_category(category).await?;
        debug!(category = %category, count = rows.len(), "listed documents by category");
        Ok(rows.into_iter().map(DocumentDto::from).collect())
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<DocumentDto> {
        self.documents
            .find_document_summary(id)
            .await?
            .map(DocumentDto::from)
            .ok_or_else(|| document_not_found(id))
    }

    pub async fn download(&self, id: i64) -> AppResult<Vec<u8>> {
        let doc = self
            .documents
            .find_document(id)
            .await?
            .ok_or_else(|| document_not_found(id))?;
        Ok(doc.file_data)
    }

    pub async fn view(&self, id: i64) -> AppResult<DocumentContent> {
        let doc = self
            .documents
            .find_document(id)
            .await?
            .ok_or_else(|| document_not_found(id))?;
        Ok(DocumentContent::from(doc))
    }

    pub async fn share(&self, request: ShareDocument) -> AppResult<ShareDto> {
        let ShareDocument {
            document_id,
            is_public,
            expiry_days,
            max_views,
        } = request;

        if !is_public {
            return Err(AppError::bad_request("only public share links are supported"));
        }
        if let Some(days) = expiry_days {
            if !(1..=MAX_SHARE_EXPIRY_DAYS).contains(&days) {
                return Err(AppError::bad_request(format!(
                    "expiryDays must be between 1 and {MAX_SHARE_EXPIRY_DAYS}"
                )));
            }
        }
        if max_views.is_some_and(|max| max < 1) {
            return Err(AppError::bad_request("maxViews must be at least 1"));
        }

        if self
            .documents
            .find_document_summary(document_id)
            .await?
            .is_none()
        {
            return Err(document_not_found(document_id));
        }

        let expires_at = expiry_days.map(|days| Utc::now().naive_utc() + Duration::days(days));
        let share = self
            .documents
            .insert_share(NewDocumentShare {
                token: generate_share_token(),
                document_id,
                expires_at,
                max_views,
            })
            .await?;

        info!(
            document_id,
            expires_at = ?share.expires_at,
            max_views = ?share.max_views,
            "share link created"
        );
        Ok(ShareDto::from(share))
    }

    /// Resolves a share link and counts the view.
    pub async fn open_share(&self, token: &str) -> AppResult<DocumentContent> {
        let doc = self
            .documents
            .claim_share_view(token, Utc::now().naive_utc())
            .await?
            .ok_or_else(|| {
                debug!("share link is unknown, expired or used up");
                AppError::not_found("share link not found or expired")
            })?;

        info!(document_id = doc.id, "shared document opened");
        Ok(DocumentContent::from(doc))
    }

    pub async fn update(&self, id: i64, request: UpdateDocument) -> AppResult<()> {
        let existing = self
            .documents
            .find_document_summary(id)
            .await?
            .ok_or_else(|| document_not_found(id))?;

        let mut changes = DocumentChangeset {
            updated_at: Some(Utc::now().naive_utc()),
            ..Default::default()
        };

        let replaced_file = request.file.is_some();
        if let Some(file) = request.file {
            let file_name = request
                .filename
                .or_else(|| file.original_name.clone())
                .unwrap_or(existing.file_name);
            changes.file_type = Some(file.resolved_content_type());
            changes.file_name = Some(file_name);
            changes.file_size = Some(file.bytes.len() as i64);
            changes.file_data = Some(file.bytes);
        }
        if let Some(category) = request.category {
            changes.category = Some(category);
        }

        if !self.documents.update_document(id, changes).await? {
            return Err(document_not_found(id));
        }

        info!(document_id = id, replaced_file, "document updated");
        Ok(())
    }

    pub async fn update_category(&self, id: i64, category: String) -> AppResult<()> {
        let changes = DocumentChangeset {
            category: Some(category),
            updated_at: Some(Utc::now().naive_utc()),
            ..Default::default()
        };

        if !self.documents.update_document(id, changes).await? {
            return Err(document_not_found(id));
        }

        info!(document_id = id, "document category updated");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if !self.documents.delete_document(id).await? {
            return Err(document_not_found(id));
        }
        info!(document_id = id, "document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::repository::InMemoryStore;
    use axum::http::StatusCode;

    fn service() -> (DocumentService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (DocumentService::new(store.clone(), store.clone()), store)
    }

    fn text_file(name: &str, body: &[u8]) -> UploadedFile {
        UploadedFile {
            original_name: Some(name.to_string()),
            content_type: Some("text/plain".to_string()),
            bytes: body.to_vec(),
        }
    }

    fn upload_request(category: &str, filename: &str, body: &[u8]) -> UploadDocument {
        UploadDocument {
            file: text_file("a.txt", body),
            category: category.to_string(),
            filename: Some(filename.to_string()),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn upload_get_download_and_recategorize() {
        let (service, _) = service();

        let created = service
            .upload(upload_request("docs", "a", b"hello"))
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let meta = service.get_by_id(1).await.unwrap();
        assert_eq!(meta.file_name, "a");
        assert_eq!(meta.file_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.category, "docs");
        assert_eq!(meta.file_size, 5);

        assert_eq!(service.download(1).await.unwrap(), b"hello");

        service.update_category(1, "reports".to_string()).await.unwrap();
        assert_eq!(service.get_by_id(1).await.unwrap().category, "reports");
        assert_eq!(service.download(1).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn list_by_category_matches_exactly_in_storage_order() {
        let (service, _) = service();
        service.upload(upload_request("docs", "one", b"1")).await.unwrap();
        service.upload(upload_request("Docs", "two", b"2")).await.unwrap();
        service.upload(upload_request("docs", "three", b"3")).await.unwrap();

        let names: Vec<String> = service
            .list_by_category("docs")
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.file_name)
            .collect();
        assert_eq!(names, vec!["one", "three"]);
        assert_eq!(service.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_with_file_replaces_file_fields_only() {
        let (service, _) = service();
        service.upload(upload_request("docs", "a", b"old")).await.unwrap();

        service
            .update(
                1,
                UpdateDocument {
                    file: Some(UploadedFile {
                        original_name: Some("scan.png".to_string()),
                        content_type: None,
                        bytes: vec![0x89, b'P', b'N', b'G'],
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let meta = service.get_by_id(1).await.unwrap();
        assert_eq!(meta.file_name, "scan.png");
        assert_eq!(meta.file_type.as_deref(), Some("image/png"));
        assert_eq!(meta.file_size, 4);
        assert_eq!(meta.category, "docs");
        assert_eq!(service.download(1).await.unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn update_prefers_explicit_filename() {
        let (service, _) = service();
        service.upload(upload_request("docs", "a", b"old")).await.unwrap();

        service
            .update(
                1,
                UpdateDocument {
                    file: Some(text_file("b.txt", b"new")),
                    category: Some("archive".to_string()),
                    filename: Some("renamed".to_string()),
                },
            )
            .await
            .unwrap();

        let meta = service.get_by_id(1).await.unwrap();
        assert_eq!(meta.file_name, "renamed");
        assert_eq!(meta.category, "archive");
    }

    #[tokio::test]
    async fn category_only_update_keeps_file_fields() {
        let (service, _) = service();
        service.upload(upload_request("docs", "a", b"body")).await.unwrap();

        service
            .update(
                1,
                UpdateDocument {
                    category: Some("misc".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let meta = service.get_by_id(1).await.unwrap();
        assert_eq!(meta.file_name, "a");
        assert_eq!(meta.file_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.category, "misc");
        assert_eq!(service.download(1).await.unwrap(), b"body");
    }

    #[tokio::test]
    async fn missing_documents_report_not_found() {
        let (service, _) = service();
        service.upload(upload_request("docs", "a", b"x")).await.unwrap();
        service.delete(1).await.unwrap();

        assert_eq!(
            service.get_by_id(1).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            service.download(1).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            service.delete(1).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            service
                .update_category(1, "x".to_string())
                .await
                .unwrap_err()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            service
                .update(1, UpdateDocument::default())
                .await
                .unwrap_err()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn upload_with_unknown_owner_is_rejected() {
        let (service, store) = service();
        let mut request = upload_request("docs", "a", b"x");
        request.user_id = Some(99);
        let err = service.upload(request).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.document_count().await, 0);

        let owner = store
            .insert_user(NewUser {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
            })
            .await
            .unwrap();
        let mut request = upload_request("docs", "a", b"x");
        request.user_id = Some(owner.id);
        service.upload(request).await.unwrap();
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn upload_falls_back_to_original_file_name() {
        let (service, _) = service();
        let created = service
            .upload(UploadDocument {
                file: text_file("notes.md", b"# hi"),
                category: "docs".to_string(),
                filename: None,
                user_id: None,
            })
            .await
            .unwrap();
        assert_eq!(created.file_name, "notes.md");
    }

    fn share_request(document_id: i64) -> ShareDocument {
        ShareDocument {
            document_id,
            is_public: true,
            expiry_days: Some(30),
            max_views: Some(2),
        }
    }

    #[tokio::test]
    async fn share_link_serves_document_until_views_run_out() {
        let (service, _) = service();
        service.upload(upload_request("docs", "a", b"shared")).await.unwrap();

        let share = service.share(share_request(1)).await.unwrap();
        assert_eq!(share.token.len(), 64);
        assert_eq!(share.document_id, 1);
        assert_eq!(share.max_views, Some(2));
        assert!(share.expires_at.is_some());

        for _ in 0..2 {
            let content = service.open_share(&share.token).await.unwrap();
            assert_eq!(content.bytes, b"shared");
            assert_eq!(content.file_type.as_deref(), Some("text/plain"));
        }
        assert_eq!(
            service.open_share(&share.token).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn expired_and_unknown_share_links_are_not_found() {
        let (service, store) = service();
        service.upload(upload_request("docs", "a", b"x")).await.unwrap();
        store
            .insert_share(NewDocumentShare {
                token: "stale".to_string(),
                document_id: 1,
                expires_at: Some(Utc::now().naive_utc() - Duration::days(1)),
                max_views: None,
            })
            .await
            .unwrap();

        assert_eq!(
            service.open_share("stale").await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            service.open_share("missing").await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn share_links_die_with_their_document() {
        let (service, _) = service();
        service.upload(upload_request("docs", "a", b"x")).await.unwrap();
        let share = service
            .share(ShareDocument {
                expiry_days: None,
                max_views: None,
                ..share_request(1)
            })
            .await
            .unwrap();
        assert!(share.expires_at.is_none());
        service.open_share(&share.token).await.unwrap();

        service.delete(1).await.unwrap();
        assert_eq!(
            service.open_share(&share.token).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn share_validates_its_options() {
        let (service, _) = service();
        assert_eq!(
            service.share(share_request(1)).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );

        service.upload(upload_request("docs", "a", b"x")).await.unwrap();
        let invalid = [
            ShareDocument {
                is_public: false,
                ..share_request(1)
            },
            ShareDocument {
                expiry_days: Some(0),
                ..share_request(1)
            },
            ShareDocument {
                expiry_days: Some(MAX_SHARE_EXPIRY_DAYS + 1),
                ..share_request(1)
            },
            ShareDocument {
                max_views: Some(0),
                ..share_request(1)
            },
        ];
        for request in invalid {
            assert_eq!(
                service.share(request).await.unwrap_err().status(),
                StatusCode::BAD_REQUEST
            );
        }
    }

    #[test]
    fn guesses_content_type_from_name_when_absent() {
        let file = UploadedFile {
            original_name: Some("report.pdf".to_string()),
            content_type: None,
            bytes: Vec::new(),
        };
        assert_eq!(
            file.resolved_content_type().as_deref(),
            Some("application/pdf")
        );

        let unnamed = UploadedFile::default();
        assert_eq!(unnamed.resolved_content_type(), None);
    }
}
