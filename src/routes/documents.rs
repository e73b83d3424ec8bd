use axum::extract::{Form, Json, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::MessageResponse;
use crate::dto::{DocumentDto, ShareDto};
use crate::error::{AppError, AppResult};
use crate::services::{DocumentContent, ShareDocument, UpdateDocument, UploadDocument, UploadedFile};
use crate::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

fn attachment_content_disposition(id: i64) -> String {
    format!("attachment; filename=document_{id}")
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(flatten)]
    pub document: DocumentDto,
}

/// `category` may come from the query string or a form-encoded body.
#[derive(Deserialize)]
pub struct CategoryParams {
    pub category: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub document_id: i64,
    #[serde(default = "default_share_public")]
    pub is_public: bool,
    #[serde(default = "default_share_expiry_days")]
    pub expiry_days: Option<i64>,
    #[serde(default = "default_share_max_views")]
    pub max_views: Option<i32>,
}

fn default_share_public() -> bool {
    true
}

fn default_share_expiry_days() -> Option<i64> {
    Some(30)
}

fn default_share_max_views() -> Option<i32> {
    Some(100)
}

/// Fields shared by the upload and update forms. Every part is optional at
/// this stage; the handlers decide what is required.
#[derive(Default)]
struct DocumentForm {
    file: Option<UploadedFile>,
    category: Option<String>,
    filename: Option<String>,
    user_id: Option<i64>,
}

async fn read_document_form(mut multipart: Multipart, action: &str) -> AppResult<DocumentForm> {
    let mut form = DocumentForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, action, "invalid multipart data");
        AppError::bad_request(format!("{action} failed: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .filter(|n| !n.is_empty());
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, action, "failed to read file bytes");
                    AppError::bad_request(format!("{action} failed: {err}"))
                })?;
                // browsers submit an empty, unnamed part for an untouched file input
                if original_name.is_none() && data.is_empty() {
                    continue;
                }
                form.file = Some(UploadedFile {
                    original_name,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            Some("category") => {
                form.category = Some(read_text(field, action).await?);
            }
            Some("filename") => {
                let value = read_text(field, action).await?;
                form.filename = Some(value).filter(|v| !v.trim().is_empty());
            }
            Some("user_id") => {
                let value = read_text(field, action).await?;
                if !value.trim().is_empty() {
                    let parsed = value.trim().parse::<i64>().map_err(|_| {
                        AppError::bad_request(format!("{action} failed: user_id must be an integer"))
                    })?;
                    form.user_id = Some(parsed);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>, action: &str) -> AppResult<String> {
    field.text().await.map_err(|err| {
        error!(error = %err, action, "failed to read form field");
        AppError::bad_request(format!("{action} failed: {err}"))
    })
}

pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let form = read_document_form(multipart, "upload").await?;

    let file = form.file.ok_or_else(|| {
        error!("upload rejected: missing file field");
        AppError::bad_request("upload failed: file field is required")
    })?;
    let category = form.category.ok_or_else(|| {
        error!("upload rejected: missing category field");
        AppError::bad_request("upload failed: category field is required")
    })?;

    let request = UploadDocument {
        file,
        category,
        filename: form.filename,
        user_id: form.user_id,
    };

    let document = state.documents.upload(request).await.map_err(|err| {
        error!(error = %err, "document upload failed");
        err
    })?;

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: format!("Uploaded successfully with ID: {}", document.id),
            document,
        }),
    ))
}

pub async fn list_documents(State(state): State<AppState>) -> AppResult<Json<Vec<DocumentDto>>> {
    Ok(Json(state.documents.list().await?))
}

pub async fn list_documents_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> AppResult<Json<Vec<DocumentDto>>> {
    Ok(Json(state.documents.list_by_category(&category).await?))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
) -> AppResult<Json<DocumentDto>> {
    Ok(Json(state.documents.get_by_id(document_id).await?))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let bytes = state.documents.download(document_id).await?;

    Ok((
        [
            (header::CONTENT_DISPOSITION, attachment_content_disposition(document_id)),
            (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
        ],
        bytes,
    ))
}

fn inline_response(content: DocumentContent) -> (HeaderMap, Vec<u8>) {
    let mut headers = HeaderMap::new();
    let content_type = content
        .file_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static(OCTET_STREAM));
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(disposition) = inline_content_disposition(&content.file_name)
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    (headers, content.bytes)
}

pub async fn view_document(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let content = state.documents.view(document_id).await?;
    Ok(inline_response(content))
}

pub async fn create_share(
    State(state): State<AppState>,
    Json(request): Json<ShareRequest>,
) -> AppResult<(StatusCode, Json<ShareDto>)> {
    let share = state
        .documents
        .share(ShareDocument {
            document_id: request.document_id,
            is_public: request.is_public,
            expiry_days: request.expiry_days,
            max_views: request.max_views,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(share)))
}

pub async fn open_share(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let content = state.documents.open_share(&token).await?;
    Ok(inline_response(content))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.documents.delete(document_id).await?;
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<MessageResponse>> {
    let form = read_document_form(multipart, "update").await?;

    let request = UpdateDocument {
        file: form.file,
        category: form.category,
        filename: form.filename,
    };
    state.documents.update(document_id, request).await?;

    info!(document_id, "document update request completed");
    Ok(Json(MessageResponse::new("Document updated successfully")))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
    Query(query): Query<CategoryParams>,
    form: Option<Form<CategoryParams>>,
) -> AppResult<Json<MessageResponse>> {
    let category = query
        .category
        .or_else(|| form.and_then(|Form(body)| body.category))
        .ok_or_else(|| AppError::bad_request("category is required"))?;
    state
        .documents
        .update_category(document_id, category)
        .await?;
    Ok(Json(MessageResponse::new("Category updated successfully")))
}
