//! Collection CRUD handlers
//!
//! Each write runs the collection adapter's hooks around persistence:
//! `before_change` on the in-flight document, then the repository write, then
//! `after_change`. A write that fails to persist hands its pending change to
//! `discard` instead. Every document leaving the API goes through `after_read`.

use crate::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    Json,
};
use mediasync_core::mime::mime_type_from_filename;
use mediasync_core::{AppError, IncomingFile, MediaDocument, WriteOperation};
use mediasync_engine::{
    adapter_fields, ChangeContext, DeleteKind, FieldDefinition, ProjectedDocument, UploadSettings,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Client-writable document attributes, sent as the multipart `data` field or
/// as a JSON body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    pub custom_filename: Option<String>,
    pub raw_transformations: Option<Vec<String>>,
    pub filesize: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub mime_type: Option<String>,
}

impl DocumentData {
    fn apply_to(self, doc: &mut MediaDocument) {
        if let Some(custom_filename) = self.custom_filename {
            doc.custom_filename = Some(custom_filename);
        }
        if let Some(raw_transformations) = self.raw_transformations {
            doc.raw_transformations = raw_transformations;
        }
        if let Some(filesize) = self.filesize {
            doc.filesize = Some(filesize);
        }
        if let Some(width) = self.width {
            doc.width = Some(width);
        }
        if let Some(height) = self.height {
            doc.height = Some(height);
        }
        if let Some(mime_type) = self.mime_type {
            doc.mime_type = Some(mime_type);
        }
    }
}

#[derive(Debug, Default)]
struct WriteRequest {
    file: Option<IncomingFile>,
    data: DocumentData,
}

async fn read_multipart(mut multipart: Multipart) -> Result<WriteRequest, HttpAppError> {
    let mut write = WriteRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| AppError::InvalidInput("File has no filename".to_string()))?;
                let mime_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| mime_type_from_filename(&filename));
                let data = field.bytes().await?;
                if data.is_empty() {
                    return Err(AppError::InvalidInput("File is empty".to_string()).into());
                }
                write.file = Some(IncomingFile::new(filename, mime_type, data));
            }
            Some("data") => {
                let text = field.text().await?;
                write.data = serde_json::from_str(&text).map_err(|e| {
                    AppError::InvalidInput(format!("Invalid data field: {}", e))
                })?;
            }
            _ => {
                tracing::debug!(field = ?name, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(write)
}

/// Multipart bodies may carry a file; anything else is read as JSON.
async fn read_write_request(request: Request) -> Result<WriteRequest, HttpAppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        read_multipart(multipart).await
    } else {
        let ValidatedJson(data) = ValidatedJson::<DocumentData>::from_request(request, &()).await?;
        Ok(WriteRequest { file: None, data })
    }
}

#[tracing::instrument(skip(state, multipart), fields(operation = "create_document"))]
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProjectedDocument>), HttpAppError> {
    let adapter = state.adapter(&collection)?;
    let write = read_multipart(multipart).await?;
    let file = write
        .file
        .ok_or_else(|| AppError::InvalidInput("Missing file".to_string()))?;

    let mut doc = MediaDocument::new(Uuid::new_v4());
    write.data.apply_to(&mut doc);

    let pending = adapter
        .before_change(ChangeContext {
            operation: WriteOperation::Create,
            doc: &mut doc,
            previous_doc: None,
            file: Some(&file),
        })
        .await?;

    let mut doc = match state.media.insert(&collection, &doc).await {
        Ok(doc) => doc,
        Err(e) => {
            adapter.discard(pending).await;
            return Err(e.into());
        }
    };
    adapter.after_change(&mut doc, pending).await;

    tracing::info!(id = %doc.id, public_id = ?doc.public_id, "Document created");
    Ok((StatusCode::CREATED, Json(adapter.after_read(doc))))
}

#[tracing::instrument(skip(state, request), fields(operation = "update_document"))]
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, Uuid)>,
    request: Request,
) -> Result<Json<ProjectedDocument>, HttpAppError> {
    let adapter = state.adapter(&collection)?;
    let write = read_write_request(request).await?;

    let previous = state
        .media
        .get(&collection, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

    let mut doc = previous.clone();
    write.data.apply_to(&mut doc);

    let pending = adapter
        .before_change(ChangeContext {
            operation: WriteOperation::Update,
            doc: &mut doc,
            previous_doc: Some(&previous),
            file: write.file.as_ref(),
        })
        .await?;

    let mut doc = match state.media.update(&collection, &doc).await {
        Ok(doc) => doc,
        Err(e) => {
            adapter.discard(pending).await;
            return Err(e.into());
        }
    };
    adapter.after_change(&mut doc, pending).await;

    Ok(Json(adapter.after_read(doc)))
}

#[tracing::instrument(skip(state), fields(operation = "get_document"))]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, Uuid)>,
) -> Result<Json<ProjectedDocument>, HttpAppError> {
    let adapter = state.adapter(&collection)?;
    let doc = state
        .media
        .get(&collection, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

    Ok(Json(adapter.after_read(doc)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub docs: Vec<ProjectedDocument>,
    pub limit: i64,
    pub page: i64,
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, HttpAppError> {
    let adapter = state.adapter(&collection)?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let page = query.page.unwrap_or(1).max(1);

    let docs = state
        .media
        .list(&collection, limit, (page - 1) * limit)
        .await?
        .into_iter()
        .map(|doc| adapter.after_read(doc))
        .collect();

    Ok(Json(ListResponse { docs, limit, page }))
}

/// Delete a document, then its remote asset. A failed remote delete does not
/// fail the request.
#[tracing::instrument(skip(state), fields(operation = "delete_document"))]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, HttpAppError> {
    let adapter = state.adapter(&collection)?;
    let doc = state
        .media
        .delete(&collection, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

    adapter.handle_delete(&doc, DeleteKind::Direct).await;

    tracing::info!(id = %id, public_id = ?doc.public_id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct CollectionFieldsResponse {
    pub collection: String,
    pub gateway: &'static str,
    pub fields: Vec<FieldDefinition>,
    pub upload: UploadSettings,
}

pub async fn collection_fields(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<CollectionFieldsResponse>, HttpAppError> {
    let adapter = state.adapter(&collection)?;

    Ok(Json(CollectionFieldsResponse {
        collection,
        gateway: adapter.gateway_name(),
        fields: adapter_fields(),
        upload: state.plugin.upload_settings(),
    }))
}
