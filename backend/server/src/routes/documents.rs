use std::sync::{Arc, LazyLock};

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use platform::Query;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use super::portal::owned_pet;
use crate::{
    auth::PortalCustomer,
    error::AppError,
    models::{Customer, Document},
    state::State as AppState,
    store,
    utils::{MultipartForm, PathParam},
};

pub const BUCKET: &str = "documents";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const SIGNED_URL_SECS: u64 = 60;
const ALLOWED_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("filename pattern"));

struct Upload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn malformed(e: MultipartError) -> AppError {
    AppError::bad_request(format!("Invalid upload: {}", e.body_text()))
}

async fn read_upload(mut multipart: Multipart) -> Result<(Upload, Option<String>), AppError> {
    let mut upload = None;
    let mut pet_id = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(malformed)?.to_vec();

                upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("petId") => {
                let value = field.text().await.map_err(malformed)?;
                if !value.trim().is_empty() {
                    pet_id = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::bad_request("file is required"))?;
    Ok((upload, pet_id))
}

async fn owned_document(
    state: &AppState,
    customer: &Customer,
    id: Uuid,
) -> Result<Document, AppError> {
    let document: Document = store::find_by_id(state.platform.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;

    if document.customer_id != customer.id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    Ok(document)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
) -> Result<Json<Value>, AppError> {
    let documents: Vec<Document> = store::fetch_all(
        state.platform.as_ref(),
        Query::new()
            .eq("customer_id", portal.customer.id)
            .order("created_at", false),
    )
    .await?;

    Ok(Json(json!({ "documents": documents })))
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    MultipartForm(multipart): MultipartForm,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (upload, pet_id) = read_upload(multipart).await?;

    if upload.bytes.is_empty() {
        return Err(AppError::bad_request("file is empty"));
    }

    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::bad_request("file exceeds 10 MB"));
    }

    if !ALLOWED_TYPES.contains(&upload.content_type.as_str()) {
        return Err(AppError::bad_request(format!(
            "Unsupported file type {}",
            upload.content_type
        )));
    }

    let pet_id = match pet_id {
        Some(raw) => {
            let id = Uuid::parse_str(&raw)
                .map_err(|_| AppError::bad_request("petId is invalid"))?;
            Some(owned_pet(&state, &portal.customer, id).await?.id)
        }
        None => None,
    };

    let file_name = sanitize_file_name(&upload.file_name);
    let storage_path = format!("{}/{}-{file_name}", portal.customer.id, Uuid::new_v4());
    let size = upload.bytes.len();

    state
        .platform
        .upload(BUCKET, &storage_path, upload.bytes, &upload.content_type)
        .await?;

    let inserted = store::insert_one::<Document>(
        state.platform.as_ref(),
        json!({
            "customer_id": portal.customer.id,
            "pet_id": pet_id,
            "file_name": file_name,
            "storage_path": storage_path,
            "mime_type": upload.content_type,
            "size_bytes": size,
        }),
    )
    .await;

    let document = match inserted {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.platform.remove(BUCKET, &[storage_path]).await {
                warn!("Removing orphaned upload failed: {cleanup}");
            }
            return Err(e);
        }
    };

    info!(
        "Customer {} uploaded document {} ({size} bytes)",
        portal.customer.id, document.id
    );

    Ok((StatusCode::CREATED, Json(json!({ "document": document }))))
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, AppError> {
    let document = owned_document(&state, &portal.customer, id).await?;

    let url = state
        .platform
        .create_signed_url(BUCKET, &document.storage_path, SIGNED_URL_SECS)
        .await?;

    Ok(Json(json!({ "url": url })))
}

/// Deletes the row even when the stored object cannot be removed.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, AppError> {
    let document = owned_document(&state, &portal.customer, id).await?;

    if let Err(e) = state
        .platform
        .remove(BUCKET, &[document.storage_path.clone()])
        .await
    {
        warn!("Removing {} from storage failed: {e}", document.storage_path);
    }

    store::delete_by_id::<Document>(state.platform.as_ref(), document.id).await?;

    info!("Customer {} deleted document {}", portal.customer.id, document.id);

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Impfpass Bello.pdf"), "Impfpass_Bello.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("Röntgen (1).png"), "R_ntgen__1_.png");
        assert_eq!(sanitize_file_name("   "), "upload");
    }
}
