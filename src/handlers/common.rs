use crate::errors::ServiceError;
use crate::services::order_lifecycle::PhotoUpload;
use crate::ApiResponse;
use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Number of pages needed for `total` items.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if total == 0 || limit == 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

/// Collects every file field of a multipart form. Fields without a file
/// name are ignored.
pub async fn read_photo_uploads(mut multipart: Multipart) -> Result<Vec<PhotoUpload>, ServiceError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart request: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::BadRequest(format!("Multipart error: {}", e)))?;
        uploads.push(PhotoUpload { file_name, data });
    }
    Ok(uploads)
}
