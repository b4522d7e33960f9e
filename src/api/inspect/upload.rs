// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::RawImage;

/// Form field carrying the image
pub const UPLOAD_FIELD: &str = "file";

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::InvalidRequest(e.body_text())
    }
}

/// Read the uploaded image from a multipart body
///
/// Takes the `file` field, or the first field that carries a file name. The
/// part's content type is forwarded as the declared MIME type; a part with
/// no content type declares `""` and is rejected by the ingestor.
pub async fn read_upload(mut multipart: Multipart) -> Result<RawImage, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let is_upload = field.name() == Some(UPLOAD_FIELD) || field.file_name().is_some();
        if !is_upload {
            continue;
        }

        let declared = field.content_type().unwrap_or("").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        debug!("Upload received: {} bytes, declared {:?}", bytes.len(), declared);
        return Ok(RawImage::new(bytes, declared));
    }

    Err(ApiError::InvalidRequest(format!(
        "multipart field '{}' is required",
        UPLOAD_FIELD
    )))
}
