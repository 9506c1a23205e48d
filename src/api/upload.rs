use std::collections::HashMap;
use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use futures::TryStreamExt;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::ApiError;

const MAX_TEXT_FIELD: usize = 64 * 1024;

/// A file spooled to local disk from a multipart request. Removed on drop
/// unless media storage already took it.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
}

impl UploadedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

fn storage_error(e: std::io::Error) -> ApiError {
    log::error!("Failed to spool upload: {}", e);
    ApiError::internal("Storage error")
}

fn upload_error(e: actix_multipart::MultipartError) -> ApiError {
    log::warn!("Malformed multipart payload: {}", e);
    ApiError::bad_request("Malformed multipart payload")
}

/// Keeps only the extension of the client's filename.
fn spool_name(filename: Option<&str>) -> String {
    let ext = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

impl MultipartForm {
    /// Reads every part of `payload`. Parts named in `file_fields` are written
    /// to the temp directory; everything else is collected as text.
    pub async fn read(
        mut payload: Multipart,
        storage: &StorageConfig,
        file_fields: &[&str],
    ) -> Result<Self, ApiError> {
        let temp_dir = storage.temp_dir();
        fs::create_dir_all(&temp_dir).await.map_err(storage_error)?;

        let mut form = MultipartForm::default();

        while let Some(mut field) = payload.try_next().await.map_err(upload_error)? {
            let content_disposition = field
                .content_disposition()
                .ok_or_else(|| ApiError::bad_request("No content disposition"))?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| ApiError::bad_request("No field name"))?
                .to_owned();

            if file_fields.contains(&name.as_str()) {
                let file = UploadedFile {
                    path: temp_dir.join(spool_name(content_disposition.get_filename())),
                };
                let mut f = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(file.path())
                    .await
                    .map_err(storage_error)?;

                let mut written = 0usize;
                while let Some(chunk) = field.try_next().await.map_err(upload_error)? {
                    written += chunk.len();
                    if written > storage.max_file_size {
                        return Err(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "File too large"));
                    }
                    f.write_all(&chunk).await.map_err(storage_error)?;
                }
                f.sync_all().await.map_err(storage_error)?;

                if written > 0 {
                    form.files.insert(name, file);
                }
            } else {
                let mut value = Vec::new();
                while let Some(chunk) = field.try_next().await.map_err(upload_error)? {
                    if value.len() + chunk.len() > MAX_TEXT_FIELD {
                        return Err(ApiError::bad_request(format!("Field {} is too long", name)));
                    }
                    value.extend_from_slice(&chunk);
                }
                let value = String::from_utf8(value)
                    .map_err(|_| ApiError::bad_request(format!("Field {} is not valid UTF-8", name)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<UploadedFile, ApiError> {
        self.take_file(name)
            .ok_or_else(|| ApiError::bad_request(format!("{} file is required", name)))
    }
}
