use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::media::discard_local_file;

/// A multipart form with its files spooled to the upload directory
#[derive(Debug, Default)]
pub struct UploadedForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, PathBuf>,
}

impl UploadedForm {
    pub fn field(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    /// Remove any temp files still on disk
    pub async fn discard(&self) {
        for path in self.files.values() {
            discard_local_file(path).await;
        }
    }
}

/// Read a multipart form, writing every file part to `upload_dir`.
///
/// `file_fields` names the parts treated as files; only the first part per
/// name is kept. Everything else is read as text.
pub async fn read_multipart(
    mut multipart: Multipart,
    upload_dir: &Path,
    file_fields: &[&str],
) -> Result<UploadedForm, ApiError> {
    let mut form = UploadedForm::default();

    tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory: {}", e);
        ApiError::Internal("Upload failed".to_string())
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                form.discard().await;
                return Err(ApiError::Validation(format!("Invalid multipart data: {}", e)));
            }
        };
        let name = field.name().unwrap_or_default().to_string();

        if file_fields.contains(&name.as_str()) {
            if form.files.contains_key(&name) {
                continue;
            }

            let filename = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "upload".to_string());

            let data = match field.bytes().await {
                Ok(data) => data,
                Err(e) => {
                    form.discard().await;
                    return Err(ApiError::Validation(format!("Failed to read file: {}", e)));
                }
            };

            let saved_filename = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&filename));
            let file_path = upload_dir.join(&saved_filename);

            if let Err(e) = tokio::fs::write(&file_path, &data).await {
                error!("Failed to save uploaded file: {}", e);
                form.discard().await;
                return Err(ApiError::Internal("Failed to save file".to_string()));
            }

            info!("File uploaded: {} ({} bytes)", file_path.display(), data.len());
            form.files.insert(name, file_path);
        } else {
            let text = match field.text().await {
                Ok(text) => text,
                Err(e) => {
                    form.discard().await;
                    return Err(ApiError::Validation(format!("Failed to read field: {}", e)));
                }
            };
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

/// Keep filenames to a safe character set
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').chars().take(100).collect()
}
