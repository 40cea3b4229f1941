use std::io;
use std::path::Path;

use axum::body::Bytes;

/// A file received in a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub form_field: String,
    pub client_filename: Option<String>,
    pub client_media_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(form_field: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            form_field: form_field.into(),
            client_filename: None,
            client_media_type: None,
            data: data.into(),
        }
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.client_filename = Some(name.into());
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.client_media_type = Some(media_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Writes the upload to `target`, creating parent directories as needed.
    pub fn save_to(&self, target: &Path) -> io::Result<()> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, &self.data)
    }
}
