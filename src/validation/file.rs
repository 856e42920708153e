use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Feedback, FieldError};

/// Largest accepted upload, 5 MiB
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// A file picked in a file input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl FileUpload {
    pub fn new(filename: &str, size_bytes: u64, mime_type: &str) -> Self {
        Self {
            filename: filename.to_string(),
            size_bytes,
            mime_type: mime_type.to_string(),
        }
    }
}

/// Limits applied to attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
            ],
        }
    }
}

impl UploadPolicy {
    /// Run the size, type and filename checks independently and report every
    /// violation.
    pub fn check(&self, upload: &FileUpload) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if upload.size_bytes > self.max_bytes {
            errors.push(FieldError::FileTooLarge {
                max_bytes: self.max_bytes,
                actual: upload.size_bytes,
            });
        }

        let mime = upload.mime_type.trim();
        if !self
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
        {
            errors.push(FieldError::UnsupportedFileType {
                mime_type: upload.mime_type.clone(),
            });
        }

        if !is_safe_file_name(&upload.filename) {
            errors.push(FieldError::UnsafeFileName {
                filename: upload.filename.clone(),
            });
        }

        errors
    }
}

/// Letters, digits, dot, underscore and hyphen only
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// State of one file input element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    pub name: String,
    pub selected: Option<FileUpload>,
    errors: Vec<FieldError>,
    feedback: Feedback,
}

impl FileField {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            selected: None,
            errors: Vec::new(),
            feedback: Feedback::Untouched,
        }
    }

    pub fn with_selection(name: &str, upload: FileUpload) -> Self {
        Self {
            selected: Some(upload),
            ..Self::new(name)
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    pub(crate) fn annotate(&mut self, errors: Vec<FieldError>) -> bool {
        self.feedback = if errors.is_empty() {
            Feedback::Valid
        } else {
            Feedback::Invalid
        };
        self.errors = errors;
        self.feedback == Feedback::Valid
    }
}

/// Name an accepted upload is stored under: a fresh UUID plus the lowercased
/// extension of the original name, or `unknown` when it has none.
pub fn stored_file_name(original: &str) -> String {
    let ext = original
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}.{}", Uuid::new_v4(), ext)
}
