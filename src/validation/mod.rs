//! Input validation for the helpdesk forms.
//!
//! The [`FieldValidator`] owns an immutable [`RuleTable`] built once at startup
//! and evaluates user input against it, annotating the field state it is handed
//! with feedback and an ordered list of [`FieldError`]s. Nothing here returns an
//! error or panics on bad input: callers read the boolean result and the error
//! lists to decide whether to proceed.

pub mod field;
pub mod file;
pub mod form;
pub mod password;
pub mod records;
pub mod rules;
pub mod sanitize;
pub mod validator;

pub use field::{Feedback, FieldState};
pub use file::{stored_file_name, FileField, FileUpload, UploadPolicy, MAX_UPLOAD_BYTES};
pub use form::{
    sector_requires_cost_center, Form, SectorUpdate, SubmitDecision, COST_CENTER_FIELD,
    PURCHASING_WARNING, SECTOR_FIELD,
};
pub use password::{password_strength, PasswordStrength, StrengthClass};
pub use records::{SearchParams, TicketDraft, UserDraft};
pub use rules::{RuleError, RuleSpec, RuleTable, ValidationRule};
pub use sanitize::{normalize_text, sanitize_input};
pub use validator::FieldValidator;

/// A single violated constraint, rendered as the inline message shown next to
/// the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Required field is missing or blank
    Required { label: String },
    /// Value is shorter than the rule allows
    TooShort { label: String, min: usize, actual: usize },
    /// Value is longer than the rule allows
    TooLong { label: String, max: usize, actual: usize },
    /// Value does not match the rule's pattern
    PatternMismatch { label: String, message: Option<String> },
    /// Value is not one of the accepted choices
    InvalidValue { label: String, allowed: Vec<String>, actual: String },
    /// Purchasing sector selected without a cost center
    CostCenterRequired,
    /// Selected file exceeds the upload limit
    FileTooLarge { max_bytes: u64, actual: u64 },
    /// Selected file has a MIME type outside the allowlist
    UnsupportedFileType { mime_type: String },
    /// Selected file name contains characters outside the safe set
    UnsafeFileName { filename: String },
    /// Free-form message
    Custom(String),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Required { label } => write!(f, "{} é obrigatório", label),
            FieldError::TooShort { label, min, .. } => {
                write!(f, "{} deve ter pelo menos {} caracteres", label, min)
            }
            FieldError::TooLong { label, max, .. } => {
                write!(f, "{} não pode ter mais de {} caracteres", label, max)
            }
            FieldError::PatternMismatch { label, message } => match message {
                Some(message) => write!(f, "{}", message),
                None => write!(f, "{} está em formato inválido", label),
            },
            FieldError::InvalidValue { label, allowed, .. } => {
                write!(f, "{} deve ser um de: {}", label, allowed.join(", "))
            }
            FieldError::CostCenterRequired => write!(
                f,
                "Para o setor COMPRAS é obrigatório informar o CDC. Caso não tenha na sua OS, a mesma será invalidada."
            ),
            FieldError::FileTooLarge { max_bytes, .. } => write!(
                f,
                "Arquivo muito grande. Máximo: {:.1}MB",
                *max_bytes as f64 / 1024.0 / 1024.0
            ),
            FieldError::UnsupportedFileType { mime_type } => write!(
                f,
                "Tipo de arquivo não permitido ({}). Use JPEG, PNG ou GIF",
                mime_type
            ),
            FieldError::UnsafeFileName { .. } => {
                write!(f, "Nome do arquivo contém caracteres inválidos")
            }
            FieldError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FieldError {}

/// Result type for record validation
pub type ValidationResult = Result<(), Vec<FieldError>>;

/// Options for record validation
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Stop collecting after the first error
    pub fail_fast: bool,
    /// Sectors a ticket may be routed to
    pub sectors: Vec<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            sectors: default_sectors(),
        }
    }
}

/// Sectors the helpdesk routes tickets to when none are configured.
pub fn default_sectors() -> Vec<String> {
    [
        "T.I",
        "Manutenção",
        "CCIH / SESMT / Manutenção de Ar condicionado",
        "Telefonia e outros serviços",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Accumulates errors while a record is validated
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Accumulated errors
    pub errors: Vec<FieldError>,
    /// Validation options
    pub options: ValidationOptions,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ValidationOptions) -> Self {
        Self {
            errors: Vec::new(),
            options,
        }
    }

    pub fn add_error(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Record the first error of a check, if any
    pub fn check(&mut self, outcome: Result<(), FieldError>) {
        if self.should_continue() {
            if let Err(error) = outcome {
                self.errors.push(error);
            }
        }
    }

    /// Check if validation should continue
    pub fn should_continue(&self) -> bool {
        !self.options.fail_fast || self.errors.is_empty()
    }

    pub fn result(self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Trait for records validated on the server side before they are stored
pub trait Validatable {
    /// Validate with default options
    fn validate(&self) -> ValidationResult {
        let mut ctx = ValidationContext::new();
        self.validate_with_context(&mut ctx);
        ctx.result()
    }

    /// Validate with custom context
    fn validate_with_context(&self, ctx: &mut ValidationContext);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FieldError::TooShort {
            label: "Username".to_string(),
            min: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Username deve ter pelo menos 3 caracteres");

        let err = FieldError::FileTooLarge {
            max_bytes: MAX_UPLOAD_BYTES,
            actual: 6 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "Arquivo muito grande. Máximo: 5.0MB");
    }

    #[test]
    fn test_validation_context_fail_fast() {
        let mut ctx = ValidationContext::with_options(ValidationOptions {
            fail_fast: true,
            ..Default::default()
        });
        ctx.check(Err(FieldError::Custom("first".to_string())));
        ctx.check(Err(FieldError::Custom("second".to_string())));

        let errors = ctx.result().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "first");
    }

    #[test]
    fn test_validation_context_collects_all() {
        let mut ctx = ValidationContext::new();
        ctx.check(Ok(()));
        ctx.check(Err(FieldError::Custom("a".to_string())));
        ctx.check(Err(FieldError::Custom("b".to_string())));
        assert_eq!(ctx.result().unwrap_err().len(), 2);
    }
}
