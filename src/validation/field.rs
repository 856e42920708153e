use serde::{Deserialize, Serialize};

use super::FieldError;

/// Visual state of a field after validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    #[default]
    Untouched,
    Valid,
    Invalid,
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Untouched => write!(f, "untouched"),
            Feedback::Valid => write!(f, "is-valid"),
            Feedback::Invalid => write!(f, "is-invalid"),
        }
    }
}

/// Transient state of one input element.
///
/// `required` mirrors the element's live required attribute; it is toggled by
/// UI synchronisation and does not feed into rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldState {
    pub name: String,
    pub value: String,
    pub required: bool,
    errors: Vec<FieldError>,
    feedback: Feedback,
}

impl FieldState {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            required: false,
            errors: Vec::new(),
            feedback: Feedback::Untouched,
        }
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Error messages in display order
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Replace the error list with the outcome of a validation pass
    pub(crate) fn annotate(&mut self, errors: Vec<FieldError>) -> bool {
        self.feedback = if errors.is_empty() {
            Feedback::Valid
        } else {
            Feedback::Invalid
        };
        self.errors = errors;
        self.feedback == Feedback::Valid
    }

    /// Append an error raised by a rule spanning several fields
    pub(crate) fn push_error(&mut self, error: FieldError) {
        self.errors.push(error);
        self.feedback = Feedback::Invalid;
    }
}
