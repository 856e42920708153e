use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::FieldError;

/// Pattern accepted for usernames
pub const USERNAME_PATTERN: &str = r"^[a-zA-Z0-9_-]+$";

/// Pattern accepted for e-mail addresses
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

pub(crate) static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"));

/// Errors raised while building the rule table
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Invalid pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule for field '{field}' has min_length {min} greater than max_length {max}")]
    InvertedBounds { field: String, min: usize, max: usize },
}

/// Constraints attached to a single named field
#[derive(Debug, Clone)]
pub struct ValidationRule {
    field_name: String,
    label: String,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    pattern_message: Option<String>,
}

impl ValidationRule {
    pub fn new(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            label: field_name.to_string(),
            required: false,
            min_length: None,
            max_length: None,
            pattern: None,
            pattern_message: None,
        }
    }

    /// Name shown in messages instead of the raw field name
    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: &str, message: Option<&str>) -> Result<Self, RuleError> {
        let regex = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            field: self.field_name.clone(),
            source,
        })?;
        self.pattern = Some(regex);
        self.pattern_message = message.map(str::to_string);
        Ok(self)
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Evaluate an already trimmed value.
    ///
    /// Violations are reported in the order required, min length, max length,
    /// pattern. A blank value only ever yields the required error, and a blank
    /// optional field is valid.
    pub fn check(&self, value: &str) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if value.is_empty() {
            if self.required {
                errors.push(FieldError::Required {
                    label: self.label.clone(),
                });
            }
            return errors;
        }

        let len = value.chars().count();

        if let Some(min) = self.min_length {
            if len < min {
                errors.push(FieldError::TooShort {
                    label: self.label.clone(),
                    min,
                    actual: len,
                });
            }
        }

        if let Some(max) = self.max_length {
            if len > max {
                errors.push(FieldError::TooLong {
                    label: self.label.clone(),
                    max,
                    actual: len,
                });
            }
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                errors.push(FieldError::PatternMismatch {
                    label: self.label.clone(),
                    message: self.pattern_message.clone(),
                });
            }
        }

        errors
    }

    fn check_bounds(self) -> Result<Self, RuleError> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(RuleError::InvertedBounds {
                    field: self.field_name,
                    min,
                    max,
                });
            }
        }
        Ok(self)
    }
}

/// Serializable form of a rule, as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSpec {
    pub field: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TryFrom<&RuleSpec> for ValidationRule {
    type Error = RuleError;

    fn try_from(spec: &RuleSpec) -> Result<Self, Self::Error> {
        let mut rule = ValidationRule::new(&spec.field);
        if let Some(label) = &spec.label {
            rule = rule.label(label);
        }
        if spec.required {
            rule = rule.required();
        }
        if let Some(min) = spec.min_length {
            rule = rule.min_length(min);
        }
        if let Some(max) = spec.max_length {
            rule = rule.max_length(max);
        }
        if let Some(pattern) = &spec.pattern {
            rule = rule.pattern(pattern, spec.message.as_deref())?;
        }
        rule.check_bounds()
    }
}

/// Immutable mapping from field name to its rule
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, ValidationRule>,
}

impl RuleTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules used by the helpdesk forms
    pub fn builtin() -> Result<Self, RuleError> {
        let rules = vec![
            ValidationRule::new("username")
                .label("Username")
                .required()
                .min_length(3)
                .max_length(50)
                .pattern(
                    USERNAME_PATTERN,
                    Some("Username só pode conter letras, números, _ e -"),
                )?,
            ValidationRule::new("password")
                .label("Senha")
                .required()
                .min_length(6)
                .max_length(128),
            ValidationRule::new("email")
                .label("E-mail")
                .max_length(254)
                .pattern(EMAIL_PATTERN, Some("Informe um e-mail válido"))?,
            ValidationRule::new("titulo")
                .label("Título")
                .required()
                .min_length(5)
                .max_length(200),
            ValidationRule::new("descricao")
                .label("Descrição")
                .required()
                .min_length(10)
                .max_length(2000),
            ValidationRule::new("usuario_setor").label("Setor").required(),
            ValidationRule::new("ramal")
                .label("Ramal")
                .max_length(10)
                .pattern(r"^[0-9]+$", Some("Ramal deve conter apenas números"))?,
            ValidationRule::new("cdc").label("CDC").max_length(50),
        ];

        let mut table = Self::empty();
        for rule in rules {
            table.insert(rule.check_bounds()?);
        }
        Ok(table)
    }

    /// Builtin rules with configured rules layered on top, replacing any
    /// builtin rule for the same field.
    pub fn with_overrides(specs: &[RuleSpec]) -> Result<Self, RuleError> {
        let mut table = Self::builtin()?;
        for spec in specs {
            table.insert(ValidationRule::try_from(spec)?);
        }
        Ok(table)
    }

    fn insert(&mut self, rule: ValidationRule) {
        self.rules.insert(rule.field_name.clone(), rule);
    }

    pub fn get(&self, field_name: &str) -> Option<&ValidationRule> {
        self.rules.get(field_name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_regex() {
        assert!(EMAIL_RE.is_match("ti@clinica.com.br"));
        assert!(!EMAIL_RE.is_match("ti@clinica"));
    }

    #[test]
    fn test_builtin_table_loads() {
        let table = RuleTable::builtin().unwrap();
        assert!(table.get("username").is_some());
        assert!(table.get("nonexistent").is_none());
        assert!(table.get("username").unwrap().is_required());
    }

    #[test]
    fn test_username_rule() {
        let table = RuleTable::builtin().unwrap();
        let rule = table.get("username").unwrap();

        assert!(rule.check("valid_user-1").is_empty());
        assert!(matches!(rule.check("ab")[..], [FieldError::TooShort { min: 3, actual: 2, .. }]));
        assert!(matches!(
            rule.check(&"a".repeat(51))[..],
            [FieldError::TooLong { max: 50, .. }]
        ));
        assert!(matches!(
            rule.check("bad user")[..],
            [FieldError::PatternMismatch { .. }]
        ));
    }

    #[test]
    fn test_violations_are_ordered() {
        let rule = ValidationRule::new("code")
            .min_length(5)
            .pattern(r"^[0-9]+$", None)
            .unwrap();

        let errors = rule.check("ab");
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], FieldError::TooShort { .. }));
        assert!(matches!(errors[1], FieldError::PatternMismatch { .. }));
    }

    #[test]
    fn test_blank_values() {
        let required = ValidationRule::new("name").required().min_length(3);
        assert_eq!(
            required.check(""),
            vec![FieldError::Required {
                label: "name".to_string()
            }]
        );

        let optional = ValidationRule::new("note").min_length(3);
        assert!(optional.check("").is_empty());
    }

    #[test]
    fn test_length_counts_characters() {
        let rule = ValidationRule::new("titulo").min_length(5);
        assert!(rule.check("ação!").is_empty());
    }

    #[test]
    fn test_overrides_replace_builtin() {
        let specs = vec![RuleSpec {
            field: "username".to_string(),
            label: None,
            required: true,
            min_length: Some(5),
            max_length: None,
            pattern: None,
            message: None,
        }];
        let table = RuleTable::with_overrides(&specs).unwrap();
        let rule = table.get("username").unwrap();
        assert_eq!(rule.check("abcd").len(), 1);
        assert!(rule.check("with space").is_empty());
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let bad_pattern = RuleSpec {
            field: "x".to_string(),
            label: None,
            required: false,
            min_length: None,
            max_length: None,
            pattern: Some("(".to_string()),
            message: None,
        };
        assert!(matches!(
            ValidationRule::try_from(&bad_pattern),
            Err(RuleError::InvalidPattern { .. })
        ));

        let inverted = RuleSpec {
            pattern: None,
            min_length: Some(10),
            max_length: Some(2),
            ..bad_pattern
        };
        assert!(matches!(
            ValidationRule::try_from(&inverted),
            Err(RuleError::InvertedBounds { .. })
        ));
    }
}
