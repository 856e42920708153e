//! Server-side checks applied to whole records before they are stored.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::{FieldError, Validatable, ValidationContext};

/// Roles a user account may hold
pub const ROLES: [&str; 3] = ["admin", "operador", "usuario"];

/// Ticket priorities
pub const PRIORITIES: [&str; 4] = ["baixa", "media", "alta", "urgente"];

/// Characters refused in search terms
const SEARCH_FORBIDDEN: [char; 5] = ['<', '>', '"', '\'', ';'];

/// Common record validation functions
pub struct Validators;

impl Validators {
    /// Trimmed value must have at least `min` characters
    pub fn min_chars(value: &str, label: &str, min: usize) -> Result<(), FieldError> {
        let actual = value.trim().chars().count();
        if actual < min {
            return Err(FieldError::TooShort {
                label: label.to_string(),
                min,
                actual,
            });
        }
        Ok(())
    }

    pub fn max_chars(value: &str, label: &str, max: usize) -> Result<(), FieldError> {
        let actual = value.chars().count();
        if actual > max {
            return Err(FieldError::TooLong {
                label: label.to_string(),
                max,
                actual,
            });
        }
        Ok(())
    }

    /// Validate that value is in allowed set
    pub fn in_set<S: AsRef<str>>(value: &str, label: &str, allowed: &[S]) -> Result<(), FieldError> {
        if !allowed.iter().any(|a| a.as_ref() == value) {
            return Err(FieldError::InvalidValue {
                label: label.to_string(),
                allowed: allowed.iter().map(|a| a.as_ref().to_string()).collect(),
                actual: value.to_string(),
            });
        }
        Ok(())
    }

    /// Letters, digits, underscore and hyphen only
    pub fn username_chars(value: &str) -> Result<(), FieldError> {
        if value.is_empty()
            || !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(FieldError::PatternMismatch {
                label: "Username".to_string(),
                message: Some("Username só pode conter letras, números, _ e -".to_string()),
            });
        }
        Ok(())
    }
}

/// A user account about to be created or edited
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserDraft {
    pub username: String,
    /// Only checked when a new password is supplied
    pub password: Option<String>,
    pub role: String,
    pub sector: Option<String>,
}

impl Validatable for UserDraft {
    fn validate_with_context(&self, ctx: &mut ValidationContext) {
        // The first failing username check wins
        let username = Validators::min_chars(&self.username, "Username", 3)
            .and_then(|_| Validators::max_chars(&self.username, "Username", 50))
            .and_then(|_| Validators::username_chars(&self.username));
        ctx.check(username);

        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            let outcome = Validators::min_chars(password, "Senha", 6)
                .and_then(|_| Validators::max_chars(password, "Senha", 128))
                .and_then(|_| {
                    if password.chars().any(|c| c.is_ascii_alphabetic()) {
                        Ok(())
                    } else {
                        Err(FieldError::Custom(
                            "Senha deve conter pelo menos uma letra".to_string(),
                        ))
                    }
                })
                .and_then(|_| {
                    if password.chars().any(|c| c.is_ascii_digit()) {
                        Ok(())
                    } else {
                        Err(FieldError::Custom(
                            "Senha deve conter pelo menos um número".to_string(),
                        ))
                    }
                });
            ctx.check(outcome);
        }

        ctx.check(Validators::in_set(&self.role, "Papel", &ROLES[..]));

        let has_sector = self
            .sector
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if self.role == "operador" && !has_sector {
            ctx.check(Err(FieldError::Custom(
                "Operadores devem ter um setor definido".to_string(),
            )));
        }
    }
}

/// A ticket about to be opened
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    pub sector: String,
    pub priority: String,
    pub user_id: Option<i64>,
}

impl Default for TicketDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            sector: String::new(),
            priority: "media".to_string(),
            user_id: None,
        }
    }
}

impl Validatable for TicketDraft {
    fn validate_with_context(&self, ctx: &mut ValidationContext) {
        ctx.check(
            Validators::min_chars(&self.title, "Título", 5)
                .and_then(|_| Validators::max_chars(&self.title, "Título", 200)),
        );
        ctx.check(
            Validators::min_chars(&self.description, "Descrição", 10)
                .and_then(|_| Validators::max_chars(&self.description, "Descrição", 2000)),
        );

        let sectors = ctx.options.sectors.clone();
        ctx.check(Validators::in_set(&self.sector, "Setor", &sectors[..]));
        ctx.check(Validators::in_set(&self.priority, "Prioridade", &PRIORITIES[..]));

        if matches!(self.user_id, Some(id) if id <= 0) {
            ctx.check(Err(FieldError::Custom("ID de usuário inválido".to_string())));
        }
    }
}

/// Search box input and column filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub query: String,
    pub filters: BTreeMap<String, String>,
}

impl Validatable for SearchParams {
    fn validate_with_context(&self, ctx: &mut ValidationContext) {
        if self.query.chars().count() > 100 {
            ctx.check(Err(FieldError::Custom("Termo de busca muito longo".to_string())));
        }
        if self.query.contains(SEARCH_FORBIDDEN) {
            ctx.check(Err(FieldError::Custom(
                "Termo de busca contém caracteres inválidos".to_string(),
            )));
        }

        for (key, value) in &self.filters {
            if key.chars().count() > 50 {
                ctx.check(Err(FieldError::Custom(format!(
                    "Chave de filtro inválida: {}",
                    key
                ))));
            }
            if value.chars().count() > 100 {
                ctx.check(Err(FieldError::Custom(format!(
                    "Valor de filtro muito longo: {}",
                    key
                ))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationOptions;

    #[test]
    fn test_valid_user() {
        let user = UserDraft {
            username: "maria_silva".to_string(),
            password: Some("segredo1".to_string()),
            role: "usuario".to_string(),
            sector: None,
        };
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_user_errors_accumulate() {
        let user = UserDraft {
            username: "ab".to_string(),
            password: Some("semnumero".to_string()),
            role: "root".to_string(),
            sector: None,
        };
        let errors = user.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], FieldError::TooShort { .. }));
        assert_eq!(errors[1].to_string(), "Senha deve conter pelo menos um número");
        assert!(matches!(errors[2], FieldError::InvalidValue { .. }));
    }

    #[test]
    fn test_operator_needs_sector() {
        let mut user = UserDraft {
            username: "operador1".to_string(),
            password: None,
            role: "operador".to_string(),
            sector: None,
        };
        assert!(user.validate().is_err());

        user.sector = Some("T.I".to_string());
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_ticket_draft() {
        let ticket = TicketDraft {
            title: "Sem internet".to_string(),
            description: "A rede caiu no setor financeiro".to_string(),
            sector: "T.I".to_string(),
            ..Default::default()
        };
        assert!(ticket.validate().is_ok());

        let bad = TicketDraft {
            title: "Oi".to_string(),
            description: "curto".to_string(),
            sector: "Cozinha".to_string(),
            priority: "maxima".to_string(),
            user_id: Some(0),
        };
        assert_eq!(bad.validate().unwrap_err().len(), 5);
    }

    #[test]
    fn test_ticket_sectors_from_options() {
        let ticket = TicketDraft {
            title: "Pedido de cadeiras".to_string(),
            description: "Precisamos de 4 cadeiras novas".to_string(),
            sector: "Compras".to_string(),
            ..Default::default()
        };
        assert!(ticket.validate().is_err());

        let mut ctx = ValidationContext::with_options(ValidationOptions {
            fail_fast: false,
            sectors: vec!["Compras".to_string()],
        });
        ticket.validate_with_context(&mut ctx);
        assert!(ctx.result().is_ok());
    }

    #[test]
    fn test_search_params() {
        let ok = SearchParams {
            query: "impressora".to_string(),
            filters: BTreeMap::from([("status".to_string(), "Aberto".to_string())]),
        };
        assert!(ok.validate().is_ok());

        let bad = SearchParams {
            query: "<script>".to_string(),
            filters: BTreeMap::from([("k".repeat(51), "v".repeat(101))]),
        };
        assert_eq!(bad.validate().unwrap_err().len(), 3);
    }
}
