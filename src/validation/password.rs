use serde::Serialize;

/// Highest score the meter can award
pub const MAX_SCORE: u8 = 6;

/// Bar color class for the strength meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthClass {
    Danger,
    Warning,
    Info,
    Success,
}

impl StrengthClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StrengthClass::Danger => "danger",
            StrengthClass::Warning => "warning",
            StrengthClass::Info => "info",
            StrengthClass::Success => "success",
        }
    }
}

impl std::fmt::Display for StrengthClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reading of the password strength meter. Advisory only: it never blocks a
/// submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub score: u8,
    pub class: StrengthClass,
    pub label: &'static str,
    pub percentage: u8,
}

impl PasswordStrength {
    pub fn evaluate(password: &str) -> Self {
        Self::from_score(score(password))
    }

    pub fn from_score(score: u8) -> Self {
        let (class, label, percentage) = if score < 3 {
            (StrengthClass::Danger, "Fraca", 25)
        } else if score < 5 {
            (StrengthClass::Warning, "Média", 50)
        } else if score < MAX_SCORE {
            (StrengthClass::Info, "Boa", 75)
        } else {
            (StrengthClass::Success, "Forte", 100)
        };

        Self {
            score: score.min(MAX_SCORE),
            class,
            label,
            percentage,
        }
    }
}

/// Shorthand for [`PasswordStrength::evaluate`]
pub fn password_strength(password: &str) -> PasswordStrength {
    PasswordStrength::evaluate(password)
}

fn score(password: &str) -> u8 {
    let len = password.chars().count();
    let mut score = if len >= 8 {
        2
    } else if len >= 6 {
        1
    } else {
        0
    };

    let classes = [
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    score += classes.iter().filter(|present| **present).count() as u8;
    score
}
