use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use super::fingerprint::HardwareId;
use super::keys::mask_key;

/// Commercial license tiers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Standard,
    Professional,
    Enterprise,
}

impl LicenseType {
    pub const ALL: [LicenseType; 3] = [
        LicenseType::Standard,
        LicenseType::Professional,
        LicenseType::Enterprise,
    ];
}

impl std::fmt::Display for LicenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseType::Standard => write!(f, "standard"),
            LicenseType::Professional => write!(f, "professional"),
            LicenseType::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl FromStr for LicenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(LicenseType::Standard),
            "professional" | "pro" => Ok(LicenseType::Professional),
            "enterprise" => Ok(LicenseType::Enterprise),
            other => Err(format!(
                "unknown license type '{}' (expected standard, professional or enterprise)",
                other
            )),
        }
    }
}

/// Usage limits and feature flags granted by a license
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Features {
    pub max_users: u32,
    pub max_tickets: u32,
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

impl Features {
    pub fn new(max_users: u32, max_tickets: u32, flags: &[&str]) -> Self {
        Self {
            max_users,
            max_tickets,
            flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// Longest validity period a tier may grant
pub const MAX_DURATION_DAYS: i64 = 36_500;

/// What one license tier grants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicensePolicy {
    pub duration_days: i64,
    pub features: Features,
}

impl LicensePolicy {
    pub fn duration_in_range(&self) -> bool {
        (1..=MAX_DURATION_DAYS).contains(&self.duration_days)
    }
}

/// Per-tier policy table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LicensePolicies {
    pub standard: LicensePolicy,
    pub professional: LicensePolicy,
    pub enterprise: LicensePolicy,
}

impl Default for LicensePolicies {
    fn default() -> Self {
        Self {
            standard: LicensePolicy {
                duration_days: 30,
                features: Features::new(50, 5000, &["premium_reports", "api_access"]),
            },
            professional: LicensePolicy {
                duration_days: 30,
                features: Features::new(
                    100,
                    10000,
                    &["premium_reports", "api_access", "white_label"],
                ),
            },
            enterprise: LicensePolicy {
                duration_days: 30,
                features: Features::new(
                    999_999,
                    999_999,
                    &[
                        "premium_reports",
                        "api_access",
                        "white_label",
                        "unlimited_access",
                        "priority_support",
                        "custom_branding",
                        "advanced_analytics",
                        "multi_tenant",
                    ],
                ),
            },
        }
    }
}

impl LicensePolicies {
    pub fn get(&self, license_type: LicenseType) -> &LicensePolicy {
        match license_type {
            LicenseType::Standard => &self.standard,
            LicenseType::Professional => &self.professional,
            LicenseType::Enterprise => &self.enterprise,
        }
    }

    /// First tier whose duration is outside `1..=MAX_DURATION_DAYS`
    pub fn invalid_duration(&self) -> Option<(LicenseType, i64)> {
        LicenseType::ALL
            .iter()
            .map(|t| (*t, self.get(*t)))
            .find(|(_, policy)| !policy.duration_in_range())
            .map(|(t, policy)| (t, policy.duration_days))
    }
}

/// Lifecycle state of an installed license
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    Active,
    Expired,
    Deactivated,
}

impl std::fmt::Display for LicenseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseState::Active => write!(f, "active"),
            LicenseState::Expired => write!(f, "expired"),
            LicenseState::Deactivated => write!(f, "deactivated"),
        }
    }
}

/// License installed on this machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicenseRecord {
    pub license_key: String,
    pub customer_name: String,
    pub customer_email: String,
    pub hardware_id: HardwareId,
    pub license_type: LicenseType,
    pub issued_at: DateTime<Utc>,
    pub duration_days: i64,
    pub status: LicenseState,
    pub features: Features,
    pub activated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_validation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validation_count: u64,
}

impl LicenseRecord {
    /// `None` when the duration does not fit in a date
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Duration::try_days(self.duration_days)
            .and_then(|duration| self.issued_at.checked_add_signed(duration))
    }

    /// Expiry as `dd/mm/YYYY`
    pub fn expiry_date(&self) -> Option<String> {
        self.expires_at()
            .map(|expires_at| expires_at.format("%d/%m/%Y").to_string())
    }

    /// Whole days since issue
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.issued_at).num_days()
    }

    /// An unrepresentable expiry counts as expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expires_at| now > expires_at)
    }

    /// Whole days left before expiry, zero once expired
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at()
            .map_or(0, |expires_at| (expires_at - now).num_days().max(0))
    }

    pub fn masked_key(&self) -> String {
        mask_key(&self.license_key)
    }
}
