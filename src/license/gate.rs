use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::fingerprint::{FingerprintSource, HardwareId, HostFingerprint};
use super::keys::KeyCatalog;
use super::record::{Features, LicensePolicies, LicenseRecord, LicenseState, LicenseType};
use super::store::LicenseStore;
use super::LicenseError;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;

/// Days before expiry at which renewal becomes urgent
pub const DEFAULT_WARN_DAYS: i64 = 7;

/// Days before expiry at which renewal is suggested
pub const DEFAULT_NOTICE_DAYS: i64 = 15;

/// Summary category of the installed license
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Active,
    Expired,
    Unlicensed,
    Deactivated,
    Error,
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusKind::Active => write!(f, "active"),
            StatusKind::Expired => write!(f, "expired"),
            StatusKind::Unlicensed => write!(f, "unlicensed"),
            StatusKind::Deactivated => write!(f, "deactivated"),
            StatusKind::Error => write!(f, "error"),
        }
    }
}

/// Report on the installed license, for display
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LicenseStatus {
    pub licensed: bool,
    pub status: StatusKind,
    pub message: String,
    pub days_remaining: i64,
    pub expires_at: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub license_type: Option<LicenseType>,
    pub masked_key: Option<String>,
    pub features: Option<Features>,
    pub validation_count: u64,
}

impl LicenseStatus {
    fn unlicensed(err: &LicenseError) -> Self {
        let status = match err {
            LicenseError::Missing => StatusKind::Unlicensed,
            LicenseError::Expired { .. } => StatusKind::Expired,
            LicenseError::Inactive {
                state: LicenseState::Deactivated,
            } => StatusKind::Deactivated,
            LicenseError::Inactive {
                state: LicenseState::Expired,
            } => StatusKind::Expired,
            _ => StatusKind::Error,
        };
        Self {
            licensed: false,
            status,
            message: err.to_string(),
            days_remaining: 0,
            expires_at: None,
            customer_name: None,
            customer_email: None,
            license_type: None,
            masked_key: None,
            features: None,
            validation_count: 0,
        }
    }
}

/// Startup gate and license administration for this machine
pub struct LicenseGate {
    pub(crate) store: LicenseStore,
    pub(crate) catalog: KeyCatalog,
    pub(crate) policies: LicensePolicies,
    pub(crate) fingerprint: Box<dyn FingerprintSource>,
    pub(crate) clock: Box<dyn Clock>,
    warn_days: i64,
    notice_days: i64,
}

impl LicenseGate {
    pub fn new(
        store: LicenseStore,
        fingerprint: Box<dyn FingerprintSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog: KeyCatalog::default(),
            policies: LicensePolicies::default(),
            fingerprint,
            clock,
            warn_days: DEFAULT_WARN_DAYS,
            notice_days: DEFAULT_NOTICE_DAYS,
        }
    }

    /// Gate over the configured files, host fingerprint and wall clock
    pub fn from_config(config: &AppConfig) -> Result<Self, LicenseError> {
        let settings = &config.license;

        let mut catalog = KeyCatalog::new(settings.keys.clone());
        catalog.merge(KeyCatalog::load(&settings.key_catalog_file())?);

        let gate = Self::new(
            LicenseStore::new(settings.license_file(), &settings.seal_secret),
            Box::new(HostFingerprint::new(settings.machine_id_file())),
            Box::new(SystemClock),
        )
        .with_catalog(catalog)
        .with_policies(settings.types.clone())
        .with_thresholds(settings.warn_days, settings.notice_days);

        Ok(gate)
    }

    pub fn with_catalog(mut self, catalog: KeyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_policies(mut self, policies: LicensePolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_thresholds(mut self, warn_days: i64, notice_days: i64) -> Self {
        self.warn_days = warn_days;
        self.notice_days = notice_days;
        self
    }

    pub fn store(&self) -> &LicenseStore {
        &self.store
    }

    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    /// Fingerprint of the current machine
    pub fn machine_id(&self) -> Result<HardwareId, LicenseError> {
        self.fingerprint.fingerprint()
    }

    /// Startup check.
    ///
    /// Succeeds only for an intact, active, unexpired license activated on this
    /// machine, and records the validation on the license. An expired license
    /// is persisted as expired.
    pub fn check(&self) -> Result<LicenseStatus, LicenseError> {
        let now = self.clock.now();

        match self.evaluate(now) {
            Ok(mut record) => {
                record.validation_count += 1;
                record.last_validation = Some(now);
                if let Err(e) = self.store.save(&record) {
                    warn!(error = %e, "could not record license validation");
                }

                let status = self.describe(&record, now);
                if status.days_remaining <= self.notice_days {
                    warn!(days_remaining = status.days_remaining, "{}", status.message);
                } else {
                    info!(
                        license_type = %record.license_type,
                        days_remaining = status.days_remaining,
                        "license valid"
                    );
                }
                Ok(status)
            }
            Err(err) => {
                if matches!(err, LicenseError::Expired { .. }) {
                    self.mark_expired();
                }
                info!(reason = %err, "license check failed");
                Err(err)
            }
        }
    }

    /// Report on the installed license without recording a validation
    pub fn status(&self) -> LicenseStatus {
        let now = self.clock.now();
        match self.evaluate(now) {
            Ok(record) => self.describe(&record, now),
            Err(err) => LicenseStatus::unlicensed(&err),
        }
    }

    /// Whether the installed license is valid and grants `feature`
    pub fn has_feature(&self, feature: &str) -> bool {
        self.evaluate(self.clock.now())
            .map(|record| record.features.has(feature))
            .unwrap_or(false)
    }

    pub(crate) fn evaluate(&self, now: DateTime<Utc>) -> Result<LicenseRecord, LicenseError> {
        let current = self.fingerprint.fingerprint()?;
        let record = self.store.load()?.ok_or(LicenseError::Missing)?;

        if record.hardware_id != current {
            return Err(LicenseError::HardwareMismatch {
                licensed: record.hardware_id,
                current,
            });
        }

        if record.expires_at().is_none() {
            return Err(LicenseError::Corrupt {
                reason: format!(
                    "license duration of {} days is out of range",
                    record.duration_days
                ),
            });
        }

        let state = record.status;
        match state {
            LicenseState::Active if !record.is_expired(now) => Ok(record),
            LicenseState::Active | LicenseState::Expired => Err(Self::expired(&record, now)),
            LicenseState::Deactivated => Err(LicenseError::Inactive { state }),
        }
    }

    fn expired(record: &LicenseRecord, now: DateTime<Utc>) -> LicenseError {
        LicenseError::Expired {
            expired_on: record.expiry_date().unwrap_or_else(|| "unknown".to_string()),
            elapsed_days: record.elapsed_days(now),
            allowed_days: record.duration_days,
            license_type: record.license_type,
        }
    }

    fn mark_expired(&self) {
        if let Ok(Some(mut record)) = self.store.load() {
            if record.status == LicenseState::Active {
                record.status = LicenseState::Expired;
                if let Err(e) = self.store.save(&record) {
                    warn!(error = %e, "could not mark license expired");
                }
            }
        }
    }

    pub(crate) fn describe(&self, record: &LicenseRecord, now: DateTime<Utc>) -> LicenseStatus {
        let days_remaining = record.days_remaining(now);
        let message = if days_remaining <= self.warn_days {
            format!("License expires in {} days - renew now!", days_remaining)
        } else if days_remaining <= self.notice_days {
            format!("License expires in {} days", days_remaining)
        } else {
            "License active".to_string()
        };

        LicenseStatus {
            licensed: true,
            status: StatusKind::Active,
            message,
            days_remaining,
            expires_at: record.expiry_date(),
            customer_name: Some(record.customer_name.clone()),
            customer_email: Some(record.customer_email.clone()),
            license_type: Some(record.license_type),
            masked_key: Some(record.masked_key()),
            features: Some(record.features.clone()),
            validation_count: record.validation_count,
        }
    }
}
