use tracing::{info, warn};

use super::gate::{LicenseGate, LicenseStatus};
use super::keys::normalize_key;
use super::record::{LicensePolicy, LicenseRecord, LicenseState, LicenseType, MAX_DURATION_DAYS};
use super::LicenseError;
use crate::validation::rules::EMAIL_RE;

fn check_customer(name: &str, email: &str) -> Result<(), LicenseError> {
    if name.trim().is_empty() {
        return Err(LicenseError::Customer("customer name is required".to_string()));
    }
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(LicenseError::Customer(format!(
            "'{}' is not a valid email address",
            email.trim()
        )));
    }
    Ok(())
}

impl LicenseGate {
    fn policy(&self, license_type: LicenseType) -> Result<&LicensePolicy, LicenseError> {
        let policy = self.policies.get(license_type);
        if !policy.duration_in_range() {
            return Err(LicenseError::InvalidDuration {
                license_type,
                duration_days: policy.duration_days,
                max: MAX_DURATION_DAYS,
            });
        }
        Ok(policy)
    }

    /// Install a license for `key` on this machine, replacing any existing one
    pub fn activate(
        &self,
        key: &str,
        customer_name: &str,
        customer_email: &str,
    ) -> Result<LicenseStatus, LicenseError> {
        let key = normalize_key(key);
        check_customer(customer_name, customer_email)?;

        let license_type = self.catalog.lookup(&key).ok_or(LicenseError::InvalidKey)?;
        let policy = self.policy(license_type)?;
        let hardware_id = self.fingerprint.fingerprint()?;
        let now = self.clock.now();

        match self.store.load() {
            Ok(Some(previous)) => info!(
                previous_key = %previous.masked_key(),
                "replacing installed license"
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "overwriting unreadable license file"),
        }

        let record = LicenseRecord {
            license_key: key,
            customer_name: customer_name.trim().to_string(),
            customer_email: customer_email.trim().to_string(),
            hardware_id,
            license_type,
            issued_at: now,
            duration_days: policy.duration_days,
            status: LicenseState::Active,
            features: policy.features.clone(),
            activated_at: now,
            last_validation: Some(now),
            validation_count: 1,
        };
        self.store.save(&record)?;

        info!(
            license_type = %license_type,
            key = %record.masked_key(),
            duration_days = record.duration_days,
            "license activated"
        );
        Ok(self.describe(&record, now))
    }

    /// Restart the validity period of the installed license.
    ///
    /// `key` must be the installed key and still be present in the catalog.
    pub fn renew(&self, key: &str) -> Result<LicenseStatus, LicenseError> {
        let key = normalize_key(key);
        let mut record = self.store.load()?.ok_or(LicenseError::Missing)?;

        if normalize_key(&record.license_key) != key {
            return Err(LicenseError::KeyMismatch);
        }
        let license_type = self.catalog.lookup(&key).ok_or(LicenseError::InvalidKey)?;

        let current = self.fingerprint.fingerprint()?;
        if record.hardware_id != current {
            return Err(LicenseError::HardwareMismatch {
                licensed: record.hardware_id,
                current,
            });
        }

        let policy = self.policy(license_type)?;
        let now = self.clock.now();
        record.license_type = license_type;
        record.issued_at = now;
        record.duration_days = policy.duration_days;
        record.features = policy.features.clone();
        record.status = LicenseState::Active;
        self.store.save(&record)?;

        let expires_at = record.expiry_date().unwrap_or_else(|| "unknown".to_string());
        info!(
            key = %record.masked_key(),
            %expires_at,
            "license renewed"
        );
        Ok(self.describe(&record, now))
    }

    /// Deactivate the installed license. Returns false when there was nothing
    /// to deactivate. An unreadable license file is removed.
    pub fn deactivate(&self) -> Result<bool, LicenseError> {
        match self.store.load() {
            Ok(Some(mut record)) => {
                if record.status == LicenseState::Deactivated {
                    return Ok(false);
                }
                record.status = LicenseState::Deactivated;
                self.store.save(&record)?;
                info!(key = %record.masked_key(), "license deactivated");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(LicenseError::Corrupt { reason }) => {
                warn!(%reason, "removing corrupt license file");
                self.store.remove()?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::gate::tests::{gate_at, start, KEY, MACHINE};
    use crate::license::gate::StatusKind;
    use crate::license::record::LicensePolicies;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_activate_normalizes_key() {
        let dir = TempDir::new().unwrap();
        let gate = gate_at(&dir, MACHINE, start());

        let status = gate
            .activate("  desk-aaaa-bbbb-cccc-dddd ", "Clinica", "ti@clinica.com.br")
            .unwrap();
        assert!(status.licensed);
        assert_eq!(status.license_type, Some(LicenseType::Professional));
        assert_eq!(status.expires_at.as_deref(), Some("31/05/2026"));

        let record = gate.store().load().unwrap().unwrap();
        assert_eq!(record.license_key, KEY);
        assert_eq!(record.hardware_id.as_str(), MACHINE);
    }

    #[test]
    fn test_activate_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let gate = gate_at(&dir, MACHINE, start());
        assert!(matches!(
            gate.activate("DESK-ZZZZ-ZZZZ-ZZZZ-ZZZZ", "Clinica", "ti@clinica.com.br"),
            Err(LicenseError::InvalidKey)
        ));
        assert!(gate.store().load().unwrap().is_none());
    }

    #[test]
    fn test_activate_requires_customer_details() {
        let dir = TempDir::new().unwrap();
        let gate = gate_at(&dir, MACHINE, start());
        assert!(matches!(
            gate.activate(KEY, "  ", "ti@clinica.com.br"),
            Err(LicenseError::Customer(_))
        ));
        assert!(matches!(
            gate.activate(KEY, "Clinica", "not-an-email"),
            Err(LicenseError::Customer(_))
        ));
    }

    #[test]
    fn test_activate_replaces_corrupt_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("license.json"), "garbage").unwrap();

        let gate = gate_at(&dir, MACHINE, start());
        gate.activate(KEY, "Clinica", "ti@clinica.com.br").unwrap();
        assert!(gate.check().is_ok());
    }

    #[test]
    fn test_activate_rejects_out_of_range_duration() {
        let dir = TempDir::new().unwrap();
        for duration_days in [100_000_000, 0, -5] {
            let mut policies = LicensePolicies::default();
            policies.professional.duration_days = duration_days;
            let gate = gate_at(&dir, MACHINE, start()).with_policies(policies);

            assert!(matches!(
                gate.activate(KEY, "Clinica", "ti@clinica.com.br"),
                Err(LicenseError::InvalidDuration { .. })
            ));
            assert!(gate.store().load().unwrap().is_none());
        }
    }

    #[test]
    fn test_renew_rejects_out_of_range_duration() {
        let dir = TempDir::new().unwrap();
        gate_at(&dir, MACHINE, start())
            .activate(KEY, "Clinica", "ti@clinica.com.br")
            .unwrap();

        let mut policies = LicensePolicies::default();
        policies.professional.duration_days = 100_000_000;
        let gate = gate_at(&dir, MACHINE, start()).with_policies(policies);
        assert!(matches!(
            gate.renew(KEY),
            Err(LicenseError::InvalidDuration { .. })
        ));
        assert_eq!(gate.store().load().unwrap().unwrap().duration_days, 30);
    }

    #[test]
    fn test_renew_restarts_period() {
        let dir = TempDir::new().unwrap();
        gate_at(&dir, MACHINE, start())
            .activate(KEY, "Clinica", "ti@clinica.com.br")
            .unwrap();

        let later = gate_at(&dir, MACHINE, start() + Duration::days(40));
        assert!(later.check().is_err());

        let status = later.renew(&KEY.to_lowercase()).unwrap();
        assert_eq!(status.days_remaining, 30);
        assert!(later.check().is_ok());
    }

    #[test]
    fn test_renew_requires_installed_key() {
        let dir = TempDir::new().unwrap();
        let gate = gate_at(&dir, MACHINE, start());
        assert!(matches!(gate.renew(KEY), Err(LicenseError::Missing)));

        gate.activate(KEY, "Clinica", "ti@clinica.com.br").unwrap();
        assert!(matches!(
            gate.renew("DESK-1111-2222-3333-4444"),
            Err(LicenseError::KeyMismatch)
        ));
    }

    #[test]
    fn test_renew_on_other_machine_fails() {
        let dir = TempDir::new().unwrap();
        gate_at(&dir, MACHINE, start())
            .activate(KEY, "Clinica", "ti@clinica.com.br")
            .unwrap();

        let other = gate_at(&dir, "fedcba9876543210", start());
        assert!(matches!(
            other.renew(KEY),
            Err(LicenseError::HardwareMismatch { .. })
        ));
    }

    #[test]
    fn test_deactivate() {
        let dir = TempDir::new().unwrap();
        let gate = gate_at(&dir, MACHINE, start());
        assert!(!gate.deactivate().unwrap());

        gate.activate(KEY, "Clinica", "ti@clinica.com.br").unwrap();
        assert!(gate.deactivate().unwrap());
        assert!(!gate.deactivate().unwrap());

        assert!(matches!(
            gate.check(),
            Err(LicenseError::Inactive {
                state: LicenseState::Deactivated
            })
        ));
        assert_eq!(gate.status().status, StatusKind::Deactivated);
        assert!(!gate.has_feature("api_access"));
    }

    #[test]
    fn test_deactivate_removes_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("license.json");
        fs::write(&path, "garbage").unwrap();

        let gate = gate_at(&dir, MACHINE, start());
        assert!(gate.deactivate().unwrap());
        assert!(!path.exists());
        assert!(matches!(gate.check(), Err(LicenseError::Missing)));
    }
}
