use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::record::LicenseRecord;
use super::LicenseError;

type HmacSha256 = Hmac<Sha256>;

const FORMAT_VERSION: u32 = 1;

/// On-disk envelope: the record as a JSON string plus an HMAC over it
#[derive(Debug, Serialize, Deserialize)]
struct SealedLicense {
    version: u32,
    payload: String,
    seal: String,
}

/// File holding the license installed on this machine
#[derive(Debug, Clone)]
pub struct LicenseStore {
    path: PathBuf,
    secret: Vec<u8>,
}

impl LicenseStore {
    pub fn new(path: PathBuf, secret: &str) -> Self {
        Self {
            path,
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mac(&self) -> Result<HmacSha256, LicenseError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| LicenseError::Corrupt {
            reason: format!("unusable seal secret: {}", e),
        })
    }

    /// Read the installed license. `Ok(None)` when no license file exists;
    /// unreadable, unparsable or tampered files are reported as corrupt.
    pub fn load(&self) -> Result<Option<LicenseRecord>, LicenseError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| LicenseError::Io {
            path: self.path.clone(),
            source,
        })?;

        let sealed: SealedLicense =
            serde_json::from_str(&content).map_err(|e| LicenseError::Corrupt {
                reason: format!("unreadable license file: {}", e),
            })?;

        if sealed.version != FORMAT_VERSION {
            return Err(LicenseError::Corrupt {
                reason: format!("unsupported license file version {}", sealed.version),
            });
        }

        let seal = general_purpose::STANDARD
            .decode(sealed.seal.as_bytes())
            .map_err(|e| LicenseError::Corrupt {
                reason: format!("malformed seal: {}", e),
            })?;

        let mut mac = self.mac()?;
        mac.update(sealed.payload.as_bytes());
        mac.verify_slice(&seal).map_err(|_| LicenseError::Corrupt {
            reason: "seal does not match contents".to_string(),
        })?;

        let record = serde_json::from_str(&sealed.payload).map_err(|e| LicenseError::Corrupt {
            reason: format!("invalid license record: {}", e),
        })?;

        debug!(path = %self.path.display(), "loaded license file");
        Ok(Some(record))
    }

    pub fn save(&self, record: &LicenseRecord) -> Result<(), LicenseError> {
        let payload = serde_json::to_string(record).map_err(|e| LicenseError::Corrupt {
            reason: format!("could not serialize license: {}", e),
        })?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let seal = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        let sealed = SealedLicense {
            version: FORMAT_VERSION,
            payload,
            seal,
        };
        let content = serde_json::to_string_pretty(&sealed).map_err(|e| LicenseError::Corrupt {
            reason: format!("could not serialize license: {}", e),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| LicenseError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, content).map_err(|source| LicenseError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), "saved license file");
        Ok(())
    }

    pub fn remove(&self) -> Result<(), LicenseError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| LicenseError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::fingerprint::HardwareId;
    use crate::license::record::{Features, LicenseState, LicenseType};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_record() -> LicenseRecord {
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        LicenseRecord {
            license_key: "DESK-AAAA-BBBB-CCCC-DDDD".to_string(),
            customer_name: "Clinica".to_string(),
            customer_email: "ti@clinica.com.br".to_string(),
            hardware_id: HardwareId::new("0123456789abcdef"),
            license_type: LicenseType::Professional,
            issued_at: issued,
            duration_days: 30,
            status: LicenseState::Active,
            features: Features::new(100, 10000, &["api_access"]),
            activated_at: issued,
            last_validation: None,
            validation_count: 0,
        }
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseStore::new(temp_dir.path().join("license.json"), "secret");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseStore::new(temp_dir.path().join("nested").join("license.json"), "secret");
        let record = sample_record();

        store.save(&record).unwrap();
        assert_eq!(store.load().unwrap(), Some(record));

        store.remove().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_tampered_payload_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("license.json");
        let store = LicenseStore::new(path.clone(), "secret");
        store.save(&sample_record()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("\\\"duration_days\\\":30", "\\\"duration_days\\\":3000")).unwrap();

        assert!(matches!(store.load(), Err(LicenseError::Corrupt { .. })));
    }

    #[test]
    fn test_wrong_secret_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("license.json");
        LicenseStore::new(path.clone(), "secret").save(&sample_record()).unwrap();

        let other = LicenseStore::new(path, "another-secret");
        assert!(matches!(other.load(), Err(LicenseError::Corrupt { .. })));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("license.json");
        fs::write(&path, "not json").unwrap();

        let store = LicenseStore::new(path, "secret");
        assert!(matches!(store.load(), Err(LicenseError::Corrupt { .. })));
    }
}
