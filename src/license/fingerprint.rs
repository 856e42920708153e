use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::LicenseError;

/// Length of a hardware id in hex characters
const ID_LEN: usize = 16;

/// Identifier derived from the machine a license is bound to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct HardwareId(String);

impl HardwareId {
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HardwareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces the fingerprint of the current machine
pub trait FingerprintSource {
    fn fingerprint(&self) -> Result<HardwareId, LicenseError>;
}

/// Fingerprint from architecture, OS and hostname.
///
/// When no hostname can be read, a random id persisted in `fallback_file` is
/// used instead so the value stays stable across runs.
#[derive(Debug, Clone)]
pub struct HostFingerprint {
    fallback_file: PathBuf,
}

impl HostFingerprint {
    pub fn new(fallback_file: PathBuf) -> Self {
        Self { fallback_file }
    }

    /// Hash of `{arch}-{os}-{hostname}`, truncated to 16 hex characters
    pub fn derive(arch: &str, os: &str, hostname: &str) -> HardwareId {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}-{}-{}", arch, os, hostname).as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        HardwareId(hash[..ID_LEN].to_string())
    }

    /// Kernel hostname of this machine
    fn hostname() -> Option<String> {
        hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().trim().to_string())
            .filter(|h| !h.is_empty())
    }

    fn fallback_id(path: &Path) -> Result<HardwareId, LicenseError> {
        if path.exists() {
            let stored = fs::read_to_string(path).map_err(|source| LicenseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let id = stored.trim();
            if !id.is_empty() {
                return Ok(HardwareId::new(id));
            }
        }

        let id: String = Uuid::new_v4().simple().to_string()[..ID_LEN].to_string();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LicenseError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, &id).map_err(|source| LicenseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        warn!(path = %path.display(), "hostname unavailable, created machine id file");
        Ok(HardwareId(id))
    }
}

impl FingerprintSource for HostFingerprint {
    fn fingerprint(&self) -> Result<HardwareId, LicenseError> {
        match Self::hostname() {
            Some(hostname) => {
                let id = Self::derive(std::env::consts::ARCH, std::env::consts::OS, &hostname);
                debug!(hardware_id = %id, "derived host fingerprint");
                Ok(id)
            }
            None => Self::fallback_id(&self.fallback_file),
        }
    }
}

/// Fingerprint with a preset value
#[derive(Debug, Clone)]
pub struct FixedFingerprint(pub HardwareId);

impl FingerprintSource for FixedFingerprint {
    fn fingerprint(&self) -> Result<HardwareId, LicenseError> {
        Ok(self.0.clone())
    }
}
