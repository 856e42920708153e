//! License gate checked once at process start.
//!
//! A license is bound to the machine it was activated on through a
//! [`HardwareId`] and is valid for the duration granted by its
//! [`LicenseType`]. [`LicenseGate::check`] fails closed: a missing or corrupt
//! license file, a different machine, an expired or deactivated license all
//! block startup with an actionable [`LicenseError`].

pub mod activation;
pub mod fingerprint;
pub mod gate;
pub mod keys;
pub mod record;
pub mod store;

pub use fingerprint::{FingerprintSource, FixedFingerprint, HardwareId, HostFingerprint};
pub use gate::{LicenseGate, LicenseStatus, StatusKind};
pub use keys::{generate_license_key, mask_key, normalize_key, IssuedKey, KeyCatalog, DEFAULT_KEY_PREFIX};
pub use record::{
    Features, LicensePolicies, LicensePolicy, LicenseRecord, LicenseState, LicenseType,
    MAX_DURATION_DAYS,
};
pub use store::LicenseStore;

use std::path::PathBuf;

/// Error types for license operations
#[derive(Debug, thiserror::Error)]
pub enum LicenseError {
    #[error("No license is installed on this machine. Activate one with `ticketdesk license activate <KEY> <NAME> <EMAIL>`")]
    Missing,

    #[error("License file is corrupt ({reason}). Run `ticketdesk license deactivate` and activate the license again")]
    Corrupt { reason: String },

    #[error("License was activated on another machine (licensed to {licensed}, this machine is {current}). Contact support to transfer it")]
    HardwareMismatch {
        licensed: HardwareId,
        current: HardwareId,
    },

    #[error("License expired on {expired_on} after {elapsed_days} days ({allowed_days} allowed for {license_type}). Renew it with `ticketdesk license renew <KEY>`")]
    Expired {
        expired_on: String,
        elapsed_days: i64,
        allowed_days: i64,
        license_type: LicenseType,
    },

    #[error("License is {state}. Activate a license to continue")]
    Inactive { state: LicenseState },

    #[error("Invalid or unauthorized license key")]
    InvalidKey,

    #[error("Key does not match the installed license")]
    KeyMismatch,

    #[error("License type {license_type} grants {duration_days} days, outside 1..={max} days. Fix `duration_days` in the config")]
    InvalidDuration {
        license_type: LicenseType,
        duration_days: i64,
        max: i64,
    },

    #[error("Invalid customer details: {0}")]
    Customer(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key catalog {path}: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("Could not generate a license key")]
    KeyGeneration,
}
