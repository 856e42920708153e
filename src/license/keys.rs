use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::record::LicenseType;
use super::LicenseError;

/// Prefix of generated keys
pub const DEFAULT_KEY_PREFIX: &str = "DESK";

const KEY_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SEGMENTS: usize = 4;
const SEGMENT_LEN: usize = 4;

/// Canonical form of a key as typed by a customer
pub fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

/// First eight and last four characters, for display
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(8).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Generate a key of the form `PREFIX-XXXX-XXXX-XXXX-XXXX` over `[A-Z0-9]`
pub fn generate_license_key(prefix: &str, rng: &dyn SecureRandom) -> Result<String, LicenseError> {
    let mut segments = Vec::with_capacity(SEGMENTS);
    for _ in 0..SEGMENTS {
        let mut segment = String::with_capacity(SEGMENT_LEN);
        while segment.len() < SEGMENT_LEN {
            let mut byte = [0u8; 1];
            rng.fill(&mut byte).map_err(|_| LicenseError::KeyGeneration)?;
            // Reject the tail of the byte range so every symbol is equally likely
            if byte[0] < 252 {
                segment.push(KEY_ALPHABET[(byte[0] % 36) as usize] as char);
            }
        }
        segments.push(segment);
    }
    Ok(format!("{}-{}", normalize_key(prefix), segments.join("-")))
}

/// A key sold to a customer and the tier it unlocks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedKey {
    pub key: String,
    pub license_type: LicenseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Keys accepted for activation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct KeyCatalog {
    #[serde(default)]
    pub keys: Vec<IssuedKey>,
}

impl KeyCatalog {
    pub fn new(keys: Vec<IssuedKey>) -> Self {
        Self { keys }
    }

    /// Load a catalog file; a missing file is an empty catalog
    pub fn load(path: &Path) -> Result<Self, LicenseError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| LicenseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| LicenseError::Catalog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), LicenseError> {
        let content = toml::to_string_pretty(self).map_err(|e| LicenseError::Catalog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LicenseError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| LicenseError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge another catalog in, keeping the first entry for a repeated key
    pub fn merge(&mut self, other: KeyCatalog) {
        for entry in other.keys {
            if self.lookup(&entry.key).is_none() {
                self.keys.push(entry);
            }
        }
    }

    /// Tier unlocked by a key, compared in normalized form
    pub fn lookup(&self, key: &str) -> Option<LicenseType> {
        let wanted = normalize_key(key);
        self.keys
            .iter()
            .find(|entry| normalize_key(&entry.key) == wanted)
            .map(|entry| entry.license_type)
    }

    /// Generate a fresh key for `license_type` and add it to the catalog
    pub fn issue(
        &mut self,
        prefix: &str,
        license_type: LicenseType,
        notes: Option<String>,
    ) -> Result<String, LicenseError> {
        let rng = SystemRandom::new();
        let key = loop {
            let candidate = generate_license_key(prefix, &rng)?;
            if self.lookup(&candidate).is_none() {
                break candidate;
            }
            debug!("generated key collided with catalog, retrying");
        };

        self.keys.push(IssuedKey {
            key: key.clone(),
            license_type,
            notes,
        });
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_key_format() {
        let rng = SystemRandom::new();
        let key = generate_license_key("desk", &rng).unwrap();
        let parts: Vec<&str> = key.split('-').collect();

        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "DESK");
        for part in &parts[1..] {
            assert_eq!(part.len(), 4);
            assert!(part.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("DESK-ABCD-EFGH-IJKL-MNOP"), "DESK-ABC...MNOP");
        assert_eq!(mask_key("AB"), "AB...AB");
    }

    #[test]
    fn test_lookup_normalizes() {
        let catalog = KeyCatalog::new(vec![IssuedKey {
            key: "DESK-AAAA-BBBB-CCCC-DDDD".to_string(),
            license_type: LicenseType::Professional,
            notes: None,
        }]);
        assert_eq!(
            catalog.lookup("  desk-aaaa-bbbb-cccc-dddd "),
            Some(LicenseType::Professional)
        );
        assert_eq!(catalog.lookup("DESK-0000-0000-0000-0000"), None);
    }

    #[test]
    fn test_issue_and_persist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keys.toml");

        let mut catalog = KeyCatalog::load(&path).unwrap();
        assert!(catalog.keys.is_empty());

        let key = catalog
            .issue("DESK", LicenseType::Enterprise, Some("hospital".to_string()))
            .unwrap();
        catalog.save(&path).unwrap();

        let reloaded = KeyCatalog::load(&path).unwrap();
        assert_eq!(reloaded.lookup(&key), Some(LicenseType::Enterprise));
        assert_eq!(reloaded.keys[0].notes.as_deref(), Some("hospital"));
    }

    #[test]
    fn test_merge_keeps_first() {
        let mut base = KeyCatalog::new(vec![IssuedKey {
            key: "K-1".to_string(),
            license_type: LicenseType::Standard,
            notes: None,
        }]);
        base.merge(KeyCatalog::new(vec![
            IssuedKey {
                key: "k-1".to_string(),
                license_type: LicenseType::Enterprise,
                notes: None,
            },
            IssuedKey {
                key: "K-2".to_string(),
                license_type: LicenseType::Enterprise,
                notes: None,
            },
        ]));
        assert_eq!(base.keys.len(), 2);
        assert_eq!(base.lookup("K-1"), Some(LicenseType::Standard));
    }

    #[test]
    fn test_corrupt_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keys.toml");
        fs::write(&path, "keys = 12").unwrap();
        assert!(matches!(KeyCatalog::load(&path), Err(LicenseError::Catalog { .. })));
    }
}
