//! Reference codes and the client-held reference slot.
//!
//! A code is issued once per successful submission and persisted on the applicant row. The
//! timestamp that bounds resumption lives only with the client, in a single "current
//! application" slot.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::domain::ReferenceCode;

pub const REFERENCE_TTL_HOURS: i64 = 48;
pub const DEFAULT_REFERENCE_PREFIX: &str = "QIS";
/// Key of the single slot inside the client store.
pub const CURRENT_APPLICATION_KEY: &str = "current_application";

const SUFFIX_LEN: usize = 6;
// No 0/O or 1/I so codes survive being read out at a bank counter.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn reference_ttl() -> Duration {
    Duration::hours(REFERENCE_TTL_HOURS)
}

/// Produces `{PREFIX}-{YYYYMMDD}-{6 random chars}` codes.
#[derive(Debug, Clone)]
pub struct ReferenceGenerator {
    prefix: String,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_PREFIX)
    }
}

impl ReferenceGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim().to_ascii_uppercase();
        let prefix = if prefix.is_empty()
            || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            DEFAULT_REFERENCE_PREFIX.to_string()
        } else {
            prefix
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self, now: DateTime<Utc>) -> ReferenceCode {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        ReferenceCode::from_generated(format!(
            "{}-{}-{suffix}",
            self.prefix,
            now.format("%Y%m%d")
        ))
    }
}

/// Code plus the moment it was issued, as retained by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceArtifact {
    pub code: ReferenceCode,
    pub created_at: DateTime<Utc>,
}

impl ReferenceArtifact {
    pub fn new(code: ReferenceCode, created_at: DateTime<Utc>) -> Self {
        Self { code, created_at }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + reference_ttl()
    }

    /// Valid iff less than 48 hours have elapsed since issue.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < reference_ttl()
    }

    /// Time left before expiry, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.expires_at() - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceStoreError {
    #[error("reference store io failed: {0}")]
    Io(#[from] io::Error),
    #[error("reference store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("reference store unavailable")]
    Poisoned,
}

/// Durable client-side storage for the current application's reference.
pub trait ReferenceStore: Send + Sync {
    fn save(&self, artifact: &ReferenceArtifact) -> Result<(), ReferenceStoreError>;
    fn load(&self) -> Result<Option<ReferenceArtifact>, ReferenceStoreError>;
    fn clear(&self) -> Result<(), ReferenceStoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SlotDocument {
    #[serde(rename = "current_application", default)]
    current_application: Option<ReferenceArtifact>,
}

/// JSON file holding the `current_application` slot; survives process restarts.
#[derive(Debug, Clone)]
pub struct FileReferenceStore {
    path: PathBuf,
}

impl FileReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ReferenceStore for FileReferenceStore {
    fn save(&self, artifact: &ReferenceArtifact) -> Result<(), ReferenceStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let document = SlotDocument {
            current_application: Some(artifact.clone()),
        };
        fs::write(&self.path, serde_json::to_vec_pretty(&document)?)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<ReferenceArtifact>, ReferenceStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let document: SlotDocument = serde_json::from_slice(&raw)?;
        Ok(document.current_application)
    }

    fn clear(&self) -> Result<(), ReferenceStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryReferenceStore {
    slot: Mutex<Option<ReferenceArtifact>>,
}

impl ReferenceStore for MemoryReferenceStore {
    fn save(&self, artifact: &ReferenceArtifact) -> Result<(), ReferenceStoreError> {
        *self.slot.lock().map_err(|_| ReferenceStoreError::Poisoned)? = Some(artifact.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<ReferenceArtifact>, ReferenceStoreError> {
        Ok(self
            .slot
            .lock()
            .map_err(|_| ReferenceStoreError::Poisoned)?
            .clone())
    }

    fn clear(&self) -> Result<(), ReferenceStoreError> {
        *self.slot.lock().map_err(|_| ReferenceStoreError::Poisoned)? = None;
        Ok(())
    }
}

/// Client-facing operations over a [`ReferenceStore`]: store, retrieve, validate, clear.
#[derive(Debug)]
pub struct ReferenceSlot<K> {
    store: K,
}

impl<K: ReferenceStore> ReferenceSlot<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    pub fn store(
        &self,
        code: &ReferenceCode,
        now: DateTime<Utc>,
    ) -> Result<ReferenceArtifact, ReferenceStoreError> {
        let artifact = ReferenceArtifact::new(code.clone(), now);
        self.store.save(&artifact)?;
        Ok(artifact)
    }

    pub fn retrieve(&self) -> Result<Option<ReferenceArtifact>, ReferenceStoreError> {
        self.store.load()
    }

    /// True when `code` is the stored code and it was stored less than 48 hours before `now`.
    pub fn is_valid(
        &self,
        code: &ReferenceCode,
        now: DateTime<Utc>,
    ) -> Result<bool, ReferenceStoreError> {
        Ok(self
            .retrieve()?
            .is_some_and(|artifact| artifact.code == *code && artifact.is_valid_at(now)))
    }

    pub fn clear(&self) -> Result<(), ReferenceStoreError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn generated_codes_are_prefixed_and_dated() {
        let generator = ReferenceGenerator::default();
        let code = generator.generate(issued_at());
        let parts: Vec<&str> = code.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "QIS");
        assert_eq!(parts[1], "20261019");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| ALPHABET.contains(&b)));
        assert_eq!(ReferenceCode::parse(code.as_str()), Some(code));
    }

    #[test]
    fn generated_codes_differ() {
        let generator = ReferenceGenerator::new("adm");
        let first = generator.generate(issued_at());
        let second = generator.generate(issued_at());
        assert!(first.as_str().starts_with("ADM-"));
        assert_ne!(first, second);
    }

    #[test]
    fn invalid_prefix_falls_back_to_default() {
        assert_eq!(ReferenceGenerator::new("q-s").prefix(), "QIS");
        assert_eq!(ReferenceGenerator::new("  ").prefix(), "QIS");
    }

    #[test]
    fn slot_validity_window_is_48_hours() {
        let slot = ReferenceSlot::new(MemoryReferenceStore::default());
        let code = ReferenceGenerator::default().generate(issued_at());
        slot.store(&code, issued_at()).expect("store succeeds");

        let valid = |offset: Duration| {
            slot.is_valid(&code, issued_at() + offset)
                .expect("store readable")
        };
        assert!(valid(Duration::zero()));
        assert!(valid(Duration::hours(47) + Duration::minutes(59)));
        assert!(!valid(Duration::hours(48)));
        assert!(!valid(Duration::hours(72)));
    }

    #[test]
    fn slot_rejects_other_codes_and_clears() {
        let slot = ReferenceSlot::new(MemoryReferenceStore::default());
        let generator = ReferenceGenerator::default();
        let code = generator.generate(issued_at());
        let other = generator.generate(issued_at());
        slot.store(&code, issued_at()).expect("store succeeds");

        assert!(!slot.is_valid(&other, issued_at()).expect("readable"));

        slot.clear().expect("clear succeeds");
        assert!(slot.retrieve().expect("readable").is_none());
        assert!(!slot.is_valid(&code, issued_at()).expect("readable"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("slot.json");
        let code = ReferenceGenerator::default().generate(issued_at());

        ReferenceSlot::new(FileReferenceStore::new(&path))
            .store(&code, issued_at())
            .expect("store succeeds");

        let reopened = ReferenceSlot::new(FileReferenceStore::new(&path));
        let artifact = reopened
            .retrieve()
            .expect("readable")
            .expect("artifact present");
        assert_eq!(artifact.code, code);
        assert_eq!(artifact.created_at, issued_at());

        let raw = std::fs::read_to_string(&path).expect("file written");
        assert!(raw.contains(CURRENT_APPLICATION_KEY));

        reopened.clear().expect("clear succeeds");
        reopened.clear().expect("clearing twice is fine");
        assert!(reopened.retrieve().expect("readable").is_none());
    }

    #[test]
    fn remaining_is_clamped() {
        let artifact = ReferenceArtifact::new(
            ReferenceGenerator::default().generate(issued_at()),
            issued_at(),
        );
        assert_eq!(
            artifact.remaining(issued_at() + Duration::hours(1)),
            Duration::hours(47)
        );
        assert_eq!(
            artifact.remaining(issued_at() + Duration::hours(50)),
            Duration::zero()
        );
    }
}
