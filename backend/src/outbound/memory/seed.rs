//! JSON seed documents for the in-memory stores.
//!
//! A seed describes a starting state, anomalies included: issued
//! prescriptions without grants, accounts claimed by two role tables,
//! hand-patched snapshots. Rows are stored as given, bypassing the guards
//! the service paths go through.

use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::MemoryStores;
use crate::domain::{
    ContributionRecord, Prescription, RoleProfile, SharingGrant, VerificationSnapshot,
};

/// Errors raised while loading or applying a seed.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The seed file could not be read.
    #[error("failed to read seed at {path}: {source}")]
    Read {
        /// Path to the seed file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The seed file is not a valid seed document.
    #[error("failed to parse seed at {path}: {source}")]
    Parse {
        /// Path to the seed file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A store refused a seeded row.
    #[error("failed to populate {store} store: {message}")]
    Store {
        /// Store that failed.
        store: &'static str,
        /// Failure reported by the store.
        message: String,
    },
}

impl SeedError {
    fn store(store: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Store {
            store,
            message: error.to_string(),
        }
    }
}

/// Rows to load into a fresh set of stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedDocument {
    /// Role profiles, one per role table entry.
    pub profiles: Vec<RoleProfile>,
    /// Prescriptions in any status.
    pub prescriptions: Vec<Prescription>,
    /// Grants already written.
    pub grants: Vec<SharingGrant>,
    /// Authoritative contribution records.
    pub contributions: Vec<ContributionRecord>,
    /// Cached snapshots.
    pub snapshots: Vec<VerificationSnapshot>,
}

impl SeedDocument {
    /// Parse a seed from JSON text.
    ///
    /// # Examples
    /// ```
    /// use mutuelle_sync::outbound::memory::SeedDocument;
    ///
    /// let seed = SeedDocument::from_json("{}").expect("empty seed");
    /// assert!(seed.profiles.is_empty());
    /// ```
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Read and parse the seed file at `path`.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let read_error = |source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| {
            read_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seed path must be a file",
            ))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let contents = dir.read_to_string(Path::new(file_name)).map_err(read_error)?;
        Self::from_json(&contents).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Store every row of the seed in `stores`.
    pub fn apply(&self, stores: &MemoryStores) -> Result<(), SeedError> {
        for profile in &self.profiles {
            stores
                .roles
                .add(profile.clone())
                .map_err(|err| SeedError::store(profile.kind().store_name(), err))?;
        }
        for prescription in &self.prescriptions {
            stores
                .prescriptions
                .put(prescription.clone())
                .map_err(|err| SeedError::store("prescription", err))?;
        }
        for grant in &self.grants {
            stores
                .grants
                .put(grant.clone())
                .map_err(|err| SeedError::store("sharing grant", err))?;
        }
        for record in &self.contributions {
            stores
                .contributions
                .put(record.clone())
                .map_err(|err| SeedError::store("contribution", err))?;
        }
        for snapshot in &self.snapshots {
            stores
                .snapshots
                .put(snapshot.clone())
                .map_err(|err| SeedError::store("verification snapshot", err))?;
        }
        info!(
            profiles = self.profiles.len(),
            prescriptions = self.prescriptions.len(),
            grants = self.grants.len(),
            contributions = self.contributions.len(),
            snapshots = self.snapshots.len(),
            "seed applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{PharmacistRoster, RoleDirectory};
    use crate::domain::{AccountId, MemberId, MemberProfile, PharmacistId, PharmacistProfile};
    use crate::test_support::cap_fs::write_temp_file;

    fn seed() -> SeedDocument {
        SeedDocument {
            profiles: vec![
                RoleProfile::Member(MemberProfile {
                    id: MemberId::random(),
                    account_id: AccountId::random(),
                }),
                RoleProfile::Pharmacist(PharmacistProfile {
                    id: PharmacistId::random(),
                    account_id: AccountId::random(),
                    active: true,
                    activated_at: None,
                }),
            ],
            ..SeedDocument::default()
        }
    }

    #[rstest]
    #[tokio::test]
    async fn seed_file_round_trips_into_the_stores() {
        let document = seed();
        let json = serde_json::to_vec(&document).expect("serialise seed");
        let (_dir, path) = write_temp_file("seed.json", &json).expect("write seed");

        let loaded = SeedDocument::load(&path).expect("load seed");
        assert_eq!(loaded, document);

        let stores = MemoryStores::new();
        loaded.apply(&stores).expect("apply seed");
        assert_eq!(stores.roles.list_active().await.map(|list| list.len()), Ok(1));
        let RoleProfile::Member(member) = &document.profiles[0] else {
            panic!("first profile is a member");
        };
        assert!(
            stores
                .roles
                .find_member(&member.account_id)
                .await
                .expect("readable")
                .is_some()
        );
    }

    #[rstest]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = SeedDocument::load(&dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(err, SeedError::Read { .. }));
    }

    #[rstest]
    fn unknown_sections_are_rejected() {
        let (_dir, path) =
            write_temp_file("seed.json", br#"{"pharmacies": []}"#).expect("write seed");
        let err = SeedDocument::load(&path).expect_err("unknown field");
        assert!(matches!(err, SeedError::Parse { .. }));
    }
}
