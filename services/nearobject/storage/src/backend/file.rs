//! Line-delimited JSON profile file

use crate::{NearObjectProfile, ProfilePersister, StorageError};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Appends profiles to a file, one JSON object per line
#[derive(Debug)]
pub struct FilePersister {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePersister {
    /// Persist to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Persist to [`crate::default_profile_path`]
    pub fn with_default_path() -> Self {
        Self::new(crate::default_profile_path())
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProfilePersister for FilePersister {
    async fn persist(&self, profile: &NearObjectProfile) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(profile)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        debug!("Persisted {} profile to {}", profile.scope, self.path.display());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<NearObjectProfile>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Profile file {} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut profiles = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!(
                    "Skipping malformed profile at {}:{}: {}",
                    self.path.display(),
                    index + 1,
                    e
                ),
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProfileScope, ProfileSecurity};
    use uwb_fira::StsConfiguration;

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let persister = FilePersister::new(dir.path().join("profiles.nearobject"));

        let secured = NearObjectProfile::new(ProfileScope::Unicast).with_security(ProfileSecurity {
            sts_configuration: StsConfiguration::Static,
            session_key: None,
        });
        persister.persist(&secured).await.unwrap();
        persister
            .persist(&NearObjectProfile::new(ProfileScope::Multicast))
            .await
            .unwrap();

        let reread = FilePersister::new(persister.path());
        let profiles = reread.read_all().await.unwrap();
        assert_eq!(
            profiles,
            vec![secured, NearObjectProfile::new(ProfileScope::Multicast)]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persister = FilePersister::new(dir.path().join("absent"));
        assert!(persister.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.nearobject");
        std::fs::write(
            &path,
            "{\"Scope\":\"Unicast\",\"Security\":null}\nnot json\n\n{\"Scope\":\"Multicast\",\"Security\":null}\n",
        )
        .unwrap();

        let profiles = FilePersister::new(&path).read_all().await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].scope, ProfileScope::Unicast);
    }
}
