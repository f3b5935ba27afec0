//! Write-through profile cache

use crate::{NearObjectProfile, ProfilePersister, ProfileScope, StorageError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Caches profiles in memory and writes new ones through to a persister
pub struct ProfileManager {
    persister: Arc<dyn ProfilePersister>,
    profiles: RwLock<Vec<NearObjectProfile>>,
}

impl ProfileManager {
    /// Create a manager with an empty cache
    pub fn new(persister: Arc<dyn ProfilePersister>) -> Self {
        Self {
            persister,
            profiles: RwLock::new(Vec::new()),
        }
    }

    /// Replace the cache with the persisted profiles, returning how many
    /// were loaded
    pub async fn load(&self) -> Result<usize, StorageError> {
        let profiles = self.persister.read_all().await?;
        let count = profiles.len();
        *self.profiles.write().await = profiles;
        info!("Loaded {} near-object profiles", count);
        Ok(count)
    }

    /// Persist `profile` and add it to the cache.
    ///
    /// The cache is only updated once the write succeeds.
    pub async fn add(&self, profile: NearObjectProfile) -> Result<(), StorageError> {
        self.persister.persist(&profile).await?;
        self.profiles.write().await.push(profile);
        Ok(())
    }

    /// Every cached profile
    pub async fn profiles(&self) -> Vec<NearObjectProfile> {
        self.profiles.read().await.clone()
    }

    /// Cached profiles with the given scope
    pub async fn profiles_with_scope(&self, scope: ProfileScope) -> Vec<NearObjectProfile> {
        self.profiles
            .read()
            .await
            .iter()
            .filter(|profile| profile.scope == scope)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for ProfileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilePersister, MemoryPersister};

    #[tokio::test]
    async fn test_write_through() {
        let persister = Arc::new(MemoryPersister::new());
        let manager = ProfileManager::new(persister.clone());
        manager
            .add(NearObjectProfile::new(ProfileScope::Unicast))
            .await
            .unwrap();

        assert_eq!(manager.profiles().await.len(), 1);
        assert_eq!(persister.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.nearobject");
        {
            let manager = ProfileManager::new(Arc::new(FilePersister::new(&path)));
            manager
                .add(NearObjectProfile::new(ProfileScope::Multicast))
                .await
                .unwrap();
            manager
                .add(NearObjectProfile::new(ProfileScope::Unicast))
                .await
                .unwrap();
        }

        let manager = ProfileManager::new(Arc::new(FilePersister::new(&path)));
        assert_eq!(manager.load().await.unwrap(), 2);
        assert_eq!(
            manager.profiles_with_scope(ProfileScope::Unicast).await,
            vec![NearObjectProfile::new(ProfileScope::Unicast)]
        );
    }
}
