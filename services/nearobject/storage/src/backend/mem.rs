//! In-memory profile persister for tests and ephemeral runs

use crate::{NearObjectProfile, ProfilePersister, StorageError};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Keeps profiles in memory only
#[derive(Debug, Default)]
pub struct MemoryPersister {
    profiles: RwLock<Vec<NearObjectProfile>>,
}

impl MemoryPersister {
    /// Create an empty persister
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfilePersister for MemoryPersister {
    async fn persist(&self, profile: &NearObjectProfile) -> Result<(), StorageError> {
        debug!("Persisting {} profile in memory", profile.scope);
        self.profiles.write().await.push(profile.clone());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<NearObjectProfile>, StorageError> {
        Ok(self.profiles.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProfileScope;

    #[tokio::test]
    async fn test_memory_persister() {
        let persister = MemoryPersister::new();
        assert!(persister.read_all().await.unwrap().is_empty());

        persister
            .persist(&NearObjectProfile::new(ProfileScope::Unicast))
            .await
            .unwrap();
        persister
            .persist(&NearObjectProfile::new(ProfileScope::Multicast))
            .await
            .unwrap();

        let profiles = persister.read_all().await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].scope, ProfileScope::Multicast);
    }
}
