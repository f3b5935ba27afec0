//! Near-object profile storage with pluggable backends.
//!
//! A profile records how to range with a class of peers: whether sessions are
//! unicast or multicast, and which STS security to use. Profiles are
//! persisted one JSON object per line:
//!
//! ```json
//! {"Scope":"Unicast","Security":{"StsConfiguration":"Static","SessionKey":null}}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod manager;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uwb_fira::StsConfiguration;

/// File name of the default profile store
pub const DEFAULT_PROFILE_FILE_NAME: &str = "profiles.nearobject";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which sessions a profile applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProfileScope {
    /// Not specified
    #[default]
    Unknown,
    /// One-to-one sessions
    Unicast,
    /// One-to-many sessions
    Multicast,
}

impl fmt::Display for ProfileScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileScope::Unknown => "Unknown",
            ProfileScope::Unicast => "Unicast",
            ProfileScope::Multicast => "Multicast",
        };
        f.write_str(name)
    }
}

/// STS security settings of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSecurity {
    /// STS mode
    #[serde(rename = "StsConfiguration")]
    pub sts_configuration: StsConfiguration,
    /// Session key, serialized as lowercase hex
    #[serde(rename = "SessionKey", with = "hex_bytes", default)]
    pub session_key: Option<Vec<u8>>,
}

/// A persisted near-object profile
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NearObjectProfile {
    /// Session scope
    #[serde(rename = "Scope", default)]
    pub scope: ProfileScope,
    /// Security settings, absent for unsecured ranging
    #[serde(rename = "Security", default)]
    pub security: Option<ProfileSecurity>,
}

impl NearObjectProfile {
    /// Profile with the given scope and no security
    pub fn new(scope: ProfileScope) -> Self {
        Self {
            scope,
            security: None,
        }
    }

    /// Attach security settings
    pub fn with_security(mut self, security: ProfileSecurity) -> Self {
        self.security = Some(security);
        self
    }
}

/// Durable store of profiles
#[async_trait]
pub trait ProfilePersister: Send + Sync {
    /// Persist one profile
    async fn persist(&self, profile: &NearObjectProfile) -> Result<(), StorageError>;

    /// Read every persisted profile
    async fn read_all(&self) -> Result<Vec<NearObjectProfile>, StorageError>;
}

/// `<temp dir>/profiles.nearobject`
pub fn default_profile_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_PROFILE_FILE_NAME)
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Write;

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    let _ = write!(hex, "{:02x}", b);
                }
                serializer.serialize_some(&hex)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let Some(hex) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if hex.len() % 2 != 0 || !hex.is_ascii() {
            return Err(de::Error::custom(format!("invalid hex key '{}'", hex)));
        }
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid hex key '{}'", hex)))
    }
}

// Re-export backend implementations
pub use backend::file::FilePersister;
pub use backend::mem::MemoryPersister;
pub use manager::ProfileManager;
