//! Device identities and their equality rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which concrete kind of device an identity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// A radio exposed by the host OS
    Host,
    /// An in-process simulated radio
    Simulator,
}

/// Identity of a UWB device.
///
/// Identities of different kinds never compare equal. Within a kind, the
/// kind's own rule applies: host interface paths compare case-insensitively,
/// simulator instances by number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceIdentity {
    /// OS device interface
    Host {
        /// Device interface path, e.g. `/dev/uwb0`
        interface_path: String,
    },
    /// Simulated device
    Simulator {
        /// Simulator instance number
        instance_id: u32,
    },
}

impl DeviceIdentity {
    /// Identity of a host device interface
    pub fn host(interface_path: impl Into<String>) -> Self {
        DeviceIdentity::Host {
            interface_path: interface_path.into(),
        }
    }

    /// Identity of a simulator instance
    pub fn simulator(instance_id: u32) -> Self {
        DeviceIdentity::Simulator { instance_id }
    }

    /// The identity's kind
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceIdentity::Host { .. } => DeviceKind::Host,
            DeviceIdentity::Simulator { .. } => DeviceKind::Simulator,
        }
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                DeviceIdentity::Host { interface_path: a },
                DeviceIdentity::Host { interface_path: b },
            ) => a.eq_ignore_ascii_case(b),
            (
                DeviceIdentity::Simulator { instance_id: a },
                DeviceIdentity::Simulator { instance_id: b },
            ) => a == b,
            _ => false,
        }
    }
}

impl Eq for DeviceIdentity {}

impl Hash for DeviceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            DeviceIdentity::Host { interface_path } => {
                for b in interface_path.bytes() {
                    state.write_u8(b.to_ascii_lowercase());
                }
            }
            DeviceIdentity::Simulator { instance_id } => instance_id.hash(state),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceIdentity::Host { interface_path } => write!(f, "host:{}", interface_path),
            DeviceIdentity::Simulator { instance_id } => write!(f, "simulator:{}", instance_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_kind_same_id_equal() {
        assert_eq!(DeviceIdentity::simulator(3), DeviceIdentity::simulator(3));
        assert_ne!(DeviceIdentity::simulator(3), DeviceIdentity::simulator(4));
        assert_eq!(
            DeviceIdentity::host("/dev/UWB0"),
            DeviceIdentity::host("/dev/uwb0")
        );
    }

    #[test]
    fn test_different_kinds_never_equal() {
        assert_ne!(DeviceIdentity::host("0"), DeviceIdentity::simulator(0));
        assert_ne!(DeviceIdentity::simulator(0), DeviceIdentity::host("0"));
    }

    #[test]
    fn test_hash_consistent_with_equality() {
        let mut set = HashSet::new();
        set.insert(DeviceIdentity::host("/dev/UWB0"));
        assert!(set.contains(&DeviceIdentity::host("/dev/uwb0")));
        assert!(!set.contains(&DeviceIdentity::simulator(0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(DeviceIdentity::simulator(7).to_string(), "simulator:7");
        assert_eq!(DeviceIdentity::host("/dev/uwb1").to_string(), "host:/dev/uwb1");
    }
}
