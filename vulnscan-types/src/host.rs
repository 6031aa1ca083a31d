use serde::{Deserialize, Serialize};

/// Host details reported once OS/service detection has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl HostInfo {
    pub fn is_empty(&self) -> bool {
        self.os.is_none() && self.hostname.is_none() && self.mac_address.is_none()
    }

    /// Fold a later detection report into this one. Fields present in `other`
    /// win; fields it leaves out keep their earlier value.
    pub fn merge(&mut self, other: HostInfo) {
        if other.os.is_some() {
            self.os = other.os;
        }
        if other.hostname.is_some() {
            self.hostname = other.hostname;
        }
        if other.mac_address.is_some() {
            self.mac_address = other.mac_address;
        }
    }
}
