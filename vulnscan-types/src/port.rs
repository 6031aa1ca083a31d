use crate::vuln::Vulnerability;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of a scanned port as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
            PortState::Filtered => write!(f, "filtered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// A single port finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "port")]
    pub number: u16,
    pub protocol: Protocol,
    pub state: PortState,
    /// Service name; `None` when the executor could not identify it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Product/version banner (populated by service detection).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl Port {
    pub fn new(number: u16, protocol: Protocol, state: PortState) -> Self {
        Self {
            number,
            protocol,
            state,
            service: None,
            version: None,
            vulnerabilities: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_vulnerability(mut self, vuln: Vulnerability) -> Self {
        self.vulnerabilities.push(vuln);
        self
    }

    /// Identity of a port within one host: number plus protocol.
    pub fn key(&self) -> (u16, Protocol) {
        (self.number, self.protocol)
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }

    /// Service name for display, `"unknown"` when undetected.
    pub fn service_name(&self) -> &str {
        self.service.as_deref().unwrap_or("unknown")
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {}",
            self.number,
            self.protocol,
            self.state,
            self.service_name()
        )?;
        if let Some(ref version) = self.version {
            write!(f, " {version}")?;
        }
        Ok(())
    }
}
