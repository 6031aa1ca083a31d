// ---------------------------------------------------------------------------
// Scan session and its lifecycle
// ---------------------------------------------------------------------------
//
//   queued ──accepted──▶ running ──completed──▶ completed
//                           │
//                           └─────failed──────▶ failed
//
// Findings are only accepted while running. Completed and failed are
// absorbing.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use vulnscan_types::{HostInfo, Port, Protocol, ScanConfig, Vulnerability};

use crate::error::CoreError;

/// Reason recorded when an operator cancels a running scan.
pub const CANCELLED_REASON: &str = "cancelled";

/// Reason recorded when a failure report arrives without one.
const UNSPECIFIED_FAILURE: &str = "execution failed";

/// Opaque, unique session identifier (`scan-<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("scan-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle status of a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ScanStatus {
    Queued,
    Running,
    Completed,
    Failed { reason: String },
}

impl ScanStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    /// Failure reason, if the session failed.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// One notification from the executor about a session.
///
/// Events for the same session are applied in the order they are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// The executor picked up a queued session.
    Accepted,
    /// A port was discovered. Re-reporting the same port/protocol replaces
    /// the earlier entry in place.
    PortFound(Port),
    /// A vulnerability was matched against an already reported port.
    VulnerabilityFound {
        port: u16,
        protocol: Protocol,
        vulnerability: Vulnerability,
    },
    /// Wholesale replacement of the port list.
    PortsReplaced { ports: Vec<Port> },
    HostInfo(HostInfo),
    Completed,
    Failed { reason: String },
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::PortFound(_) => "port_found",
            Self::VulnerabilityFound { .. } => "vulnerability_found",
            Self::PortsReplaced { .. } => "ports_replaced",
            Self::HostInfo(_) => "host_info",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// The record of one scan run: its configuration, accrued findings and
/// status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSession {
    id: SessionId,
    config: ScanConfig,
    status: ScanStatus,
    /// Creation time, milliseconds since the UNIX epoch.
    timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<u64>,
    #[serde(default)]
    ports: Vec<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host_info: Option<HostInfo>,
    /// Bumped on every applied event.
    #[serde(default)]
    version: u64,
}

impl ScanSession {
    pub(crate) fn new(config: ScanConfig, initial: ScanStatus) -> Self {
        Self {
            id: SessionId::generate(),
            config,
            status: initial,
            timestamp: now_ms(),
            finished_at: None,
            ports: Vec::new(),
            host_info: None,
            version: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn target(&self) -> &str {
        self.config.target()
    }

    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn finished_at(&self) -> Option<u64> {
        self.finished_at
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn host_info(&self) -> Option<&HostInfo> {
        self.host_info.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Apply one executor event. On error the session is left untouched.
    pub(crate) fn apply(&mut self, event: ScanEvent) -> Result<(), CoreError> {
        let allowed = match (&self.status, &event) {
            (ScanStatus::Queued, ScanEvent::Accepted) => true,
            (ScanStatus::Running, ScanEvent::Accepted) => false,
            (ScanStatus::Running, _) => true,
            _ => false,
        };
        if !allowed {
            return Err(CoreError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.name(),
                attempted: event.name(),
            });
        }

        match event {
            ScanEvent::Accepted => self.status = ScanStatus::Running,
            ScanEvent::PortFound(port) => {
                check_port_number(&port)?;
                match self.ports.iter_mut().find(|p| p.key() == port.key()) {
                    Some(existing) => {
                        let mut vulnerabilities = std::mem::take(&mut existing.vulnerabilities);
                        *existing = port;
                        merge_vulnerabilities(&mut vulnerabilities, &mut existing.vulnerabilities);
                        existing.vulnerabilities = vulnerabilities;
                    }
                    None => self.ports.push(port),
                }
            }
            ScanEvent::VulnerabilityFound {
                port,
                protocol,
                vulnerability,
            } => {
                let entry = self
                    .ports
                    .iter_mut()
                    .find(|p| p.key() == (port, protocol))
                    .ok_or_else(|| {
                        CoreError::InvalidFinding(format!(
                            "{} has no {port}/{protocol} port to attach {} to",
                            self.id, vulnerability.cve
                        ))
                    })?;
                entry.vulnerabilities.push(vulnerability);
            }
            ScanEvent::PortsReplaced { ports } => {
                ports.iter().try_for_each(check_port_number)?;
                self.ports = ports;
            }
            ScanEvent::HostInfo(info) => {
                self.host_info.get_or_insert_with(HostInfo::default).merge(info);
            }
            ScanEvent::Completed => {
                self.status = ScanStatus::Completed;
                self.finished_at = Some(now_ms());
            }
            ScanEvent::Failed { reason } => {
                let reason = if reason.trim().is_empty() {
                    UNSPECIFIED_FAILURE.to_string()
                } else {
                    reason
                };
                self.status = ScanStatus::Failed { reason };
                self.finished_at = Some(now_ms());
            }
        }

        self.version += 1;
        Ok(())
    }
}

/// Fold a re-reported port's findings into the ones already recorded. A CVE
/// seen before is updated in place; new ones are appended.
fn merge_vulnerabilities(known: &mut Vec<Vulnerability>, reported: &mut Vec<Vulnerability>) {
    for vuln in reported.drain(..) {
        match known.iter_mut().find(|v| v.cve == vuln.cve) {
            Some(existing) => *existing = vuln,
            None => known.push(vuln),
        }
    }
}

fn check_port_number(port: &Port) -> Result<(), CoreError> {
    if port.number == 0 {
        return Err(CoreError::InvalidFinding(
            "port 0 is not a valid port (ports must be 1-65535)".into(),
        ));
    }
    Ok(())
}

/// Get the current timestamp in milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnscan_types::{PortState, Severity};

    fn running_session() -> ScanSession {
        ScanSession::new(ScanConfig::new("10.0.0.5").unwrap(), ScanStatus::Running)
    }

    fn ssh() -> Port {
        Port::new(22, Protocol::Tcp, PortState::Open).with_service("ssh")
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("scan-"));
    }

    #[test]
    fn queued_session_must_be_accepted_first() {
        let mut session =
            ScanSession::new(ScanConfig::new("10.0.0.5").unwrap(), ScanStatus::Queued);
        let err = session.apply(ScanEvent::PortFound(ssh())).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: "queued",
                attempted: "port_found",
                ..
            }
        ));
        assert_eq!(session.version(), 0);

        session.apply(ScanEvent::Accepted).unwrap();
        assert_eq!(session.status(), &ScanStatus::Running);
        session.apply(ScanEvent::PortFound(ssh())).unwrap();
        assert_eq!(session.ports().len(), 1);
    }

    #[test]
    fn accepted_twice_is_rejected() {
        let mut session = running_session();
        assert!(matches!(
            session.apply(ScanEvent::Accepted),
            Err(CoreError::InvalidTransition { from: "running", .. })
        ));
    }

    #[test]
    fn repeated_port_replaces_in_place() {
        let mut session = running_session();
        session.apply(ScanEvent::PortFound(ssh())).unwrap();
        session
            .apply(ScanEvent::PortFound(Port::new(80, Protocol::Tcp, PortState::Open)))
            .unwrap();
        session
            .apply(ScanEvent::PortFound(ssh().with_version("OpenSSH 8.9p1")))
            .unwrap();

        let ports = session.ports();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].number, 22);
        assert_eq!(ports[0].version.as_deref(), Some("OpenSSH 8.9p1"));
        assert_eq!(ports[1].number, 80);
        assert_eq!(session.version(), 3);
    }

    #[test]
    fn re_reported_port_keeps_vulnerabilities() {
        let mut session = running_session();
        session.apply(ScanEvent::PortFound(ssh())).unwrap();
        session
            .apply(ScanEvent::VulnerabilityFound {
                port: 22,
                protocol: Protocol::Tcp,
                vulnerability: Vulnerability::new("CVE-2021-1", Severity::Critical),
            })
            .unwrap();

        // Service detection fills in the version later.
        session
            .apply(ScanEvent::PortFound(ssh().with_version("OpenSSH 8.9p1")))
            .unwrap();
        let port = &session.ports()[0];
        assert_eq!(port.version.as_deref(), Some("OpenSSH 8.9p1"));
        assert_eq!(port.vulnerabilities.len(), 1);
        assert_eq!(port.vulnerabilities[0].severity, Severity::Critical);

        // A report carrying findings updates known CVEs and appends new ones.
        session
            .apply(ScanEvent::PortFound(
                ssh()
                    .with_vulnerability(
                        Vulnerability::new("CVE-2021-1", Severity::High)
                            .with_description("downgraded"),
                    )
                    .with_vulnerability(Vulnerability::new("CVE-2023-38408", Severity::Medium)),
            ))
            .unwrap();
        let vulns = &session.ports()[0].vulnerabilities;
        assert_eq!(vulns.len(), 2);
        assert_eq!(vulns[0].cve, "CVE-2021-1");
        assert_eq!(vulns[0].severity, Severity::High);
        assert_eq!(vulns[1].cve, "CVE-2023-38408");
    }

    #[test]
    fn same_number_different_protocol_is_distinct() {
        let mut session = running_session();
        session
            .apply(ScanEvent::PortFound(Port::new(53, Protocol::Tcp, PortState::Open)))
            .unwrap();
        session
            .apply(ScanEvent::PortFound(Port::new(53, Protocol::Udp, PortState::Open)))
            .unwrap();
        assert_eq!(session.ports().len(), 2);
    }

    #[test]
    fn vulnerability_requires_known_port() {
        let mut session = running_session();
        let event = ScanEvent::VulnerabilityFound {
            port: 22,
            protocol: Protocol::Tcp,
            vulnerability: Vulnerability::new("CVE-2021-1", Severity::Critical),
        };
        assert!(matches!(
            session.apply(event.clone()),
            Err(CoreError::InvalidFinding(_))
        ));

        session.apply(ScanEvent::PortFound(ssh())).unwrap();
        session.apply(event).unwrap();
        assert_eq!(session.ports()[0].vulnerabilities.len(), 1);
    }

    #[test]
    fn port_zero_rejected_without_side_effects() {
        let mut session = running_session();
        session.apply(ScanEvent::PortFound(ssh())).unwrap();
        let bad = ScanEvent::PortsReplaced {
            ports: vec![
                Port::new(443, Protocol::Tcp, PortState::Open),
                Port::new(0, Protocol::Tcp, PortState::Open),
            ],
        };
        assert!(matches!(
            session.apply(bad),
            Err(CoreError::InvalidFinding(_))
        ));
        assert_eq!(session.ports(), &[ssh()]);
        assert_eq!(session.version(), 1);
    }

    #[test]
    fn failure_keeps_partial_ports() {
        let mut session = running_session();
        session.apply(ScanEvent::PortFound(ssh())).unwrap();
        session
            .apply(ScanEvent::Failed {
                reason: "host unreachable".into(),
            })
            .unwrap();
        assert_eq!(session.status().reason(), Some("host unreachable"));
        assert_eq!(session.ports().len(), 1);
        assert!(session.finished_at().is_some());
    }

    #[test]
    fn blank_failure_reason_is_filled_in() {
        let mut session = running_session();
        session
            .apply(ScanEvent::Failed { reason: "  ".into() })
            .unwrap();
        assert_eq!(session.status().reason(), Some(UNSPECIFIED_FAILURE));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let probes = || {
            vec![
                ScanEvent::Accepted,
                ScanEvent::PortFound(ssh()),
                ScanEvent::PortsReplaced { ports: vec![] },
                ScanEvent::HostInfo(HostInfo::default()),
                ScanEvent::Completed,
                ScanEvent::Failed {
                    reason: "late".into(),
                },
            ]
        };

        for terminal in [
            ScanEvent::Completed,
            ScanEvent::Failed {
                reason: "boom".into(),
            },
        ] {
            let mut session = running_session();
            session.apply(ScanEvent::PortFound(ssh())).unwrap();
            session.apply(terminal).unwrap();
            let frozen = session.clone();

            for event in probes() {
                let err = session.apply(event).unwrap_err();
                assert!(matches!(err, CoreError::InvalidTransition { .. }));
            }
            assert_eq!(session, frozen);
        }
    }

    #[test]
    fn host_info_merges() {
        let mut session = running_session();
        session
            .apply(ScanEvent::HostInfo(HostInfo {
                os: Some("Linux 5.x".into()),
                ..Default::default()
            }))
            .unwrap();
        session
            .apply(ScanEvent::HostInfo(HostInfo {
                hostname: Some("db01".into()),
                ..Default::default()
            }))
            .unwrap();
        let info = session.host_info().unwrap();
        assert_eq!(info.os.as_deref(), Some("Linux 5.x"));
        assert_eq!(info.hostname.as_deref(), Some("db01"));
    }

    #[test]
    fn event_json_shape() {
        let event: ScanEvent = serde_json::from_str(
            r#"{"type":"port_found","port":22,"protocol":"tcp","state":"open","service":"ssh"}"#,
        )
        .unwrap();
        assert_eq!(event, ScanEvent::PortFound(ssh()));

        let failed: ScanEvent =
            serde_json::from_str(r#"{"type":"failed","reason":"cancelled"}"#).unwrap();
        assert!(failed.is_terminal());

        let status = serde_json::to_value(ScanStatus::Failed {
            reason: "timeout".into(),
        })
        .unwrap();
        assert_eq!(status, serde_json::json!({"state": "failed", "reason": "timeout"}));
    }
}
