// ---------------------------------------------------------------------------
// Plain-text rendering of sessions and history
// ---------------------------------------------------------------------------

use std::fmt::Write;

use vulnscan_core::{ScanSession, SessionSummary, aggregate, vulnerabilities_by_severity};
use vulnscan_types::Severity;

/// Full report for one session: ports, host details, findings and totals.
pub fn render_session(session: &ScanSession) -> String {
    let mut out = String::new();
    let config = session.config();

    let _ = writeln!(out, "Scan {} [{}]", session.id(), session.status());
    let _ = writeln!(
        out,
        "Target: {}  Type: {}  Args: {}",
        session.target(),
        config.scan_type(),
        config.engine_args().join(" ")
    );

    if let Some(info) = session.host_info().filter(|i| !i.is_empty()) {
        let mut parts = Vec::new();
        if let Some(ref os) = info.os {
            parts.push(format!("os={os}"));
        }
        if let Some(ref hostname) = info.hostname {
            parts.push(format!("hostname={hostname}"));
        }
        if let Some(ref mac) = info.mac_address {
            parts.push(format!("mac={mac}"));
        }
        let _ = writeln!(out, "Host: {}", parts.join(" "));
    }

    if session.ports().is_empty() {
        let _ = writeln!(out, "\nNo ports reported.");
    } else {
        let _ = writeln!(out, "\n{:<10} {:<9} {:<14} VERSION", "PORT", "STATE", "SERVICE");
        for port in session.ports() {
            let _ = writeln!(
                out,
                "{:<10} {:<9} {:<14} {}",
                format!("{}/{}", port.number, port.protocol),
                port.state.to_string(),
                port.service_name(),
                port.version.as_deref().unwrap_or("")
            );
        }
    }

    let vulns = vulnerabilities_by_severity(session);
    if !vulns.is_empty() {
        let _ = writeln!(out, "\nVulnerabilities (most severe first):");
        for (port, vuln) in vulns {
            let _ = write!(out, "  [{:<8}] {} on port {port}", vuln.severity.as_str(), vuln.cve);
            if !vuln.description.is_empty() {
                let _ = write!(out, ": {}", vuln.description);
            }
            out.push('\n');
        }
    }

    let stats = aggregate(session);
    let by_level = Severity::ALL
        .iter()
        .rev()
        .map(|s| format!("{s} {}", stats.count(*s)))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(
        out,
        "\nSummary: {} open ports, {} vulnerabilities ({by_level})",
        stats.open_ports, stats.total_vulns
    );
    out
}

/// One line per session, oldest first.
pub fn render_history(summaries: &[SessionSummary]) -> String {
    if summaries.is_empty() {
        return "No scan history found.\n".to_string();
    }

    let mut out = format!(
        "{:<42} {:<20} {:<14} {:<10} {:<6} VULNS (C/H/M/L)\n",
        "SCAN ID", "TARGET", "TYPE", "STATUS", "OPEN"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<42} {:<20} {:<14} {:<10} {:<6} {} ({}/{}/{}/{})",
            s.id.as_str(),
            s.target,
            s.scan_type.as_str(),
            s.status.name(),
            s.stats.open_ports,
            s.stats.total_vulns,
            s.stats.critical,
            s.stats.high,
            s.stats.medium,
            s.stats.low
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnscan_core::{ScanEvent, SessionStore};
    use vulnscan_types::{HostInfo, Port, PortState, Protocol, ScanConfig, Vulnerability};

    fn finished_session() -> (SessionStore, ScanSession) {
        let store = SessionStore::new();
        let id = store.create(ScanConfig::new("10.0.0.5").unwrap());
        store
            .update(
                &id,
                ScanEvent::PortFound(
                    Port::new(22, Protocol::Tcp, PortState::Open)
                        .with_service("ssh")
                        .with_version("OpenSSH 8.9p1")
                        .with_vulnerability(
                            Vulnerability::new("CVE-2023-38408", Severity::Critical)
                                .with_description("ssh-agent remote code execution"),
                        ),
                ),
            )
            .unwrap();
        store
            .update(
                &id,
                ScanEvent::HostInfo(HostInfo {
                    os: Some("Linux 5.x".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        let session = store.update(&id, ScanEvent::Completed).unwrap();
        (store, session)
    }

    #[test]
    fn session_report_lists_findings() {
        let (_, session) = finished_session();
        let report = render_session(&session);
        assert!(report.contains("[completed]"));
        assert!(report.contains("Host: os=Linux 5.x"));
        assert!(report.contains("22/tcp"));
        assert!(report.contains("OpenSSH 8.9p1"));
        assert!(report.contains("CVE-2023-38408 on port 22: ssh-agent remote code execution"));
        assert!(report.contains(
            "Summary: 1 open ports, 1 vulnerabilities (critical 1, high 0, medium 0, low 0)"
        ));
    }

    #[test]
    fn history_has_one_row_per_session() {
        let (store, session) = finished_session();
        store.create(ScanConfig::new("10.0.0.6").unwrap());
        let table = render_history(&store.summaries());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with(session.id().as_str()));
        assert!(lines[1].contains("completed"));
        assert!(lines[2].contains("running"));
    }

    #[test]
    fn empty_history() {
        assert_eq!(render_history(&[]), "No scan history found.\n");
    }
}
