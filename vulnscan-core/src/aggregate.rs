// ---------------------------------------------------------------------------
// Result aggregation
// ---------------------------------------------------------------------------
//
// Everything here is derived from a session's ports on demand and never
// stored on the session, so the numbers cannot drift from the data.

use std::collections::HashMap;

use serde::Serialize;
use vulnscan_types::{Severity, Vulnerability};

use crate::session::{ScanSession, SessionId};

/// Summary numbers for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub open_ports: usize,
    pub total_vulns: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SessionStats {
    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Compute all counters in one pass over the ports.
pub fn aggregate(session: &ScanSession) -> SessionStats {
    let mut stats = SessionStats::default();
    for port in session.ports() {
        if port.is_open() {
            stats.open_ports += 1;
        }
        for vuln in &port.vulnerabilities {
            stats.total_vulns += 1;
            stats.bump(vuln.severity);
        }
    }
    stats
}

/// Sum of vulnerability counts across all ports, open or not.
pub fn total_vulnerabilities(session: &ScanSession) -> usize {
    session.ports().iter().map(|p| p.vulnerabilities.len()).sum()
}

pub fn count_by_severity(session: &ScanSession, severity: Severity) -> usize {
    session
        .ports()
        .iter()
        .flat_map(|p| &p.vulnerabilities)
        .filter(|v| v.severity == severity)
        .count()
}

pub fn open_port_count(session: &ScanSession) -> usize {
    session.ports().iter().filter(|p| p.is_open()).count()
}

/// Most severe level found, `None` if the session has no vulnerabilities.
pub fn highest_severity(session: &ScanSession) -> Option<Severity> {
    session
        .ports()
        .iter()
        .flat_map(|p| &p.vulnerabilities)
        .map(|v| v.severity)
        .max()
}

/// Every vulnerability with its port number, most severe first. Findings of
/// equal severity keep their discovery order.
pub fn vulnerabilities_by_severity(session: &ScanSession) -> Vec<(u16, &Vulnerability)> {
    let mut vulns: Vec<(u16, &Vulnerability)> = session
        .ports()
        .iter()
        .flat_map(|p| p.vulnerabilities.iter().map(move |v| (p.number, v)))
        .collect();
    vulns.sort_by(|a, b| b.1.severity.cmp(&a.1.severity));
    vulns
}

/// Memoizes [`aggregate`] per session, keyed on the session version so any
/// applied event invalidates the entry.
#[derive(Debug, Default)]
pub struct StatsCache {
    entries: HashMap<SessionId, (u64, SessionStats)>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, session: &ScanSession) -> SessionStats {
        if let Some((version, stats)) = self.entries.get(session.id())
            && *version == session.version()
        {
            return *stats;
        }
        let stats = aggregate(session);
        self.entries
            .insert(session.id().clone(), (session.version(), stats));
        stats
    }

    pub fn invalidate(&mut self, id: &SessionId) {
        self.entries.remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
