use std::path::PathBuf;

use clap::Parser;
use vulnscan_types::ScanRequest;

/// Default address for `--api`.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// vulnscan: scan session manager for an external vulnerability scanner
#[derive(Parser, Debug)]
#[command(
    name = "vulnscan",
    version,
    about = "Configure, track, and summarize vulnerability scan sessions"
)]
pub struct Args {
    /// Target host, hostname, or CIDR block
    #[arg(value_name = "TARGET", required_unless_present_any = ["list_profiles", "save_profile", "history", "api"])]
    pub target: Option<String>,

    /// Scan type: quick, intense, comprehensive, stealth, udp
    #[arg(short = 's', long = "scan-type", value_name = "TYPE")]
    pub scan_type: Option<String>,

    /// Port preset: 1-1000, 1-65535, top-100, top-1000, 22,80,443,3389
    #[arg(short = 'p', long = "ports", value_name = "PRESET")]
    pub ports: Option<String>,

    /// Timing template (0-5): 0=paranoid, 1=sneaky, 2=polite, 3=normal, 4=aggressive, 5=insane
    #[arg(short = 'T', value_name = "0-5", value_parser = clap::value_parser!(u8).range(0..=5))]
    pub timing: Option<u8>,

    /// Service/version detection (on by default; `--sV false` disables it)
    #[arg(long = "sV", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub service_version: Option<bool>,

    /// Enable OS detection
    #[arg(short = 'O')]
    pub os_detection: bool,

    /// Run default scripts
    #[arg(short = 'C', long = "sC")]
    pub default_scripts: bool,

    /// Increase verbosity level (use -v, -vv or -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    // --- Profiles ---
    /// Load a named scan profile (built-in or ~/.vulnscan/profiles/<NAME>.toml)
    #[arg(long = "profile", value_name = "NAME")]
    pub profile: Option<String>,

    /// List available scan profiles and exit
    #[arg(long = "list-profiles")]
    pub list_profiles: bool,

    /// Save the current options as a named profile and exit
    #[arg(long = "save-profile", value_name = "NAME")]
    pub save_profile: Option<String>,

    // --- Sessions ---
    /// Drive the scan from a recorded JSON event log instead of a live executor
    #[arg(long = "replay", value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Delay between replayed events in milliseconds
    #[arg(long = "replay-delay", value_name = "MS", default_value = "0")]
    pub replay_delay_ms: u64,

    /// Show the session history and exit
    #[arg(long = "history")]
    pub history: bool,

    /// Session history file (default: ~/.vulnscan/history.json)
    #[arg(long = "history-file", value_name = "FILE")]
    pub history_file: Option<PathBuf>,

    /// New sessions wait in `queued` until the executor accepts them
    #[arg(long = "queued")]
    pub queued: bool,

    // --- API server ---
    /// Start the REST API server
    #[arg(long = "api")]
    pub api: bool,

    /// API server listen address
    #[arg(long = "listen", value_name = "ADDR", default_value = DEFAULT_LISTEN)]
    pub listen: String,
}

impl Args {
    /// The scan request described by the command line, if a target was given.
    /// Unset options are left for the configuration defaults.
    pub fn to_request(&self) -> Option<ScanRequest> {
        let target = self.target.clone()?;
        Some(ScanRequest {
            target,
            scan_type: self.scan_type.clone(),
            port_range: self.ports.clone(),
            timing: self.timing.map(|t| t.to_string()),
            service_detection: self.service_version,
            os_detection: self.os_detection.then_some(true),
            script_scan: self.default_scripts.then_some(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnscan_types::{PortPreset, ScanType, TimingTemplate};

    #[test]
    fn target_required_for_scans() {
        assert!(Args::try_parse_from(["vulnscan"]).is_err());
        assert!(Args::try_parse_from(["vulnscan", "--history"]).is_ok());
        assert!(Args::try_parse_from(["vulnscan", "--list-profiles"]).is_ok());
    }

    #[test]
    fn bare_target_uses_defaults() {
        let args = Args::try_parse_from(["vulnscan", "10.0.0.5"]).unwrap();
        let config = args.to_request().unwrap().into_config().unwrap();
        assert_eq!(config.scan_type(), ScanType::Quick);
        assert_eq!(config.timing(), TimingTemplate::Normal);
        assert!(config.service_detection());
        assert!(!config.os_detection());
    }

    #[test]
    fn flags_map_onto_request() {
        let args = Args::try_parse_from([
            "vulnscan", "-s", "intense", "-p", "top-100", "-T", "2", "--sV", "false", "-O",
            "--sC", "db01.internal",
        ])
        .unwrap();
        let config = args.to_request().unwrap().into_config().unwrap();
        assert_eq!(config.scan_type(), ScanType::Intense);
        assert_eq!(config.port_range(), PortPreset::Top100);
        assert_eq!(config.timing(), TimingTemplate::Polite);
        assert!(!config.service_detection());
        assert!(config.os_detection());
        assert!(config.script_scan());
    }

    #[test]
    fn bare_sv_flag_enables() {
        let args = Args::try_parse_from(["vulnscan", "--sV", "-O", "10.0.0.5"]).unwrap();
        assert_eq!(args.service_version, Some(true));
    }

    #[test]
    fn timing_out_of_range_rejected() {
        assert!(Args::try_parse_from(["vulnscan", "-T", "6", "10.0.0.5"]).is_err());
    }
}
