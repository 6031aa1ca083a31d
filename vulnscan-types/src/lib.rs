pub mod error;
pub mod host;
pub mod port;
pub mod scan;
pub mod vuln;

pub use error::ConfigError;
pub use host::HostInfo;
pub use port::{Port, PortState, Protocol};
pub use scan::{PortPreset, ScanConfig, ScanConfigBuilder, ScanRequest, ScanType, TimingTemplate};
pub use vuln::{Severity, Vulnerability};
