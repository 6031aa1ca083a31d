use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which scan profile the executor should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Quick,
    Intense,
    Comprehensive,
    Stealth,
    Udp,
}

impl ScanType {
    pub const ALL: [ScanType; 5] = [
        Self::Quick,
        Self::Intense,
        Self::Comprehensive,
        Self::Stealth,
        Self::Udp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Intense => "intense",
            Self::Comprehensive => "comprehensive",
            Self::Stealth => "stealth",
            Self::Udp => "udp",
        }
    }

    /// nmap-style flags this scan type stands for.
    pub fn engine_flags(&self) -> &'static [&'static str] {
        match self {
            Self::Quick => &["-T4", "-F"],
            Self::Intense => &["-T4", "-A", "-v"],
            Self::Comprehensive => &["-T4", "-A", "-v", "-Pn"],
            Self::Stealth => &["-sS"],
            Self::Udp => &["-sU"],
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::invalid("scan_type", s, &Self::ALL[..]))
    }
}

/// Timing template, matching nmap's -T0 through -T5.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TimingTemplate {
    Paranoid = 0,
    Sneaky = 1,
    Polite = 2,
    #[default]
    Normal = 3,
    Aggressive = 4,
    Insane = 5,
}

impl TimingTemplate {
    pub const ALL: [TimingTemplate; 6] = [
        Self::Paranoid,
        Self::Sneaky,
        Self::Polite,
        Self::Normal,
        Self::Aggressive,
        Self::Insane,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paranoid => "paranoid",
            Self::Sneaky => "sneaky",
            Self::Polite => "polite",
            Self::Normal => "normal",
            Self::Aggressive => "aggressive",
            Self::Insane => "insane",
        }
    }

    /// Numeric aggressiveness level, 0 (paranoid) to 5 (insane).
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn engine_flag(&self) -> String {
        format!("-T{}", self.level())
    }
}

impl TryFrom<u8> for TimingTemplate {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Paranoid),
            1 => Ok(Self::Sneaky),
            2 => Ok(Self::Polite),
            3 => Ok(Self::Normal),
            4 => Ok(Self::Aggressive),
            5 => Ok(Self::Insane),
            _ => Err(ConfigError::invalid(
                "timing",
                &value.to_string(),
                &["0", "1", "2", "3", "4", "5"],
            )),
        }
    }
}

impl fmt::Display for TimingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimingTemplate {
    type Err = ConfigError;

    /// Accepts either the template name (`"aggressive"`) or its level (`"4"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(level) = trimmed.parse::<u8>() {
            return Self::try_from(level);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::invalid("timing", s, &Self::ALL[..]))
    }
}

/// Port selection presets offered to the operator. The core passes them
/// through to the executor without interpreting them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortPreset {
    #[default]
    #[serde(rename = "1-1000")]
    Fast,
    #[serde(rename = "1-65535")]
    All,
    #[serde(rename = "top-100")]
    Top100,
    #[serde(rename = "top-1000")]
    Top1000,
    #[serde(rename = "22,80,443,3389")]
    Common,
}

impl PortPreset {
    pub const ALL: [PortPreset; 5] = [
        Self::Fast,
        Self::All,
        Self::Top100,
        Self::Top1000,
        Self::Common,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "1-1000",
            Self::All => "1-65535",
            Self::Top100 => "top-100",
            Self::Top1000 => "top-1000",
            Self::Common => "22,80,443,3389",
        }
    }

    pub fn engine_flags(&self) -> [String; 2] {
        match self {
            Self::Top100 => ["--top-ports".into(), "100".into()],
            Self::Top1000 => ["--top-ports".into(), "1000".into()],
            other => ["-p".into(), other.as_str().into()],
        }
    }
}

impl fmt::Display for PortPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == trimmed)
            .ok_or_else(|| ConfigError::invalid("port_range", s, &Self::ALL[..]))
    }
}

/// A validated, immutable scan request.
///
/// Built through [`ScanConfig::builder`] or converted from a [`ScanRequest`];
/// both paths guarantee a non-blank target. Deserialization goes through the
/// same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScanRequest")]
pub struct ScanConfig {
    target: String,
    scan_type: ScanType,
    port_range: PortPreset,
    timing: TimingTemplate,
    service_detection: bool,
    os_detection: bool,
    script_scan: bool,
}

impl ScanConfig {
    /// Configuration with every option at its default.
    pub fn new(target: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder(target).build()
    }

    pub fn builder(target: impl Into<String>) -> ScanConfigBuilder {
        ScanConfigBuilder::new(target)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub fn port_range(&self) -> PortPreset {
        self.port_range
    }

    pub fn timing(&self) -> TimingTemplate {
        self.timing
    }

    pub fn service_detection(&self) -> bool {
        self.service_detection
    }

    pub fn os_detection(&self) -> bool {
        self.os_detection
    }

    pub fn script_scan(&self) -> bool {
        self.script_scan
    }

    /// Render the argument vector the executor is expected to run.
    ///
    /// Port selection always comes from the port preset, so the `-F` of a
    /// quick scan is not emitted. A scan type that implies `-T4` keeps it
    /// only while the timing is left at its default. `-A` already covers
    /// `-sV -O -sC`.
    pub fn engine_args(&self) -> Vec<String> {
        let flags = self.scan_type.engine_flags();
        let mut args: Vec<String> = flags
            .iter()
            .filter(|f| !f.starts_with("-T") && **f != "-F")
            .map(|f| f.to_string())
            .collect();

        match flags.iter().find(|f| f.starts_with("-T")) {
            Some(implied) if self.timing == TimingTemplate::default() => {
                args.push(implied.to_string())
            }
            _ => args.push(self.timing.engine_flag()),
        }

        if !flags.contains(&"-A") {
            if self.service_detection {
                args.push("-sV".into());
            }
            if self.os_detection {
                args.push("-O".into());
            }
            if self.script_scan {
                args.push("-sC".into());
            }
        }

        args.extend(self.port_range.engine_flags());
        args.push(self.target.clone());
        args
    }
}

/// Typed builder for [`ScanConfig`]. The only way `build` fails is a blank
/// target.
#[derive(Debug, Clone)]
pub struct ScanConfigBuilder {
    target: String,
    scan_type: ScanType,
    port_range: PortPreset,
    timing: TimingTemplate,
    service_detection: bool,
    os_detection: bool,
    script_scan: bool,
}

impl ScanConfigBuilder {
    fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            scan_type: ScanType::default(),
            port_range: PortPreset::default(),
            timing: TimingTemplate::default(),
            service_detection: true,
            os_detection: false,
            script_scan: false,
        }
    }

    pub fn scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }

    pub fn port_range(mut self, port_range: PortPreset) -> Self {
        self.port_range = port_range;
        self
    }

    pub fn timing(mut self, timing: TimingTemplate) -> Self {
        self.timing = timing;
        self
    }

    pub fn service_detection(mut self, enabled: bool) -> Self {
        self.service_detection = enabled;
        self
    }

    pub fn os_detection(mut self, enabled: bool) -> Self {
        self.os_detection = enabled;
        self
    }

    pub fn script_scan(mut self, enabled: bool) -> Self {
        self.script_scan = enabled;
        self
    }

    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        let target = self.target.trim();
        if target.is_empty() {
            return Err(ConfigError::BlankTarget);
        }
        Ok(ScanConfig {
            target: target.to_string(),
            scan_type: self.scan_type,
            port_range: self.port_range,
            timing: self.timing,
            service_detection: self.service_detection,
            os_detection: self.os_detection,
            script_scan: self.script_scan,
        })
    }
}

/// Loosely-typed scan request as it arrives from an operator surface (JSON
/// body, form, profile). Unset fields take the documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_scan: Option<bool>,
}

impl ScanRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Validate and convert. The target is checked first, then each
    /// enumerated field; the first offending field is reported.
    pub fn into_config(self) -> Result<ScanConfig, ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::BlankTarget);
        }

        let mut builder = ScanConfig::builder(self.target);
        if let Some(ref scan_type) = self.scan_type {
            builder = builder.scan_type(scan_type.parse()?);
        }
        if let Some(ref port_range) = self.port_range {
            builder = builder.port_range(port_range.parse()?);
        }
        if let Some(ref timing) = self.timing {
            builder = builder.timing(timing.parse()?);
        }
        if let Some(enabled) = self.service_detection {
            builder = builder.service_detection(enabled);
        }
        if let Some(enabled) = self.os_detection {
            builder = builder.os_detection(enabled);
        }
        if let Some(enabled) = self.script_scan {
            builder = builder.script_scan(enabled);
        }
        builder.build()
    }
}

impl TryFrom<ScanRequest> for ScanConfig {
    type Error = ConfigError;

    fn try_from(request: ScanRequest) -> Result<Self, Self::Error> {
        request.into_config()
    }
}

impl From<&ScanConfig> for ScanRequest {
    fn from(config: &ScanConfig) -> Self {
        Self {
            target: config.target.clone(),
            scan_type: Some(config.scan_type.to_string()),
            port_range: Some(config.port_range.to_string()),
            timing: Some(config.timing.to_string()),
            service_detection: Some(config.service_detection),
            os_detection: Some(config.os_detection),
            script_scan: Some(config.script_scan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_baseline() {
        let config = ScanConfig::new("10.0.0.5").unwrap();
        assert_eq!(config.target(), "10.0.0.5");
        assert_eq!(config.scan_type(), ScanType::Quick);
        assert_eq!(config.port_range(), PortPreset::Fast);
        assert_eq!(config.port_range().as_str(), "1-1000");
        assert_eq!(config.timing(), TimingTemplate::Normal);
        assert!(config.service_detection());
        assert!(!config.os_detection());
        assert!(!config.script_scan());
    }

    #[test]
    fn blank_target_rejected() {
        for target in ["", " ", "\t\n", "   \r\n  "] {
            assert_eq!(
                ScanConfig::new(target).unwrap_err(),
                ConfigError::BlankTarget,
                "target {target:?} should be rejected"
            );
        }
    }

    #[test]
    fn blank_target_wins_over_other_invalid_fields() {
        let request = ScanRequest {
            target: "  ".into(),
            scan_type: Some("ultra".into()),
            timing: Some("9".into()),
            ..Default::default()
        };
        assert_eq!(request.into_config().unwrap_err(), ConfigError::BlankTarget);
    }

    #[test]
    fn target_is_trimmed() {
        let config = ScanConfig::new("  example.com \n").unwrap();
        assert_eq!(config.target(), "example.com");
    }

    #[test]
    fn request_names_offending_field() {
        let cases = [
            (
                ScanRequest {
                    scan_type: Some("ping".into()),
                    ..ScanRequest::new("10.0.0.1")
                },
                "scan_type",
            ),
            (
                ScanRequest {
                    port_range: Some("1-80".into()),
                    ..ScanRequest::new("10.0.0.1")
                },
                "port_range",
            ),
            (
                ScanRequest {
                    timing: Some("ludicrous".into()),
                    ..ScanRequest::new("10.0.0.1")
                },
                "timing",
            ),
            (
                ScanRequest {
                    timing: Some("6".into()),
                    ..ScanRequest::new("10.0.0.1")
                },
                "timing",
            ),
        ];
        for (request, field) in cases {
            let err = request.into_config().unwrap_err();
            assert_eq!(err.field(), field, "{err}");
        }
    }

    #[test]
    fn request_full_conversion() {
        let request = ScanRequest {
            target: "192.168.1.0/24".into(),
            scan_type: Some("Stealth".into()),
            port_range: Some("top-100".into()),
            timing: Some("2".into()),
            service_detection: Some(false),
            os_detection: Some(true),
            script_scan: Some(true),
        };
        let config = request.into_config().unwrap();
        assert_eq!(config.scan_type(), ScanType::Stealth);
        assert_eq!(config.port_range(), PortPreset::Top100);
        assert_eq!(config.timing(), TimingTemplate::Polite);
        assert!(!config.service_detection());
        assert!(config.os_detection());
        assert!(config.script_scan());

        // And back again
        let back = ScanRequest::from(&config).into_config().unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn timing_levels() {
        for (level, template) in TimingTemplate::ALL.iter().enumerate() {
            assert_eq!(template.level() as usize, level);
            assert_eq!(TimingTemplate::try_from(level as u8).unwrap(), *template);
        }
        assert!(TimingTemplate::Paranoid < TimingTemplate::Insane);
        assert!(TimingTemplate::try_from(6).is_err());
    }

    #[test]
    fn config_serde_uses_lowercase_names() {
        let config = ScanConfig::builder("10.0.0.5")
            .scan_type(ScanType::Udp)
            .port_range(PortPreset::Common)
            .timing(TimingTemplate::Aggressive)
            .build()
            .unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["scan_type"], "udp");
        assert_eq!(json["port_range"], "22,80,443,3389");
        assert_eq!(json["timing"], "aggressive");

        let parsed: ScanConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn config_deserialize_validates_target() {
        let err = serde_json::from_str::<ScanConfig>(r#"{"target":"   "}"#).unwrap_err();
        assert!(err.to_string().contains("target must not be blank"));

        let minimal: ScanConfig = serde_json::from_str(r#"{"target":"host.local"}"#).unwrap();
        assert_eq!(minimal, ScanConfig::new("host.local").unwrap());
    }

    #[test]
    fn engine_args_quick_default() {
        let config = ScanConfig::new("10.0.0.5").unwrap();
        assert_eq!(
            config.engine_args(),
            vec!["-T4", "-sV", "-p", "1-1000", "10.0.0.5"]
        );
    }

    #[test]
    fn engine_args_ports_come_from_preset_only() {
        for scan_type in ScanType::ALL {
            for preset in PortPreset::ALL {
                let config = ScanConfig::builder("10.0.0.5")
                    .scan_type(scan_type)
                    .port_range(preset)
                    .build()
                    .unwrap();
                let args = config.engine_args();
                assert!(!args.contains(&"-F".to_string()), "{scan_type}: {args:?}");
                let port_flags = args
                    .iter()
                    .filter(|a| *a == "-p" || *a == "--top-ports")
                    .count();
                assert_eq!(port_flags, 1, "{scan_type}/{preset}: {args:?}");
            }
        }
    }

    #[test]
    fn engine_args_explicit_timing_overrides_implied() {
        let config = ScanConfig::builder("10.0.0.5")
            .scan_type(ScanType::Intense)
            .timing(TimingTemplate::Sneaky)
            .port_range(PortPreset::Top1000)
            .os_detection(true)
            .build()
            .unwrap();
        assert_eq!(
            config.engine_args(),
            vec!["-A", "-v", "-T1", "--top-ports", "1000", "10.0.0.5"]
        );
    }

    #[test]
    fn engine_args_stealth_with_toggles() {
        let config = ScanConfig::builder("scanme.example")
            .scan_type(ScanType::Stealth)
            .service_detection(false)
            .os_detection(true)
            .script_scan(true)
            .port_range(PortPreset::All)
            .build()
            .unwrap();
        assert_eq!(
            config.engine_args(),
            vec!["-sS", "-T3", "-O", "-sC", "-p", "1-65535", "scanme.example"]
        );
    }
}
