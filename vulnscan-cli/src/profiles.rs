use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use clap::parser::ValueSource;
use serde::{Deserialize, Serialize};

use crate::args::Args;

/// A scan profile that can be serialized to/from TOML.
///
/// All fields are optional; `None` means "use the CLI default."
/// When applying a profile, only `Some` values are applied, and only
/// if the user did not explicitly provide that flag on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScanProfile {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<u8>,

    // --- Detection ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_detection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_scripts: Option<bool>,
}

// ---------------------------------------------------------------------------
// Built-in profiles
// ---------------------------------------------------------------------------

/// Names of built-in profiles that cannot be overwritten by users.
const BUILTIN_NAMES: &[&str] = &["quick", "web-audit", "full-audit", "stealth", "udp-sweep"];

fn builtin_profiles() -> Vec<(&'static str, ScanProfile)> {
    vec![
        (
            "quick",
            ScanProfile {
                description: Some("Fast scan of the top 100 ports".into()),
                scan_type: Some("quick".into()),
                ports: Some("top-100".into()),
                timing: Some(4),
                ..Default::default()
            },
        ),
        (
            "web-audit",
            ScanProfile {
                description: Some("Common service ports with version detection and scripts".into()),
                scan_type: Some("intense".into()),
                ports: Some("22,80,443,3389".into()),
                service_version: Some(true),
                default_scripts: Some(true),
                ..Default::default()
            },
        ),
        (
            "full-audit",
            ScanProfile {
                description: Some(
                    "Comprehensive audit: all 65535 ports, service+OS detection, scripts".into(),
                ),
                scan_type: Some("comprehensive".into()),
                ports: Some("1-65535".into()),
                timing: Some(4),
                service_version: Some(true),
                os_detection: Some(true),
                default_scripts: Some(true),
            },
        ),
        (
            "stealth",
            ScanProfile {
                description: Some("Low-and-slow SYN scan without version probes".into()),
                scan_type: Some("stealth".into()),
                timing: Some(1),
                service_version: Some(false),
                ..Default::default()
            },
        ),
        (
            "udp-sweep",
            ScanProfile {
                description: Some("UDP scan of the top 1000 ports".into()),
                scan_type: Some("udp".into()),
                ports: Some("top-1000".into()),
                timing: Some(4),
                ..Default::default()
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Profile directory
// ---------------------------------------------------------------------------

fn profiles_dir() -> PathBuf {
    crate::vulnscan_home().join("profiles")
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a profile name is safe (no path traversal).
fn validate_profile_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        bail!(
            "invalid profile name: {name:?} (only alphanumeric, hyphens, underscores, and dots allowed)"
        );
    }
    if name.contains("..") {
        bail!("invalid profile name: {name:?} (contains '..')");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load a profile by name. Checks built-in profiles first, then user TOML files.
pub fn load_profile(name: &str) -> Result<ScanProfile> {
    load_profile_from(&profiles_dir(), name)
}

fn load_profile_from(dir: &Path, name: &str) -> Result<ScanProfile> {
    validate_profile_name(name)?;

    if let Some((_, profile)) = builtin_profiles().into_iter().find(|(n, _)| *n == name) {
        return Ok(profile);
    }

    let path = dir.join(format!("{name}.toml"));
    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read profile '{}'", path.display()))?;
        let profile: ScanProfile = toml::from_str(&content)
            .with_context(|| format!("failed to parse profile '{}'", path.display()))?;
        return Ok(profile);
    }

    bail!("unknown profile '{name}'. Use --list-profiles to see available profiles.");
}

/// Save the current CLI arguments as a named user profile.
pub fn save_profile(name: &str, profile: &ScanProfile) -> Result<PathBuf> {
    save_profile_in(&profiles_dir(), name, profile)
}

fn save_profile_in(dir: &Path, name: &str, profile: &ScanProfile) -> Result<PathBuf> {
    validate_profile_name(name)?;

    if BUILTIN_NAMES.contains(&name) {
        bail!("cannot overwrite built-in profile '{name}'");
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create profiles directory: {}", dir.display()))?;

    let path = dir.join(format!("{name}.toml"));
    let content = toml::to_string_pretty(profile).context("failed to serialize profile to TOML")?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write profile to {}", path.display()))?;

    Ok(path)
}

/// List all available profiles: built-in + user-defined.
/// Returns (name, profile, is_builtin) tuples.
pub fn list_all_profiles() -> Vec<(String, ScanProfile, bool)> {
    list_profiles_in(&profiles_dir())
}

fn list_profiles_in(dir: &Path) -> Vec<(String, ScanProfile, bool)> {
    let mut profiles: Vec<_> = builtin_profiles()
        .into_iter()
        .map(|(name, profile)| (name.to_string(), profile, true))
        .collect();

    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut user = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "toml") {
                continue;
            }
            let name = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
            // Skip if it shadows a built-in
            if BUILTIN_NAMES.contains(&name.as_str()) {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|c| toml::from_str::<ScanProfile>(&c).map_err(Into::into))
            {
                Ok(profile) => user.push((name, profile, false)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable profile")
                }
            }
        }
        user.sort_by(|a, b| a.0.cmp(&b.0));
        profiles.extend(user);
    }

    profiles
}

/// Print formatted profile list to stdout.
pub fn show_profiles() {
    println!("Available scan profiles:\n");
    for (name, profile, is_builtin) in &list_all_profiles() {
        let tag = if *is_builtin { "[built-in]" } else { "[user]" };
        let desc = profile.description.as_deref().unwrap_or("(no description)");
        println!("  {name:<20} {tag:<12} {desc}");
    }

    println!(
        "\nUsage: vulnscan --profile <NAME> <TARGET>\n\
         Save:  vulnscan --save-profile <NAME> [options] <TARGET>"
    );
}

/// Apply a profile's settings to an `Args` struct.
///
/// Only applies fields where the profile has a `Some` value AND the user
/// did not explicitly provide that flag on the command line.
pub fn apply_profile_with_matches(profile: &ScanProfile, args: &mut Args, matches: &ArgMatches) {
    let not_set = |id: &str| -> bool {
        matches
            .value_source(id)
            .is_none_or(|s| s != ValueSource::CommandLine)
    };

    if let Some(ref v) = profile.scan_type
        && not_set("scan_type")
    {
        args.scan_type = Some(v.clone());
    }
    if let Some(ref v) = profile.ports
        && not_set("ports")
    {
        args.ports = Some(v.clone());
    }
    if let Some(v) = profile.timing
        && not_set("timing")
    {
        args.timing = Some(v);
    }
    if let Some(v) = profile.service_version
        && not_set("service_version")
    {
        args.service_version = Some(v);
    }
    if let Some(v) = profile.os_detection
        && not_set("os_detection")
    {
        args.os_detection = v;
    }
    if let Some(v) = profile.default_scripts
        && not_set("default_scripts")
    {
        args.default_scripts = v;
    }
}

/// Capture the scan options on the command line as a profile.
pub fn args_to_profile(args: &Args) -> ScanProfile {
    ScanProfile {
        description: None,
        scan_type: args.scan_type.clone(),
        ports: args.ports.clone(),
        timing: args.timing,
        service_version: args.service_version,
        os_detection: Some(args.os_detection),
        default_scripts: Some(args.default_scripts),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
