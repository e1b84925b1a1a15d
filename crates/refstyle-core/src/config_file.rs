use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rate_limit::HostRateLimiters;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub analysis: Option<AnalysisConfig>,
    pub network: Option<NetworkConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Classification threshold below which an entry is "Unknown".
    pub min_confidence: Option<f64>,
    /// Extra reference section header words (added to the built-in list).
    pub extra_headers: Option<Vec<String>>,
    /// Extra phrases marking non-reference text in the reference list.
    pub extra_noise_phrases: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub verify_links: Option<bool>,
    pub timeout_secs: Option<u64>,
    /// Requests per minute by host name, e.g. `"doi.org" = 30`.
    pub requests_per_minute: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// `text`, `markdown` or `json`.
    pub format: Option<String>,
    pub color: Option<bool>,
}

impl ConfigFile {
    pub fn min_confidence(&self) -> Option<f64> {
        self.analysis.as_ref().and_then(|a| a.min_confidence)
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.network.as_ref().and_then(|n| n.timeout_secs)
    }

    pub fn verify_links(&self) -> Option<bool> {
        self.network.as_ref().and_then(|n| n.verify_links)
    }

    pub fn report_format(&self) -> Option<&str> {
        self.report.as_ref().and_then(|r| r.format.as_deref())
    }

    pub fn color(&self) -> Option<bool> {
        self.report.as_ref().and_then(|r| r.color)
    }

    /// Host limiters with any per-host budgets from the config applied.
    pub fn rate_limiters(&self) -> HostRateLimiters {
        let mut limiters = HostRateLimiters::new();
        if let Some(budgets) = self
            .network
            .as_ref()
            .and_then(|n| n.requests_per_minute.as_ref())
        {
            for (host, per_minute) in budgets {
                limiters = if host == "default" {
                    limiters.with_default_budget(*per_minute)
                } else {
                    limiters.with_budget(host, *per_minute)
                };
            }
        }
        limiters
    }
}

/// Platform config directory path: `<config_dir>/refstyle/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("refstyle").join("config.toml"))
}

/// Load config by cascading CWD `.refstyle.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".refstyle.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unparseable config: {}", e);
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_analysis = base.analysis.unwrap_or_default();
    let overlay_analysis = overlay.analysis.unwrap_or_default();
    let base_network = base.network.unwrap_or_default();
    let overlay_network = overlay.network.unwrap_or_default();
    let base_report = base.report.unwrap_or_default();
    let overlay_report = overlay.report.unwrap_or_default();

    ConfigFile {
        analysis: Some(AnalysisConfig {
            min_confidence: overlay_analysis
                .min_confidence
                .or(base_analysis.min_confidence),
            extra_headers: overlay_analysis
                .extra_headers
                .or(base_analysis.extra_headers),
            extra_noise_phrases: overlay_analysis
                .extra_noise_phrases
                .or(base_analysis.extra_noise_phrases),
        }),
        network: Some(NetworkConfig {
            verify_links: overlay_network.verify_links.or(base_network.verify_links),
            timeout_secs: overlay_network.timeout_secs.or(base_network.timeout_secs),
            requests_per_minute: match (
                base_network.requests_per_minute,
                overlay_network.requests_per_minute,
            ) {
                (Some(mut b), Some(o)) => {
                    b.extend(o);
                    Some(b)
                }
                (b, o) => o.or(b),
            },
        }),
        report: Some(ReportConfig {
            format: overlay_report.format.or(base_report.format),
            color: overlay_report.color.or(base_report.color),
        }),
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

/// Save the config to `path`, creating parent directories.
pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}
