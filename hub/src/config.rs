use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Engine configuration: correlation thresholds, signature patterns, and
/// detector tuning. Defaults mirror the shipped rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub brute_force: BruteForceConfig,
    pub privilege_escalation: PrivilegeEscalationConfig,
    pub lateral_movement: LateralMovementConfig,
    pub exfiltration: ExfiltrationConfig,
    pub network: NetworkConfig,
    pub malware: MalwareConfig,
    /// Alerts whose description exceeds this byte length are skipped by the
    /// correlation matchers and counted as rule errors.
    pub max_match_len: usize,
    /// Reject incident creation without a title instead of defaulting it.
    pub strict_incident_validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteForceConfig {
    pub failed_attempts: usize,
    pub time_window_secs: i64,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeEscalationConfig {
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralMovementConfig {
    pub connection_threshold: usize,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExfiltrationConfig {
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub detection_threshold: f64,
    pub medium_score: f64,
    pub high_score: f64,
    pub critical_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalwareConfig {
    pub known_bad_hashes: Vec<String>,
    pub suspicious_extension_pattern: String,
    pub entropy_threshold: f64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            brute_force: BruteForceConfig {
                failed_attempts: 5,
                time_window_secs: 300,
                signature: r"(?i)(failed.*auth|auth.*failed)".to_string(),
            },
            privilege_escalation: PrivilegeEscalationConfig {
                keywords: vec![
                    "sudo".to_string(),
                    "admin".to_string(),
                    "root".to_string(),
                ],
            },
            lateral_movement: LateralMovementConfig {
                connection_threshold: 3,
                signature: r"(?i)(connection|network)".to_string(),
            },
            exfiltration: ExfiltrationConfig {
                signature: r"(?i)(transfer|download)".to_string(),
            },
            network: NetworkConfig {
                detection_threshold: 0.7,
                medium_score: 0.6,
                high_score: 0.75,
                critical_score: 0.9,
            },
            malware: MalwareConfig {
                known_bad_hashes: Vec::new(),
                suspicious_extension_pattern: r"(?i)\.(exe|dll|scr|ps1|vbs|bat|cmd)$".to_string(),
                entropy_threshold: 7.5,
            },
            max_match_len: 64 * 1024,
            strict_incident_validation: false,
        }
    }
}

impl HubConfig {
    /// Loads configuration from a JSON file, falling back to defaults when
    /// the file is absent or unreadable. A present-but-invalid value set is
    /// still caught later by `validate`.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => {
                        log::info!("Loaded configuration from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse config file: {}. Using defaults.", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file: {}. Using defaults.", e);
                }
            }
        }

        log::info!("Using default configuration");
        HubConfig::default()
    }

    pub fn save(&self, path: &Path) -> Result<(), HubError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Startup validation. A failure here is fatal; the engine refuses to
    /// run with nonsense thresholds or uncompilable signatures.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.brute_force.failed_attempts == 0 {
            return Err(HubError::Config(
                "brute_force.failed_attempts must be at least 1".to_string(),
            ));
        }
        if self.brute_force.time_window_secs <= 0 {
            return Err(HubError::Config(
                "brute_force.time_window_secs must be positive".to_string(),
            ));
        }
        if self.privilege_escalation.keywords.is_empty() {
            return Err(HubError::Config(
                "privilege_escalation.keywords must not be empty".to_string(),
            ));
        }
        if self.lateral_movement.connection_threshold == 0 {
            return Err(HubError::Config(
                "lateral_movement.connection_threshold must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.network.detection_threshold) {
            return Err(HubError::Config(
                "network.detection_threshold must be within [0, 1]".to_string(),
            ));
        }
        if !(self.network.medium_score < self.network.high_score
            && self.network.high_score < self.network.critical_score)
        {
            return Err(HubError::Config(
                "network severity bands must be ordered medium < high < critical".to_string(),
            ));
        }
        if self.max_match_len == 0 {
            return Err(HubError::Config(
                "max_match_len must be at least 1".to_string(),
            ));
        }
        for (name, pattern) in [
            ("brute_force.signature", &self.brute_force.signature),
            ("lateral_movement.signature", &self.lateral_movement.signature),
            ("exfiltration.signature", &self.exfiltration.signature),
            (
                "malware.suspicious_extension_pattern",
                &self.malware.suspicious_extension_pattern,
            ),
        ] {
            if let Err(e) = Regex::new(pattern) {
                return Err(HubError::Config(format!("{} is not a valid regex: {}", name, e)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(HubConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_threshold_is_fatal() {
        let mut config = HubConfig::default();
        config.brute_force.failed_attempts = 0;
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
    }

    #[test]
    fn empty_keyword_set_is_fatal() {
        let mut config = HubConfig::default();
        config.privilege_escalation.keywords.clear();
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
    }

    #[test]
    fn bad_signature_is_fatal() {
        let mut config = HubConfig::default();
        config.exfiltration.signature = "(unclosed".to_string();
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
    }

    #[test]
    fn unordered_severity_bands_are_fatal() {
        let mut config = HubConfig::default();
        config.network.high_score = 0.95;
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
    }

    #[test]
    fn round_trips_through_json() {
        let config = HubConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: HubConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.brute_force.failed_attempts, 5);
        assert_eq!(back.brute_force.time_window_secs, 300);
        assert_eq!(back.lateral_movement.connection_threshold, 3);
    }
}
