use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use super::types::{Exclusions, KostyConfig, OutputFormat, ProfileConfig};
use crate::models::{OperationParams, DEFAULT_MAX_WORKERS, DEFAULT_REGION, DEFAULT_ROLE_NAME};

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_DURATION_SECONDS: i64 = 3600;
/// Concurrency for `run` when neither configuration nor a flag sets it.
pub const RUN_MAX_WORKERS: i64 = 10;

/// Thresholds every operation receives unless configuration overrides them.
pub const DEFAULT_THRESHOLDS: &[(&str, i64)] = &[
    ("ec2_cpu", 20),
    ("rds_cpu", 20),
    ("lambda_memory", 512),
    ("stopped_days", 7),
    ("idle_days", 7),
    ("old_snapshot_days", 30),
];

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub organization: Option<bool>,
    pub regions: Option<Vec<String>>,
    pub max_workers: Option<i64>,
    /// Command default for `max_workers`, below configuration.
    pub default_max_workers: Option<i64>,
    pub output: Option<OutputFormat>,
    pub cross_account_role: Option<String>,
    pub org_admin_account_id: Option<String>,
    pub save_to: Option<String>,
}

/// Effective configuration after layering built-ins, `default`, the selected
/// profile and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub profile: String,
    pub organization: bool,
    pub regions: Vec<String>,
    pub max_workers: i64,
    /// Whether a configuration layer set `max_workers`.
    pub max_workers_configured: bool,
    pub output: OutputFormat,
    pub cross_account_role: String,
    pub org_admin_account_id: Option<String>,
    pub role_arn: Option<String>,
    pub mfa_serial: Option<String>,
    pub duration_seconds: i64,
    pub save_to: Option<PathBuf>,
    pub thresholds: OperationParams,
    pub exclude: Exclusions,
}

impl Default for Settings {
    fn default() -> Self {
        let mut thresholds = OperationParams::new();
        for (key, value) in DEFAULT_THRESHOLDS {
            thresholds.insert(*key, *value);
        }
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            organization: false,
            regions: vec![DEFAULT_REGION.to_string()],
            max_workers: DEFAULT_MAX_WORKERS as i64,
            max_workers_configured: false,
            output: OutputFormat::Console,
            cross_account_role: DEFAULT_ROLE_NAME.to_string(),
            org_admin_account_id: None,
            role_arn: None,
            mfa_serial: None,
            duration_seconds: DEFAULT_DURATION_SECONDS,
            save_to: None,
            thresholds,
            exclude: Exclusions::default(),
        }
    }
}

impl Settings {
    /// Layer `config` for `profile` over the built-in defaults. An unknown
    /// profile falls back to `default` with a warning.
    pub fn resolve(config: &KostyConfig, profile: &str) -> Self {
        let mut settings = Settings::default();
        settings.apply_profile(&config.default);
        merge_thresholds(&mut settings.thresholds, &config.thresholds);
        settings.exclude.extend(&config.exclude);

        if profile != DEFAULT_PROFILE {
            match config.profiles.get(profile) {
                Some(selected) => {
                    settings.profile = profile.to_string();
                    settings.apply_profile(selected);
                    merge_thresholds(&mut settings.thresholds, &selected.thresholds);
                    settings.exclude.extend(&selected.exclude);
                }
                None => warn!(profile, "Profile not found, using 'default'"),
            }
        }
        settings
    }

    fn apply_profile(&mut self, layer: &ProfileConfig) {
        if let Some(v) = layer.organization {
            self.organization = v;
        }
        if let Some(v) = &layer.regions {
            self.regions = v.clone().into_vec();
        }
        if let Some(v) = layer.max_workers {
            self.max_workers = v;
            self.max_workers_configured = true;
        }
        if let Some(v) = layer.output {
            self.output = v;
        }
        if let Some(v) = &layer.cross_account_role {
            self.cross_account_role = v.clone();
        }
        if let Some(v) = &layer.org_admin_account_id {
            self.org_admin_account_id = Some(v.clone());
        }
        if let Some(v) = &layer.role_arn {
            self.role_arn = Some(v.clone());
        }
        if let Some(v) = &layer.mfa_serial {
            self.mfa_serial = Some(v.clone());
        }
        if let Some(v) = layer.duration_seconds {
            self.duration_seconds = v;
        }
        if let Some(v) = &layer.save_to {
            self.save_to = Some(PathBuf::from(v));
        }
    }

    /// CLI flags win over every configuration layer.
    pub fn with_overrides(mut self, cli: &CliOverrides) -> Self {
        if let Some(v) = cli.organization {
            self.organization = v;
        }
        if let Some(v) = &cli.regions {
            if !v.is_empty() {
                self.regions = v.clone();
            }
        }
        match (cli.max_workers, cli.default_max_workers) {
            (Some(v), _) => self.max_workers = v,
            (None, Some(v)) if !self.max_workers_configured => self.max_workers = v,
            _ => {}
        }
        if let Some(v) = cli.output {
            self.output = v;
        }
        if let Some(v) = &cli.cross_account_role {
            self.cross_account_role = v.clone();
        }
        if let Some(v) = &cli.org_admin_account_id {
            self.org_admin_account_id = Some(v.clone());
        }
        if let Some(v) = &cli.save_to {
            self.save_to = Some(PathBuf::from(v));
        }
        self
    }

    /// Regions to scan after removing excluded ones.
    pub fn scan_regions(&self) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| !self.exclude.excludes_region(r))
            .cloned()
            .collect()
    }
}

fn merge_thresholds(target: &mut OperationParams, layer: &indexmap::IndexMap<String, Value>) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}
