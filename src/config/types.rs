use glob::Pattern;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-disk layout of `kosty.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct KostyConfig {
    #[serde(default)]
    pub default: ProfileConfig,
    #[serde(default)]
    pub profiles: IndexMap<String, ProfileConfig>,
    #[serde(default)]
    pub thresholds: IndexMap<String, Value>,
    #[serde(default)]
    pub exclude: Exclusions,
}

/// One profile (or the `default` block). Every key is optional; unset keys
/// fall through to the next layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProfileConfig {
    pub organization: Option<bool>,
    pub regions: Option<RegionList>,
    pub max_workers: Option<i64>,
    pub output: Option<OutputFormat>,
    pub cross_account_role: Option<String>,
    pub org_admin_account_id: Option<String>,
    pub role_arn: Option<String>,
    pub mfa_serial: Option<String>,
    pub duration_seconds: Option<i64>,
    pub save_to: Option<String>,
    #[serde(default)]
    pub thresholds: IndexMap<String, Value>,
    #[serde(default)]
    pub exclude: Exclusions,
}

/// `regions: us-east-1` and `regions: [us-east-1, eu-west-1]` are both accepted.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RegionList {
    One(String),
    Many(Vec<String>),
}

impl RegionList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(region) => vec![region],
            Self::Many(regions) => regions,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
    Csv,
    All,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::All => "all",
        }
    }

    pub fn wants_json(&self) -> bool {
        matches!(self, Self::Json | Self::All)
    }

    pub fn wants_csv(&self) -> bool {
        matches!(self, Self::Csv | Self::All)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources left out of a scan. Global and profile exclusions add up.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Exclusions {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    /// Glob patterns, e.g. `arn:aws:ec2:*:*:security-group/sg-keep*`.
    #[serde(default)]
    pub arns: Vec<String>,
}

impl Exclusions {
    pub fn extend(&mut self, other: &Exclusions) {
        self.accounts.extend(other.accounts.iter().cloned());
        self.regions.extend(other.regions.iter().cloned());
        self.services.extend(other.services.iter().cloned());
        self.arns.extend(other.arns.iter().cloned());
    }

    pub fn excludes_account(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|a| a == account_id)
    }

    pub fn excludes_region(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }

    pub fn excludes_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s.eq_ignore_ascii_case(service))
    }

    pub fn arn_matcher(&self) -> ArnMatcher {
        ArnMatcher::new(&self.arns)
    }
}

/// Compiled ARN exclusion globs. A pattern that is not a valid glob only
/// matches itself literally.
#[derive(Debug, Clone, Default)]
pub struct ArnMatcher {
    patterns: Vec<Pattern>,
    literals: Vec<String>,
}

impl ArnMatcher {
    pub fn new(patterns: &[String]) -> Self {
        let mut matcher = Self::default();
        for raw in patterns {
            match Pattern::new(raw) {
                Ok(p) => matcher.patterns.push(p),
                Err(_) => matcher.literals.push(raw.clone()),
            }
        }
        matcher
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.literals.is_empty()
    }

    pub fn matches(&self, arn: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(arn)) || self.literals.iter().any(|l| l == arn)
    }
}
