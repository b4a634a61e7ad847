use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::KostyError;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ROLE_NAME: &str = "OrganizationAccountAccessRole";
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Operation-specific keyword parameters (day thresholds, percentages, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationParams(Map<String, Value>);

impl OperationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Add entries from `other` that are not already present.
    pub fn merge_missing(&mut self, other: &OperationParams) {
        for (key, value) in &other.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `key=value` pair from the command line. Numbers and booleans
    /// are stored typed, anything else as a string.
    pub fn parse_pair(raw: &str) -> Result<(String, Value), KostyError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| KostyError::Config(format!("Parameter '{}' must be key=value", raw)))?;
        let key = key.trim().replace('-', "_");
        if key.is_empty() {
            return Err(KostyError::Config(format!("Parameter '{}' has an empty key", raw)));
        }
        let value = value.trim();
        let parsed = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| v.is_number() || v.is_boolean())
            .unwrap_or_else(|| Value::String(value.to_string()));
        Ok((key, parsed))
    }
}

/// Deadlines applied to each remote call made on behalf of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub credentials: Duration,
    pub operation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            credentials: Duration::from_secs(60),
            operation: Duration::from_secs(900),
        }
    }
}

/// One invocation of a named audit operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRequest {
    pub operation: String,
    pub organization: bool,
    pub regions: Vec<String>,
    pub max_workers: usize,
    pub role_name: String,
    pub admin_account: Option<String>,
    pub params: OperationParams,
    pub timeouts: Timeouts,
}

impl AuditRequest {
    pub fn builder(operation: impl Into<String>) -> AuditRequestBuilder {
        AuditRequestBuilder::new(operation)
    }

    /// Suggested internal parallelism for one region's invocation.
    pub fn worker_hint(&self) -> usize {
        worker_hint(self.max_workers, self.regions.len())
    }
}

/// `max(1, max_workers / regions)`; never zero.
pub fn worker_hint(max_workers: usize, regions: usize) -> usize {
    (max_workers / regions.max(1)).max(1)
}

#[derive(Debug, Clone)]
pub struct AuditRequestBuilder {
    operation: String,
    organization: bool,
    regions: Vec<String>,
    max_workers: usize,
    role_name: Option<String>,
    admin_account: Option<String>,
    params: OperationParams,
    timeouts: Timeouts,
}

impl AuditRequestBuilder {
    fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            organization: false,
            regions: Vec::new(),
            max_workers: DEFAULT_MAX_WORKERS,
            role_name: None,
            admin_account: None,
            params: OperationParams::new(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn organization(mut self, organization: bool) -> Self {
        self.organization = organization;
        self
    }

    pub fn regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    pub fn admin_account(mut self, admin_account: Option<String>) -> Self {
        self.admin_account = admin_account;
        self
    }

    pub fn params(mut self, params: OperationParams) -> Self {
        self.params = params;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn build(self) -> Result<AuditRequest, KostyError> {
        if self.max_workers == 0 {
            return Err(KostyError::Config("max_workers must be a positive integer".into()));
        }
        let operation = self.operation.trim().replace('-', "_");
        if operation.is_empty() {
            return Err(KostyError::Config("operation name must not be empty".into()));
        }

        let mut regions: Vec<String> = Vec::with_capacity(self.regions.len());
        for region in self.regions {
            let region = region.trim().to_string();
            if !region.is_empty() && !regions.contains(&region) {
                regions.push(region);
            }
        }
        if regions.is_empty() {
            regions.push(DEFAULT_REGION.to_string());
        }

        Ok(AuditRequest {
            operation,
            organization: self.organization,
            regions,
            max_workers: self.max_workers,
            role_name: self.role_name.unwrap_or_else(|| DEFAULT_ROLE_NAME.to_string()),
            admin_account: self.admin_account.filter(|a| !a.trim().is_empty()),
            params: self.params,
            timeouts: self.timeouts,
        })
    }
}
