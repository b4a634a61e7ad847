use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use console::style;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use super::formatter::format_severity_breakdown;
use crate::errors::KostyError;
use crate::models::{AccountOutcome, Finding, ScanResult, BASE_COLUMNS};
use crate::utils::formatting::format_cost;

const TOP_ISSUES: usize = 10;

/// Findings of one (account, service, operation).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationEntry {
    pub count: usize,
    pub items: Vec<Finding>,
    pub potential_savings: f64,
}

impl OperationEntry {
    fn new(items: Vec<Finding>) -> Self {
        let potential_savings = items.iter().filter_map(|f| f.monthly_cost).sum();
        Self {
            count: items.len(),
            items,
            potential_savings,
        }
    }
}

type Nested<T> = IndexMap<String, IndexMap<String, IndexMap<String, T>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_accounts: usize,
    pub total_issues: usize,
    pub potential_savings: f64,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    scan_id: &'a str,
    scan_timestamp: String,
    total_issues: usize,
    results: &'a Nested<OperationEntry>,
    failures: &'a Nested<String>,
    summary: ReportSummary,
}

/// Accumulates results for one CLI invocation, keyed account → service →
/// operation. Insertion order is preserved, so every rendering of one
/// report lists entries identically.
#[derive(Debug, Clone)]
pub struct Reporter {
    scan_id: String,
    scan_timestamp: DateTime<Local>,
    file_stem: String,
    results: Nested<OperationEntry>,
    failures: Nested<String>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Reporter for a comprehensive scan: files are `kosty-report-<ts>.*`.
    pub fn new() -> Self {
        let scan_timestamp = Local::now();
        let file_stem = format!("kosty-report-{}", scan_timestamp.format("%Y%m%d-%H%M%S"));
        Self::with_stem(scan_timestamp, file_stem)
    }

    /// Reporter for one operation: files are `kosty_audit_<op>_<ts>.*`.
    pub fn for_operation(operation: &str) -> Self {
        let scan_timestamp = Local::now();
        let file_stem = format!("kosty_audit_{}_{}", operation, scan_timestamp.format("%Y%m%d_%H%M%S"));
        Self::with_stem(scan_timestamp, file_stem)
    }

    fn with_stem(scan_timestamp: DateTime<Local>, file_stem: String) -> Self {
        Self {
            scan_id: Uuid::new_v4().to_string(),
            scan_timestamp,
            file_stem,
            results: IndexMap::new(),
            failures: IndexMap::new(),
        }
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    pub fn scan_timestamp(&self) -> DateTime<Local> {
        self.scan_timestamp
    }

    pub fn add_results(&mut self, service: &str, operation: &str, findings: Vec<Finding>, account_id: &str) {
        self.results
            .entry(account_id.to_string())
            .or_default()
            .entry(service.to_string())
            .or_default()
            .insert(operation.to_string(), OperationEntry::new(findings));
    }

    pub fn add_failure(&mut self, service: &str, operation: &str, account_id: &str, message: &str) {
        self.failures
            .entry(account_id.to_string())
            .or_default()
            .entry(service.to_string())
            .or_default()
            .insert(operation.to_string(), message.to_string());
    }

    /// Record every account of `result`; failed accounts go to `failures`
    /// with their error marker.
    pub fn add_scan_result(&mut self, service: &str, operation: &str, result: &ScanResult) {
        for (account_id, outcome) in result.iter() {
            match outcome {
                AccountOutcome::Findings(findings) => {
                    self.add_results(service, operation, findings.clone(), account_id)
                }
                AccountOutcome::Failed(failure) => {
                    self.add_failure(service, operation, account_id, &failure.marker())
                }
            }
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&String, &String, &String, &OperationEntry)> {
        self.results.iter().flat_map(|(account, services)| {
            services.iter().flat_map(move |(service, operations)| {
                operations
                    .iter()
                    .map(move |(operation, entry)| (account, service, operation, entry))
            })
        })
    }

    fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.entries().flat_map(|(_, _, _, entry)| entry.items.iter())
    }

    pub fn total_issues(&self) -> usize {
        self.entries().map(|(_, _, _, entry)| entry.count).sum()
    }

    pub fn potential_savings(&self) -> f64 {
        self.entries().map(|(_, _, _, entry)| entry.potential_savings).sum()
    }

    /// Accounts with results or failures.
    pub fn total_accounts(&self) -> usize {
        let mut accounts: Vec<&String> = self.results.keys().collect();
        for account in self.failures.keys() {
            if !self.results.contains_key(account) {
                accounts.push(account);
            }
        }
        accounts.len()
    }

    /// Accounts with at least one failed service/operation.
    pub fn failed_accounts(&self) -> Vec<&str> {
        self.failures.keys().map(String::as_str).collect()
    }

    pub fn report_summary(&self) -> ReportSummary {
        ReportSummary {
            total_accounts: self.total_accounts(),
            total_issues: self.total_issues(),
            potential_savings: self.potential_savings(),
        }
    }

    /// (service, operation, count) summed over accounts, highest first; ties
    /// keep the order in which the pair was first recorded.
    pub fn top_issues(&self, limit: usize) -> Vec<(String, String, usize)> {
        let mut totals: IndexMap<(String, String), usize> = IndexMap::new();
        for (_, service, operation, entry) in self.entries() {
            if entry.count > 0 {
                *totals.entry((service.clone(), operation.clone())).or_default() += entry.count;
            }
        }
        let mut ranked: Vec<(String, String, usize)> = totals.into_iter().map(|((s, o), c)| (s, o, c)).collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2));
        ranked.truncate(limit);
        ranked
    }

    /// Human-readable summary: totals, per-account subtotals, failed
    /// accounts and the top issues by count.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(80);
        let mut lines = vec![
            String::new(),
            rule.clone(),
            style("KOSTY - AWS COST OPTIMIZATION REPORT").bold().to_string(),
            rule.clone(),
            format!("Scan Date: {}", self.scan_timestamp.format("%Y-%m-%d %H:%M:%S")),
            format!("Scan ID: {}", self.scan_id),
            format!("Total Issues Found: {}", self.total_issues()),
        ];
        let savings = self.potential_savings();
        if savings > 0.0 {
            lines.push(format!("Potential Monthly Savings: {}", format_cost(savings)));
        }
        lines.push(String::new());

        for (account_id, services) in &self.results {
            lines.push(format!("Account: {}", account_id));
            lines.push("-".repeat(50));
            let mut account_issues = 0;
            for (service, operations) in services {
                for (operation, entry) in operations {
                    if entry.count > 0 {
                        lines.push(format!("  {} {}: {} issues", service.to_uppercase(), operation, entry.count));
                        account_issues += entry.count;
                    }
                }
            }
            lines.push(format!("  Account Total: {} issues found", account_issues));
            lines.push(String::new());
        }

        if !self.failures.is_empty() {
            lines.push(style("FAILED ACCOUNTS").bold().to_string());
            lines.push("-".repeat(30));
            for (account_id, services) in &self.failures {
                for (service, operations) in services {
                    for (operation, message) in operations {
                        lines.push(format!(
                            "  {} {} {}: {}",
                            account_id,
                            service.to_uppercase(),
                            operation,
                            message
                        ));
                    }
                }
            }
            lines.push(String::new());
        }

        lines.push(style("TOP ISSUES BY COUNT").bold().to_string());
        lines.push("-".repeat(30));
        for (i, (service, operation, count)) in self.top_issues(TOP_ISSUES).iter().enumerate() {
            lines.push(format!("  {:2}. {} {}: {} issues", i + 1, service.to_uppercase(), operation, count));
        }
        lines.push(String::new());
        lines.push(format_severity_breakdown(self.findings()));
        lines.push(rule);

        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<Vec<u8>, KostyError> {
        let document = ReportDocument {
            scan_id: &self.scan_id,
            scan_timestamp: self.scan_timestamp.to_rfc3339(),
            total_issues: self.total_issues(),
            results: &self.results,
            failures: &self.failures,
            summary: self.report_summary(),
        };
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    /// One row per finding. Columns are the union of all findings' keys in
    /// first-seen order; without findings only the base header is written.
    pub fn to_csv(&self) -> Result<Vec<u8>, KostyError> {
        let rows: Vec<Map<String, Value>> = self
            .findings()
            .map(|f| match serde_json::to_value(f) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(KostyError::Internal("finding did not serialize to an object".into())),
                Err(e) => Err(KostyError::from(e)),
            })
            .collect::<Result<_, _>>()?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        if rows.is_empty() {
            writer.write_record(BASE_COLUMNS)?;
        } else {
            let mut columns: Vec<&str> = Vec::new();
            for row in &rows {
                for key in row.keys() {
                    if !columns.contains(&key.as_str()) {
                        columns.push(key);
                    }
                }
            }
            writer.write_record(&columns)?;
            for row in &rows {
                writer.write_record(columns.iter().map(|c| csv_cell(row.get(*c))))?;
            }
        }

        writer
            .into_inner()
            .map_err(|e| KostyError::Internal(format!("CSV buffer error: {}", e)))
    }

    pub async fn save_json(&self, dir: &Path) -> Result<PathBuf, KostyError> {
        let path = dir.join(format!("{}.json", self.file_stem));
        self.write(&path, self.to_json()?).await?;
        Ok(path)
    }

    pub async fn save_csv(&self, dir: &Path) -> Result<PathBuf, KostyError> {
        let path = dir.join(format!("{}.csv", self.file_stem));
        self.write(&path, self.to_csv()?).await?;
        Ok(path)
    }

    async fn write(&self, path: &Path, bytes: Vec<u8>) -> Result<(), KostyError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote report");
        Ok(())
    }
}

/// Scalars as text, nested values as compact JSON, missing as empty.
fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(nested) => nested.to_string(),
    }
}
