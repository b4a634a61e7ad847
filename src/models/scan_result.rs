use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::finding::Finding;

/// Why one account's work unit produced no findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credentials for the account could not be acquired.
    Auth,
    /// The audit operation itself failed in some region.
    Operation,
    /// A credential or operation call exceeded its deadline.
    Timeout,
    /// The scan was cancelled before this account settled.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Operation => "operation",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AccountFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// The error marker stored in the account's slot of a report.
    pub fn marker(&self) -> String {
        format!("Error: {}", self.message)
    }
}

impl std::fmt::Display for AccountFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.marker(), self.kind.as_str())
    }
}

/// Settled outcome of one account's work unit.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountOutcome {
    Findings(Vec<Finding>),
    Failed(AccountFailure),
}

impl AccountOutcome {
    pub fn findings(&self) -> Option<&[Finding]> {
        match self {
            Self::Findings(items) => Some(items),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&AccountFailure> {
        match self {
            Self::Findings(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Serialize for AccountOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Findings(items) => items.serialize(serializer),
            Self::Failed(failure) => serializer.serialize_str(&failure.marker()),
        }
    }
}

/// Account-keyed map of merged findings or error markers from one run.
///
/// Entries are kept in account resolution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub accounts: IndexMap<String, AccountOutcome>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account_id: impl Into<String>, outcome: AccountOutcome) {
        self.accounts.insert(account_id.into(), outcome);
    }

    pub fn get(&self, account_id: &str) -> Option<&AccountOutcome> {
        self.accounts.get(account_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AccountOutcome)> {
        self.accounts.iter()
    }

    /// Total findings across all successful accounts.
    pub fn total_findings(&self) -> usize {
        self.accounts
            .values()
            .filter_map(AccountOutcome::findings)
            .map(<[Finding]>::len)
            .sum()
    }

    pub fn failed_accounts(&self) -> impl Iterator<Item = (&String, &AccountFailure)> {
        self.accounts
            .iter()
            .filter_map(|(id, outcome)| outcome.failure().map(|f| (id, f)))
    }
}

impl Serialize for ScanResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.accounts.len()))?;
        for (account, outcome) in &self.accounts {
            map.serialize_entry(account, outcome)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::FindingKind;

    fn finding(id: &str) -> Finding {
        Finding::new("EIP", FindingKind::Cost, id, "Unattached Elastic IP")
    }

    #[test]
    fn test_total_findings_skips_failed_accounts() {
        let mut result = ScanResult::new();
        result.insert("111111111111", AccountOutcome::Findings(vec![finding("a"), finding("b")]));
        result.insert(
            "222222222222",
            AccountOutcome::Failed(AccountFailure::new(FailureKind::Auth, "AccessDenied")),
        );
        result.insert("333333333333", AccountOutcome::Findings(vec![]));

        assert_eq!(result.len(), 3);
        assert_eq!(result.total_findings(), 2);
        assert_eq!(result.failed_accounts().count(), 1);
    }

    #[test]
    fn test_failed_outcome_serializes_as_error_marker() {
        let mut result = ScanResult::new();
        result.insert(
            "222222222222",
            AccountOutcome::Failed(AccountFailure::new(FailureKind::Operation, "boom")),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["222222222222"], "Error: boom");
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut result = ScanResult::new();
        for id in ["3", "1", "2"] {
            result.insert(id, AccountOutcome::Findings(vec![]));
        }
        let keys: Vec<&str> = result.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["3", "1", "2"]);
    }
}
