use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity level for a finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a finding is about wasted spend or about exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    Cost,
    Security,
}

/// One reported cost or security issue about one cloud resource.
///
/// The fixed fields cover what every audit service reports; anything
/// resource-specific lives in `details` or, for flat top-level columns,
/// in `extra`. Serialized keys follow the report format consumed by
/// spreadsheets and dashboards (`AccountId`, `ResourceId`, `ARN`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Finding {
    pub account_id: String,
    pub region: String,
    pub service: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    pub issue: String,
    #[serde(rename = "Type")]
    pub kind: FindingKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "ARN", default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    /// Name of the check that produced this finding (e.g. `check_unattached_eips`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub check: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    /// Estimated monthly cost of the resource, set by the cost calculator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_currency: Option<String>,
    /// Service-specific top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Finding {
    pub fn new(
        service: impl Into<String>,
        kind: FindingKind,
        resource_id: impl Into<String>,
        issue: impl Into<String>,
    ) -> Self {
        Self {
            account_id: String::new(),
            region: String::new(),
            service: service.into(),
            resource_id: resource_id.into(),
            resource_name: None,
            issue: issue.into(),
            kind,
            severity: Severity::Medium,
            description: String::new(),
            arn: None,
            check: String::new(),
            details: Map::new(),
            monthly_cost: None,
            cost_currency: None,
            extra: Map::new(),
        }
    }

    pub fn in_scope(mut self, account_id: impl Into<String>, region: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self.region = region.into();
        self
    }

    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.check = check.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Adds a flat top-level field. Names that collide with a fixed column
    /// are kept under `details` so they never shadow it.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if is_reserved_field(&key) {
            self.details.insert(key, value.into());
        } else {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// Best human-readable label for console output.
    pub fn display_name(&self) -> &str {
        self.resource_name.as_deref().unwrap_or(&self.resource_id)
    }

    pub fn is_cost(&self) -> bool {
        self.kind == FindingKind::Cost
    }

    /// Numeric detail lookup used by the cost calculator.
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details
            .get(key)
            .or_else(|| self.extra.get(key))
            .and_then(Value::as_f64)
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details
            .get(key)
            .or_else(|| self.extra.get(key))
            .and_then(Value::as_str)
    }
}

/// Columns every finding serializes, used for the header of an empty CSV export.
pub const BASE_COLUMNS: &[&str] = &[
    "AccountId",
    "Region",
    "Service",
    "ResourceId",
    "ResourceName",
    "Issue",
    "Type",
    "Severity",
    "Description",
    "ARN",
    "Check",
    "Details",
];

/// Fixed keys that are not part of an empty CSV header.
const COST_COLUMNS: &[&str] = &["MonthlyCost", "CostCurrency"];

pub fn is_reserved_field(key: &str) -> bool {
    BASE_COLUMNS.contains(&key) || COST_COLUMNS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Finding {
        Finding::new("EIP", FindingKind::Cost, "eipalloc-0abc", "Unattached Elastic IP")
            .in_scope("123456789012", "us-east-1")
            .with_severity(Severity::High)
            .with_name("203.0.113.10")
            .with_detail("PublicIp", "203.0.113.10")
    }

    #[test]
    fn test_serializes_pascal_case_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["AccountId"], "123456789012");
        assert_eq!(value["ResourceId"], "eipalloc-0abc");
        assert_eq!(value["Type"], "Cost");
        assert_eq!(value["Severity"], "High");
        assert_eq!(value["Details"]["PublicIp"], "203.0.113.10");
        assert!(value.get("ARN").is_none());
        assert!(value.get("MonthlyCost").is_none());
    }

    #[test]
    fn test_extra_fields_flatten_to_top_level() {
        let finding = sample().with_field("VolumeType", "gp3");
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["VolumeType"], "gp3");

        let parsed: Finding = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.extra.get("VolumeType").and_then(Value::as_str), Some("gp3"));
        assert_eq!(parsed.resource_name.as_deref(), Some("203.0.113.10"));
    }

    #[test]
    fn test_datetime_details_render_iso8601() {
        let ts = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap();
        let finding = sample().with_detail("LaunchTime", serde_json::to_value(ts).unwrap());
        let json = serde_json::to_string(&finding).unwrap();
        assert!(json.contains("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn test_display_name_falls_back_to_resource_id() {
        let finding = Finding::new("SG", FindingKind::Security, "sg-123", "Open SSH");
        assert_eq!(finding.display_name(), "sg-123");
        assert_eq!(sample().display_name(), "203.0.113.10");
    }

    #[test]
    fn test_detail_lookup_checks_details_then_extra() {
        let finding = sample()
            .with_detail("SizeGb", 100)
            .with_field("VolumeType", "io1");
        assert_eq!(finding.detail_f64("SizeGb"), Some(100.0));
        assert_eq!(finding.detail_str("VolumeType"), Some("io1"));
        assert_eq!(finding.detail_str("Missing"), None);
    }

    #[test]
    fn test_field_named_like_fixed_column_goes_to_details() {
        let finding = sample()
            .with_field("Severity", "Low")
            .with_field("MonthlyCost", 9.5)
            .with_field("GroupName", "web");
        assert!(finding.extra.get("Severity").is_none());
        assert!(finding.extra.get("MonthlyCost").is_none());
        assert_eq!(finding.details.get("Severity"), Some(&Value::from("Low")));

        let json = serde_json::to_string(&finding).unwrap();
        assert_eq!(json.matches("\"Severity\"").count(), 2);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Severity"], "High");
        assert_eq!(value["Details"]["Severity"], "Low");
        assert!(value.get("MonthlyCost").is_none());
        assert_eq!(value["GroupName"], "web");
    }

    #[test]
    fn test_severity_rank_ordering() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::Low.rank() < Severity::Info.rank());
    }
}
