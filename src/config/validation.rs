use serde_json::Value;

use super::settings::Settings;
use crate::errors::KostyError;

pub const VALID_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-east-1",
    "ca-central-1",
    "sa-east-1",
    "me-south-1",
    "af-south-1",
];

pub const VALID_SERVICES: &[&str] = &[
    "ec2",
    "s3",
    "rds",
    "lambda",
    "ebs",
    "iam",
    "eip",
    "lb",
    "nat",
    "sg",
    "cloudwatch",
    "dynamodb",
    "route53",
    "apigateway",
    "backup",
    "snapshots",
];

/// Semantic checks on the effective settings. All problems are reported
/// together in one `Config` error.
pub fn validate_settings(settings: &Settings) -> Result<(), KostyError> {
    let errors = collect_errors(settings);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(KostyError::Config(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

pub fn collect_errors(settings: &Settings) -> Vec<String> {
    let mut errors = Vec::new();

    for region in &settings.regions {
        if !VALID_REGIONS.contains(&region.as_str()) {
            errors.push(format!("Invalid region: '{}'", region));
        }
    }

    for service in &settings.exclude.services {
        if !VALID_SERVICES.contains(&service.to_ascii_lowercase().as_str()) {
            errors.push(format!("Unknown service: '{}'", service));
        }
    }

    for arn in &settings.exclude.arns {
        if !arn.starts_with("arn:aws") {
            errors.push(format!("Invalid ARN format: '{}' (must start with 'arn:aws')", arn));
        }
    }

    if settings.max_workers <= 0 {
        errors.push(format!("'max_workers' must be a positive integer, got: {}", settings.max_workers));
    }
    if settings.duration_seconds <= 0 || settings.duration_seconds > i32::MAX as i64 {
        errors.push(format!(
            "'duration_seconds' must be a positive integer, got: {}",
            settings.duration_seconds
        ));
    }

    if let Some(account) = &settings.org_admin_account_id {
        if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
            errors.push(format!("'org_admin_account_id' must be a 12-digit account id, got: '{}'", account));
        }
    }

    for (key, value) in settings.thresholds.iter() {
        if !value.as_f64().is_some_and(|v| v > 0.0) {
            errors.push(format!("Threshold '{}' must be a positive number, got: {}", key, render(value)));
        }
    }

    errors
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}
