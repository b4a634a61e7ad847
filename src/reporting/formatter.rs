use console::style;

use crate::models::{AccountOutcome, Finding, ScanResult, Severity};

const PREVIEW_LIMIT: usize = 5;

/// `resource: issue [severity]`
pub fn format_finding_line(finding: &Finding) -> String {
    format!("{}: {} [{}]", finding.display_name(), finding.issue, finding.severity)
}

/// Console rendering of one operation's result: per account either "no
/// issues found", the error marker, or the count and a short preview;
/// always followed by the total.
pub fn format_scan_console(operation: &str, result: &ScanResult) -> String {
    let mut out = String::new();

    for (account_id, outcome) in result.iter() {
        out.push_str(&format!("\n{} {}\n", style("Account:").bold(), account_id));
        match outcome {
            AccountOutcome::Failed(failure) => {
                out.push_str(&format!("  {}\n", style(failure.marker()).red()));
            }
            AccountOutcome::Findings(findings) if findings.is_empty() => {
                out.push_str(&format!("  {}: no issues found\n", operation));
            }
            AccountOutcome::Findings(findings) => {
                out.push_str(&format!("  {}: {} issues\n", operation, findings.len()));
                for finding in findings.iter().take(PREVIEW_LIMIT) {
                    out.push_str(&format!("    - {}\n", format_finding_line(finding)));
                }
                if findings.len() > PREVIEW_LIMIT {
                    out.push_str(&format!("    ... and {} more\n", findings.len() - PREVIEW_LIMIT));
                }
            }
        }
    }

    out.push_str(&format!(
        "\n{} {}\n",
        style("Total issues found:").bold(),
        result.total_findings()
    ));
    out
}

pub fn format_severity_breakdown<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> String {
    let mut counts = [0usize; 5];
    let mut total = 0;
    for f in findings {
        counts[f.severity.rank() as usize] += 1;
        total += 1;
    }

    let mut out = String::from("  Severity   Count\n");
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low, Severity::Info] {
        out.push_str(&format!("  {:<10} {}\n", severity.as_str(), counts[severity.rank() as usize]));
    }
    out.push_str(&format!("  {:<10} {}\n", "Total", total));
    out
}
