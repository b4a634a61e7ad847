pub mod formatter;
pub mod reporter;

pub use formatter::{format_finding_line, format_scan_console, format_severity_breakdown};
pub use reporter::{OperationEntry, ReportSummary, Reporter};
