use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::OutputFormat;
use crate::errors::KostyError;
use crate::reporting::Reporter;

/// Write the report files `format` asks for into `dir`.
pub async fn save_reports(reporter: &Reporter, format: OutputFormat, dir: &Path) -> Result<Vec<PathBuf>, KostyError> {
    let mut written = Vec::new();
    if format.wants_json() {
        written.push(reporter.save_json(dir).await?);
    }
    if format.wants_csv() {
        written.push(reporter.save_csv(dir).await?);
    }
    Ok(written)
}

/// Print the console view to `out`, then save and announce the report
/// files `format` asks for. The view is printed for every format.
pub async fn deliver<W: Write>(
    view: &str,
    reporter: &Reporter,
    format: OutputFormat,
    dir: &Path,
    out: &mut W,
) -> Result<Vec<PathBuf>, KostyError> {
    writeln!(out, "{}", view)?;
    let written = save_reports(reporter, format, dir).await?;
    for path in &written {
        writeln!(out, "Report saved: {}", path.display())?;
    }
    Ok(written)
}
