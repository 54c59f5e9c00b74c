//! The failure report handed back to the operator after a bulk run.

use inventory_core::{now_rfc3339, DiscoverySession, TargetOutcome};
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

pub fn report_path(dir: &Path, session: DiscoverySession) -> PathBuf {
    dir.join(format!("bulk-failures-{session}.txt"))
}

/// Write one line per failed target. Everything after `#` is a comment to
/// the target list parser, so the file can be fed straight back to a new
/// bulk run.
pub fn write_failure_report(
    dir: &Path,
    session: DiscoverySession,
    reason: &str,
    failed: &[&TargetOutcome],
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = report_path(dir, session);
    let retry = format!("inventory bulk --targets {} --reason \"{}\"", path.display(), reason.replace('"', "'"));

    let mut body = String::new();
    let _ = writeln!(body, "# bulk scan failures");
    let _ = writeln!(body, "# session: {session}");
    let _ = writeln!(body, "# written: {}", now_rfc3339());
    let _ = writeln!(body, "# failed: {}", failed.len());
    for o in failed {
        let err = o.error.as_deref().unwrap_or("unknown error").replace(['\n', '\r'], " ");
        let _ = writeln!(body, "{}  # {}; retry: {}", o.target, err, retry);
    }
    std::fs::write(&path, body)?;
    Ok(path)
}
