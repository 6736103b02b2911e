//! Upload intake and input artifact synthesis.
//!
//! Everything a caller can submit is normalized into one shape before
//! it reaches the queue: a spooled file on disk whose ownership passes
//! to the job. Bulk uploads are spooled as-is; single-number requests
//! are synthesized into a one-row CSV so the engine protocol stays
//! identical for every path.
//!
//! Input validation happens before any side effect. A rejected request
//! leaves no spooled file and no job record behind, and a failed
//! enqueue rolls the spooled file back.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::queue::{JobQueue, QueueError};
use crate::models::job::Job;

/// Upload extensions the engine's parser selection understands.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["sql", "csv", "xlsx", "xls"];

/// Regions tried by forceful validation, in submission order.
pub const FORCEFUL_COUNTRIES: [&str; 38] = [
    "US", "BR", "MX", "CO", "CR", "ES", "CA", "AR", "BD", "BE", "BJ", "CL",
    "CN", "EC", "EG", "SV", "HN", "IN", "IL", "KZ", "KG", "MA", "MY", "NP",
    "NG", "OM", "PK", "PE", "RU", "SA", "SG", "TR", "UZ", "VE", "VN", "ZM",
    "AE", "KE",
];

/// Column order for synthesized artifacts. The engine detects columns
/// by header keywords, so the names matter more than the order.
const SYNTH_HEADER: &str = "rowNumber,id,email,name,phone_number,country,platform";

/// Spool an uploaded file into `spool_dir`, returning the path the job
/// will own. Validates filename and content before touching the disk.
pub fn spool_upload(
    filename: &str,
    bytes: &[u8],
    spool_dir: &Path,
) -> Result<PathBuf, IntakeError> {
    let ext = accepted_extension(filename)?;
    if bytes.is_empty() {
        return Err(IntakeError::InvalidInput("Uploaded file is empty".to_string()));
    }
    spool_bytes(bytes, &ext, spool_dir)
}

/// Synthesize the one-row artifact for a manual check of `phone`,
/// optionally carrying a country hint for the engine's cascade.
pub fn synthesize_manual(
    phone: &str,
    country: Option<&str>,
    spool_dir: &Path,
) -> Result<PathBuf, IntakeError> {
    let phone = required_phone(phone)?;
    let mut csv = String::from(SYNTH_HEADER);
    csv.push('\n');
    csv.push_str(&synth_row(1, phone, country.unwrap_or("").trim(), "manual"));
    spool_bytes(csv.as_bytes(), "csv", spool_dir)
}

/// Synthesize one row per candidate region for the same number, so the
/// engine reports which regions (if any) make it parseable.
pub fn synthesize_forceful(phone: &str, spool_dir: &Path) -> Result<PathBuf, IntakeError> {
    let phone = required_phone(phone)?;
    let mut csv = String::from(SYNTH_HEADER);
    csv.push('\n');
    for (i, country) in FORCEFUL_COUNTRIES.iter().enumerate() {
        csv.push_str(&synth_row(i as u32 + 1, phone, country, "forceful"));
    }
    spool_bytes(csv.as_bytes(), "csv", spool_dir)
}

/// Enqueue a job for an already-spooled artifact.
///
/// On queue failure the artifact is removed again so an unavailable
/// queue leaves nothing behind, and the caller gets `QueueUnavailable`.
pub async fn submit_job(
    queue: &JobQueue,
    filename: &str,
    input_path: PathBuf,
) -> Result<Job, IntakeError> {
    let job = Job::new(filename, input_path);
    if let Err(e) = queue.enqueue(&job).await {
        match std::fs::remove_file(&job.input_path) {
            Ok(()) => {}
            Err(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(io_err) => {
                tracing::warn!(
                    input_path = %job.input_path.display(),
                    error = %io_err,
                    "Could not roll back spooled artifact after enqueue failure"
                );
            }
        }
        return Err(IntakeError::QueueUnavailable(e));
    }
    Ok(job)
}

fn accepted_extension(filename: &str) -> Result<String, IntakeError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(IntakeError::InvalidInput(format!(
            "File must be one of: {}",
            ACCEPTED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn required_phone(phone: &str) -> Result<&str, IntakeError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Err(IntakeError::InvalidInput(
            "Phone number is required".to_string(),
        ));
    }
    Ok(trimmed)
}

fn synth_row(row: u32, phone: &str, country: &str, platform: &str) -> String {
    format!(
        "{row},,,,{},{},{platform}\n",
        escape_csv(phone),
        escape_csv(country)
    )
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn spool_bytes(bytes: &[u8], ext: &str, spool_dir: &Path) -> Result<PathBuf, IntakeError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("phone-upload-")
        .suffix(&format!(".{ext}"))
        .tempfile_in(spool_dir)
        .map_err(IntakeError::Io)?;
    tmp.write_all(bytes).map_err(IntakeError::Io)?;
    let (_file, path) = tmp.keep().map_err(|e| IntakeError::Io(e.error))?;
    Ok(path)
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The submission was rejected before any side effect.
    #[error("{0}")]
    InvalidInput(String),

    /// The queue refused the job; the spooled artifact was rolled back.
    #[error("Validation queue is unavailable")]
    QueueUnavailable(#[source] QueueError),

    #[error("Failed to spool uploaded file: {0}")]
    Io(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobState;

    #[test]
    fn test_spool_upload_accepts_known_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["leads.sql", "leads.csv", "leads.XLSX", "old.xls"] {
            let path = spool_upload(name, b"data", dir.path()).unwrap();
            assert!(path.is_file(), "spooled file for {name} should exist");
            assert!(path.starts_with(dir.path()));
        }
    }

    #[test]
    fn test_spool_upload_keeps_extension_for_parser_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = spool_upload("leads.SQL", b"SELECT 1;", dir.path()).unwrap();
        assert_eq!(path.extension().unwrap(), "sql");
    }

    #[test]
    fn test_spool_upload_rejects_unknown_extension_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let err = spool_upload("malware.exe", b"data", dir.path()).unwrap_err();
        assert!(matches!(err, IntakeError::InvalidInput(_)));
        assert!(err.to_string().contains(".sql"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_spool_upload_rejects_missing_extension_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            spool_upload("no-extension", b"data", dir.path()),
            Err(IntakeError::InvalidInput(_))
        ));
        assert!(matches!(
            spool_upload("empty.csv", b"", dir.path()),
            Err(IntakeError::InvalidInput(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_manual_synthesis_single_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = synthesize_manual(" +13105551234 ", Some("US"), dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(SYNTH_HEADER));
        assert_eq!(lines.next(), Some("1,,,,+13105551234,US,manual"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_manual_synthesis_without_country_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = synthesize_manual("+5511987654321", None, dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("1,,,,+5511987654321,,manual\n"));
    }

    #[test]
    fn test_manual_synthesis_rejects_blank_phone() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            synthesize_manual("   ", None, dir.path()),
            Err(IntakeError::InvalidInput(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_forceful_synthesis_covers_every_region_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = synthesize_forceful("3105551234", dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(rows.len(), FORCEFUL_COUNTRIES.len());
        assert_eq!(rows[0], "1,,,,3105551234,US,forceful");
        assert_eq!(
            rows.last().copied(),
            Some(format!("{},,,,3105551234,KE,forceful", rows.len()).as_str())
        );
    }

    #[test]
    fn test_escape_csv_quotes_delimiters() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn test_submit_job_rolls_back_spool_when_queue_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let input = spool_upload("leads.csv", b"data", dir.path()).unwrap();

        // Port 1 refuses connections immediately.
        let queue = JobQueue::new("redis://127.0.0.1:1").unwrap();
        let err = submit_job(&queue, "leads.csv", input.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::QueueUnavailable(_)));
        assert!(!input.exists(), "spooled artifact should be rolled back");
    }

    #[test]
    fn test_new_submission_starts_queued() {
        let job = Job::new("leads.csv", PathBuf::from("/tmp/x.csv"));
        assert_eq!(job.state, JobState::Queued);
    }
}
