//! Small helpers for logging and output directories.

use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Shorten `s` to at most `max` bytes for a log field.
///
/// The cut is moved back to the nearest character boundary and the number
/// of dropped bytes is appended, e.g. `"aaaa…(+490 bytes)"`.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Create `path` if needed and confirm a file can be written inside it.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe = std::path::Path::new(path).join("..__probe_write__");
    fs::write(&probe, b"").await?;
    let _ = fs::remove_file(&probe).await;
    info!("Output directory is writable");
    Ok(())
}
