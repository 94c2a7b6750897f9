//! Static assets and per-niche directory housekeeping.

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Name of the template file itself; never copied as an asset.
pub const TEMPLATE_FILE: &str = "index.html";

/// Entries preserved when a niche directory is reset (the publish step keeps
/// its working tree there).
const PRESERVED: &[&str] = &[".git"];

/// Copy every regular file in `template_dir` except the template into `dest`.
///
/// Subdirectories are not copied. A missing template directory is not an
/// error and copies nothing. Returns the copied file names, sorted.
#[instrument(level = "debug", skip_all, fields(from = %template_dir.display(), to = %dest.display()))]
pub async fn copy_assets(template_dir: &Path, dest: &Path) -> io::Result<Vec<String>> {
    let mut entries = match fs::read_dir(template_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No template directory; skipping asset copy");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == TEMPLATE_FILE {
            continue;
        }
        names.push(name);
    }
    names.sort();

    for name in &names {
        fs::copy(template_dir.join(name), dest.join(name)).await?;
    }
    debug!(count = names.len(), "Copied static assets");
    Ok(names)
}

/// Create `dir` if needed and remove everything in it except `.git`.
pub async fn reset_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir).await?;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if PRESERVED.iter().any(|p| name == *p) {
            continue;
        }
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}
