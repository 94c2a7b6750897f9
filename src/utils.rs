//! Utility functions for slugs, affiliate links, logging, and the file system.
//!
//! - Slugification for output directories and repository names
//! - Associate-tag rewriting for outbound product links
//! - String truncation for log previews of API bodies
//! - File system validation for the output root

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Convert a keyword to a filesystem- and URL-safe slug.
///
/// Lowercases the text, collapses every run of non-alphanumeric characters
/// (whitespace included) into a single hyphen, and strips hyphens from both
/// ends. A keyword with no ASCII letters or digits slugs to `"niche"` so the
/// output never lands in the output root itself.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Wireless Ear Buds!!"), "wireless-ear-buds");
/// assert_eq!(slugify("  --4K  Monitors--"), "4k-monitors");
/// ```
pub fn slugify(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let replaced = NON_ALNUM.replace_all(&lower, "-");
    let slug = replaced.trim_matches('-');
    if !lower.is_ascii() {
        warn!(keyword = %text, %slug, "Non-ASCII characters dropped from slug");
    }
    if slug.is_empty() {
        warn!(keyword = %text, "Keyword has no ASCII letters or digits; using slug 'niche'");
        "niche".to_string()
    } else {
        slug.to_string()
    }
}

/// Capitalize the first character of a string.
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Set the Amazon Associates `tag` parameter on a product link.
///
/// Every existing `tag` parameter is dropped and a single `tag=<tag>` is
/// appended after the remaining parameters, which keep their order. Applying
/// it twice gives the same URL as applying it once.
///
/// Returns the URL untouched when the tag is empty, when the URL is the `#`
/// placeholder, or when it does not parse.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     with_associate_tag("https://amazon.com/dp/B000X?ref=abc", "mytag-20"),
///     "https://amazon.com/dp/B000X?ref=abc&tag=mytag-20"
/// );
/// ```
pub fn with_associate_tag(url: &str, tag: &str) -> String {
    let tag = tag.trim();
    if url.is_empty() || url == "#" || tag.is_empty() {
        return url.to_string();
    }
    let mut parsed = match Url::parse(url) {
        Ok(u) if u.has_host() => u,
        _ => {
            debug!(%url, "Leaving unparseable product URL untouched");
            return url.to_string();
        }
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "tag")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("tag", tag);
    }
    parsed.to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with
/// `"…(+N bytes)"` appended.
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

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
