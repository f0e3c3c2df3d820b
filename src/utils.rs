//! Utility functions for file naming and artifact cleanup

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters that are not allowed in artifact file names
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Suffix that marks the temporary sibling written by the tagger
pub const TAG_TEMP_SUFFIX: &str = "_meta";

/// Shape of what follows the stem in a retrieval artifact name
///
/// An optional `f<N>.` format or `temp.` segment, one extension without dots
/// or spaces, then an optional in-progress marker.
static PARTIAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let pattern = Regex::new(
        r"^\.(?:(?P<format>f\d+\.)|(?P<temp>temp\.))?[A-Za-z0-9]+(?P<marker>\.part(?:-Frag\d+(?:\.part)?)?|\.ytdl)?$",
    )
    .expect("partial suffix pattern is valid");
    pattern
});

/// Turn a display title into a safe file stem
///
/// Maps `<>:"/\|?*` to `_`, collapses runs of `_`, and trims leading/trailing
/// underscores and spaces.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("John 3:16 / Love"), "John 3_16 _ Love");
/// assert_eq!(sanitize_filename("__What?? Why?__"), "What_ Why");
/// ```
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        let c = if INVALID_FILENAME_CHARS.contains(&c) {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c: char| c == '_' || c.is_whitespace())
        .to_string()
}

/// Path of the final artifact for a sanitized stem
#[must_use]
pub fn final_artifact_path(destination: &Path, stem: &str, extension: &str) -> PathBuf {
    destination.join(format!("{}.{}", stem, extension))
}

/// Path of the temporary sibling the tagger writes next to `file`
///
/// `/media/Talk.mp4` becomes `/media/Talk_meta.mp4`. Returns `None` when the
/// path has no file stem.
#[must_use]
pub fn tag_temp_path(file: &Path) -> Option<PathBuf> {
    let stem = file.file_stem()?.to_str()?;
    let name = match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}{}.{}", stem, TAG_TEMP_SUFFIX, ext),
        None => format!("{}{}", stem, TAG_TEMP_SUFFIX),
    };
    Some(file.with_file_name(name))
}

/// Whether a file name looks like an in-progress retrieval artifact of `stem`
///
/// Fetchers leave `<stem>.<ext>.part`, finished per-format streams
/// `<stem>.f137.mp4` awaiting a merge, their `.part` and `.part-Frag3`
/// fragments, `.ytdl` state files and `<stem>.temp.<ext>` merge outputs.
/// Names of other stems that merely share a prefix never match.
#[must_use]
pub fn is_partial_artifact_name(file_name: &str, stem: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(stem) else {
        return false;
    };
    let Some(caps) = PARTIAL_SUFFIX.captures(rest) else {
        return false;
    };
    caps.name("marker").is_some() || caps.name("format").is_some() || caps.name("temp").is_some()
}

/// Whether a file name is a tagger temporary sibling (`*_meta.<ext>`)
#[must_use]
pub fn is_tag_temp_name(file_name: &str) -> bool {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file_name,
    };
    stem.ends_with(TAG_TEMP_SUFFIX)
}

/// List partial artifacts of `stem` inside `destination`
///
/// A missing destination directory yields an empty list.
pub async fn find_partial_artifacts(destination: &Path, stem: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut entries = match tokio::fs::read_dir(destination).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if let Some(name) = name.to_str()
            && is_partial_artifact_name(name, stem)
        {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Remove every partial artifact of `stem`, returning what was removed
///
/// Individual failures are logged and skipped.
pub async fn remove_partial_artifacts(destination: &Path, stem: &str) -> Vec<PathBuf> {
    let candidates = match find_partial_artifacts(destination, stem).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!(
                destination = %destination.display(),
                error = %e,
                "Failed to scan for partial artifacts"
            );
            return Vec::new();
        }
    };

    let mut removed = Vec::with_capacity(candidates.len());
    for path in candidates {
        if remove_file_if_exists(&path).await {
            removed.push(path);
        }
    }
    removed
}

/// Remove every tagger temporary sibling in `destination`
pub async fn remove_tag_temporaries(destination: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let mut entries = match tokio::fs::read_dir(destination).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    destination = %destination.display(),
                    error = %e,
                    "Failed to scan for temporary files"
                );
            }
            return removed;
        }
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read directory entry");
                break;
            }
        };
        let path = entry.path();
        let is_temp = entry
            .file_name()
            .to_str()
            .is_some_and(is_tag_temp_name);
        if is_temp && remove_file_if_exists(&path).await {
            removed.push(path);
        }
    }
    removed
}

/// Delete a file, treating "already gone" as success
///
/// Returns true when the file was removed by this call.
pub async fn remove_file_if_exists(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}
