/// Saving a received clip to disk.
use std::io::Write;
use std::path::{Path, PathBuf};

use ripedly_shared::models::clip_filename;
use ripedly_shared::timecode::Timecode;

/// Extract the filename from a `Content-Disposition` header value.
///
/// Accepts `filename="a.mp4"` and `filename=a.mp4`. Only the final path
/// component is kept so a hostile header cannot point outside the output
/// directory.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value.split(';').map(str::trim).find_map(|part| {
        let (key, val) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| val.trim().trim_matches('"'))
    })?;

    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Header filename if present, otherwise the synthesized clip name.
pub fn resolve_filename(disposition: Option<&str>, start: &Timecode, end: &Timecode) -> String {
    disposition
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| clip_filename(start, end))
}

/// Write `bytes` to `dir/filename` atomically.
///
/// Data goes to a hidden temp file in the same directory first, then is
/// renamed into place, so a failed write never leaves a partial clip.
pub fn deliver(bytes: &[u8], dir: &Path, filename: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".ripedly-")
        .suffix(".part")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;

    let target = dir.join(filename);
    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(target)
}
