use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `bytes` to `dest` so readers only ever observe the old file or the
/// complete new one.
///
/// The bytes land in a temp file beside `dest` and are renamed into place;
/// on failure the temp file is removed and `dest` is untouched.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("destination has no file name: {}", dest.display()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("stage {}", dest.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", dest.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", dest.display()))?;
    tmp.persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

pub fn write_atomic_json<T: serde::Serialize>(dest: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    bytes.push(b'\n');
    write_atomic(dest, &bytes)
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}
