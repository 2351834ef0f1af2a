//! Plain-text details report written next to the preview image.

use std::fs;
use std::path::{Path, PathBuf};

use crate::field_normalizer::ResolvedFields;

const REPORT_FALLBACK_STEM: &str = "model";

/// File stem shared by the report and the preview image.
pub fn output_stem(file_name: &str, fallback: &str) -> String {
    Path::new(file_name.trim())
        .file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// `Key: value` lines in fixed field order, then the source URL.
pub fn render_report(fields: &ResolvedFields, url: &str) -> String {
    let mut text = String::new();
    for (name, value) in fields.entries() {
        text.push_str(&format!("{name}: {value}\n"));
    }
    text.push_str(&format!("URL: {url}\n"));
    text
}

pub fn report_path(output_dir: &Path, fields: &ResolvedFields) -> PathBuf {
    let stem = output_stem(&fields.file_name, REPORT_FALLBACK_STEM);
    output_dir.join(format!("{stem}.txt"))
}

/// Writes the report into `output_dir`, creating it when needed.
pub fn save_report(
    output_dir: &Path,
    fields: &ResolvedFields,
    url: &str,
) -> Result<PathBuf, String> {
    fs::create_dir_all(output_dir).map_err(|err| {
        format!(
            "Failed to create output directory {}: {}",
            output_dir.display(),
            err
        )
    })?;
    let path = report_path(output_dir, fields);
    fs::write(&path, render_report(fields, url))
        .map_err(|err| format!("Failed to write report {}: {}", path.display(), err))?;
    Ok(path)
}
