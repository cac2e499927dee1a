//! Write decoded attachments to disk.

use std::path::{Path, PathBuf};

use crate::model::attachment::Attachment;
use crate::model::message::Message;

/// Export a single decoded attachment into `output_dir`.
///
/// `index` is used to name attachments that carry no filename.
pub fn export_attachment(
    attachment: &Attachment,
    index: usize,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let filename = match attachment.filename.as_deref() {
        Some(name) => sanitize_filename_part(name, 150),
        None => default_filename(index, &attachment.mime_type),
    };
    let path = output_dir.join(&filename);

    // Never overwrite an existing file
    let path = unique_path(&path);
    std::fs::write(&path, attachment.content.to_bytes())?;
    tracing::debug!(path = %path.display(), size = attachment.size(), "Wrote attachment");
    Ok(path)
}

/// Export every attachment of a message. Failures are logged and skipped.
pub fn export_all_attachments(message: &Message, output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::with_capacity(message.attachments.len());

    for (i, att) in message.attachments.iter().enumerate() {
        match export_attachment(att, i + 1, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    filename = att.filename.as_deref().unwrap_or(""),
                    error = %e,
                    "Failed to export attachment"
                );
            }
        }
    }

    Ok(paths)
}

/// Replace anything outside `[A-Za-z0-9._@-]` (Unicode letters allowed) with `_`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    // A name made only of dots would refer to a directory.
    if sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// `attachment-N.ext`, with the extension guessed from the MIME type.
fn default_filename(index: usize, mime_type: &str) -> String {
    let ext = match mime_type {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/calendar" | "application/ics" => "ics",
        "message/rfc822" => "eml",
        _ => "bin",
    };
    format!("attachment-{index}.{ext}")
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    // Counter space exhausted
    parent.join(format!("{stem}_dup.{ext}"))
}
