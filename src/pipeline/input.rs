//! Input resolution: normalise a user-supplied path or URL to a local file
//! and decide whether it is a PDF or a raster image.
//!
//! pdfium needs a file-system path, so URLs are downloaded into a `TempDir`
//! that lives as long as the [`ResolvedInput`]. PDFs are recognised by their
//! `%PDF` magic bytes; anything else must carry a `.png`, `.jpg` or `.jpeg`
//! extension.

use crate::error::Pdf2TexError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Raster formats accepted as single-page inputs.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// What kind of document the input is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
}

/// The resolved input: a local path, or a downloaded temp file.
pub enum ResolvedInput {
    Local {
        path: PathBuf,
        kind: SourceKind,
    },
    /// The `TempDir` is held so the download survives until processing ends.
    Downloaded {
        path: PathBuf,
        kind: SourceKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedInput::Local { kind, .. } => *kind,
            ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }

    /// File stem used to name the output `.tex` file.
    pub fn stem(&self) -> String {
        self.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify a file from its leading bytes and extension.
///
/// Returns `None` when the file is neither a PDF nor a supported image.
pub fn classify(path: &Path, head: &[u8]) -> Option<SourceKind> {
    if head.starts_with(b"%PDF") {
        return Some(SourceKind::Pdf);
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Image)
    } else {
        None
    }
}

/// Resolve the input string to a local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2TexError> {
    if input.trim().is_empty() {
        return Err(Pdf2TexError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2TexError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(Pdf2TexError::FileNotFound { path });
    }

    let mut head = [0u8; 4];
    let read = match std::fs::File::open(&path) {
        Ok(mut f) => f.read(&mut head).unwrap_or(0),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2TexError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2TexError::FileNotFound { path }),
    };

    let kind = classify(&path, &head[..read])
        .ok_or_else(|| Pdf2TexError::UnsupportedInput { path: path.clone() })?;

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2TexError> {
    info!("Downloading input from: {}", url);

    let failed = |reason: String| Pdf2TexError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2TexError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let filename = extract_filename(url, &bytes);
    let temp_dir = TempDir::new().map_err(|e| Pdf2TexError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2TexError::Internal(format!("Failed to write temp file: {}", e)))?;

    let head = &bytes[..bytes.len().min(4)];
    let kind = classify(&file_path, head).ok_or_else(|| Pdf2TexError::UnsupportedInput {
        path: file_path.clone(),
    })?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment if it has an extension, else a name derived from
/// the magic bytes.
fn extract_filename(url: &str, bytes: &[u8]) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    if bytes.starts_with(b"%PDF") {
        "downloaded.pdf".to_string()
    } else {
        "downloaded.png".to_string()
    }
}
