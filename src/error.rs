//! Error types for the edgequake-pdf2tex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2TexError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, provider not configured, output directory cannot be
//!   created). Returned as `Err(Pdf2TexError)` from the top-level
//!   `convert*` functions.
//!
//! * [`FigureError`] — **Non-fatal**: one figure could not be generated or
//!   compiled. Failed attempts are retried inside the figure's own task; an
//!   exhausted figure is stored in [`crate::output::TaskResult`] and the
//!   matching placeholder is left in the document.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2tex library.
///
/// Figure-level failures use [`FigureError`] and never abort a run.
#[derive(Debug, Error)]
pub enum Pdf2TexError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file is neither a PDF nor a supported raster image.
    #[error("Unsupported input '{path}': expected a PDF or a .png/.jpg/.jpeg image")]
    UnsupportedInput { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Source document errors ────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// An image input could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// The source document has no pages to convert.
    #[error("Document '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API failed on a single-shot stage (text or figure discovery).
    #[error("LLM API error during {stage}: {message}")]
    LlmApiError { stage: String, message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output or figures directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output LaTeX file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium for your platform, or set PDFIUM_LIB_PATH to the\n\
library file (or the directory containing it).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single figure.
///
/// `figure` is always the 1-indexed figure number, matching the
/// `%%FIGURE_PLACEHOLDER_n%%` token it would have filled.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FigureError {
    /// The generation service failed or returned no usable code.
    #[error("Figure {figure}: generation failed: {detail}")]
    GenerationFailed { figure: usize, detail: String },

    /// The renderer rejected the generated code.
    #[error("Figure {figure}: render failed: {diagnostic}")]
    RenderFailed { figure: usize, diagnostic: String },

    /// Every attempt failed.
    #[error("Figure {figure}: no artifact after {attempts} attempts: {last_error}")]
    Exhausted {
        figure: usize,
        attempts: u32,
        last_error: String,
    },

    /// The figure's task panicked or was cancelled.
    #[error("Figure {figure}: task aborted: {detail}")]
    Panicked { figure: usize, detail: String },
}

impl FigureError {
    /// 1-indexed figure number this error belongs to.
    pub fn figure(&self) -> usize {
        match self {
            FigureError::GenerationFailed { figure, .. }
            | FigureError::RenderFailed { figure, .. }
            | FigureError::Exhausted { figure, .. }
            | FigureError::Panicked { figure, .. } => *figure,
        }
    }
}
