//! # edgequake-pdf2tex
//!
//! Convert PDF documents and page images to LaTeX, redrawing every figure
//! as compiled Asymptote vector graphics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Pages     rasterise via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    PNG → base64 ImageData
//!  ├─ 4. Analyse   VLM text → LaTeX template  ┐ concurrently
//!  │               VLM figure descriptions    ┘
//!  ├─ 5. Figures   one tokio task per figure: generate → asy → retry
//!  │               with the compiler output, up to `max_attempts`
//!  └─ 6. Assemble  figure blocks replace %%FIGURE_PLACEHOLDER_n%%,
//!                  graphicx added to the preamble, {stem}.tex written
//! ```
//!
//! A figure that never compiles is omitted: its placeholder stays in the
//! document and its number is reported in
//! [`ConversionOutput::omitted_figures`]. Only input, provider and output
//! directory problems abort a run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2tex::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ConversionConfig::builder().output_dir("out").build()?;
//!     let output = convert("paper.pdf", &config).await?;
//!     println!("wrote {:?}", output.output_path);
//!     eprintln!("omitted figures: {:?}", output.omitted_figures());
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own generator or renderer
//!
//! [`generate_figures`] and [`assemble_document`] take any
//! [`FigureCodeGenerator`] and [`ArtifactRenderer`], so the figure stage can
//! run against a different model client or compiler.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2tex` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, TextMode, MAX_ATTEMPTS, MAX_RETRIES,
};
pub use convert::{assemble_document, convert, convert_sync, convert_to_file, generate_figures};
pub use error::{FigureError, Pdf2TexError};
pub use output::{artifact_refs, ConversionOutput, ConversionStats, TaskResult};
pub use pipeline::artifact::{ArtifactRenderer, AsymptoteRenderer, RenderReport};
pub use pipeline::assemble::{assemble, MergedDocument};
pub use pipeline::dispatch::Dispatcher;
pub use pipeline::llm::{FigureCodeGenerator, LlmGenerator};
pub use pipeline::retry::FigureWorker;
pub use pipeline::task::{AttemptFeedback, AttemptLog, AttemptOutcome, FigureTask};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
