//! Pipeline stages for PDF-to-LaTeX conversion.
//!
//! Each submodule implements one step. The figure stages sit behind traits
//! ([`llm::FigureCodeGenerator`], [`artifact::ArtifactRenderer`]) so the
//! retry and dispatch logic can be tested without a model or a compiler.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pages ──▶ encode ──▶ llm ─┬─▶ LaTeX template ──────────────┐
//! (URL/path) (pdfium)  (base64)  (VLM) │                                ▼
//!                                      └─▶ descriptions ──▶ dispatch ──▶ assemble
//!                                                          (retry × N)
//! ```
//!
//! 1. [`input`]    — canonicalise the path or URL, classify PDF vs image
//! 2. [`pages`]    — rasterise PDF pages (or load the image) in
//!    `spawn_blocking`
//! 3. [`encode`]   — PNG-encode and base64-wrap each page
//! 4. [`llm`]      — text extraction, figure discovery, figure code
//! 5. [`dispatch`] — one tokio task per figure, results kept in input order
//! 6. [`retry`]    — per-figure generate → render loop with error feedback
//! 7. [`artifact`] — compile figure source with `asy`
//! 8. [`assemble`] — splice figure blocks into the placeholders
//! 9. [`postprocess`] — deterministic cleanup of model output

pub mod artifact;
pub mod assemble;
pub mod dispatch;
pub mod encode;
pub mod input;
pub mod llm;
pub mod pages;
pub mod postprocess;
pub mod retry;
pub mod task;
