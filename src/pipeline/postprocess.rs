//! Post-processing: deterministic cleanup of LLM responses.
//!
//! Models wrap output in Markdown code fences even when told not to, mix
//! line endings, and pad responses with prose. These rules normalise the
//! three kinds of response the pipeline consumes:
//!
//! 1. [`clean_latex`] — the LaTeX document template and the merged output
//! 2. [`extract_figure_code`] — generated figure source for the compiler
//! 3. [`parse_figure_descriptions`] — the numbered figure list

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all document rules: fences, line endings, trailing whitespace,
/// blank-line runs, final newline.
pub fn clean_latex(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Pull compilable source out of a code-generation response.
///
/// Returns `None` when nothing usable is left, which the retry loop counts
/// as a failed attempt without invoking the compiler.
pub fn extract_figure_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    // With several fenced blocks the outer pattern would swallow the inner
    // fences, so only the first block is taken.
    let several_blocks = RE_FIRST_BLOCK.find_iter(trimmed).nth(1).is_some();

    let code = if let Some(caps) = RE_OUTER_FENCES
        .captures(trimmed)
        .filter(|_| !several_blocks)
    {
        caps[1].to_string()
    } else if let Some(caps) = RE_FIRST_BLOCK.captures(trimmed) {
        caps[1].to_string()
    } else {
        trimmed.to_string()
    };

    let code = normalise_line_endings(code.trim());
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Parse a numbered list (`1. ...`, `2) ...`) into descriptions.
///
/// Lines that are not list items are ignored, so a preamble sentence or a
/// "no figures found" reply yields an empty list.
pub fn parse_figure_descriptions(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| RE_LIST_ITEM.captures(line))
        .map(|caps| caps[1].trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

// ── Fences ──────────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

static RE_FIRST_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\n(.*?)```").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Whitespace ──────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_latex_fences() {
        let raw = "```latex\n\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\n```";
        let out = clean_latex(raw);
        assert!(out.starts_with("\\documentclass{article}"));
        assert!(out.ends_with("\\end{document}\n"));
        assert!(!out.contains("```"));
    }

    #[test]
    fn unfenced_latex_is_kept() {
        let raw = "\\documentclass{article}\r\n\\begin{document}   \r\nx\n\\end{document}";
        let out = clean_latex(raw);
        assert_eq!(out, "\\documentclass{article}\n\\begin{document}\nx\n\\end{document}\n");
    }

    #[test]
    fn blank_line_runs_collapse() {
        let out = clean_latex("a\n\n\n\n\n\nb");
        assert_eq!(out, "a\n\n\nb\n");
    }

    #[test]
    fn clean_latex_is_stable() {
        let once = clean_latex("```tex\nA\n\n\n\n\nB  \n```");
        assert_eq!(clean_latex(&once), once);
    }

    #[test]
    fn code_from_fenced_response() {
        let raw = "```asy\nsize(200);\ndraw(unitcircle);\n```";
        assert_eq!(
            extract_figure_code(raw).as_deref(),
            Some("size(200);\ndraw(unitcircle);")
        );
    }

    #[test]
    fn code_from_response_with_prose() {
        let raw = "Here is the code:\n```\nsize(100);\n```\nIt draws nothing.";
        assert_eq!(extract_figure_code(raw).as_deref(), Some("size(100);"));
    }

    #[test]
    fn two_fenced_blocks_yield_the_first() {
        let raw = "```asy\nsize(100);\ndraw(A);\n```\n```asy\ndraw(B);\n```";
        let code = extract_figure_code(raw).unwrap();
        assert_eq!(code, "size(100);\ndraw(A);");
        assert!(!code.contains("```"));
    }

    #[test]
    fn plain_code_passes_through() {
        assert_eq!(
            extract_figure_code("  size(100);\n").as_deref(),
            Some("size(100);")
        );
    }

    #[test]
    fn empty_or_fence_only_is_none() {
        assert_eq!(extract_figure_code(""), None);
        assert_eq!(extract_figure_code("   \n\t"), None);
        assert_eq!(extract_figure_code("```asy\n\n```"), None);
    }

    #[test]
    fn parses_numbered_descriptions() {
        let response = "I found the following figures:\n\
                        1. A bar chart showing quarterly profits.\n\
                        2) A diagram of the system architecture.\n\
                        \n\
                        10. A scatter plot. With two sentences.";
        assert_eq!(
            parse_figure_descriptions(response),
            vec![
                "A bar chart showing quarterly profits.",
                "A diagram of the system architecture.",
                "A scatter plot. With two sentences.",
            ]
        );
    }

    #[test]
    fn no_figures_reply_is_empty() {
        assert!(parse_figure_descriptions("No figures were found.").is_empty());
        assert!(parse_figure_descriptions("").is_empty());
    }
}
