//! Document assembly: splice rendered figures into the LaTeX template.
//!
//! The template marks figure positions with `%%FIGURE_PLACEHOLDER_n%%`
//! (1-based). Slot `n - 1` of the artifact list belongs to placeholder `n`;
//! a slot that is `None` leaves its placeholder untouched so the document
//! still shows where a figure was omitted.
//!
//! Assembly is pure string work and idempotent: running it again on its
//! own output with the same artifacts changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

/// Package line added to the preamble when figures were merged.
pub const GRAPHICX_PACKAGE: &str = "\\usepackage{graphicx}";

/// Result of [`assemble`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedDocument {
    pub latex: String,
    /// 1-based figure numbers whose block was inserted.
    pub merged: Vec<usize>,
    /// 1-based placeholder numbers still present in `latex`, ascending.
    pub unfilled: Vec<usize>,
    /// Whether `\usepackage{graphicx}` was added by this call.
    pub preamble_injected: bool,
}

/// The placeholder token for figure `number` (1-based).
pub fn placeholder(number: usize) -> String {
    format!("%%FIGURE_PLACEHOLDER_{number}%%")
}

/// The `figure` environment that replaces placeholder `number`.
pub fn figure_block(number: usize, artifact_ref: &str) -> String {
    format!(
        "\\begin{{figure}}[htbp]\n\
         \x20   \\centering\n\
         \x20   \\includegraphics[width=0.8\\textwidth]{{{artifact_ref}}}\n\
         \x20   \\caption{{Generated Figure {number}.}}\n\
         \x20   \\label{{fig:gen{number}}}\n\
         \\end{{figure}}"
    )
}

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%%FIGURE_PLACEHOLDER_(\d+)%%").unwrap());

static RE_DOCUMENTCLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\documentclass(?:\[[^\]]*\])?\{[^}]*\}").unwrap());

static RE_GRAPHICX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\usepackage(?:\[[^\]]*\])?\{[^}]*\bgraphicx\b[^}]*\}").unwrap()
});

/// Replace each placeholder whose slot holds an artifact with its figure
/// block, then make sure the preamble loads `graphicx`.
pub fn assemble<S: AsRef<str>>(template: &str, artifacts: &[Option<S>]) -> MergedDocument {
    let mut latex = template.to_string();
    let mut merged = Vec::new();

    for (index, slot) in artifacts.iter().enumerate() {
        let Some(artifact_ref) = slot else { continue };
        let number = index + 1;
        let token = placeholder(number);
        if latex.contains(&token) {
            latex = latex.replace(&token, &figure_block(number, artifact_ref.as_ref()));
            merged.push(number);
        } else {
            debug!("Figure {}: no placeholder in template", number);
        }
    }

    let preamble_injected = !merged.is_empty() && inject_graphicx(&mut latex);

    let unfilled = remaining_placeholders(&latex);
    if !unfilled.is_empty() {
        warn!(
            "{} placeholder(s) left unfilled: {:?}",
            unfilled.len(),
            unfilled
        );
    }

    MergedDocument {
        latex,
        merged,
        unfilled,
        preamble_injected,
    }
}

/// Insert the package line after the first `\documentclass`. Returns
/// whether anything was inserted.
fn inject_graphicx(latex: &mut String) -> bool {
    if RE_GRAPHICX.is_match(latex) {
        return false;
    }
    match RE_DOCUMENTCLASS.find(latex) {
        Some(m) => {
            latex.insert_str(m.end(), &format!("\n{GRAPHICX_PACKAGE}"));
            true
        }
        None => {
            warn!("No \\documentclass found; graphicx not added to the preamble");
            false
        }
    }
}

fn remaining_placeholders(latex: &str) -> Vec<usize> {
    let mut numbers: Vec<usize> = RE_PLACEHOLDER
        .captures_iter(latex)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\\documentclass{article}\n\
                            \\begin{document}\n\
                            Intro.\n\
                            %%FIGURE_PLACEHOLDER_1%%\n\
                            Middle.\n\
                            %%FIGURE_PLACEHOLDER_2%%\n\
                            End.\n\
                            \\end{document}\n";

    #[test]
    fn fills_all_slots_in_order() {
        let doc = assemble(
            TEMPLATE,
            &[Some("figures/figure1.pdf"), Some("figures/figure2.pdf")],
        );

        let first = doc.latex.find("figures/figure1.pdf").unwrap();
        let second = doc.latex.find("figures/figure2.pdf").unwrap();
        assert!(first < second);
        assert!(doc.latex.contains("\\caption{Generated Figure 1.}"));
        assert!(doc.latex.contains("\\label{fig:gen2}"));
        assert!(!doc.latex.contains("%%FIGURE_PLACEHOLDER_"));
        assert_eq!(doc.merged, vec![1, 2]);
        assert!(doc.unfilled.is_empty());
        assert!(doc.preamble_injected);
        assert_eq!(doc.latex.matches(GRAPHICX_PACKAGE).count(), 1);
        assert!(doc
            .latex
            .starts_with("\\documentclass{article}\n\\usepackage{graphicx}\n"));
    }

    #[test]
    fn empty_slot_keeps_its_placeholder() {
        let doc = assemble(TEMPLATE, &[None, Some("figures/figure2.pdf")]);

        assert!(doc.latex.contains("%%FIGURE_PLACEHOLDER_1%%"));
        assert!(!doc.latex.contains("%%FIGURE_PLACEHOLDER_2%%"));
        assert!(!doc.latex.contains("figures/figure1.pdf"));
        assert_eq!(doc.merged, vec![2]);
        assert_eq!(doc.unfilled, vec![1]);
    }

    #[test]
    fn placeholders_beyond_the_slot_list_are_unfilled() {
        let doc = assemble(TEMPLATE, &[Some("figures/figure1.pdf")]);
        assert_eq!(doc.unfilled, vec![2]);
        assert!(doc.latex.contains("%%FIGURE_PLACEHOLDER_2%%"));
    }

    #[test]
    fn third_placeholder_survives_two_artifacts() {
        let template = "\\documentclass{article}\n\\begin{document}\n\
                        %%FIGURE_PLACEHOLDER_1%%\n\
                        %%FIGURE_PLACEHOLDER_2%%\n\
                        %%FIGURE_PLACEHOLDER_3%%\n\
                        \\end{document}\n";
        let doc = assemble(
            template,
            &[Some("figures/figure1.pdf"), Some("figures/figure2.pdf")],
        );

        assert!(doc.latex.contains("{figures/figure1.pdf}"));
        assert!(doc.latex.contains("{figures/figure2.pdf}"));
        assert!(!doc.latex.contains("%%FIGURE_PLACEHOLDER_1%%"));
        assert!(!doc.latex.contains("%%FIGURE_PLACEHOLDER_2%%"));
        assert!(doc.latex.contains("%%FIGURE_PLACEHOLDER_3%%"));
        assert_eq!(doc.merged, vec![1, 2]);
        assert_eq!(doc.unfilled, vec![3]);
        assert!(doc.preamble_injected);
    }

    #[test]
    fn nothing_merged_leaves_template_untouched() {
        let doc = assemble::<&str>(TEMPLATE, &[None, None]);
        assert_eq!(doc.latex, TEMPLATE);
        assert!(!doc.preamble_injected);
        assert_eq!(doc.unfilled, vec![1, 2]);

        let doc = assemble::<String>(TEMPLATE, &[]);
        assert_eq!(doc.latex, TEMPLATE);
    }

    #[test]
    fn assembly_is_idempotent() {
        let artifacts = [Some("figures/figure1.pdf"), None];
        let once = assemble(TEMPLATE, &artifacts);
        let twice = assemble(&once.latex, &artifacts);

        assert_eq!(twice.latex, once.latex);
        assert_eq!(twice.unfilled, once.unfilled);
        assert!(!twice.preamble_injected);
        assert!(twice.merged.is_empty());
    }

    #[test]
    fn existing_graphicx_is_respected() {
        let template = "\\documentclass[11pt]{article}\n\
                        \\usepackage[final]{graphicx}\n\
                        \\begin{document}\n%%FIGURE_PLACEHOLDER_1%%\n\\end{document}\n";
        let doc = assemble(template, &[Some("figures/figure1.pdf")]);
        assert!(!doc.preamble_injected);
        assert!(!doc.latex.contains(GRAPHICX_PACKAGE));

        let multi = template.replace("[final]{graphicx}", "{amsmath,graphicx}");
        let doc = assemble(&multi, &[Some("figures/figure1.pdf")]);
        assert!(!doc.preamble_injected);
    }

    #[test]
    fn injects_after_documentclass_with_options() {
        let template = "% header\n\\documentclass[a4paper,12pt]{report}\n\
                        \\begin{document}\n%%FIGURE_PLACEHOLDER_1%%\n\\end{document}\n";
        let doc = assemble(template, &[Some("figures/figure1.pdf")]);
        assert!(doc
            .latex
            .contains("\\documentclass[a4paper,12pt]{report}\n\\usepackage{graphicx}\n"));
    }

    #[test]
    fn missing_documentclass_still_merges() {
        let doc = assemble("%%FIGURE_PLACEHOLDER_1%%", &[Some("figures/figure1.pdf")]);
        assert_eq!(doc.merged, vec![1]);
        assert!(!doc.preamble_injected);
        assert!(doc.latex.contains("\\includegraphics"));
    }

    #[test]
    fn repeated_placeholder_is_replaced_everywhere() {
        let template = "\\documentclass{article}\n%%FIGURE_PLACEHOLDER_1%%\n%%FIGURE_PLACEHOLDER_1%%\n";
        let doc = assemble(template, &[Some("figures/figure1.pdf")]);
        assert_eq!(doc.latex.matches("figures/figure1.pdf").count(), 2);
        assert!(doc.unfilled.is_empty());
    }

    #[test]
    fn placeholder_numbers_do_not_collide() {
        let template = "%%FIGURE_PLACEHOLDER_1%% %%FIGURE_PLACEHOLDER_11%%";
        let doc = assemble(template, &[Some("a.pdf")]);
        assert!(doc.latex.contains("%%FIGURE_PLACEHOLDER_11%%"));
        assert_eq!(doc.unfilled, vec![11]);
    }
}
