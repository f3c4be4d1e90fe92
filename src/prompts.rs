//! Prompts for the three LLM stages.
//!
//! Keeping every prompt here means the wording can change without touching
//! retry or assembly logic, and tests can inspect the exact text a stage
//! sends.

use crate::config::TextMode;
use crate::pipeline::task::AttemptLog;

/// System prompt shared by all stages.
pub const SYSTEM_PROMPT: &str = "You are an expert LaTeX typesetter and technical illustrator. \
Follow the output format instructions exactly and never add commentary.";

/// Instructions for turning page images into a LaTeX document with figure
/// placeholders.
const TEXT_PROMPT_BODY: &str = r#"Format the output as a complete, compilable LaTeX document.

Where a figure, chart, or diagram appears on the pages, insert a placeholder
comment on its own line in the format:
%%FIGURE_PLACEHOLDER_n%%
where n is a sequential 1-based index in reading order. Number the
placeholders in the same order in which the figures appear.

Do not try to reproduce the figures themselves.

Output ONLY the LaTeX code, starting with \documentclass{article}."#;

/// Instructions for listing the figures on the page images.
pub const DESCRIBE_FIGURES_PROMPT: &str = r#"Analyze the following page images. Identify each distinct figure, chart, or diagram, in reading order.
For each one you find, provide a detailed, one-sentence description that is precise enough to redraw it.

Format your response as a numbered list. For example:
1. A bar chart showing quarterly profits.
2. A diagram of the system architecture.

If no figures are found, reply with an empty response."#;

/// Build the text-stage prompt for the selected mode.
pub fn text_prompt(mode: TextMode) -> String {
    format!("{}\n\n{}", mode.instruction(), TEXT_PROMPT_BODY)
}

/// Build the figure-code prompt for one attempt.
///
/// Every earlier failed render is replayed in order (code plus compiler
/// output) so the model can correct its previous mistakes.
pub fn figure_code_prompt(description: &str, feedback: &AttemptLog) -> String {
    let mut prompt = format!(
        "Generate Asymptote code to create a vector graphic for the following description.\n\
         The code must be self-contained and ready to compile with 'asy'.\n\
         Do not include any explanations, just the raw Asymptote code.\n\n\
         Description: \"{description}\""
    );

    if !feedback.is_empty() {
        prompt.push_str("\n\nPrevious attempts failed to compile. Fix the errors below.");
        for entry in feedback.entries() {
            prompt.push_str(&format!(
                "\n\n--- Attempt {} ---\nCode:\n{}\nError:\n{}",
                entry.attempt, entry.code, entry.diagnostic
            ));
        }
    }

    prompt
}
