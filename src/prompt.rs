//! Prompt templates for each output format
//!
//! Templates embed the input text at a `{text}` placeholder. Custom
//! templates supplied by the user must contain the placeholder to be
//! considered valid; callers resolve invalid custom templates back to
//! the built-in defaults before building.

use crate::types::FormatKind;

/// Placeholder token substituted with the input text.
pub const TEXT_PLACEHOLDER: &str = "{text}";

const NOTES_PROMPT: &str = "Please reformat the following text into well-structured notes with proper grammar, punctuation, and markdown formatting. Use headers (##, ###) for main topics, bullet points (-) for lists, and improve readability while preserving all important information:\n\n{text}";

const PROSE_PROMPT: &str = "Please reformat the following text into well-written prose with proper grammar, punctuation, and paragraph structure. Improve flow and readability while maintaining the original meaning and all key information:\n\n{text}";

const TODO_PROMPT: &str = "Please convert the following text into a well-organized to-do list using markdown checkbox syntax (- [ ]). Extract actionable items and organize them logically. Include any relevant context or details as sub-items:\n\n{text}";

const CUSTOM_PROMPT: &str = "Please reformat and improve the following text with proper grammar, punctuation, and structure while preserving all important information:\n\n{text}";

/// Built-in template for the given format.
pub const fn default_prompt(format: FormatKind) -> &'static str {
    match format {
        FormatKind::Notes => NOTES_PROMPT,
        FormatKind::Prose => PROSE_PROMPT,
        FormatKind::Todo => TODO_PROMPT,
        FormatKind::Custom => CUSTOM_PROMPT,
    }
}

/// All built-in templates, keyed by format.
pub const fn default_prompts() -> [(FormatKind, &'static str); 4] {
    [
        (FormatKind::Notes, NOTES_PROMPT),
        (FormatKind::Prose, PROSE_PROMPT),
        (FormatKind::Todo, TODO_PROMPT),
        (FormatKind::Custom, CUSTOM_PROMPT),
    ]
}

/// Builds the final prompt for one reformatting run.
///
/// Uses `template` when supplied, else the format's default, and
/// substitutes the input text for the first `{text}` occurrence only,
/// so input containing the literal placeholder cannot expand into later
/// template positions. A template without the placeholder passes
/// through unchanged.
pub fn build_prompt(text: &str, format: FormatKind, template: Option<&str>) -> String {
    template
        .unwrap_or_else(|| default_prompt(format))
        .replacen(TEXT_PLACEHOLDER, text, 1)
}

/// A usable template is non-blank and contains the placeholder.
pub fn validate_prompt(template: &str) -> bool {
    !template.trim().is_empty() && template.contains(TEXT_PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FORMATS: [FormatKind; 4] = [
        FormatKind::Notes,
        FormatKind::Prose,
        FormatKind::Todo,
        FormatKind::Custom,
    ];

    #[test]
    fn test_defaults_contain_placeholder() {
        for format in ALL_FORMATS {
            assert!(
                default_prompt(format).contains(TEXT_PLACEHOLDER),
                "default template for {format} is missing the placeholder"
            );
        }
    }

    #[test]
    fn test_default_templates_describe_their_format() {
        assert!(default_prompt(FormatKind::Notes).contains("headers"));
        assert!(default_prompt(FormatKind::Notes).contains("bullet points"));
        assert!(default_prompt(FormatKind::Prose).contains("paragraph structure"));
        assert!(default_prompt(FormatKind::Todo).contains("- [ ]"));
        assert!(default_prompt(FormatKind::Todo).contains("to-do list"));
    }

    #[test]
    fn test_default_prompts_lists_all_formats() {
        let all = default_prompts();
        assert_eq!(all.len(), 4);
        for (format, template) in all {
            assert_eq!(template, default_prompt(format));
        }
    }

    #[test]
    fn test_build_prompt_embeds_text_for_every_default() {
        for format in ALL_FORMATS {
            let prompt = build_prompt("the quick brown fox", format, None);
            assert!(prompt.contains("the quick brown fox"), "format {format}");
            assert!(!prompt.contains(TEXT_PLACEHOLDER), "format {format}");
        }
    }

    #[test]
    fn test_build_prompt_prefers_supplied_template() {
        let prompt = build_prompt("hello world", FormatKind::Notes, Some("Rewrite this: {text}"));
        assert_eq!(prompt, "Rewrite this: hello world");
    }

    #[test]
    fn test_build_prompt_replaces_first_occurrence_only() {
        let prompt = build_prompt("X", FormatKind::Custom, Some("A {text} B {text}"));
        assert_eq!(prompt, "A X B {text}");
    }

    #[test]
    fn test_build_prompt_with_placeholder_in_input() {
        // Input that itself contains "{text}" must not cascade into the
        // second template slot.
        let prompt = build_prompt(
            "literal {text} here",
            FormatKind::Custom,
            Some("{text} END {text}"),
        );
        assert_eq!(prompt, "literal {text} here END {text}");
    }

    #[test]
    fn test_build_prompt_passes_through_template_without_placeholder() {
        let prompt = build_prompt("ignored", FormatKind::Notes, Some("no slot here"));
        assert_eq!(prompt, "no slot here");
    }

    #[test]
    fn test_validate_prompt() {
        assert!(validate_prompt("Fix grammar: {text}"));
        assert!(!validate_prompt(""));
        assert!(!validate_prompt("   \n  "));
        assert!(!validate_prompt("Fix grammar but no slot"));
        assert!(!validate_prompt("{TEXT}"));
    }
}
