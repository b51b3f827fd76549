//! Prompt templates for the three pipeline stages.

use uavchat_core::flight::{SectionId, join_sections, section_descriptions};

/// Describes the exact JSON shape the router must answer with.
pub fn section_format_instructions() -> String {
    let allowed = SectionId::ALL
        .iter()
        .map(|id| format!("\"{}\"", id.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "The output must be a single JSON object with exactly one key, \"sections\", \
         whose value is a list of section names.\n\
         Every entry must be one of: {allowed}.\n\
         Example: {{\"sections\": [\"attitude\", \"trajectories\"]}}"
    )
}

pub fn router_prompt(question: &str, history_window: &str) -> String {
    format!(
        r#"You have access to these telemetry sections:
{sections}

Descriptions:
{descriptions}

Recent conversation:
{history_window}

User question: "{question}"

{format_instructions}

Reply ONLY with the JSON format specifying your chosen sections (or empty list if none). Be generous: if a follow-up question refers to earlier answers, keep the sections those answers needed."#,
        sections = join_sections(&SectionId::ALL),
        descriptions = section_descriptions(),
        format_instructions = section_format_instructions(),
    )
}

pub fn answer_prompt(
    question: &str,
    history_window: &str,
    summary: &str,
    section_names: &str,
    data: &str,
) -> String {
    format!(
        r#"Recent conversation:
{history_window}

Conversation summary so far:
{summary}

Here are the extracted sections ({section_names}):
{data}

User question: "{question}"

If the question involves time calculations (duration, intervals, etc.):
1. Identify all relevant timestamps across the provided sections
2. Determine the appropriate calculation method (min/max for duration, sequence analysis for patterns)
3. Include units in your answer (milliseconds, seconds, minutes)

Otherwise, answer the question directly.
If the request is ambiguous, ask a clarifying question instead of guessing.
Based on the conversation and this data, provide a direct, clear, accurate answer. Don't make the reasoning section too long."#
    )
}

pub fn summary_prompt(current_summary: &str, recent_turns: &str, max_words: usize) -> String {
    format!(
        r#"You maintain a running summary of a conversation about a UAV flight log.

Current summary:
{current_summary}

Latest turns:
{recent_turns}

Write an updated summary that folds the latest turns into the current summary.
Keep what the user asked, the figures and units given in answers, and any open questions.
Use at most {max_words} words. Reply with the summary text only."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_prompt_lists_catalog_and_shape() {
        let prompt = router_prompt("how high did it fly?", "User: hi\nAssistant: hello");
        assert!(prompt.contains("flightModeChanges, events, mission, attitude"));
        assert!(prompt.contains("textMessages: list of"));
        assert!(prompt.contains("\"how high did it fly?\""));
        assert!(prompt.contains("Assistant: hello"));
        assert!(prompt.contains("{\"sections\": [\"attitude\", \"trajectories\"]}"));
    }

    #[test]
    fn format_instructions_quote_every_section() {
        let text = section_format_instructions();
        for id in SectionId::ALL {
            assert!(text.contains(&format!("\"{}\"", id.as_str())));
        }
    }

    #[test]
    fn answer_prompt_carries_all_context() {
        let prompt = answer_prompt(
            "what vehicle?",
            "(no previous turns)",
            "No previous conversation.",
            "vehicle",
            "{\n  \"vehicle\": \"quadcopter\"\n}",
        );
        assert!(prompt.contains("\"quadcopter\""));
        assert!(prompt.contains("No previous conversation."));
        assert!(prompt.contains("Include units"));
        assert!(prompt.contains("clarifying question"));
    }

    #[test]
    fn summary_prompt_states_budget() {
        let prompt = summary_prompt("old", "User: q", 300);
        assert!(prompt.contains("at most 300 words"));
        assert!(prompt.contains("Current summary:\nold"));
    }
}
