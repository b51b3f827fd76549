//! Section routing: decide which telemetry sections a question needs.
//!
//! The generator is asked for `{"sections": [...]}` but its reply is
//! untrusted text. Parsing yields an explicit [`ParseOutcome`] and the
//! fallback ladder in [`resolve`] always ends in a non-empty subset of the
//! catalog:
//!
//! 1. first brace-balanced JSON object with a `sections` key
//! 2. strict parse of the whole reply against the schema
//! 3. the previous turn's selection
//! 4. the full catalog

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uavchat_core::flight::{SectionId, SectionSet, join_sections};
use uavchat_core::provider::Generator;

use crate::context::History;
use crate::context::prompt;

/// Result of one parsing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A non-empty, whitelisted selection.
    Parsed(SectionSet),
    Failed,
}

/// Which rung of the fallback ladder produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Extracted,
    Strict,
    Previous,
    FullCatalog,
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteSource::Extracted => "extracted",
            RouteSource::Strict => "strict",
            RouteSource::Previous => "previous",
            RouteSource::FullCatalog => "full_catalog",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub sections: SectionSet,
    pub source: RouteSource,
}

/// Picks the telemetry sections relevant to a question.
pub struct SectionRouter {
    generator: Arc<dyn Generator>,
    history_window: usize,
}

impl SectionRouter {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            history_window: 5,
        }
    }

    /// Number of prior non-system turns shown to the generator.
    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn build_prompt(&self, question: &str, history: &History) -> String {
        prompt::router_prompt(question, &history.render_prior(self.history_window))
    }

    /// Route a question.
    ///
    /// Only a generator failure is an error; unusable replies fall through
    /// the ladder. There is no retry.
    pub async fn route(
        &self,
        question: &str,
        history: &History,
        previous: &SectionSet,
    ) -> uavchat_core::Result<RouteDecision> {
        let prompt = self.build_prompt(question, history);
        let raw = self.generator.generate(&prompt).await?;
        debug!(raw = %raw, "Router reply");

        let decision = resolve(&raw, previous);
        match decision.source {
            RouteSource::Extracted | RouteSource::Strict => info!(
                sections = %join_sections(&decision.sections),
                source = %decision.source,
                "Sections selected"
            ),
            RouteSource::Previous | RouteSource::FullCatalog => warn!(
                sections = %join_sections(&decision.sections),
                source = %decision.source,
                "Router reply unusable, falling back"
            ),
        }
        Ok(decision)
    }
}

/// Apply the fallback ladder to a raw router reply.
pub fn resolve(raw: &str, previous: &SectionSet) -> RouteDecision {
    if let ParseOutcome::Parsed(sections) = extract_sections(raw) {
        return RouteDecision {
            sections,
            source: RouteSource::Extracted,
        };
    }
    if let ParseOutcome::Parsed(sections) = parse_strict(raw) {
        return RouteDecision {
            sections,
            source: RouteSource::Strict,
        };
    }
    if !previous.is_empty() {
        return RouteDecision {
            sections: previous.clone(),
            source: RouteSource::Previous,
        };
    }
    RouteDecision {
        sections: SectionId::catalog(),
        source: RouteSource::FullCatalog,
    }
}

/// Use the first brace-balanced `{...}` span that decodes to an object
/// with a `sections` key.
///
/// Unknown names and non-string entries are dropped.
pub fn extract_sections(raw: &str) -> ParseOutcome {
    for (start, end) in balanced_spans(raw) {
        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&raw[start..=end]) else {
            continue;
        };
        let Some(sections) = object.get("sections") else {
            continue;
        };
        return whitelist(sections);
    }
    ParseOutcome::Failed
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionChoice {
    sections: Vec<SectionId>,
}

/// Parse the whole reply (optionally inside a ```json fence) as exactly
/// `{"sections": [<catalog names>]}`.
pub fn parse_strict(raw: &str) -> ParseOutcome {
    let body = strip_code_fence(raw.trim());
    match serde_json::from_str::<SectionChoice>(body) {
        Ok(choice) if !choice.sections.is_empty() => {
            ParseOutcome::Parsed(choice.sections.into_iter().collect())
        }
        _ => ParseOutcome::Failed,
    }
}

fn whitelist(sections: &Value) -> ParseOutcome {
    let selected: SectionSet = sections
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|name| name.parse::<SectionId>().ok())
                .collect()
        })
        .unwrap_or_default();

    if selected.is_empty() {
        ParseOutcome::Failed
    } else {
        ParseOutcome::Parsed(selected)
    }
}

/// Byte ranges of every brace-balanced `{...}` span, ordered by start.
///
/// One pass with a stack of open braces. Quotes only open a string while
/// some brace is open, so stray quotes in prose before the JSON are ignored.
/// An opening brace that never closes is dropped without hiding the spans
/// nested inside it.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(idx),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, idx));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_helpers::*;

    fn set(ids: &[SectionId]) -> SectionSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn extracts_plain_object() {
        let outcome = extract_sections(r#"{"sections": ["vehicle", "params"]}"#);
        assert_eq!(
            outcome,
            ParseOutcome::Parsed(set(&[SectionId::Params, SectionId::Vehicle]))
        );
    }

    #[test]
    fn extracts_object_wrapped_in_prose_and_fence() {
        let raw = "Sure! Here you go:\n```json\n{\"sections\": [\"attitude\"]}\n```\nLet me know.";
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Attitude]))
        );
    }

    #[test]
    fn skips_objects_without_sections_key() {
        let raw = r#"{"note": "thinking"} then {"sections": ["events"]}"#;
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Events]))
        );
    }

    #[test]
    fn finds_sections_nested_inside_another_object() {
        let raw = r#"{"result": {"sections": ["mission"]}, "confidence": 0.9}"#;
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Mission]))
        );
    }

    #[test]
    fn braces_inside_strings_do_not_break_balance() {
        let raw = r#"{"reason": "uses {time} keys", "sections": ["attitude", "trajectories"]}"#;
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Attitude, SectionId::Trajectories]))
        );
    }

    #[test]
    fn unknown_names_are_filtered_out() {
        let raw = r#"{"sections": ["vehicle", "battery", 7, null, "VEHICLE"]}"#;
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Vehicle]))
        );
    }

    #[test]
    fn first_sections_object_wins_even_when_empty() {
        let raw = r#"{"sections": ["gps"]} {"sections": ["vehicle"]}"#;
        assert_eq!(extract_sections(raw), ParseOutcome::Failed);
    }

    #[test]
    fn unclosed_outer_brace_keeps_inner_object() {
        let raw = r#"{"note": "cut off", {"sections": ["vehicle"]}"#;
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Vehicle]))
        );
    }

    #[test]
    fn stray_quote_in_prose_is_ignored() {
        let raw = r#"The "best {"sections": ["vehicle"]}"#;
        assert_eq!(
            extract_sections(raw),
            ParseOutcome::Parsed(set(&[SectionId::Vehicle]))
        );
    }

    #[test]
    fn balanced_spans_are_ordered_by_start() {
        let raw = r#"{"a": {"b": 1}} x {}"#;
        assert_eq!(balanced_spans(raw), vec![(0, 14), (6, 13), (18, 19)]);
    }

    #[test]
    fn long_run_of_open_braces_resolves_quickly() {
        let raw = "{".repeat(200_000);
        let started = std::time::Instant::now();
        let decision = resolve(&raw, &SectionSet::new());
        assert_eq!(decision.source, RouteSource::FullCatalog);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn strict_parse_accepts_fenced_schema() {
        let raw = "```json\n{\"sections\": [\"textMessages\"]}\n```";
        assert_eq!(
            parse_strict(raw),
            ParseOutcome::Parsed(set(&[SectionId::TextMessages]))
        );
    }

    #[test]
    fn strict_parse_rejects_unknown_names_and_fields() {
        assert_eq!(parse_strict(r#"{"sections": ["gps"]}"#), ParseOutcome::Failed);
        assert_eq!(
            parse_strict(r#"{"sections": ["vehicle"], "why": "x"}"#),
            ParseOutcome::Failed
        );
        assert_eq!(parse_strict(r#"{"sections": []}"#), ParseOutcome::Failed);
    }

    #[test]
    fn malformed_reply_reuses_previous_selection() {
        let previous = set(&[SectionId::Attitude, SectionId::Trajectories]);
        let decision = resolve("I think attitude and trajectories are relevant.", &previous);
        assert_eq!(decision.sections, previous);
        assert_eq!(decision.source, RouteSource::Previous);
    }

    #[test]
    fn malformed_reply_without_history_selects_full_catalog() {
        let decision = resolve("<<not json>>", &SectionSet::new());
        assert_eq!(decision.sections, SectionId::catalog());
        assert_eq!(decision.sections.len(), 8);
        assert_eq!(decision.source, RouteSource::FullCatalog);
    }

    #[test]
    fn empty_selection_falls_through_the_ladder() {
        let previous = set(&[SectionId::Params]);
        let decision = resolve(r#"{"sections": []}"#, &previous);
        assert_eq!(decision.source, RouteSource::Previous);
        assert_eq!(decision.sections, previous);
    }

    #[test]
    fn any_reply_resolves_to_non_empty_catalog_subset() {
        let catalog = SectionId::catalog();
        let replies = [
            "",
            "{",
            "}{",
            "{{{{",
            "{\"sections\": \"vehicle\"}",
            "{\"sections\": [\"flightModeChanges\", \"../etc/passwd\"]}",
            "{\"sections\": [{\"name\": \"events\"}]}",
            "null",
            "[\"vehicle\"]",
            "{\"sections\": [\"vehicle\"",
            "\"}{\"sections\": [\"params\"]}",
            "🚁 {\"sections\": [\"mission\", \"mission\"]} 🚁",
        ];
        for previous in [SectionSet::new(), set(&[SectionId::Events])] {
            for raw in replies {
                let decision = resolve(raw, &previous);
                assert!(!decision.sections.is_empty(), "empty selection for {raw:?}");
                assert!(decision.sections.is_subset(&catalog), "escaped catalog for {raw:?}");
            }
        }
    }

    #[tokio::test]
    async fn route_prompt_contains_window_but_not_system_turn() {
        let generator = Arc::new(ScriptedGenerator::texts(&[r#"{"sections": ["vehicle"]}"#]));
        let router = SectionRouter::new(generator.clone());

        let mut history = History::new("SYSTEM PERSONA");
        history.push_user("earlier question");
        history.push_assistant("earlier answer");
        history.push_user("what vehicle is this?");

        let decision = router
            .route("what vehicle is this?", &history, &SectionSet::new())
            .await
            .unwrap();
        assert_eq!(decision.sections, set(&[SectionId::Vehicle]));
        assert_eq!(decision.source, RouteSource::Extracted);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User: earlier question\nAssistant: earlier answer"));
        assert!(!prompts[0].contains("SYSTEM PERSONA"));
        assert!(prompts[0].contains("User question: \"what vehicle is this?\""));
    }

    #[tokio::test]
    async fn consecutive_unparsable_replies_keep_first_selection() {
        let generator = Arc::new(ScriptedGenerator::texts(&[
            r#"{"sections": ["attitude", "trajectories"]}"#,
            "sorry, I cannot help with that",
        ]));
        let router = SectionRouter::new(generator);
        let mut history = History::new("persona");

        history.push_user("how did it pitch?");
        let first = router
            .route("how did it pitch?", &history, &SectionSet::new())
            .await
            .unwrap();
        history.push_assistant("It pitched up to 12 degrees.");

        history.push_user("and after that?");
        let second = router
            .route("and after that?", &history, &first.sections)
            .await
            .unwrap();

        assert_eq!(second.sections, first.sections);
        assert_eq!(second.source, RouteSource::Previous);
    }

    #[tokio::test]
    async fn generator_failure_is_an_error() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(network_error())]));
        let router = SectionRouter::new(generator);
        let mut history = History::new("persona");
        history.push_user("q");

        let err = router.route("q", &history, &SectionSet::new()).await.unwrap_err();
        assert!(matches!(err, uavchat_core::Error::Provider(_)));
    }
}
