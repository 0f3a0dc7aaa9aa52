//! Parsing of orchestrator model replies.
//!
//! The orchestrator is asked for a `provider:model` token but in practice
//! replies in two shapes: the bare token, or a minimal JSON object
//! `{"provider": ..., "model": ...}`. Anything else is an explicit Invalid
//! outcome that feeds the heuristic fallback — never a thrown error that
//! aborts the turn.

use serde::Deserialize;

/// The outcome of parsing one orchestrator reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDecision {
    /// A well-formed provider/model pair (not yet validated against the
    /// manifest).
    Choice { provider: String, model: String },
    /// The reply matched neither accepted shape.
    Invalid,
}

#[derive(Deserialize)]
struct JsonChoice {
    provider: String,
    model: String,
}

/// Parse an orchestrator reply into a tagged decision.
pub fn parse_decision(reply: &str) -> ParsedDecision {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return ParsedDecision::Invalid;
    }

    // Shape 1: minimal JSON object
    if trimmed.starts_with('{') {
        if let Ok(choice) = serde_json::from_str::<JsonChoice>(trimmed) {
            let provider = choice.provider.trim().to_lowercase();
            let model = choice.model.trim().to_string();
            if !provider.is_empty() && !model.is_empty() {
                return ParsedDecision::Choice { provider, model };
            }
        }
        return ParsedDecision::Invalid;
    }

    // Shape 2: "provider:model" token. The model ID may itself contain
    // colons, so split only on the first one.
    let lowered = trimmed.to_lowercase();
    let Some((provider, model)) = lowered.split_once(':') else {
        return ParsedDecision::Invalid;
    };

    let provider = provider.trim();
    let model = model.trim();
    if provider.is_empty()
        || model.is_empty()
        || provider.chars().any(char::is_whitespace)
        || model.chars().any(char::is_whitespace)
    {
        return ParsedDecision::Invalid;
    }

    ParsedDecision::Choice {
        provider: provider.to_string(),
        model: model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(provider: &str, model: &str) -> ParsedDecision {
        ParsedDecision::Choice {
            provider: provider.into(),
            model: model.into(),
        }
    }

    #[test]
    fn parses_bare_token() {
        assert_eq!(
            parse_decision("openai:gpt-4o"),
            choice("openai", "gpt-4o")
        );
    }

    #[test]
    fn token_is_lowercased_and_trimmed() {
        assert_eq!(
            parse_decision("  Google:Gemini-1.5-Pro \n"),
            choice("google", "gemini-1.5-pro")
        );
    }

    #[test]
    fn model_may_contain_colons() {
        assert_eq!(
            parse_decision("ollama:library/llama3:8b"),
            choice("ollama", "library/llama3:8b")
        );
    }

    #[test]
    fn parses_minimal_json_object() {
        assert_eq!(
            parse_decision(r#"{"provider": "openai", "model": "gpt-4o"}"#),
            choice("openai", "gpt-4o")
        );
    }

    #[test]
    fn json_with_extra_fields_still_parses() {
        assert_eq!(
            parse_decision(r#"{"provider": "google", "model": "gemini-1.5-pro", "reason": "long context"}"#),
            choice("google", "gemini-1.5-pro")
        );
    }

    #[test]
    fn json_missing_fields_is_invalid() {
        assert_eq!(
            parse_decision(r#"{"provider": "openai"}"#),
            ParsedDecision::Invalid
        );
    }

    #[test]
    fn json_empty_values_are_invalid() {
        assert_eq!(
            parse_decision(r#"{"provider": "", "model": "gpt-4o"}"#),
            ParsedDecision::Invalid
        );
    }

    #[test]
    fn prose_is_invalid() {
        assert_eq!(
            parse_decision("I would recommend using GPT-4o for this."),
            ParsedDecision::Invalid
        );
        assert_eq!(parse_decision(""), ParsedDecision::Invalid);
        assert_eq!(parse_decision("   "), ParsedDecision::Invalid);
        assert_eq!(parse_decision("just-a-model-name"), ParsedDecision::Invalid);
    }

    #[test]
    fn empty_sides_of_token_are_invalid() {
        assert_eq!(parse_decision(":gpt-4o"), ParsedDecision::Invalid);
        assert_eq!(parse_decision("openai:"), ParsedDecision::Invalid);
    }
}
